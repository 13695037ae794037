//! # PACS影像分诊模块
//!
//! 基于影像所见的相似病例检索（TF-IDF + 余弦相似度），
//! 以及结合相似病例向大模型请求的分诊优先级建议。

pub mod advisor;
pub mod backend;
pub mod prompt;
pub mod service;
pub mod similarity;
pub mod stop_words;

pub use advisor::{AdvisorSettings, TriageAdvisor};
pub use backend::{BackendConfig, BackendError, ChatCompletionsBackend, JudgmentRequest, TriageBackend};
pub use service::{StudyDetail, TriageOutcome, TriageService};
pub use similarity::{RankedMatch, RankerConfig, SimilarityRanker, TfIdfVectorizer};
