//! 分诊建议
//!
//! 任何失败（未配置后端、调用出错、返回无法解析）都降级为中等优先级的默认建议，不向调用方抛错。

use pacs_core::{SimilarCase, Study, TriageCandidate};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::backend::{BackendConfig, BackendError, JudgmentRequest, TriageBackend, DEFAULT_MODEL};
use crate::prompt::{render_prompt, SYSTEM_PROMPT};

pub const UNAVAILABLE_EXPLANATION: &str =
    "Triage backend not configured. Please check API configuration.";

pub const PARSE_FAILURE_EXPLANATION: &str =
    "Unable to parse AI response. Defaulting to medium priority.";

/// 请求参数
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

impl From<&BackendConfig> for AdvisorSettings {
    fn from(config: &BackendConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// 分诊顾问
#[derive(Clone)]
pub struct TriageAdvisor {
    backend: Option<Arc<dyn TriageBackend>>,
    settings: AdvisorSettings,
}

impl TriageAdvisor {
    pub fn new(backend: Option<Arc<dyn TriageBackend>>, settings: AdvisorSettings) -> Self {
        Self { backend, settings }
    }

    /// 无后端，始终返回默认建议
    pub fn unavailable() -> Self {
        Self::new(None, AdvisorSettings::default())
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn settings(&self) -> &AdvisorSettings {
        &self.settings
    }

    /// 生成分诊建议，不会失败
    pub async fn advise(&self, study: &Study, similar_cases: &[SimilarCase]) -> TriageCandidate {
        let Some(backend) = &self.backend else {
            warn!("No triage backend configured, using fallback for study {}", study.study_id);
            return TriageCandidate::fallback(UNAVAILABLE_EXPLANATION);
        };

        let request = JudgmentRequest {
            model: self.settings.model.clone(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: render_prompt(study, similar_cases),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        match backend.judge(&request).await {
            Ok(candidate) => {
                info!(
                    "Study {} triaged as {} ({:.2}) by {}",
                    study.study_id,
                    candidate.triage_level,
                    candidate.triage_score,
                    backend.name()
                );
                candidate
            }
            Err(e @ (BackendError::MalformedResponse(_) | BackendError::EmptyResponse)) => {
                warn!("Unparseable triage response for study {}: {}", study.study_id, e);
                TriageCandidate::fallback(PARSE_FAILURE_EXPLANATION)
            }
            Err(e) => {
                error!("Error calling triage backend for study {}: {}", study.study_id, e);
                TriageCandidate::fallback(format!("API Error: {}. Defaulting to medium priority.", e))
            }
        }
    }
}
