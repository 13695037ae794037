//! 分诊服务
//!
//! 读取检查与语料 → 相似病例检索 → 分诊建议 → 追加保存结论。

use chrono::Utc;
use pacs_core::{PacsError, Result, SimilarCase, Study, StudyStore, TriageCandidate, TriageJudgment};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::advisor::TriageAdvisor;
use crate::similarity::SimilarityRanker;

/// 检查详情
#[derive(Debug, Clone, Serialize)]
pub struct StudyDetail {
    pub study: Study,
    pub similar_cases: Vec<SimilarCase>,
    pub latest_triage: Option<TriageJudgment>,
}

/// 一次分诊的结果
#[derive(Debug, Clone, Serialize)]
pub struct TriageOutcome {
    pub triage: TriageCandidate,
    #[serde(skip)]
    pub judgment: TriageJudgment,
    pub similar_cases_count: usize,
}

pub struct TriageService<S: StudyStore> {
    store: Arc<S>,
    ranker: SimilarityRanker,
    advisor: TriageAdvisor,
}

impl<S: StudyStore> TriageService<S> {
    pub fn new(store: Arc<S>, ranker: SimilarityRanker, advisor: TriageAdvisor) -> Self {
        Self { store, ranker, advisor }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn advisor(&self) -> &TriageAdvisor {
        &self.advisor
    }

    /// 全部检查，按检查时间倒序
    pub async fn list_studies(&self) -> Result<Vec<Study>> {
        self.store.list_studies().await
    }

    /// 在当前语料中检索与影像所见相似的病例
    pub async fn find_similar_cases(&self, findings: &str) -> Result<Vec<SimilarCase>> {
        let corpus = self.store.list_studies_with_findings().await?;
        Ok(self.ranker.rank_studies(findings, &corpus))
    }

    pub async fn study_detail(&self, study_id: &str) -> Result<StudyDetail> {
        let study = self.load_study(study_id).await?;
        let latest_triage = self.store.get_latest_judgment(study_id).await?;
        let similar_cases = self.find_similar_cases(study.findings_text()).await?;

        Ok(StudyDetail {
            study,
            similar_cases,
            latest_triage,
        })
    }

    /// 对检查执行分诊并追加保存结论
    pub async fn triage_study(&self, study_id: &str) -> Result<TriageOutcome> {
        let study = self.load_study(study_id).await?;
        let similar_cases = self.find_similar_cases(study.findings_text()).await?;

        let triage = self.advisor.advise(&study, &similar_cases).await;
        let judgment = TriageJudgment::from_candidate(study_id, &triage, Utc::now());
        self.store.append_judgment(&judgment).await?;

        info!(
            "Saved triage {} for study {} with {} similar cases",
            judgment.triage_level,
            study_id,
            similar_cases.len()
        );

        Ok(TriageOutcome {
            triage,
            judgment,
            similar_cases_count: similar_cases.len(),
        })
    }

    async fn load_study(&self, study_id: &str) -> Result<Study> {
        self.store
            .get_study(study_id)
            .await?
            .ok_or_else(|| PacsError::NotFound(format!("Study {}", study_id)))
    }
}
