//! 检查记录存储接口
//!
//! 分诊核心通过该接口读取检查记录并追加分诊结论，具体实现见 `pacs-database`。

use async_trait::async_trait;
use std::sync::{PoisonError, RwLock};

use crate::error::{PacsError, Result};
use crate::models::{Study, TriageJudgment};

/// 检查记录存储
#[async_trait]
pub trait StudyStore: Send + Sync {
    /// 全部检查，按检查时间倒序
    async fn list_studies(&self) -> Result<Vec<Study>>;

    /// 影像所见非空的检查，按检查时间倒序
    async fn list_studies_with_findings(&self) -> Result<Vec<Study>>;

    async fn get_study(&self, study_id: &str) -> Result<Option<Study>>;

    /// 最新一条分诊结论
    async fn get_latest_judgment(&self, study_id: &str) -> Result<Option<TriageJudgment>>;

    /// 追加分诊结论，历史记录不修改
    async fn append_judgment(&self, judgment: &TriageJudgment) -> Result<()>;
}

/// 内存存储，用于测试和演示
#[derive(Debug, Default)]
pub struct InMemoryStudyStore {
    studies: RwLock<Vec<Study>>,
    judgments: RwLock<Vec<TriageJudgment>>,
}

impl InMemoryStudyStore {
    pub fn new(studies: Vec<Study>) -> Self {
        Self {
            studies: RwLock::new(studies),
            judgments: RwLock::new(Vec::new()),
        }
    }

    pub fn insert_study(&self, study: Study) -> Result<()> {
        let mut studies = self.studies.write().map_err(lock_error)?;
        studies.retain(|s| s.study_id != study.study_id);
        studies.push(study);
        Ok(())
    }

    /// 某检查的全部分诊记录，按写入顺序
    pub fn judgments_for(&self, study_id: &str) -> Result<Vec<TriageJudgment>> {
        let judgments = self.judgments.read().map_err(lock_error)?;
        Ok(judgments.iter().filter(|j| j.study_id == study_id).cloned().collect())
    }

    fn sorted_studies(&self, filter: impl Fn(&Study) -> bool) -> Result<Vec<Study>> {
        let studies = self.studies.read().map_err(lock_error)?;
        let mut selected: Vec<Study> = studies.iter().filter(|s| filter(*s)).cloned().collect();
        selected.sort_by(|a, b| b.exam_datetime.cmp(&a.exam_datetime));
        Ok(selected)
    }
}

fn lock_error<T>(_: PoisonError<T>) -> PacsError {
    PacsError::Internal("In-memory store lock poisoned".to_string())
}

#[async_trait]
impl StudyStore for InMemoryStudyStore {
    async fn list_studies(&self) -> Result<Vec<Study>> {
        self.sorted_studies(|_| true)
    }

    async fn list_studies_with_findings(&self) -> Result<Vec<Study>> {
        self.sorted_studies(Study::has_findings)
    }

    async fn get_study(&self, study_id: &str) -> Result<Option<Study>> {
        let studies = self.studies.read().map_err(lock_error)?;
        Ok(studies.iter().find(|s| s.study_id == study_id).cloned())
    }

    async fn get_latest_judgment(&self, study_id: &str) -> Result<Option<TriageJudgment>> {
        let judgments = self.judgments.read().map_err(lock_error)?;
        // 同一时间戳时后写入者优先
        Ok(judgments
            .iter()
            .filter(|j| j.study_id == study_id)
            .max_by_key(|j| j.created_at)
            .cloned())
    }

    async fn append_judgment(&self, judgment: &TriageJudgment) -> Result<()> {
        let mut judgments = self.judgments.write().map_err(lock_error)?;
        judgments.push(judgment.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TriageCandidate, TriageLevel};
    use chrono::{Duration, TimeZone, Utc};

    fn study(id: &str, findings: Option<&str>, day: u32) -> Study {
        Study {
            study_id: id.to_string(),
            patient_id: format!("P-{}", id),
            modality: "CT".to_string(),
            body_part: "CHEST".to_string(),
            indication: "Cough".to_string(),
            findings_summary: findings.map(|f| f.to_string()),
            report_text: None,
            exam_datetime: Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
            site: "MAIN".to_string(),
            current_status: "NEW".to_string(),
            priority_flag: None,
        }
    }

    #[tokio::test]
    async fn test_listing_order_and_findings_filter() {
        let store = InMemoryStudyStore::new(vec![
            study("S1", Some("nodule"), 1),
            study("S2", None, 3),
            study("S3", Some(""), 4),
            study("S4", Some("effusion"), 2),
        ]);

        let all: Vec<String> = store.list_studies().await.unwrap().into_iter().map(|s| s.study_id).collect();
        assert_eq!(all, vec!["S3", "S2", "S4", "S1"]);

        let with_findings: Vec<String> = store
            .list_studies_with_findings()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.study_id)
            .collect();
        assert_eq!(with_findings, vec!["S4", "S1"]);

        assert!(store.get_study("S9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_judgments_are_append_only_latest_wins() {
        let store = InMemoryStudyStore::new(vec![study("S1", Some("nodule"), 1)]);
        assert!(store.get_latest_judgment("S1").await.unwrap().is_none());

        let now = Utc::now();
        let first = TriageJudgment::from_candidate("S1", &TriageCandidate::fallback("first"), now);
        let second = TriageJudgment::from_candidate(
            "S1",
            &TriageCandidate {
                triage_level: TriageLevel::Low,
                triage_score: 0.2,
                explanation: "second".to_string(),
            },
            now + Duration::seconds(5),
        );
        store.append_judgment(&second).await.unwrap();
        store.append_judgment(&first).await.unwrap();

        let latest = store.get_latest_judgment("S1").await.unwrap().unwrap();
        assert_eq!(latest.explanation, "second");
        assert_eq!(store.judgments_for("S1").unwrap().len(), 2);
    }
}
