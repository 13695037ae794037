//! 数据库模型

use chrono::{DateTime, Utc};
use pacs_core::{PacsError, Study, TriageJudgment, TriageLevel};
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 影像检查表
#[derive(Debug, FromRow)]
pub struct DbStudy {
    pub study_id: String,
    pub patient_id: String,
    pub modality: String,
    pub body_part: String,
    pub indication: String,
    pub findings_summary: Option<String>,
    pub report_text: Option<String>,
    pub exam_datetime: DateTime<Utc>,
    pub site: String,
    pub current_status: String,
    pub priority_flag: Option<String>,
}

impl From<DbStudy> for Study {
    fn from(db_study: DbStudy) -> Self {
        Study {
            study_id: db_study.study_id,
            patient_id: db_study.patient_id,
            modality: db_study.modality,
            body_part: db_study.body_part,
            indication: db_study.indication,
            findings_summary: db_study.findings_summary,
            report_text: db_study.report_text,
            exam_datetime: db_study.exam_datetime,
            site: db_study.site,
            current_status: db_study.current_status,
            priority_flag: db_study.priority_flag,
        }
    }
}

/// 分诊结论表
#[derive(Debug, FromRow)]
pub struct DbTriageJudgment {
    pub id: Uuid,
    pub study_id: String,
    pub triage_level: String, // 存储为字符串，转换为TriageLevel枚举
    pub triage_score: f64,
    pub ai_explanation: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbTriageJudgment> for TriageJudgment {
    type Error = PacsError;

    fn try_from(row: DbTriageJudgment) -> Result<Self, Self::Error> {
        // 库中的级别只由本服务写入，解析失败属于数据损坏
        let triage_level = row.triage_level.parse::<TriageLevel>().map_err(|e| {
            PacsError::Database(format!("Corrupt triage judgment {}: {}", row.id, e))
        })?;

        Ok(TriageJudgment {
            id: row.id,
            study_id: row.study_id,
            triage_level,
            triage_score: row.triage_score,
            explanation: row.ai_explanation,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(level: &str) -> DbTriageJudgment {
        DbTriageJudgment {
            id: Uuid::new_v4(),
            study_id: "S1".to_string(),
            triage_level: level.to_string(),
            triage_score: 0.7,
            ai_explanation: "Needs same-day read".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_judgment_row_conversion() {
        let judgment = TriageJudgment::try_from(row("HIGH")).unwrap();
        assert_eq!(judgment.triage_level, TriageLevel::High);
        assert_eq!(judgment.explanation, "Needs same-day read");

        assert!(matches!(TriageJudgment::try_from(row("CRITICAL")), Err(PacsError::Database(_))));
    }
}
