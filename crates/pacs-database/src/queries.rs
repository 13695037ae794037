//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use async_trait::async_trait;
use pacs_core::{Result, Study, StudyStore, TriageJudgment};

const STUDY_COLUMNS: &str = "study_id, patient_id, modality, body_part, indication, findings_summary, \
     report_text, exam_datetime, site, current_status, priority_flag";

/// 数据库查询操作接口
#[derive(Debug, Clone)]
pub struct DatabaseQueries {
    pool: DatabasePool,
}

impl DatabaseQueries {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 影像检查表，由外部采集流程写入
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS imaging_studies (
                study_id VARCHAR(64) PRIMARY KEY,
                patient_id VARCHAR(64) NOT NULL,
                modality VARCHAR(16) NOT NULL,
                body_part VARCHAR(64) NOT NULL,
                indication TEXT NOT NULL DEFAULT '',
                findings_summary TEXT,
                report_text TEXT,
                exam_datetime TIMESTAMP WITH TIME ZONE NOT NULL,
                site VARCHAR(64) NOT NULL DEFAULT '',
                current_status VARCHAR(32) NOT NULL,
                priority_flag VARCHAR(16)
            )
        "#).execute(pool).await?;

        // 分诊结论表，只追加
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS study_triage_ai (
                id UUID PRIMARY KEY,
                study_id VARCHAR(64) NOT NULL REFERENCES imaging_studies(study_id),
                triage_level VARCHAR(8) NOT NULL,
                triage_score DOUBLE PRECISION NOT NULL,
                ai_explanation TEXT NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
        "#).execute(pool).await?;

        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_imaging_studies_exam_datetime ON imaging_studies(exam_datetime DESC)",
            "CREATE INDEX IF NOT EXISTS idx_study_triage_ai_study_created ON study_triage_ai(study_id, created_at DESC)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql).execute(pool).await?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }
}

#[async_trait]
impl StudyStore for DatabaseQueries {
    async fn list_studies(&self) -> Result<Vec<Study>> {
        let results = sqlx::query_as::<_, DbStudy>(&format!(
            "SELECT {} FROM imaging_studies ORDER BY exam_datetime DESC",
            STUDY_COLUMNS
        ))
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(Study::from).collect())
    }

    async fn list_studies_with_findings(&self) -> Result<Vec<Study>> {
        let results = sqlx::query_as::<_, DbStudy>(&format!(
            "SELECT {} FROM imaging_studies \
             WHERE findings_summary IS NOT NULL AND findings_summary != '' \
             ORDER BY exam_datetime DESC",
            STUDY_COLUMNS
        ))
        .fetch_all(self.pool.pool())
        .await?;

        Ok(results.into_iter().map(Study::from).collect())
    }

    async fn get_study(&self, study_id: &str) -> Result<Option<Study>> {
        let result = sqlx::query_as::<_, DbStudy>(&format!(
            "SELECT {} FROM imaging_studies WHERE study_id = $1",
            STUDY_COLUMNS
        ))
        .bind(study_id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(result.map(Study::from))
    }

    async fn get_latest_judgment(&self, study_id: &str) -> Result<Option<TriageJudgment>> {
        let result = sqlx::query_as::<_, DbTriageJudgment>(
            "SELECT id, study_id, triage_level, triage_score, ai_explanation, created_at \
             FROM study_triage_ai WHERE study_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(study_id)
        .fetch_optional(self.pool.pool())
        .await?;

        result.map(TriageJudgment::try_from).transpose()
    }

    async fn append_judgment(&self, judgment: &TriageJudgment) -> Result<()> {
        sqlx::query(r#"
            INSERT INTO study_triage_ai (id, study_id, triage_level, triage_score, ai_explanation, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#)
        .bind(judgment.id)
        .bind(&judgment.study_id)
        .bind(judgment.triage_level.as_str())
        .bind(judgment.triage_score)
        .bind(&judgment.explanation)
        .bind(judgment.created_at)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }
}
