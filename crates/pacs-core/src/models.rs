//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PacsError;

/// 默认分诊分数
pub const FALLBACK_TRIAGE_SCORE: f64 = 0.5;

/// 影像检查记录
///
/// 由外部采集流程写入，分诊核心只读。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub study_id: String,
    pub patient_id: String,
    pub modality: String,                 // 检查设备类型 (CT, MR, DR等)
    pub body_part: String,                // 检查部位
    pub indication: String,               // 检查指征
    pub findings_summary: Option<String>, // 影像所见摘要
    pub report_text: Option<String>,      // 报告全文
    pub exam_datetime: DateTime<Utc>,
    pub site: String,
    pub current_status: String, // 工作流状态
    pub priority_flag: Option<String>,
}

impl Study {
    /// 影像所见文本，缺失时为空串
    pub fn findings_text(&self) -> &str {
        self.findings_summary.as_deref().unwrap_or("")
    }

    /// 是否含有可用于相似度检索的影像所见
    pub fn has_findings(&self) -> bool {
        !self.findings_text().trim().is_empty()
    }
}

/// 相似病例：检查记录加上查询时计算的相似度
///
/// 仅在单次查询内有效，不持久化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarCase {
    #[serde(flatten)]
    pub study: Study,
    pub similarity_score: f64,
}

/// 分诊级别
///
/// 序列化为大写；反序列化经由 `FromStr`，不区分大小写。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum TriageLevel {
    High,
    Medium,
    Low,
}

impl TriageLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriageLevel::High => "HIGH",
            TriageLevel::Medium => "MEDIUM",
            TriageLevel::Low => "LOW",
        }
    }
}

impl fmt::Display for TriageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriageLevel {
    type Err = PacsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => Ok(TriageLevel::High),
            "MEDIUM" => Ok(TriageLevel::Medium),
            "LOW" => Ok(TriageLevel::Low),
            other => Err(PacsError::Validation(format!("Unknown triage level: {}", other))),
        }
    }
}

impl TryFrom<String> for TriageLevel {
    type Error = PacsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 分诊建议候选
///
/// 字段名与后端返回的JSON一致。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageCandidate {
    pub triage_level: TriageLevel,
    pub triage_score: f64,
    pub explanation: String,
}

impl TriageCandidate {
    /// 默认的中等优先级建议
    pub fn fallback(explanation: impl Into<String>) -> Self {
        Self {
            triage_level: TriageLevel::Medium,
            triage_score: FALLBACK_TRIAGE_SCORE,
            explanation: explanation.into(),
        }
    }
}

/// 已保存的分诊结论
///
/// 每次分诊追加一条，展示时取最新一条。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageJudgment {
    pub id: Uuid,
    pub study_id: String,
    pub triage_level: TriageLevel,
    pub triage_score: f64,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

impl TriageJudgment {
    pub fn from_candidate(study_id: &str, candidate: &TriageCandidate, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            study_id: study_id.to_string(),
            triage_level: candidate.triage_level,
            triage_score: candidate.triage_score,
            explanation: candidate.explanation.clone(),
            created_at,
        }
    }

    pub fn candidate(&self) -> TriageCandidate {
        TriageCandidate {
            triage_level: self.triage_level,
            triage_score: self.triage_score,
            explanation: self.explanation.clone(),
        }
    }
}
