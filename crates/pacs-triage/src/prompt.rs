//! 分诊提示词

use pacs_core::{SimilarCase, Study};

/// 系统角色说明
pub const SYSTEM_PROMPT: &str =
    "You are a radiology operations AI assistant focused on study prioritization.";

const INSTRUCTIONS: &str = r#"You are an AI assistant helping a radiology operations team to PRIORITIZE imaging studies, not to make final diagnoses.

Your task:
- Read the current study information and a list of similar past cases.
- Propose a triage level: HIGH, MEDIUM, or LOW.
- Justify the triage level in operational terms (risk, symptoms, time-sensitivity).
- Do NOT overstep into giving definitive diagnoses; focus on urgency of review.
- Output in JSON with keys: triage_level, triage_score, explanation.

Response format:
{
  "triage_level": "HIGH|MEDIUM|LOW",
  "triage_score": 0.0-1.0,
  "explanation": "Operational justification focusing on urgency and workflow considerations"
}"#;

/// 渲染用户提示词：当前检查、按排序的相似病例和输出要求
pub fn render_prompt(study: &Study, similar_cases: &[SimilarCase]) -> String {
    let mut prompt = format!(
        "CURRENT STUDY:\n\
         - Study ID: {}\n\
         - Modality: {}\n\
         - Body Part: {}\n\
         - Indication: {}\n\
         - Findings: {}\n\
         - Current Status: {}\n\
         - Exam Time: {}\n\
         \n\
         SIMILAR PAST CASES:\n",
        study.study_id,
        study.modality,
        study.body_part,
        study.indication,
        study.findings_text(),
        study.current_status,
        study.exam_datetime.format("%Y-%m-%d %H:%M:%S"),
    );

    for (i, case) in similar_cases.iter().enumerate() {
        prompt.push_str(&render_case(i + 1, case));
    }

    prompt.push('\n');
    prompt.push_str(INSTRUCTIONS);
    prompt
}

fn render_case(number: usize, case: &SimilarCase) -> String {
    let past = &case.study;
    // 空字符串视为未设置
    let priority = past
        .priority_flag
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or("Not set");

    format!(
        "\n\
         Case {}:\n\
         - Study ID: {}\n\
         - Modality: {}\n\
         - Body Part: {}\n\
         - Indication: {}\n\
         - Findings: {}\n\
         - Previous Priority: {}\n\
         - Similarity Score: {:.2}\n",
        number,
        past.study_id,
        past.modality,
        past.body_part,
        past.indication,
        past.findings_text(),
        priority,
        case.similarity_score,
    )
}
