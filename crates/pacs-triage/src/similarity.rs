//! 相似病例检索
//!
//! 基于 TF-IDF 与余弦相似度对历史检查的影像所见进行排序。
//! 每次查询都以“语料 + 查询文本”重新建立词表，不做跨请求缓存；
//! 计算量随语料规模增长，语料变大时可缓存语料向量矩阵并在语料写入时失效。

use pacs_core::{PacsError, Result, SimilarCase, Study};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tracing::debug;

use crate::stop_words::is_stop_word;

/// 默认返回的相似病例数量
pub const DEFAULT_LIMIT: usize = 5;

/// 默认相似度阈值，得分需严格大于该值
pub const DEFAULT_THRESHOLD: f64 = 0.1;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\w\w+\b").unwrap())
}

/// 分词：小写化，保留两个及以上字符的词，剔除停用词后生成一元词与二元词组
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = token_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| !is_stop_word(w))
        .collect();

    let mut terms: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    terms.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

/// 稀疏向量，按词表下标有序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: BTreeMap<usize, f64>,
}

impl SparseVector {
    pub fn get(&self, index: usize) -> f64 {
        self.entries.get(&index).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn magnitude(&self) -> f64 {
        self.entries.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (small, large) = if self.len() <= other.len() { (self, other) } else { (other, self) };
        small
            .entries
            .iter()
            .filter_map(|(index, w)| large.entries.get(index).map(|v| w * v))
            .sum()
    }
}

/// 余弦相似度，任一向量模为0时返回0
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let norms = a.magnitude() * b.magnitude();
    if norms == 0.0 {
        return 0.0;
    }
    (a.dot(b) / norms).clamp(0.0, 1.0)
}

/// TF-IDF 向量化器
#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    /// 在给定文档集合上建立词表并计算平滑 IDF: ln((1 + n) / (1 + df)) + 1
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for terms in &tokenized {
            let unique: HashSet<&String> = terms.iter().collect();
            for term in unique {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
        }

        let n_docs = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            idf.push(((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(term, index);
        }

        Self { vocabulary, idf }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// 词频 × IDF，L2 归一化；词表外的词忽略
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut entries: BTreeMap<usize, f64> = BTreeMap::new();
        for term in tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *entries.entry(index).or_insert(0.0) += 1.0;
            }
        }
        for (index, weight) in entries.iter_mut() {
            *weight *= self.idf[*index];
        }

        let mut vector = SparseVector { entries };
        let norm = vector.magnitude();
        if norm > 0.0 {
            for weight in vector.entries.values_mut() {
                *weight /= norm;
            }
        }
        vector
    }
}

/// 相似度检索参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerConfig {
    pub limit: usize,
    pub threshold: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl RankerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(PacsError::Validation("Ranker limit must be at least 1".to_string()));
        }
        if !(0.0..1.0).contains(&self.threshold) {
            return Err(PacsError::Validation(format!(
                "Ranker threshold must be in [0, 1), got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// 单条检索结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch {
    /// 在输入语料中的位置
    pub position: usize,
    pub id: String,
    pub score: f64,
}

/// 相似度排序器
#[derive(Debug, Clone, Default)]
pub struct SimilarityRanker {
    config: RankerConfig,
}

impl SimilarityRanker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// 按与查询文本的相似度对语料排序
    ///
    /// 空文本条目在向量化前剔除；结果按得分降序，同分保持语料顺序，
    /// 最多 `limit` 条且得分均大于阈值。
    pub fn rank(&self, query: &str, corpus: &[(&str, &str)]) -> Vec<RankedMatch> {
        let candidates: Vec<(usize, &str, &str)> = corpus
            .iter()
            .enumerate()
            .filter(|(_, (_, text))| !text.trim().is_empty())
            .map(|(position, (id, text))| (position, *id, *text))
            .collect();

        if candidates.is_empty() {
            debug!("Similarity corpus is empty, skipping ranking");
            return Vec::new();
        }

        let mut documents: Vec<&str> = candidates.iter().map(|(_, _, text)| *text).collect();
        documents.push(query);
        let vectorizer = TfIdfVectorizer::fit(&documents);
        let query_vector = vectorizer.transform(query);

        let mut scored: Vec<RankedMatch> = candidates
            .iter()
            .map(|(position, id, text)| RankedMatch {
                position: *position,
                id: id.to_string(),
                score: cosine_similarity(&query_vector, &vectorizer.transform(text)),
            })
            .collect();

        // 稳定排序，同分保持语料顺序
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.config.limit);
        scored.retain(|m| m.score > self.config.threshold);

        debug!(
            "Ranked {} documents over {} terms, {} above threshold {}",
            candidates.len(),
            vectorizer.vocabulary_size(),
            scored.len(),
            self.config.threshold
        );
        scored
    }

    /// 针对检查记录的检索，返回带相似度的病例
    pub fn rank_studies(&self, query: &str, studies: &[Study]) -> Vec<SimilarCase> {
        let corpus: Vec<(&str, &str)> = studies
            .iter()
            .map(|s| (s.study_id.as_str(), s.findings_text()))
            .collect();

        self.rank(query, &corpus)
            .into_iter()
            .map(|m| SimilarCase {
                study: studies[m.position].clone(),
                similarity_score: m.score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn study(id: &str, findings: Option<&str>) -> Study {
        Study {
            study_id: id.to_string(),
            patient_id: format!("P-{}", id),
            modality: "CT".to_string(),
            body_part: "CHEST".to_string(),
            indication: "Chest pain".to_string(),
            findings_summary: findings.map(|f| f.to_string()),
            report_text: None,
            exam_datetime: Utc::now(),
            site: "MAIN".to_string(),
            current_status: "NEW".to_string(),
            priority_flag: None,
        }
    }

    #[test]
    fn test_tokenize_unigrams_and_bigrams() {
        let terms = tokenize("Acute chest pain with ST elevation");
        assert_eq!(
            terms,
            vec![
                "acute", "chest", "pain", "st", "elevation",
                "acute chest", "chest pain", "pain st", "st elevation",
            ]
        );
    }

    #[test]
    fn test_tokenize_drops_single_chars_and_stop_words() {
        let terms = tokenize("A 3 cm mass, no effusion");
        assert_eq!(terms, vec!["cm", "mass", "effusion", "cm mass", "mass effusion"]);
    }

    #[test]
    fn test_cosine_zero_magnitude() {
        let empty = SparseVector::default();
        let vectorizer = TfIdfVectorizer::fit(&["lung nodule"]);
        let v = vectorizer.transform("lung nodule");
        assert_eq!(cosine_similarity(&empty, &v), 0.0);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_chest_pain_scenario() {
        let ranker = SimilarityRanker::default();
        let corpus = [
            ("S1", "chest pain, no acute findings"),
            ("S2", "acute chest pain with ST elevation"),
        ];
        let ranked = ranker.rank("chest pain with ST elevation", &corpus);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "S2");
        assert_eq!(ranked[1].id, "S1");
        assert!(ranked[0].score > ranked[1].score);
        assert!(ranked[1].score > DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_identical_text_ranks_first() {
        let ranker = SimilarityRanker::default();
        let corpus = [
            ("A", "small renal cyst"),
            ("B", "left lower lobe consolidation"),
            ("C", "normal brain mri"),
        ];
        let ranked = ranker.rank("left lower lobe consolidation", &corpus);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "B");
        assert_eq!(ranked[0].position, 1);
        assert!((ranked[0].score - 1.0).abs() < 1e-9);
        assert!(ranked[0].score <= 1.0);
    }

    #[test]
    fn test_identical_documents_tie_in_corpus_order() {
        let ranker = SimilarityRanker::default();
        let corpus = [
            ("X", "fracture of distal radius"),
            ("B", "pneumothorax right apex"),
            ("A", "pneumothorax right apex"),
        ];
        let ranked = ranker.rank("right apex pneumothorax", &corpus);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "B");
        assert_eq!(ranked[1].id, "A");
        assert_eq!(ranked[0].score, ranked[1].score);
    }

    #[test]
    fn test_empty_corpus_after_filtering() {
        let ranker = SimilarityRanker::default();
        assert!(ranker.rank("chest pain", &[]).is_empty());
        assert!(ranker.rank("chest pain", &[("S1", ""), ("S2", "   ")]).is_empty());
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let ranker = SimilarityRanker::default();
        let ranked = ranker.rank("", &[("S1", "chest pain"), ("S2", "renal cyst")]);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_limit_and_ordering() {
        let ranker = SimilarityRanker::new(RankerConfig { limit: 3, threshold: 0.1 });
        let corpus = [
            ("S1", "pulmonary embolism right lower lobe"),
            ("S2", "pulmonary embolism"),
            ("S3", "embolism in segmental arteries"),
            ("S4", "right lower lobe pneumonia"),
            ("S5", "pulmonary embolism bilateral, right heart strain"),
            ("S6", "normal study"),
        ];
        let ranked = ranker.rank("pulmonary embolism right lower lobe", &corpus);

        // S1、S2、S4、S5 超过阈值，截断到3条
        let ids: Vec<&str> = ranked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S4", "S2"]);
        for pair in ranked.windows(2) {
            assert!(pair[0].score > pair[1].score);
        }
        for m in &ranked {
            assert!(m.score > 0.1 && m.score <= 1.0);
        }

        // 不截断时只有仅共享一个词的 S3 和毫无交集的 S6 被过滤
        let wide = SimilarityRanker::new(RankerConfig { limit: 10, threshold: 0.1 });
        let ids: Vec<String> = wide
            .rank("pulmonary embolism right lower lobe", &corpus)
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["S1", "S4", "S2", "S5"]);
    }

    #[test]
    fn test_rank_studies_skips_missing_findings() {
        let ranker = SimilarityRanker::default();
        let studies = vec![
            study("S1", None),
            study("S2", Some("acute appendicitis with periappendiceal fat stranding")),
            study("S3", Some("normal appendix")),
        ];
        let cases = ranker.rank_studies("acute appendicitis", &studies);

        assert_eq!(cases[0].study.study_id, "S2");
        assert!(cases.iter().all(|c| c.study.study_id != "S1"));
    }

    #[test]
    fn test_ranker_config_validation() {
        assert!(RankerConfig::default().validate().is_ok());
        assert!(RankerConfig { limit: 0, threshold: 0.1 }.validate().is_err());
        assert!(RankerConfig { limit: 5, threshold: 1.0 }.validate().is_err());
    }
}
