use crate::corpus::QaPair;
use crate::error::{Error, Result};
use crate::text;
use crate::utils;
use ndarray::Array1;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Vocabulary fitting parameters. The defaults match a corpus in the low
/// thousands; toy corpora need `permissive()` or the frequency filters will
/// prune every term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// Terms in fewer documents than this are dropped.
    pub min_df: usize,
    /// Terms in more than this fraction of documents are dropped.
    pub max_df: f32,
    /// Vocabulary cap; highest aggregate corpus count wins.
    pub max_features: usize,
    /// Inclusive n-gram range, e.g. (1, 2) for unigrams and bigrams.
    pub ngram_range: (usize, usize),
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            min_df: 2,
            max_df: 0.95,
            max_features: 10_000,
            ngram_range: (1, 2),
        }
    }
}

impl VectorizerConfig {
    /// Thresholds that keep every term; for small corpora and tests.
    pub fn permissive() -> Self {
        Self {
            min_df: 1,
            max_df: 1.0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieval {
    pub question: String,
    pub answer: String,
    pub score: f32,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    format_version: u32,
    config: VectorizerConfig,
    terms: Vec<String>,
    idf: Array1<f32>,
    entries: Vec<QaPair>,
    vectors: Vec<Array1<f32>>,
}

/// A built, immutable TF-IDF index over a Q&A corpus. All methods take
/// `&self`; concurrent readers share one instance, and a rebuild constructs
/// a whole new `Index` to swap in.
#[derive(Debug)]
pub struct Index {
    config: VectorizerConfig,
    terms: Vec<String>,
    vocabulary: FxHashMap<String, usize>,
    idf: Array1<f32>,
    entries: Vec<QaPair>,
    vectors: Vec<Array1<f32>>,
}

impl Index {
    pub fn build(corpus: Vec<QaPair>, config: VectorizerConfig) -> Result<Self> {
        if corpus.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let docs: Vec<Vec<String>> = corpus
            .iter()
            .map(|pair| {
                let tokens = text::tokenize(&text::normalize(&pair.question));
                text::ngrams(&tokens, config.ngram_range)
            })
            .collect();

        let mut df: FxHashMap<String, usize> = FxHashMap::default();
        let mut aggregate: FxHashMap<String, u64> = FxHashMap::default();
        for terms in &docs {
            let mut seen: FxHashSet<&str> = FxHashSet::default();
            for term in terms {
                *aggregate.entry(term.clone()).or_insert(0) += 1;
                if seen.insert(term) {
                    *df.entry(term.clone()).or_insert(0) += 1;
                }
            }
        }

        let n_docs = corpus.len();
        let max_doc_count = config.max_df * n_docs as f32;
        let mut kept: Vec<(String, usize)> = df
            .into_iter()
            .filter(|(_, d)| *d >= config.min_df && (*d as f32) <= max_doc_count)
            .collect();
        if kept.is_empty() {
            return Err(Error::EmptyVocabulary);
        }
        if kept.len() > config.max_features {
            kept.sort_by(|a, b| {
                aggregate[&b.0]
                    .cmp(&aggregate[&a.0])
                    .then_with(|| a.0.cmp(&b.0))
            });
            kept.truncate(config.max_features);
        }

        let df_map: FxHashMap<String, usize> = kept.into_iter().collect();
        let mut terms: Vec<String> = df_map.keys().cloned().collect();
        terms.sort();
        let vocabulary: FxHashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();
        let idf: Array1<f32> = terms
            .iter()
            .map(|term| ((1.0 + n_docs as f32) / (1.0 + df_map[term] as f32)).ln() + 1.0)
            .collect();

        let vectors: Vec<Array1<f32>> = docs
            .iter()
            .map(|doc_terms| weigh(doc_terms, &vocabulary, &idf))
            .collect();

        tracing::info!(
            corpus = n_docs,
            vocabulary = terms.len(),
            "built tf-idf index"
        );

        Ok(Self {
            config,
            terms,
            vocabulary,
            idf,
            entries: corpus,
            vectors,
        })
    }

    /// Score the query against every document vector and return up to
    /// `top_k` results, best first. Ties keep corpus insertion order.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Retrieval>> {
        if top_k == 0 {
            return Err(Error::InvalidTopK(top_k));
        }

        let tokens = text::tokenize(&text::normalize(query));
        let query_terms = text::ngrams(&tokens, self.config.ngram_range);
        let query_vector = weigh(&query_terms, &self.vocabulary, &self.idf);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .map(|vector| vector.dot(&query_vector).clamp(0.0, 1.0))
            .enumerate()
            .collect();
        // sort_by is stable, so equal scores stay in corpus order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        if let Some(&(_, best)) = scored.first() {
            tracing::debug!(best_score = best, "scored query against corpus");
        }

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(i, score)| {
                let entry = &self.entries[i];
                Retrieval {
                    question: entry.question.clone(),
                    answer: entry.answer.clone(),
                    score,
                }
            })
            .collect())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            utils::ensure_dir(parent)?;
        }
        let snapshot = Snapshot {
            format_version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            terms: self.terms.clone(),
            idf: self.idf.clone(),
            entries: self.entries.clone(),
            vectors: self.vectors.clone(),
        };
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)?;
        tracing::info!(path = %path.display(), "saved index snapshot");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let snapshot: Snapshot =
            serde_json::from_str(&data).map_err(|e| Error::CorruptSnapshot(e.to_string()))?;
        let index = Self::from_snapshot(snapshot)?;
        tracing::info!(
            path = %path.display(),
            corpus = index.entries.len(),
            vocabulary = index.terms.len(),
            "loaded index snapshot"
        );
        Ok(index)
    }

    fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        if snapshot.format_version != SNAPSHOT_VERSION {
            return Err(Error::CorruptSnapshot(format!(
                "unsupported format version {}",
                snapshot.format_version
            )));
        }
        if snapshot.idf.len() != snapshot.terms.len() {
            return Err(Error::CorruptSnapshot(
                "idf length does not match vocabulary".to_string(),
            ));
        }
        if snapshot.vectors.len() != snapshot.entries.len() {
            return Err(Error::CorruptSnapshot(
                "vector count does not match corpus".to_string(),
            ));
        }
        if snapshot
            .vectors
            .iter()
            .any(|v| v.len() != snapshot.terms.len())
        {
            return Err(Error::CorruptSnapshot(
                "vector width does not match vocabulary".to_string(),
            ));
        }
        let vocabulary = snapshot
            .terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();
        Ok(Self {
            config: snapshot.config,
            terms: snapshot.terms,
            vocabulary,
            idf: snapshot.idf,
            entries: snapshot.entries,
            vectors: snapshot.vectors,
        })
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }
}

/// Count occurrences of in-vocabulary terms, weight by IDF, L2-normalize.
/// Out-of-vocabulary terms contribute nothing; an all-unknown input yields
/// the zero vector.
fn weigh(
    doc_terms: &[String],
    vocabulary: &FxHashMap<String, usize>,
    idf: &Array1<f32>,
) -> Array1<f32> {
    let mut vector: Array1<f32> = Array1::zeros(idf.len());
    for term in doc_terms {
        if let Some(&col) = vocabulary.get(term) {
            vector[col] += idf[col];
        }
    }
    let norm = vector.dot(&vector).sqrt();
    if norm > 0.0 {
        vector /= norm;
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pair(question: &str, answer: &str) -> QaPair {
        QaPair {
            question: question.to_string(),
            answer: answer.to_string(),
        }
    }

    fn network_corpus() -> Vec<QaPair> {
        vec![
            pair("what is tcp ip", "tcp ip is a suite of communication protocols"),
            pair("what is a router", "a router forwards packets between networks"),
            pair("what is a switch", "a switch connects devices on a local network"),
            pair("what is dns", "dns translates domain names into ip addresses"),
        ]
    }

    fn built() -> Index {
        Index::build(network_corpus(), VectorizerConfig::permissive()).unwrap()
    }

    #[test]
    fn test_empty_corpus_fails() {
        let err = Index::build(Vec::new(), VectorizerConfig::permissive()).unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus));
    }

    #[test]
    fn test_default_thresholds_prune_tiny_corpus() {
        let corpus = vec![
            pair("what is tcp ip", "a"),
            pair("what is a router", "b"),
        ];
        let err = Index::build(corpus, VectorizerConfig::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyVocabulary));
    }

    #[test]
    fn test_self_retrieval_is_top_hit() {
        let index = built();
        for entry in network_corpus() {
            let results = index.retrieve(&entry.question, 1).unwrap();
            assert_eq!(results[0].question, entry.question);
            assert!(results[0].score >= 0.99, "score was {}", results[0].score);
        }
    }

    #[test]
    fn test_scores_bounded_and_descending() {
        let index = built();
        let results = index.retrieve("how does a router forward packets", 4).unwrap();
        for window in results.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        for result in &results {
            assert!((0.0..=1.0).contains(&result.score));
        }
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let index = built();
        // a query with no corpus overlap scores every document 0.0
        let results = index.retrieve("zzz qqq xxx", 4).unwrap();
        let questions: Vec<&str> = results.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(
            questions,
            vec![
                "what is tcp ip",
                "what is a router",
                "what is a switch",
                "what is dns"
            ]
        );
        assert!(results.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn test_top_k_clamped_to_corpus_size() {
        let index = built();
        let results = index.retrieve("router", 50).unwrap();
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let index = built();
        let err = index.retrieve("router", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidTopK(0)));
    }

    #[test]
    fn test_retrieval_is_deterministic() {
        let index = built();
        let first = index.retrieve("what is dns", 4).unwrap();
        for _ in 0..10 {
            let again = index.retrieve("what is dns", 4).unwrap();
            for (a, b) in first.iter().zip(&again) {
                assert_eq!(a.question, b.question);
                assert_eq!(a.score.to_bits(), b.score.to_bits());
            }
        }
    }

    #[test]
    fn test_round_trip_preserves_retrieval() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("retriever.json");

        let mut corpus = network_corpus();
        for i in 0..20 {
            corpus.push(pair(
                &format!("what is protocol number {i}"),
                &format!("protocol number {i} is a networking protocol"),
            ));
        }
        let index = Index::build(corpus, VectorizerConfig::permissive()).unwrap();
        index.save(&path).unwrap();
        let loaded = Index::load(&path).unwrap();

        let queries: Vec<String> = (0..50)
            .map(|i| format!("how does protocol number {} compare to a router", i % 23))
            .collect();
        for query in &queries {
            let before = index.retrieve(query, 5).unwrap();
            let after = loaded.retrieve(query, 5).unwrap();
            assert_eq!(before.len(), after.len());
            for (a, b) in before.iter().zip(&after) {
                assert_eq!(a.question, b.question);
                assert_eq!(a.answer, b.answer);
                assert_eq!(a.score.to_bits(), b.score.to_bits());
            }
        }
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = Index::load(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptSnapshot(_)));
    }

    #[test]
    fn test_load_rejects_version_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("retriever.json");
        built().save(&path).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        value["format_version"] = serde_json::json!(99);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        let err = Index::load(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptSnapshot(_)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Index::load(Path::new("/nonexistent/retriever.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_max_features_caps_vocabulary() {
        let config = VectorizerConfig {
            max_features: 3,
            ..VectorizerConfig::permissive()
        };
        let index = Index::build(network_corpus(), config).unwrap();
        assert_eq!(index.vocabulary_size(), 3);
    }

    #[test]
    fn test_index_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Index>();
    }

    #[test]
    fn test_out_of_vocabulary_query_scores_zero() {
        let index = built();
        let results = index.retrieve("quantum chromodynamics", 1).unwrap();
        assert_eq!(results[0].score, 0.0);
    }
}
