use crate::corpus::QaPair;
use crate::error::{Error, Result};
use crate::index::{Index, Retrieval, VectorizerConfig};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RetrieverStats {
    pub num_qa_pairs: usize,
    pub vocabulary_size: usize,
}

enum State {
    Unbuilt,
    Ready(Index),
}

/// Owns the index lifecycle. A `Retriever` starts `Unbuilt`; `build` or
/// `load` moves it to `Ready` by installing a complete new `Index`, so
/// readers never observe a half-constructed snapshot.
pub struct Retriever {
    config: VectorizerConfig,
    state: State,
}

impl Retriever {
    pub fn new(config: VectorizerConfig) -> Self {
        Retriever {
            config,
            state: State::Unbuilt,
        }
    }

    pub fn build(&mut self, corpus: Vec<QaPair>) -> Result<()> {
        let index = Index::build(corpus, self.config.clone())?;
        self.state = State::Ready(index);
        Ok(())
    }

    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Retrieval>> {
        match &self.state {
            State::Ready(index) => index.retrieve(query, top_k),
            State::Unbuilt => Err(Error::NotBuilt),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        match &self.state {
            State::Ready(index) => index.save(path),
            State::Unbuilt => Err(Error::NotBuilt),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let index = Index::load(path)?;
        Ok(Retriever {
            config: index.config().clone(),
            state: State::Ready(index),
        })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    pub fn stats(&self) -> RetrieverStats {
        match &self.state {
            State::Ready(index) => RetrieverStats {
                num_qa_pairs: index.len(),
                vocabulary_size: index.vocabulary_size(),
            },
            State::Unbuilt => RetrieverStats {
                num_qa_pairs: 0,
                vocabulary_size: 0,
            },
        }
    }
}

impl Default for Retriever {
    fn default() -> Self {
        Retriever::new(VectorizerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn corpus() -> Vec<QaPair> {
        vec![
            QaPair {
                question: "what is tcp ip".to_string(),
                answer: "tcp ip is a suite of communication protocols".to_string(),
            },
            QaPair {
                question: "what is a router".to_string(),
                answer: "a router forwards packets between networks".to_string(),
            },
        ]
    }

    #[test]
    fn test_retrieve_before_build_fails() {
        let retriever = Retriever::new(VectorizerConfig::permissive());
        let err = retriever.retrieve("what is tcp ip", 3).unwrap_err();
        assert!(matches!(err, Error::NotBuilt));
    }

    #[test]
    fn test_save_before_build_fails() {
        let retriever = Retriever::new(VectorizerConfig::permissive());
        let err = retriever.save(Path::new("anywhere.json")).unwrap_err();
        assert!(matches!(err, Error::NotBuilt));
    }

    #[test]
    fn test_build_then_retrieve() {
        let mut retriever = Retriever::new(VectorizerConfig::permissive());
        retriever.build(corpus()).unwrap();
        assert!(retriever.is_ready());

        let results = retriever.retrieve("what is tcp ip", 2).unwrap();
        assert_eq!(results[0].question, "what is tcp ip");
        assert!(results[0].score >= 0.99);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("retriever.json");

        let mut retriever = Retriever::new(VectorizerConfig::permissive());
        retriever.build(corpus()).unwrap();
        retriever.save(&path).unwrap();

        let loaded = Retriever::load(&path).unwrap();
        assert!(loaded.is_ready());
        assert_eq!(loaded.stats().num_qa_pairs, 2);

        let results = loaded.retrieve("router", 1).unwrap();
        assert_eq!(results[0].question, "what is a router");
    }

    #[test]
    fn test_stats_reflect_lifecycle() {
        let mut retriever = Retriever::new(VectorizerConfig::permissive());
        assert_eq!(retriever.stats().num_qa_pairs, 0);
        retriever.build(corpus()).unwrap();
        let stats = retriever.stats();
        assert_eq!(stats.num_qa_pairs, 2);
        assert!(stats.vocabulary_size > 0);
    }
}
