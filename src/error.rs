use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("corpus is empty")]
    EmptyCorpus,

    #[error("no terms survived frequency filtering")]
    EmptyVocabulary,

    #[error("index not built; call build() or load() first")]
    NotBuilt,

    #[error("top_k must be at least 1, got {0}")]
    InvalidTopK(usize),

    #[error("corrupt index snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
