use crate::error::Result;
use crate::generator::Generator;
use crate::retriever::Retriever;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChatbotStats {
    pub num_qa_pairs: usize,
    pub vocabulary_size: usize,
    pub conversation_length: usize,
}

/// Session wrapper: retrieval, synthesis, and the append-only transcript.
pub struct Chatbot {
    retriever: Retriever,
    generator: Generator,
    history: Vec<Turn>,
    top_k: usize,
}

impl Chatbot {
    pub fn new(retriever: Retriever, generator: Generator) -> Self {
        Chatbot {
            retriever,
            generator,
            history: Vec::new(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Load a saved index snapshot and assemble a ready-to-serve session.
    pub fn open(model_path: &Path) -> Result<Self> {
        let retriever = Retriever::load(model_path)?;
        tracing::info!("chatbot initialized");
        Ok(Chatbot::new(retriever, Generator::new()))
    }

    pub fn ask(&mut self, query: &str) -> Result<String> {
        self.history.push(Turn {
            role: Role::User,
            content: query.to_string(),
        });

        let results = self.retriever.retrieve(query, self.top_k)?;
        match results.first() {
            Some(best) => tracing::debug!(
                count = results.len(),
                best_score = best.score,
                "retrieved candidates"
            ),
            None => tracing::warn!(query = %utils::preview(query), "no candidates retrieved"),
        }

        let response = self.generator.generate(&results, query);
        self.history.push(Turn {
            role: Role::Assistant,
            content: response.clone(),
        });
        Ok(response)
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        tracing::info!("conversation history cleared");
    }

    pub fn stats(&self) -> ChatbotStats {
        let retriever = self.retriever.stats();
        ChatbotStats {
            num_qa_pairs: retriever.num_qa_pairs,
            vocabulary_size: retriever.vocabulary_size,
            conversation_length: self.history.len(),
        }
    }
}
