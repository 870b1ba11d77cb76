use crate::chatbot::Chatbot;
use crate::error::Result;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct QueryFile {
    id: Option<String>,
    query: Option<String>,
}

#[derive(Serialize)]
struct ResponseFile<'a> {
    id: &'a str,
    response: &'a str,
    timestamp: i64,
}

#[derive(Serialize)]
struct ErrorFile<'a> {
    id: &'a str,
    error: String,
    timestamp: i64,
}

/// File-based transport loop: maps `<id>_query.json` request files in the
/// input directory to `<id>_response.json` / `<id>_error.json` result files
/// in the output directory. Single consumer; transcript appends stay
/// single-writer.
pub struct Runner {
    chatbot: Chatbot,
    input_dir: PathBuf,
    output_dir: PathBuf,
    interval: Duration,
}

impl Runner {
    pub fn new(
        chatbot: Chatbot,
        input_dir: PathBuf,
        output_dir: PathBuf,
        interval: Duration,
    ) -> Result<Self> {
        utils::ensure_dir(&input_dir)?;
        utils::ensure_dir(&output_dir)?;
        tracing::info!("runner initialized");
        Ok(Runner {
            chatbot,
            input_dir,
            output_dir,
            interval,
        })
    }

    /// Poll until ctrl-c. A failed poll cycle is logged and the loop keeps
    /// going; only startup errors are fatal.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(input = %self.input_dir.display(), "monitoring for query files");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down query processor");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.poll().await {
                        tracing::error!(error = %err, "poll cycle failed");
                    }
                }
            }
        }
    }

    async fn poll(&mut self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.input_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // quarantined files keep the _query.json suffix; skip them
            if !name.ends_with("_query.json") || name.starts_with("error_") {
                continue;
            }
            match read_request(&path).await {
                Ok((id, query)) => {
                    self.process_query(&id, &query).await?;
                    tokio::fs::remove_file(&path).await?;
                }
                Err(reason) => {
                    tracing::warn!(file = %path.display(), reason, "invalid query file");
                    let quarantined = self.input_dir.join(format!("error_{name}"));
                    tokio::fs::rename(&path, &quarantined).await?;
                }
            }
        }
        Ok(())
    }

    /// Answer one request and write the result file. Failures inside the
    /// pipeline become an error file rather than killing the loop.
    pub async fn process_query(&mut self, id: &str, query: &str) -> Result<()> {
        tracing::info!(id, query = %utils::preview(query), "processing query");
        match self.chatbot.ask(query) {
            Ok(response) => {
                let output = self.output_dir.join(format!("{id}_response.json"));
                let body = serde_json::to_string_pretty(&ResponseFile {
                    id,
                    response: &response,
                    timestamp: chrono::Utc::now().timestamp(),
                })
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                tokio::fs::write(&output, body).await?;
                tracing::info!(id, "query processed");
            }
            Err(err) => {
                let output = self.output_dir.join(format!("{id}_error.json"));
                let body = serde_json::to_string_pretty(&ErrorFile {
                    id,
                    error: err.to_string(),
                    timestamp: chrono::Utc::now().timestamp(),
                })
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                tokio::fs::write(&output, body).await?;
                tracing::error!(id, error = %err, "query failed");
            }
        }
        Ok(())
    }
}

async fn read_request(path: &Path) -> std::result::Result<(String, String), &'static str> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|_| "unreadable")?;
    let parsed: QueryFile = serde_json::from_str(&data).map_err(|_| "malformed json")?;
    match (parsed.id, parsed.query) {
        (Some(id), Some(query)) if !id.is_empty() && !query.is_empty() => Ok((id, query)),
        _ => Err("missing id or query"),
    }
}
