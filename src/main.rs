mod chatbot;
mod corpus;
mod error;
mod eval;
mod generator;
mod index;
mod retriever;
mod runner;
mod text;
mod utils;

use anyhow::{Result, anyhow};
use chatbot::Chatbot;
use clap::{Parser, Subcommand};
use index::VectorizerConfig;
use retriever::Retriever;
use runner::Runner;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Networking Q&A bot: TF-IDF retrieval over a fixed corpus plus
/// confidence-tiered response synthesis.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clean, deduplicate, augment and split a raw Q&A dataset
    Prepare {
        /// Raw JSON export: an array of {question, answer} records
        #[arg(long)]
        input: PathBuf,
        /// Directory for the processed splits
        #[arg(long, default_value = "data/processed")]
        out_dir: PathBuf,
        /// Shuffle seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Build the retrieval index from a prepared dataset
    Train {
        /// Prepared training split
        #[arg(long, default_value = "data/processed/network_qa_train.json")]
        data: PathBuf,
        /// Where to save the index snapshot
        #[arg(long)]
        model: Option<PathBuf>,
        /// Keep every term; needed for corpora too small for the default
        /// frequency filters
        #[arg(long)]
        permissive: bool,
    },
    /// Answer a single query and emit a JSON result
    Ask {
        /// The query text
        #[arg(long)]
        query: String,
        /// Path to a saved index snapshot
        #[arg(long)]
        model: Option<PathBuf>,
        /// Output file path, or "stdout"
        #[arg(long, default_value = "stdout")]
        output: String,
    },
    /// Interactive question loop
    Chat {
        /// Path to a saved index snapshot
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Poll a directory for query files and write response files
    Run {
        /// Path to a saved index snapshot
        #[arg(long)]
        model: Option<PathBuf>,
        /// Directory to poll for *_query.json files
        #[arg(long, default_value = "data/interface/input")]
        input_dir: PathBuf,
        /// Directory for response and error files
        #[arg(long, default_value = "data/interface/output")]
        output_dir: PathBuf,
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Measure retrieval accuracy on a held-out split
    Eval {
        /// Prepared evaluation split
        #[arg(long, default_value = "data/processed/network_qa_test.json")]
        data: PathBuf,
        /// Path to a saved index snapshot
        #[arg(long)]
        model: Option<PathBuf>,
        /// How many results to consider a hit within
        #[arg(long, default_value_t = 3)]
        top_k: usize,
        /// How many sample responses to print
        #[arg(long, default_value_t = 5)]
        samples: usize,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Prepare {
            input,
            out_dir,
            seed,
        } => {
            let stats = corpus::prepare_dataset(&input, &out_dir, seed)?;
            println!("Data processing completed:");
            println!("  Total Q&A pairs: {}", stats.total_pairs);
            println!("  Training pairs: {}", stats.train_pairs);
            println!("  Validation pairs: {}", stats.val_pairs);
            println!("  Test pairs: {}", stats.test_pairs);
            println!("  Average question length: {:.1} words", stats.avg_question_words);
            println!("  Average answer length: {:.1} words", stats.avg_answer_words);
            println!("\nNext step: run 'netqa train' to build the index");
            Ok(())
        }
        Commands::Train {
            data,
            model,
            permissive,
        } => {
            let pairs = corpus::load_corpus(&data)?;
            let config = if permissive {
                VectorizerConfig::permissive()
            } else {
                VectorizerConfig::default()
            };
            let mut retriever = Retriever::new(config);
            retriever.build(pairs)?;

            let model = resolve_model_path(model)?;
            retriever.save(&model)?;

            let stats = retriever.stats();
            println!(
                "Training complete: {} Q&A pairs, vocabulary size {}",
                stats.num_qa_pairs, stats.vocabulary_size
            );
            println!("Model saved to {}", model.display());
            println!("\nNext step: run 'netqa eval' or ask a question with 'netqa ask'");
            Ok(())
        }
        Commands::Ask {
            query,
            model,
            output,
        } => {
            let model = resolve_model_path(model)?;
            let result = match Chatbot::open(&model) {
                Ok(mut chatbot) => match chatbot.ask(&query) {
                    Ok(response) => serde_json::json!({"query": query, "response": response}),
                    Err(err) => serde_json::json!({"query": query, "error": err.to_string()}),
                },
                Err(err) => serde_json::json!({"query": query, "error": err.to_string()}),
            };
            let rendered = serde_json::to_string_pretty(&result)?;
            if output == "stdout" {
                println!("{rendered}");
            } else {
                std::fs::write(&output, rendered)?;
            }
            Ok(())
        }
        Commands::Chat { model } => {
            let model = resolve_model_path(model)?;
            let mut chatbot = Chatbot::open(&model)?;
            let stats = chatbot.stats();
            println!(
                "NetQA ready: {} Q&A pairs, {} vocabulary terms",
                stats.num_qa_pairs, stats.vocabulary_size
            );
            println!("Type your networking questions below. Type 'quit' to exit.");

            loop {
                let mut line = String::new();
                print!("\n> ");
                std::io::stdout().flush()?;
                if std::io::stdin().read_line(&mut line)? == 0 {
                    break; // EOF (Ctrl+D)
                }

                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                match query.to_lowercase().as_str() {
                    "quit" | "exit" | "q" => break,
                    "clear" => {
                        chatbot.clear_history();
                        println!("Conversation history cleared.");
                        continue;
                    }
                    "history" => {
                        for turn in chatbot.history() {
                            println!("{:?}: {}", turn.role, turn.content);
                        }
                        continue;
                    }
                    _ => {}
                }

                match chatbot.ask(query) {
                    Ok(response) => println!("\nNetQA: {response}"),
                    Err(err) => eprintln!("Error: {err}"),
                }
            }
            println!("Goodbye!");
            Ok(())
        }
        Commands::Run {
            model,
            input_dir,
            output_dir,
            interval_ms,
        } => {
            let model = resolve_model_path(model)?;
            let chatbot = Chatbot::open(&model)?;
            let mut runner = Runner::new(
                chatbot,
                input_dir,
                output_dir,
                Duration::from_millis(interval_ms),
            )?;
            runner.run().await?;
            Ok(())
        }
        Commands::Eval {
            data,
            model,
            top_k,
            samples,
        } => {
            let model = resolve_model_path(model)?;
            let mut chatbot = Chatbot::open(&model)?;
            let pairs = corpus::load_corpus(&data)?;

            let accuracy = eval::retrieval_accuracy(chatbot.retriever(), &pairs, top_k)?;
            println!("Retrieval accuracy (top-{top_k}): {:.1}%", accuracy * 100.0);

            if samples > 0 {
                let sampled = eval::sample_responses(&mut chatbot, &pairs, samples, 42)?;
                println!("\nSample responses:");
                for (i, sample) in sampled.iter().enumerate() {
                    println!("\n{}. Query: {}", i + 1, sample.query);
                    println!("   Response: {}", sample.generated_response);
                }
            }
            Ok(())
        }
    }
}

/// Explicit path if given, otherwise the per-user data directory.
fn resolve_model_path(model: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = model {
        return Ok(path);
    }
    let base = dirs::data_local_dir().ok_or_else(|| anyhow!("could not determine data directory"))?;
    Ok(base.join("netqa").join("retriever.json"))
}
