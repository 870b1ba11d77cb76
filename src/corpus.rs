use crate::error::{Error, Result};
use crate::text;
use crate::utils;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One corpus entry. Also the on-disk record format of prepared datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub total_pairs: usize,
    pub train_pairs: usize,
    pub val_pairs: usize,
    pub test_pairs: usize,
    pub avg_question_words: f32,
    pub avg_answer_words: f32,
}

pub fn load_corpus(path: &Path) -> Result<Vec<QaPair>> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| Error::InvalidDataset(e.to_string()))
}

/// Clean, deduplicate, augment, shuffle and split a raw Q&A export into
/// train/val/test JSON files plus summary statistics. Deterministic for a
/// fixed seed.
pub fn prepare_dataset(input: &Path, out_dir: &Path, seed: u64) -> Result<DatasetStats> {
    let raw = load_corpus(input)?;
    tracing::info!(records = raw.len(), input = %input.display(), "loaded raw dataset");
    if raw.is_empty() {
        return Err(Error::InvalidDataset("no records in input".to_string()));
    }

    let mut pairs: Vec<QaPair> = raw
        .into_iter()
        .map(|pair| QaPair {
            question: text::normalize(&pair.question),
            answer: text::normalize(&pair.answer),
        })
        .filter(|pair| !pair.question.is_empty() && !pair.answer.is_empty())
        .collect();

    let before_dedup = pairs.len();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    pairs.retain(|pair| seen.insert(pair.question.clone()));
    tracing::info!(
        removed = before_dedup - pairs.len(),
        "dropped duplicate questions"
    );
    if pairs.is_empty() {
        return Err(Error::InvalidDataset(
            "every record was empty after cleaning".to_string(),
        ));
    }

    let mut pairs = augment(pairs);
    tracing::info!(total = pairs.len(), "dataset size after augmentation");

    let total_pairs = pairs.len();
    let avg_question_words = mean_words(pairs.iter().map(|p| p.question.as_str()));
    let avg_answer_words = mean_words(pairs.iter().map(|p| p.answer.as_str()));

    let mut rng = StdRng::seed_from_u64(seed);
    pairs.shuffle(&mut rng);

    let test_len = total_pairs / 10;
    let val_len = total_pairs / 10;
    let test: Vec<QaPair> = pairs.split_off(total_pairs - test_len);
    let val: Vec<QaPair> = pairs.split_off(pairs.len() - val_len);
    let train = pairs;

    utils::ensure_dir(out_dir)?;
    write_split(out_dir, "train", &train)?;
    write_split(out_dir, "val", &val)?;
    write_split(out_dir, "test", &test)?;

    let stats = DatasetStats {
        total_pairs,
        train_pairs: train.len(),
        val_pairs: val.len(),
        test_pairs: test.len(),
        avg_question_words,
        avg_answer_words,
    };
    let stats_json = serde_json::to_string_pretty(&stats)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(out_dir.join("dataset_stats.json"), stats_json)?;

    tracing::info!(
        train = stats.train_pairs,
        val = stats.val_pairs,
        test = stats.test_pairs,
        "dataset preparation complete"
    );
    Ok(stats)
}

/// Question-form variations: pairs phrased as "what is ..." also get an
/// "explain ..." variant and vice versa.
fn augment(pairs: Vec<QaPair>) -> Vec<QaPair> {
    let mut augmented = Vec::with_capacity(pairs.len() * 2);
    for pair in pairs {
        let variant = variant_question(&pair.question).map(|question| QaPair {
            question,
            answer: pair.answer.clone(),
        });
        augmented.push(pair);
        if let Some(variant) = variant {
            augmented.push(variant);
        }
    }
    augmented
}

fn variant_question(question: &str) -> Option<String> {
    if let Some(rest) = question.strip_prefix("what is") {
        Some(format!("explain{rest}"))
    } else {
        question
            .strip_prefix("explain")
            .map(|rest| format!("what is{rest}"))
    }
}

fn mean_words<'a>(texts: impl Iterator<Item = &'a str>) -> f32 {
    let mut words = 0usize;
    let mut count = 0usize;
    for t in texts {
        words += t.split_whitespace().count();
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        words as f32 / count as f32
    }
}

fn write_split(out_dir: &Path, name: &str, pairs: &[QaPair]) -> Result<()> {
    let path = out_dir.join(format!("network_qa_{name}.json"));
    let json = serde_json::to_string_pretty(pairs)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(&path, json)?;
    tracing::info!(count = pairs.len(), path = %path.display(), "wrote split");
    Ok(())
}
