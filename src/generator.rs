use crate::index::Retrieval;
use crate::text;
use crate::utils;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rustc_hash::FxHashSet;

const TEMPLATES: &[&str] = &[
    "Based on networking principles, {}",
    "In computer networking, {}",
    "According to networking standards, {}",
    "From a technical perspective, {}",
    "In the context of telecommunications, {}",
    "{}",
];

const FALLBACKS: &[&str] = &[
    "I don't have specific information about that networking topic. Could you try rephrasing your question or asking about a more general networking concept?",
    "I'm not sure about that particular aspect of computer networks. Could you provide more context or ask about a related networking topic?",
    "That's not covered in my current knowledge base. I specialize in computer networks and telecommunications - could you ask about protocols, network architecture, or security?",
    "I don't have enough information to answer that question accurately. I'm trained on networking and telecommunications topics - perhaps you could ask about TCP/IP, routing, or network security?",
];

const HEDGES: &[&str] = &[
    "I found some related information, but I'm not entirely certain it answers your question. {} Please let me know if you'd like me to clarify anything.",
    "Based on what I know about networking, {} However, you might want to verify this information for your specific use case.",
    "Here's what I can tell you about this topic: {} If this doesn't fully answer your question, please feel free to ask for more details.",
];

/// Confidence tier of the best retrieval score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy)]
pub struct GeneratorConfig {
    pub high_confidence: f32,
    pub medium_confidence: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            high_confidence: 0.7,
            medium_confidence: 0.4,
        }
    }
}

/// Picks one index in `0..len` (`len` is always at least 1). Production
/// uses a seeded-from-entropy RNG for variety; tests inject `FixedSelector`
/// so output is deterministic.
pub trait Selector: Send {
    fn pick(&mut self, len: usize) -> usize;
}

pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    pub fn new() -> Self {
        RandomSelector {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Selector for RandomSelector {
    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

/// Always picks the same slot (clamped to the pool size).
pub struct FixedSelector(pub usize);

impl Selector for FixedSelector {
    fn pick(&mut self, len: usize) -> usize {
        self.0.min(len - 1)
    }
}

/// Turns ranked retrieval results into response text. Pure apart from the
/// selector; never fails: no results and weak matches are tiers, not errors.
pub struct Generator {
    config: GeneratorConfig,
    selector: Box<dyn Selector>,
}

impl Generator {
    pub fn new() -> Self {
        Self::with_selector(GeneratorConfig::default(), Box::new(RandomSelector::new()))
    }

    pub fn with_selector(config: GeneratorConfig, selector: Box<dyn Selector>) -> Self {
        Generator { config, selector }
    }

    pub fn generate(&mut self, results: &[Retrieval], query: &str) -> String {
        let Some(best) = results.first() else {
            tracing::info!(query = %utils::preview(query), "no matches, using fallback");
            return FALLBACKS[self.selector.pick(FALLBACKS.len())].to_string();
        };

        let confidence = self.confidence(best.score);
        tracing::info!(
            score = best.score,
            confidence = ?confidence,
            query = %utils::preview(query),
            "synthesizing response"
        );

        match confidence {
            Confidence::High => {
                let template = TEMPLATES[self.selector.pick(TEMPLATES.len())];
                finish(&template.replace("{}", &best.answer))
            }
            Confidence::Medium => {
                let combined = combine_answers(results);
                if combined.is_empty() {
                    finish(&best.answer)
                } else {
                    finish(&combined)
                }
            }
            Confidence::Low => {
                let hedge = HEDGES[self.selector.pick(HEDGES.len())];
                hedge.replace("{}", &best.answer)
            }
        }
    }

    fn confidence(&self, score: f32) -> Confidence {
        if score >= self.config.high_confidence {
            Confidence::High
        } else if score >= self.config.medium_confidence {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

impl Default for Generator {
    fn default() -> Self {
        Generator::new()
    }
}

/// Merge the top two answers: first two sentences of each, dropping
/// near-duplicates (case-insensitive after trimming) and sentences shorter
/// than four words, capped at three sentences overall.
fn combine_answers(results: &[Retrieval]) -> String {
    let mut picked: Vec<String> = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    for result in results.iter().take(2) {
        for sentence in text::split_sentences(&result.answer).into_iter().take(2) {
            if sentence.split_whitespace().count() < 4 {
                continue;
            }
            if !seen.insert(sentence.trim().to_lowercase()) {
                continue;
            }
            picked.push(sentence);
        }
    }
    picked.truncate(3);
    picked.join(" ")
}

/// Capitalize the first character and make sure the text ends in terminal
/// punctuation.
fn finish(answer: &str) -> String {
    let trimmed = answer.trim();
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut formatted: String = first.to_uppercase().collect();
    formatted.push_str(chars.as_str());
    if !formatted.ends_with(['.', '!', '?']) {
        formatted.push('.');
    }
    formatted
}
