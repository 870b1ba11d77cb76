use crate::chatbot::Chatbot;
use crate::corpus::QaPair;
use crate::error::{Error, Result};
use crate::retriever::Retriever;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SampleResponse {
    pub query: String,
    pub expected_answer: String,
    pub generated_response: String,
}

/// Fraction of held-out questions whose expected answer appears among the
/// top-k retrieved answers (case-insensitive, trimmed).
pub fn retrieval_accuracy(retriever: &Retriever, pairs: &[QaPair], top_k: usize) -> Result<f32> {
    if pairs.is_empty() {
        return Err(Error::InvalidDataset("no evaluation pairs".to_string()));
    }

    let mut correct = 0usize;
    for (i, pair) in pairs.iter().enumerate() {
        let results = retriever.retrieve(&pair.question, top_k)?;
        let expected = pair.answer.trim().to_lowercase();
        if results
            .iter()
            .any(|r| r.answer.trim().to_lowercase() == expected)
        {
            correct += 1;
        }
        if (i + 1) % 10 == 0 {
            tracing::debug!(processed = i + 1, total = pairs.len(), "evaluation progress");
        }
    }

    let accuracy = correct as f32 / pairs.len() as f32;
    tracing::info!(top_k, accuracy, "retrieval accuracy computed");
    Ok(accuracy)
}

/// Generate responses for a seeded sample of held-out questions, for manual
/// quality inspection.
pub fn sample_responses(
    chatbot: &mut Chatbot,
    pairs: &[QaPair],
    sample_size: usize,
    seed: u64,
) -> Result<Vec<SampleResponse>> {
    let amount = sample_size.min(pairs.len());
    let mut rng = StdRng::seed_from_u64(seed);
    let indices = rand::seq::index::sample(&mut rng, pairs.len(), amount);

    let mut samples = Vec::with_capacity(amount);
    for i in indices {
        let pair = &pairs[i];
        let generated_response = chatbot.ask(&pair.question)?;
        samples.push(SampleResponse {
            query: pair.question.clone(),
            expected_answer: pair.answer.clone(),
            generated_response,
        });
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{FixedSelector, Generator, GeneratorConfig};
    use crate::index::VectorizerConfig;

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
            QaPair {
                question: "what is dns".to_string(),
                answer: "dns translates domain names into ip addresses".to_string(),
            },
        ]
    }

    fn ready_retriever() -> Retriever {
        let mut retriever = Retriever::new(VectorizerConfig::permissive());
        retriever.build(corpus()).unwrap();
        retriever
    }

    #[test]
    fn test_self_evaluation_is_perfect() {
        let retriever = ready_retriever();
        let accuracy = retrieval_accuracy(&retriever, &corpus(), 3).unwrap();
        assert_eq!(accuracy, 1.0);
    }

    #[test]
    fn test_unseen_pairs_score_zero() {
        let retriever = ready_retriever();
        let unseen = vec![QaPair {
            question: "what is bgp".to_string(),
            answer: "bgp exchanges routing information between systems".to_string(),
        }];
        let accuracy = retrieval_accuracy(&retriever, &unseen, 3).unwrap();
        assert_eq!(accuracy, 0.0);
    }

    #[test]
    fn test_empty_evaluation_set_rejected() {
        let retriever = ready_retriever();
        let err = retrieval_accuracy(&retriever, &[], 3).unwrap_err();
        assert!(matches!(err, Error::InvalidDataset(_)));
    }

    #[test]
    fn test_sampling_is_seeded_and_bounded() {
        let generator =
            Generator::with_selector(GeneratorConfig::default(), Box::new(FixedSelector(5)));
        let mut chatbot = Chatbot::new(ready_retriever(), generator);

        let samples = sample_responses(&mut chatbot, &corpus(), 2, 42).unwrap();
        assert_eq!(samples.len(), 2);

        let generator =
            Generator::with_selector(GeneratorConfig::default(), Box::new(FixedSelector(5)));
        let mut chatbot = Chatbot::new(ready_retriever(), generator);
        let again = sample_responses(&mut chatbot, &corpus(), 2, 42).unwrap();
        for (a, b) in samples.iter().zip(&again) {
            assert_eq!(a.query, b.query);
            assert_eq!(a.generated_response, b.generated_response);
        }

        // sample size larger than the dataset is clamped
        let generator =
            Generator::with_selector(GeneratorConfig::default(), Box::new(FixedSelector(5)));
        let mut chatbot = Chatbot::new(ready_retriever(), generator);
        let clamped = sample_responses(&mut chatbot, &corpus(), 50, 42).unwrap();
        assert_eq!(clamped.len(), 3);
    }
}
