use lazy_static::lazy_static;
use regex::Regex;
use rustc_hash::FxHashSet;
use unicode_normalization::UnicodeNormalization;

/// Literal compound-term rewrites. Applied before punctuation stripping so
/// slash-joined forms split into separate tokens instead of fusing.
const TERM_REWRITES: &[(&str, &str)] = &[
    ("tcp/ip", "tcp ip"),
    ("wi-fi", "wifi"),
    ("wi fi", "wifi"),
    ("e-mail", "email"),
];

lazy_static! {
    static ref DISALLOWED: Regex = Regex::new(r"[^\w\s.?!,()-]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref TOKEN: Regex = Regex::new(r"\w\w+").unwrap();
    static ref STOP_WORDS: FxHashSet<&'static str> = {
        let words = vec![
            "a", "an", "and", "are", "as", "at", "be", "by", "can", "could",
            "do", "does", "for", "from", "has", "he", "how", "i", "in", "is",
            "it", "its", "me", "my", "of", "on", "or", "so", "that", "the",
            "these", "this", "those", "to", "was", "we", "were", "what",
            "when", "where", "which", "who", "why", "will", "with", "would",
            "you", "your",
        ];
        words.into_iter().collect()
    };
}

/// Canonicalize raw text: NFC fold, lowercase, compound rewrites, strip
/// characters outside the word/whitespace/basic-punctuation allow-list,
/// collapse runs of whitespace.
pub fn normalize(text: &str) -> String {
    let mut text = text.nfc().collect::<String>().to_lowercase();
    for (from, to) in TERM_REWRITES {
        text = text.replace(from, to);
    }
    let text = DISALLOWED.replace_all(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Extract word tokens (two or more word characters) from normalized text,
/// dropping stop words.
pub fn tokenize(normalized: &str) -> Vec<String> {
    TOKEN
        .find_iter(normalized)
        .map(|m| m.as_str())
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Expand tokens into space-joined n-grams for every n in the range.
pub fn ngrams(tokens: &[String], (min_n, max_n): (usize, usize)) -> Vec<String> {
    let min_n = min_n.max(1);
    let mut terms = Vec::new();
    for n in min_n..=max_n.max(min_n) {
        for window in tokens.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}

/// Split text into sentences at `.`, `!` or `?` followed by whitespace or
/// end of text. Terminators stay on the sentence. No abbreviation handling.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = match chars.peek() {
                Some((_, next)) => next.is_whitespace(),
                None => true,
            };
            if at_boundary {
                let end = i + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}
