//! Text normalization shared by ingestion and query parsing.

use crate::query::TermNormalizer;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn fold(text: &str) -> String { text.nfkc().collect::<String>().to_lowercase() }

/// Tokenize text into (term, position) using NFKC normalization, lowercase, stopword removal, and stemming.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    Tokenizer::default().tokenize(text)
}

/// Tokenizer with a configurable stopword list on top of the built-in English one.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    extra_stopwords: HashSet<String>,
}

impl Tokenizer {
    /// Extend the built-in stopwords with a whitespace-separated word file.
    /// A missing or unreadable file only logs a warning.
    pub fn with_stopwords_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let extra_stopwords: HashSet<String> = text.split_whitespace().map(fold).collect();
                tracing::debug!(path = %path.display(), count = extra_stopwords.len(), "loaded stopwords");
                Self { extra_stopwords }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read stopwords file; using built-in list");
                Self::default()
            }
        }
    }

    fn is_stopword(&self, token: &str) -> bool {
        STOPWORDS.contains(token) || self.extra_stopwords.contains(token)
    }

    pub fn tokenize(&self, text: &str) -> Vec<(String, usize)> {
        let normalized = fold(text);
        let mut tokens = Vec::new();
        for (pos, mat) in RE.find_iter(&normalized).enumerate() {
            let token = mat.as_str();
            if self.is_stopword(token) { continue; }
            let stem = STEMMER.stem(token).to_string();
            tokens.push((stem, pos));
        }
        tokens
    }

    /// Per-term share of the retained tokens, `count / total`, sorted by term.
    pub fn term_frequencies(&self, text: &str) -> Vec<(String, f64)> {
        let tokens = self.tokenize(text);
        let total = tokens.len();
        if total == 0 {
            return Vec::new();
        }
        let mut counts: HashMap<String, usize> = HashMap::new();
        for (term, _pos) in tokens {
            *counts.entry(term).or_insert(0) += 1;
        }
        let mut freqs: Vec<(String, f64)> = counts
            .into_iter()
            .map(|(term, count)| (term, count as f64 / total as f64))
            .collect();
        freqs.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        freqs
    }
}

/// Runs query tokens through the ingestion pipeline with the built-in
/// stopwords, so `S&P` yields the same two terms an article containing it was
/// indexed under.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishNormalizer;

impl TermNormalizer for EnglishNormalizer {
    fn normalize(&self, token: &str) -> Vec<String> {
        tokenize(token).into_iter().map(|(term, _)| term).collect()
    }
}
