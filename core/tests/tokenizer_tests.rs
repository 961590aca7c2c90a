use finsearch_core::tokenizer::{tokenize, EnglishNormalizer};
use finsearch_core::TermNormalizer;

#[test]
fn it_normalizes_and_stems() {
    let toks = tokenize("Running Runners RUN! The café's menu.");
    let words: Vec<String> = toks.into_iter().map(|(w, _)| w).collect();
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // Unicode normalization keeps the accented letter as one token
    assert!(words.iter().any(|w| w.starts_with("caf")));
}

#[test]
fn it_filters_stopwords() {
    let toks = tokenize("The quick brown fox and the lazy dog");
    let words: Vec<String> = toks.into_iter().map(|(w, _)| w).collect();
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn query_tokens_hit_indexed_terms() {
    let indexed: Vec<String> = tokenize("Markets tumbled as investors sold stocks").into_iter().map(|(w, _)| w).collect();
    for raw in ["markets", "Tumbled", "STOCKS"] {
        let terms = EnglishNormalizer.normalize(raw);
        assert_eq!(terms.len(), 1, "{raw} -> {terms:?}");
        assert!(indexed.contains(&terms[0]), "{raw} -> {terms:?} not in {indexed:?}");
    }
}
