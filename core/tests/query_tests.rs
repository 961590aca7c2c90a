use finsearch_core::{EnglishNormalizer, IndexCatalog, IngestDocument, QueryEngine, DEFAULT_RESULT_LIMIT};

fn ids(results: &[finsearch_core::QueryResult]) -> Vec<&str> {
    results.iter().map(|r| r.doc_id.as_str()).collect()
}

fn two_doc_catalog() -> IndexCatalog {
    let mut catalog = IndexCatalog::new();
    catalog.ingest(IngestDocument {
        doc_id: "d1".into(),
        title: "Google beats estimates".into(),
        date: "2018-02-01".into(),
        source: "reuters".into(),
        terms: vec![("stock".into(), 0.5)],
        organizations: vec!["Google".into()],
        persons: vec![],
    })
    .unwrap();
    catalog.ingest(IngestDocument {
        doc_id: "d2".into(),
        title: "Markets close flat".into(),
        terms: vec![("stock".into(), 0.3)],
        ..Default::default()
    })
    .unwrap();
    catalog
}

#[test]
fn term_query_ranks_by_score() {
    let catalog = two_doc_catalog();
    let engine = QueryEngine::new(&catalog, EnglishNormalizer);
    let results = engine.process("stock", DEFAULT_RESULT_LIMIT);
    assert_eq!(ids(&results), vec!["d1", "d2"]);
    assert!(results[0].score >= results[1].score);
    assert_eq!(results[0].title, "Google beats estimates");
    assert_eq!(results[0].source, "reuters");
}

#[test]
fn organization_query_uses_entity_boost() {
    let catalog = two_doc_catalog();
    let engine = QueryEngine::new(&catalog, EnglishNormalizer);
    let results = engine.process("ORG:Google", DEFAULT_RESULT_LIMIT);
    assert_eq!(ids(&results), vec!["d1"]);
    assert_eq!(results[0].score, 1.5);
}

#[test]
fn self_exclusion_empties_results() {
    let catalog = two_doc_catalog();
    let engine = QueryEngine::new(&catalog, EnglishNormalizer);
    assert!(engine.process("stock -stock", DEFAULT_RESULT_LIMIT).is_empty());
}

#[test]
fn terms_are_intersected_and_summed() {
    let mut catalog = IndexCatalog::new();
    for (doc, a, b) in [("1", Some(0.1), None), ("2", Some(0.2), Some(1.0)), ("3", Some(0.3), Some(2.0)), ("4", None, Some(4.0))] {
        if let Some(s) = a {
            catalog.add_term("alpha", doc, s);
        }
        if let Some(s) = b {
            catalog.add_term("beta", doc, s);
        }
    }
    let engine = QueryEngine::new(&catalog, |t: &str| Some(t.to_owned()));
    let results = engine.process("alpha beta", 10);
    assert_eq!(ids(&results), vec!["3", "2"]);
    assert!((results[0].score - 2.3).abs() < 1e-12);
    assert!((results[1].score - 1.2).abs() < 1e-12);
}

#[test]
fn entity_matches_bypass_term_intersection() {
    let mut catalog = two_doc_catalog();
    catalog.ingest(IngestDocument {
        doc_id: "d3".into(),
        terms: vec![("bond".into(), 0.9)],
        persons: vec!["Powell".into()],
        ..Default::default()
    })
    .unwrap();
    let engine = QueryEngine::new(&catalog, EnglishNormalizer);
    let results = engine.process("stock PERSON:Powell ORG:Google", 10);
    // d1: 0.5 + 1.5, d3 only through the person clause, d2 only through the term
    assert_eq!(ids(&results), vec!["d1", "d3", "d2"]);
    assert!((results[0].score - 2.0).abs() < 1e-12);
    assert_eq!(results[1].score, 1.5);
}

#[test]
fn exclusion_overrides_entity_match() {
    let catalog = two_doc_catalog();
    let engine = QueryEngine::new(&catalog, EnglishNormalizer);
    assert!(engine.process("ORG:Google -stocks", 10).is_empty());
}

#[test]
fn unknown_keys_yield_nothing() {
    let catalog = two_doc_catalog();
    let engine = QueryEngine::new(&catalog, EnglishNormalizer);
    assert!(engine.process("nonexistent ORG:Nobody", 10).is_empty());
    assert!(engine.process("", 10).is_empty());
}

#[test]
fn missing_second_term_clears_results() {
    let catalog = two_doc_catalog();
    let engine = QueryEngine::new(&catalog, EnglishNormalizer);
    assert!(engine.process("stock nonexistent", 10).is_empty());
}

#[test]
fn normalized_scores_are_what_queries_see() {
    let mut catalog = two_doc_catalog();
    for i in 0..8 {
        catalog.ingest(IngestDocument { doc_id: format!("filler{i}"), terms: vec![("other".into(), 1.0)], ..Default::default() }).unwrap();
    }
    catalog.finalize_corpus();
    let engine = QueryEngine::new(&catalog, EnglishNormalizer);
    let results = engine.process("stock", 10);
    // N = 10, df = 2
    let idf = (10.0f64 / 3.0).log10();
    assert!((results[0].score - 0.5 * idf).abs() < 1e-12);
    assert!((results[1].score - 0.3 * idf).abs() < 1e-12);
}
