//! Query parsing, posting combination and ranking.
//!
//! A query is a whitespace separated list of clauses:
//!
//! ```text
//! word          term clause, all term clauses must match (AND)
//! ORG:Name      organization clause, adds 1.5 x its weight (OR)
//! PERSON:Name   person clause, adds 1.5 x its weight (OR)
//! -word         exclusion, drops every document containing the term
//! ```

use crate::index::{DocId, IndexCatalog};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

pub const DEFAULT_RESULT_LIMIT: usize = 15;

/// Multiplier applied to organization and person postings.
pub const ENTITY_BOOST: f64 = 1.5;

const ORG_PREFIX: &str = "ORG:";
const PERSON_PREFIX: &str = "PERSON:";

/// Maps a raw query token onto the terms it was indexed under.
pub trait TermNormalizer {
    /// Empty when nothing indexable is left; several terms when the token
    /// joins words, as in `S&P`.
    fn normalize(&self, token: &str) -> Vec<String>;
}

impl<F> TermNormalizer for F
where
    F: Fn(&str) -> Option<String>,
{
    fn normalize(&self, token: &str) -> Vec<String> { self(token).into_iter().collect() }
}

/// Classified clauses of one query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedQuery {
    pub terms: BTreeSet<String>,
    pub organizations: BTreeSet<String>,
    pub persons: BTreeSet<String>,
    pub exclusions: BTreeSet<String>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.organizations.is_empty() && self.persons.is_empty() && self.exclusions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub doc_id: DocId,
    pub score: f64,
    pub title: String,
    pub date: String,
    pub source: String,
}

pub struct QueryEngine<'a, N> {
    catalog: &'a IndexCatalog,
    normalizer: N,
}

impl<'a, N: TermNormalizer> QueryEngine<'a, N> {
    pub fn new(catalog: &'a IndexCatalog, normalizer: N) -> Self {
        Self { catalog, normalizer }
    }

    pub fn parse(&self, query: &str) -> ParsedQuery {
        let mut parsed = ParsedQuery::default();
        for token in query.split_whitespace() {
            if let Some(org) = token.strip_prefix(ORG_PREFIX).filter(|s| !s.is_empty()) {
                parsed.organizations.insert(org.to_owned());
            } else if let Some(person) = token.strip_prefix(PERSON_PREFIX).filter(|s| !s.is_empty()) {
                parsed.persons.insert(person.to_owned());
            } else if let Some(excluded) = token.strip_prefix('-').filter(|s| !s.is_empty()) {
                parsed.exclusions.extend(self.normalizer.normalize(excluded));
            } else {
                parsed.terms.extend(self.normalizer.normalize(token));
            }
        }
        parsed
    }

    /// Combine postings: AND over terms, boosted OR over entities, then exclusions.
    pub fn score(&self, parsed: &ParsedQuery) -> HashMap<DocId, f64> {
        let mut scores: HashMap<DocId, f64> = HashMap::new();

        let mut terms = parsed.terms.iter();
        if let Some(first) = terms.next() {
            scores.extend(self.catalog.search_word(first));
            for term in terms {
                let postings: HashMap<DocId, f64> = self.catalog.search_word(term).into_iter().collect();
                scores.retain(|doc_id, score| match postings.get(doc_id) {
                    Some(s) => {
                        *score += s;
                        true
                    }
                    None => false,
                });
            }
        }

        let entity_postings = parsed
            .organizations
            .iter()
            .map(|org| self.catalog.search_organization(org))
            .chain(parsed.persons.iter().map(|person| self.catalog.search_person(person)));
        for postings in entity_postings {
            for (doc_id, score) in postings {
                *scores.entry(doc_id).or_insert(0.0) += score * ENTITY_BOOST;
            }
        }

        for term in &parsed.exclusions {
            for (doc_id, _) in self.catalog.search_word(term) {
                scores.remove(&doc_id);
            }
        }
        scores
    }

    /// Attach metadata, order by score descending then doc id ascending, keep `limit`.
    pub fn rank(&self, scores: HashMap<DocId, f64>, limit: usize) -> Vec<QueryResult> {
        let mut results: Vec<QueryResult> = scores
            .into_iter()
            .map(|(doc_id, score)| {
                let meta = self.catalog.document(&doc_id);
                QueryResult {
                    title: meta.map(|m| m.title.clone()).unwrap_or_default(),
                    date: meta.map(|m| m.date.clone()).unwrap_or_default(),
                    source: meta.map(|m| m.source.clone()).unwrap_or_default(),
                    doc_id,
                    score,
                }
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id)));
        results.truncate(limit);
        results
    }

    pub fn process(&self, query: &str, limit: usize) -> Vec<QueryResult> {
        let parsed = self.parse(query);
        let scores = self.score(&parsed);
        let total_hits = scores.len();
        let results = self.rank(scores, limit);
        tracing::debug!(query, total_hits, returned = results.len(), "processed query");
        results
    }

    /// Article bodies are not kept in the index; front ends show this placeholder.
    pub fn full_article(&self, doc_id: &str) -> String {
        format!(
            "Article content for document ID: {doc_id}\n\
             The index stores titles and scores only; open the source article file to read the full text."
        )
    }
}
