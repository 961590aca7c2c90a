use crate::error::{IndexError, Result};
use crate::persist::{load_metadata, load_tree, save_metadata, save_tree, IndexPaths};
use crate::tree::{KeyIndex, PostingStore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub type DocId = String;

/// Organization and person postings record presence, not frequency.
pub const ENTITY_WEIGHT: f64 = 1.0;

/// Display metadata of one ingested document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentRecord {
    /// Carried as the map key on disk rather than inside the JSON object.
    #[serde(skip)]
    pub doc_id: DocId,
    pub title: String,
    pub date: String,
    pub source: String,
}

/// One document as handed over by the ingestion layer: terms already
/// case-folded and stemmed, each with its normalized frequency.
#[derive(Debug, Clone, Default)]
pub struct IngestDocument {
    pub doc_id: DocId,
    pub title: String,
    pub date: String,
    pub source: String,
    pub terms: Vec<(String, f64)>,
    pub organizations: Vec<String>,
    pub persons: Vec<String>,
}

/// The three key indexes plus the document registry.
///
/// Raw term frequencies are kept beside the searchable scores so every
/// normalization pass starts from them with the current corpus size. They are
/// not persisted, so a catalog read from disk holds final scores only and
/// refuses further ingestion.
#[derive(Debug, Default)]
pub struct IndexCatalog {
    terms: KeyIndex,
    raw_terms: KeyIndex,
    organizations: KeyIndex,
    persons: KeyIndex,
    known_documents: HashSet<DocId>,
    metadata: HashMap<DocId, DocumentRecord>,
    normalized: bool,
    loaded_from: Option<PathBuf>,
}

impl IndexCatalog {
    pub fn new() -> Self { Self::default() }

    /// Load a catalog previously written with [`IndexCatalog::save`].
    pub fn open<P: AsRef<Path>>(base: P) -> Result<Self> {
        let mut catalog = Self::new();
        catalog.load(base)?;
        Ok(catalog)
    }

    pub fn add_term(&mut self, term: &str, doc_id: &str, score: f64) {
        self.terms.insert(term, doc_id, score);
        self.raw_terms.insert(term, doc_id, score);
        self.normalized = false;
    }

    pub fn add_organization(&mut self, org: &str, doc_id: &str) {
        self.organizations.insert(org, doc_id, ENTITY_WEIGHT);
    }

    pub fn add_person(&mut self, person: &str, doc_id: &str) {
        self.persons.insert(person, doc_id, ENTITY_WEIGHT);
    }

    pub fn register_document(&mut self, doc_id: &str) {
        if !self.known_documents.contains(doc_id) {
            self.known_documents.insert(doc_id.to_owned());
            self.normalized = false;
        }
    }

    /// Last write wins.
    pub fn add_document_metadata(&mut self, doc_id: &str, title: &str, date: &str, source: &str) {
        let record = DocumentRecord {
            doc_id: doc_id.to_owned(),
            title: title.to_owned(),
            date: date.to_owned(),
            source: source.to_owned(),
        };
        self.metadata.insert(doc_id.to_owned(), record);
    }

    pub fn document(&self, doc_id: &str) -> Option<&DocumentRecord> { self.metadata.get(doc_id) }

    pub fn total_documents(&self) -> usize { self.known_documents.len() }

    /// Number of distinct documents whose postings contain `term`.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.terms.postings(term).map_or(0, PostingStore::len)
    }

    pub fn term_count(&self) -> usize { self.terms.len() }
    pub fn organization_count(&self) -> usize { self.organizations.len() }
    pub fn person_count(&self) -> usize { self.persons.len() }

    /// False for a catalog read from disk, which has no raw frequencies.
    pub fn accepts_documents(&self) -> bool { self.loaded_from.is_none() }

    /// True when term scores hold TF-IDF for the current corpus.
    pub fn is_normalized(&self) -> bool { self.normalized }

    /// Add one parsed article. A catalog loaded from disk only carries final
    /// scores and rejects new documents.
    pub fn ingest(&mut self, doc: IngestDocument) -> Result<()> {
        if let Some(base) = &self.loaded_from {
            return Err(IndexError::ScoresOnly(base.clone()));
        }
        self.register_document(&doc.doc_id);
        self.add_document_metadata(&doc.doc_id, &doc.title, &doc.date, &doc.source);
        for (term, freq) in &doc.terms {
            self.add_term(term, &doc.doc_id, *freq);
        }
        for org in doc.organizations.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            self.add_organization(org, &doc.doc_id);
        }
        for person in doc.persons.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            self.add_person(person, &doc.doc_id);
        }
        Ok(())
    }

    /// Rewrite every term posting to `tf * log10(N / (1 + df))`, always
    /// starting from the raw frequency so repeated passes after further
    /// ingestion see the current N and df. Returns the number of rewritten
    /// postings.
    pub fn finalize_corpus(&mut self) -> usize {
        if self.loaded_from.is_some() {
            tracing::debug!("scores loaded from disk are already final");
            return 0;
        }
        let total = self.total_documents();
        if total == 0 {
            tracing::debug!("empty corpus; nothing to normalize");
            return 0;
        }
        let n = total as f64;
        let raw_terms = &self.raw_terms;
        let mut rewritten = 0usize;
        self.terms.for_each_mut(|term, postings| {
            let idf = (n / (1.0 + postings.len() as f64)).log10();
            let raw = raw_terms.postings(term);
            for (doc_id, score) in postings.iter_mut() {
                if let Some(tf) = raw.and_then(|r| r.get(doc_id)) {
                    *score = tf * idf;
                    rewritten += 1;
                }
            }
        });
        self.normalized = true;
        tracing::info!(num_docs = total, num_terms = self.terms.len(), rewritten, "computed tf-idf scores");
        rewritten
    }

    /// Write `<base>.words`, `<base>.orgs`, `<base>.persons` and `<base>.meta`.
    ///
    /// A failure part way leaves earlier artifacts written; nothing is rolled back.
    pub fn save<P: AsRef<Path>>(&self, base: P) -> Result<()> {
        let paths = IndexPaths::new(base);
        paths.ensure_parent()?;
        save_tree(&paths.words(), &self.terms)?;
        save_tree(&paths.orgs(), &self.organizations)?;
        save_tree(&paths.persons(), &self.persons)?;
        save_metadata(&paths.meta(), &self.known_documents, &self.metadata)?;
        tracing::info!(base = %paths.base.display(), num_docs = self.total_documents(), "saved indices");
        Ok(())
    }

    /// Replace this catalog with the one stored at `base`. On error the
    /// current contents are left untouched.
    pub fn load<P: AsRef<Path>>(&mut self, base: P) -> Result<()> {
        let paths = IndexPaths::new(base);
        let terms = load_tree(&paths.words())?;
        let organizations = load_tree(&paths.orgs())?;
        let persons = load_tree(&paths.persons())?;
        let (known_documents, metadata) = load_metadata(&paths.meta())?;
        let normalized = !known_documents.is_empty();
        let loaded_from = normalized.then(|| paths.base.clone());
        *self = IndexCatalog {
            terms,
            raw_terms: KeyIndex::new(),
            organizations,
            persons,
            known_documents,
            metadata,
            normalized,
            loaded_from,
        };
        tracing::info!(
            base = %paths.base.display(),
            num_docs = self.total_documents(),
            num_terms = self.terms.len(),
            "loaded indices"
        );
        Ok(())
    }

    pub fn search_word(&self, term: &str) -> Vec<(DocId, f64)> { self.terms.search(term) }

    pub fn search_organization(&self, org: &str) -> Vec<(DocId, f64)> { self.organizations.search(org) }

    pub fn search_person(&self, person: &str) -> Vec<(DocId, f64)> { self.persons.search(person) }
}
