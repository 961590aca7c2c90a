//! Turning article records on disk into catalog documents.

use anyhow::{bail, Context, Result};
use finsearch_core::{IndexCatalog, IngestDocument, Tokenizer};
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Deserialize)]
pub struct Article {
    pub uuid: String,
    pub content: String,
    #[serde(default, deserialize_with = "string_or_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    pub date_publish: Option<String>,
    #[serde(default, deserialize_with = "string_or_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub metadata: Option<ArticleMetadata>,
}

/// Display fields of any other JSON type fall back to their defaults.
fn string_or_none<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ArticleMetadata {
    #[serde(default)]
    pub organizations: Vec<Entity>,
    #[serde(default)]
    pub persons: Vec<Entity>,
}

/// Entity mentions appear either as bare names or as objects with a `name`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Entity {
    Name(String),
    Named { name: String },
    Other(serde_json::Value),
}

impl Entity {
    fn into_name(self) -> Option<String> {
        match self {
            Entity::Name(name) | Entity::Named { name } => Some(name),
            Entity::Other(_) => None,
        }
    }
}

impl Article {
    pub fn into_document(self, tokenizer: &Tokenizer) -> IngestDocument {
        let metadata = self.metadata.unwrap_or_default();
        IngestDocument {
            terms: tokenizer.term_frequencies(&self.content),
            doc_id: self.uuid,
            title: self.title.unwrap_or_else(|| "Untitled".into()),
            date: self.date_publish.unwrap_or_else(|| "Unknown Date".into()),
            source: self.source.unwrap_or_else(|| "Unknown Source".into()),
            organizations: metadata.organizations.into_iter().filter_map(Entity::into_name).collect(),
            persons: metadata.persons.into_iter().filter_map(Entity::into_name).collect(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub files: usize,
    pub documents: usize,
    pub failures: usize,
}

impl IngestStats {
    fn absorb(&mut self, other: IngestStats) {
        self.files += other.files;
        self.documents += other.documents;
        self.failures += other.failures;
    }
}

fn is_article_file(p: &Path) -> bool {
    matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl"))
}

fn collect_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        bail!("input path does not exist: {}", input.display());
    }
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_article_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

fn ingest_value(
    catalog: &mut IndexCatalog,
    tokenizer: &Tokenizer,
    value: serde_json::Value,
    stats: &mut IngestStats,
    origin: &Path,
) -> Result<()> {
    match serde_json::from_value::<Article>(value) {
        Ok(article) => {
            catalog.ingest(article.into_document(tokenizer))?;
            stats.documents += 1;
        }
        Err(e) => {
            stats.failures += 1;
            tracing::warn!(file = %origin.display(), error = %e, "skipping article");
        }
    }
    Ok(())
}

fn ingest_jsonl(catalog: &mut IndexCatalog, tokenizer: &Tokenizer, file: &Path) -> Result<IngestStats> {
    let reader = BufReader::new(File::open(file)?);
    let mut stats = IngestStats::default();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value) => ingest_value(catalog, tokenizer, value, &mut stats, file)?,
            Err(e) => {
                stats.failures += 1;
                tracing::warn!(file = %file.display(), line = lineno + 1, error = %e, "skipping malformed line");
            }
        }
    }
    Ok(stats)
}

fn ingest_json(catalog: &mut IndexCatalog, tokenizer: &Tokenizer, file: &Path) -> Result<IngestStats> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let mut stats = IngestStats::default();
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                ingest_value(catalog, tokenizer, v, &mut stats, file)?;
            }
        }
        other => ingest_value(catalog, tokenizer, other, &mut stats, file)?,
    }
    Ok(stats)
}

/// Ingest one file: a single article object, an array of them, or JSON lines.
pub fn ingest_file(catalog: &mut IndexCatalog, tokenizer: &Tokenizer, file: &Path) -> Result<IngestStats> {
    let mut stats = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        ingest_jsonl(catalog, tokenizer, file)
    } else {
        ingest_json(catalog, tokenizer, file)
    }
    .with_context(|| format!("reading {}", file.display()))?;
    stats.files = 1;
    Ok(stats)
}

/// Ingest a file or every `.json`/`.jsonl` file below a directory.
///
/// A bad file or record is logged and counted; it never aborts the batch.
/// A catalog loaded from disk is refused up front.
pub fn ingest_path(catalog: &mut IndexCatalog, tokenizer: &Tokenizer, input: &Path) -> Result<IngestStats> {
    if !catalog.accepts_documents() {
        bail!("the loaded index holds final scores only; rebuild it from the articles instead");
    }
    let files = collect_files(input)?;
    tracing::info!(input = %input.display(), files = files.len(), "scanning articles");
    let mut stats = IngestStats::default();
    for (i, file) in files.iter().enumerate() {
        match ingest_file(catalog, tokenizer, file) {
            Ok(s) => stats.absorb(s),
            Err(e) => {
                stats.files += 1;
                stats.failures += 1;
                tracing::warn!(error = %format!("{e:#}"), "skipping file");
            }
        }
        if (i + 1) % PROGRESS_EVERY == 0 {
            tracing::info!(processed = i + 1, total = files.len(), failures = stats.failures, "progress");
        }
    }
    tracing::info!(files = stats.files, documents = stats.documents, failures = stats.failures, "ingestion complete");
    Ok(stats)
}
