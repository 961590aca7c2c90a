//! Interactive session: load, index, save and query until `exit`.

use crate::ingest::ingest_path;
use anyhow::{anyhow, Context, Result};
use finsearch_core::{EnglishNormalizer, IndexCatalog, QueryEngine, QueryResult, Tokenizer, DEFAULT_RESULT_LIMIT};
use std::io::{BufRead, Write};
use std::path::Path;

const RULE_WIDTH: usize = 80;

pub fn write_results<W: Write>(out: &mut W, results: &[QueryResult]) -> std::io::Result<()> {
    if results.is_empty() {
        writeln!(out, "No results found.")?;
        return Ok(());
    }
    writeln!(out, "Found {} results:", results.len())?;
    writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
    for (i, r) in results.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, r.title)?;
        writeln!(out, "   Source: {} | Date: {}", r.source, r.date)?;
        writeln!(out, "   Score: {:.4}", r.score)?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
    }
    Ok(())
}

fn write_help<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "Commands:")?;
    writeln!(out, "  load <path>     - Load index from path")?;
    writeln!(out, "  index <path>    - Index documents in file or directory")?;
    writeln!(out, "  save <path>     - Save index to path")?;
    writeln!(out, "  view <number>   - View article from last search")?;
    writeln!(out, "  exit/quit       - Exit program")?;
    writeln!(out, "  Any other input will be treated as a search query")?;
    writeln!(out, "Query syntax: word1 word2 (all terms), ORG:Google, PERSON:Musk, -excludeword")
}

enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    catalog: IndexCatalog,
    tokenizer: Tokenizer,
    last_results: Vec<QueryResult>,
}

impl Shell {
    pub fn new(catalog: IndexCatalog, tokenizer: Tokenizer) -> Self {
        Self { catalog, tokenizer, last_results: Vec::new() }
    }

    /// Read commands until `exit`, `quit` or end of input. Command failures
    /// are reported to `out` and the session continues.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> Result<()> {
        writeln!(out, "Financial News Search Engine - Interactive Mode")?;
        writeln!(out, "Type 'help' for commands, 'exit' to quit")?;
        let mut lines = input.lines();
        loop {
            write!(out, "\n> ")?;
            out.flush()?;
            let Some(line) = lines.next() else { break };
            let line = line?;
            match self.handle(line.trim(), &mut out) {
                Ok(Flow::Exit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => {
                    tracing::debug!(error = %format!("{e:#}"), "command failed");
                    writeln!(out, "Error: {e:#}")?;
                }
            }
        }
        Ok(())
    }

    fn handle<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, rest)) => (c, rest.trim()),
            None => (line, ""),
        };
        match (command, arg) {
            ("", _) => {}
            ("exit" | "quit", "") => return Ok(Flow::Exit),
            ("help", "") => write_help(out)?,
            ("load", path) if !path.is_empty() => {
                writeln!(out, "Loading index from {path}...")?;
                self.catalog.load(path).with_context(|| format!("loading index from {path}"))?;
                writeln!(out, "Loaded {} documents.", self.catalog.total_documents())?;
            }
            ("index", path) if !path.is_empty() => {
                writeln!(out, "Indexing documents in {path}...")?;
                let stats = ingest_path(&mut self.catalog, &self.tokenizer, Path::new(path))?;
                self.catalog.finalize_corpus();
                writeln!(out, "Indexed {} documents ({} failures).", stats.documents, stats.failures)?;
            }
            ("save", path) if !path.is_empty() => {
                writeln!(out, "Saving index to {path}...")?;
                self.catalog.save(path).with_context(|| format!("saving index to {path}"))?;
                writeln!(out, "Index saved successfully.")?;
            }
            ("view", n) if !n.is_empty() => {
                let n: usize = n.parse().with_context(|| format!("not a result number: {n}"))?;
                let result = n
                    .checked_sub(1)
                    .and_then(|i| self.last_results.get(i))
                    .ok_or_else(|| anyhow!("invalid result number; choose between 1 and {}", self.last_results.len()))?;
                let engine = QueryEngine::new(&self.catalog, EnglishNormalizer);
                writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
                writeln!(out, "{}", result.title)?;
                writeln!(out, "{}", engine.full_article(&result.doc_id))?;
                writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
            }
            _ => {
                if self.catalog.total_documents() == 0 {
                    writeln!(out, "No index loaded. Use 'load <path>' to load an index.")?;
                    return Ok(Flow::Continue);
                }
                let engine = QueryEngine::new(&self.catalog, EnglishNormalizer);
                self.last_results = engine.process(line, DEFAULT_RESULT_LIMIT);
                write_results(out, &self.last_results)?;
            }
        }
        Ok(Flow::Continue)
    }
}
