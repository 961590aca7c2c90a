//! On-disk artifacts of an index catalog.
//!
//! Every artifact is bincode with fixed-width little-endian integers. A key
//! index file is the pre-order encoding of
//!
//! ```text
//! node := key:String docs:Vec<(String, f64)> left:Option<node> right:Option<node>
//! ```
//!
//! which puts a `u64` length before every string and list and a one byte tag
//! before every child. An empty index is an empty file. Heights are not stored.
//!
//! The metadata file is `Vec<(doc_id, meta)>` where `meta` is the JSON object
//! of a [`DocumentRecord`] as bytes.

use crate::error::{IndexError, Result};
use crate::index::DocumentRecord;
use crate::tree::{KeyIndex, Node, PostingStore};
use bincode::Options;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs::{create_dir_all, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Deeper than any AVL tree whose nodes fit in addressable memory.
const MAX_DEPTH: usize = 128;

/// Locations of the four artifacts sharing one base path.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub base: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self { base: base.as_ref().to_path_buf() }
    }
    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut s: OsString = self.base.as_os_str().to_owned();
        s.push(suffix);
        PathBuf::from(s)
    }
    pub fn words(&self) -> PathBuf { self.with_suffix(".words") }
    pub fn orgs(&self) -> PathBuf { self.with_suffix(".orgs") }
    pub fn persons(&self) -> PathBuf { self.with_suffix(".persons") }
    pub fn meta(&self) -> PathBuf { self.with_suffix(".meta") }

    pub fn ensure_parent(&self) -> Result<()> {
        match self.base.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => create_dir_all(dir).map_err(|e| IndexError::io(dir, e)),
            _ => Ok(()),
        }
    }
}

fn wire() -> impl Options {
    bincode::options().with_fixint_encoding().with_little_endian()
}

/// Borrowed view of a subtree in its on-disk shape.
#[derive(Serialize)]
struct WireNode<'a> {
    key: &'a str,
    docs: Vec<(&'a str, f64)>,
    left: Option<Box<WireNode<'a>>>,
    right: Option<Box<WireNode<'a>>>,
}

impl<'a> WireNode<'a> {
    fn of(node: &'a Node) -> Box<Self> {
        Box::new(WireNode {
            key: &node.key,
            docs: node.postings.sorted_entries(),
            left: node.left.as_deref().map(WireNode::of),
            right: node.right.as_deref().map(WireNode::of),
        })
    }
}

/// Serialize a key index into its binary pre-order form.
pub fn encode_tree(index: &KeyIndex) -> Result<Vec<u8>> {
    match index.root() {
        Some(root) => Ok(wire().serialize(&WireNode::of(root))?),
        None => Ok(Vec::new()),
    }
}

/// Pulls one node part at a time so nesting depth and key order are checked
/// before a subtree is descended into.
struct NodeReader<'a> {
    rest: &'a [u8],
    total: usize,
}

impl<'a> NodeReader<'a> {
    fn offset(&self) -> usize { self.total - self.rest.len() }

    fn next<T: serde::de::DeserializeOwned>(&mut self, what: &str) -> std::result::Result<T, String> {
        let at = self.offset();
        wire()
            .with_limit(self.total as u64)
            .deserialize_from(&mut self.rest)
            .map_err(|e| format!("{what} at offset {at}: {e}"))
    }

    fn node(&mut self, depth: usize, lower: Option<&str>, upper: Option<&str>) -> std::result::Result<Box<Node>, String> {
        if depth > MAX_DEPTH {
            return Err(format!("tree deeper than {MAX_DEPTH} levels"));
        }
        let key: String = self.next("key")?;
        if lower.map_or(false, |lo| key.as_str() <= lo) || upper.map_or(false, |hi| key.as_str() >= hi) {
            return Err(format!("key {key:?} violates tree order"));
        }
        let docs: Vec<(String, f64)> = self.next("postings")?;
        let mut postings = PostingStore::new();
        for (doc_id, score) in docs {
            postings.insert(&doc_id, score);
        }
        let left = if self.next::<bool>("has_left flag")? { Some(self.node(depth + 1, lower, Some(key.as_str()))?) } else { None };
        let right = if self.next::<bool>("has_right flag")? { Some(self.node(depth + 1, Some(key.as_str()), upper)?) } else { None };
        Ok(Node::from_parts(key, postings, left, right))
    }
}

/// Rebuild a key index from its binary form. The error string describes the defect.
pub fn decode_tree(bytes: &[u8]) -> std::result::Result<KeyIndex, String> {
    if bytes.is_empty() {
        return Ok(KeyIndex::new());
    }
    let mut reader = NodeReader { rest: bytes, total: bytes.len() };
    let root = reader.node(1, None, None)?;
    if !reader.rest.is_empty() {
        return Err(format!("{} trailing bytes after root node", reader.rest.len()));
    }
    Ok(KeyIndex::from_root(Some(root)))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = File::create(path).map_err(|e| IndexError::io(path, e))?;
    f.write_all(bytes).map_err(|e| IndexError::io(path, e))?;
    f.flush().map_err(|e| IndexError::io(path, e))?;
    Ok(())
}

fn read_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn save_tree(path: &Path, index: &KeyIndex) -> Result<()> {
    let bytes = encode_tree(index)?;
    write_file(path, &bytes)?;
    tracing::debug!(path = %path.display(), keys = index.len(), bytes = bytes.len(), "wrote key index");
    Ok(())
}

pub fn load_tree(path: &Path) -> Result<KeyIndex> {
    let buf = read_file(path).map_err(|e| IndexError::io(path, e))?;
    let index = decode_tree(&buf).map_err(|reason| IndexError::malformed(path, reason))?;
    tracing::debug!(path = %path.display(), keys = index.len(), "read key index");
    Ok(index)
}

/// Serialize the metadata artifact for every known document, in id order.
pub fn encode_metadata(known: &HashSet<String>, metadata: &HashMap<String, DocumentRecord>) -> Result<Vec<u8>> {
    let mut ids: Vec<&String> = known.iter().collect();
    ids.sort_unstable();
    let mut records: Vec<(&str, Vec<u8>)> = Vec::with_capacity(ids.len());
    for id in ids {
        let meta = match metadata.get(id) {
            Some(record) => serde_json::to_vec(record)?,
            None => b"{}".to_vec(),
        };
        records.push((id, meta));
    }
    Ok(wire().serialize(&records)?)
}

pub fn decode_metadata(bytes: &[u8]) -> std::result::Result<(HashSet<String>, HashMap<String, DocumentRecord>), String> {
    let records: Vec<(String, Vec<u8>)> = wire()
        .reject_trailing_bytes()
        .with_limit(bytes.len() as u64)
        .deserialize(bytes)
        .map_err(|e| format!("metadata records: {e}"))?;
    let mut known = HashSet::with_capacity(records.len());
    let mut metadata = HashMap::with_capacity(records.len());
    for (id, raw) in records {
        let mut record: DocumentRecord =
            serde_json::from_slice(&raw).map_err(|e| format!("metadata for {id:?} is not a valid object: {e}"))?;
        record.doc_id = id.clone();
        known.insert(id.clone());
        metadata.insert(id, record);
    }
    Ok((known, metadata))
}

pub fn save_metadata(path: &Path, known: &HashSet<String>, metadata: &HashMap<String, DocumentRecord>) -> Result<()> {
    let bytes = encode_metadata(known, metadata)?;
    write_file(path, &bytes)?;
    tracing::debug!(path = %path.display(), docs = known.len(), "wrote metadata");
    Ok(())
}

pub fn load_metadata(path: &Path) -> Result<(HashSet<String>, HashMap<String, DocumentRecord>)> {
    let buf = match read_file(path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(IndexError::MissingMetadataFile(path.to_path_buf())),
        Err(e) => return Err(IndexError::io(path, e)),
    };
    decode_metadata(&buf).map_err(|reason| IndexError::malformed(path, reason))
}
