//! AVL-balanced ordered index from a string key to the postings of that key.
//!
//! Every node exclusively owns its children, so rotations are plain moves of
//! boxed subtrees. Heights are a derived cache and are re-derived after every
//! pointer swap.

use std::cmp::Ordering;
use std::collections::HashMap;

/// Per-key mapping from document id to score.
///
/// A later insert for a document already present overwrites its score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingStore {
    scores: HashMap<String, f64>,
}

impl PostingStore {
    pub fn new() -> Self { Self::default() }

    /// Set the score for `doc_id`, returning the score it replaced.
    pub fn insert(&mut self, doc_id: &str, score: f64) -> Option<f64> {
        match self.scores.get_mut(doc_id) {
            Some(slot) => Some(std::mem::replace(slot, score)),
            None => {
                self.scores.insert(doc_id.to_owned(), score);
                None
            }
        }
    }

    pub fn get(&self, doc_id: &str) -> Option<f64> { self.scores.get(doc_id).copied() }

    pub fn len(&self) -> usize { self.scores.len() }

    pub fn is_empty(&self) -> bool { self.scores.is_empty() }

    /// Unordered iteration over (doc_id, score).
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.scores.iter().map(|(d, s)| (d.as_str(), *s))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut f64)> + '_ {
        self.scores.iter_mut().map(|(d, s)| (d.as_str(), s))
    }

    /// Entries in ascending document id order, used for reproducible output.
    pub fn sorted_entries(&self) -> Vec<(&str, f64)> {
        let mut entries: Vec<(&str, f64)> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn to_vec(&self) -> Vec<(String, f64)> {
        self.scores.iter().map(|(d, s)| (d.clone(), *s)).collect()
    }
}

type Link = Option<Box<Node>>;

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) key: String,
    pub(crate) postings: PostingStore,
    pub(crate) left: Link,
    pub(crate) right: Link,
    height: usize,
}

fn height(link: &Link) -> usize { link.as_ref().map_or(0, |n| n.height) }

impl Node {
    /// Assemble a node from already built subtrees; height is derived, never taken on trust.
    pub(crate) fn from_parts(key: String, postings: PostingStore, left: Link, right: Link) -> Box<Node> {
        let mut node = Box::new(Node { key, postings, left, right, height: 1 });
        node.update_height();
        node
    }

    fn update_height(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
    }

    fn balance_factor(&self) -> isize {
        height(&self.left) as isize - height(&self.right) as isize
    }
}

fn rotate_right(mut y: Box<Node>) -> Box<Node> {
    let Some(mut x) = y.left.take() else { return y };
    y.left = x.right.take();
    y.update_height();
    x.right = Some(y);
    x.update_height();
    x
}

fn rotate_left(mut x: Box<Node>) -> Box<Node> {
    let Some(mut y) = x.right.take() else { return x };
    x.right = y.left.take();
    x.update_height();
    y.left = Some(x);
    y.update_height();
    y
}

/// Restore the AVL invariant at `node` after `key` was added somewhere below it.
fn rebalance(mut node: Box<Node>, key: &str) -> Box<Node> {
    node.update_height();
    let balance = node.balance_factor();
    if balance > 1 {
        let left_left = node.left.as_ref().map_or(false, |l| key < l.key.as_str());
        if !left_left {
            node.left = node.left.take().map(rotate_left);
        }
        return rotate_right(node);
    }
    if balance < -1 {
        let right_right = node.right.as_ref().map_or(false, |r| key > r.key.as_str());
        if !right_right {
            node.right = node.right.take().map(rotate_right);
        }
        return rotate_left(node);
    }
    node
}

/// Returns the new subtree root and whether a node was created.
fn insert_node(link: Link, key: &str, doc_id: &str, score: f64) -> (Box<Node>, bool) {
    let mut node = match link {
        Some(node) => node,
        None => {
            let mut postings = PostingStore::new();
            postings.insert(doc_id, score);
            return (Node::from_parts(key.to_owned(), postings, None, None), true);
        }
    };
    let created = match key.cmp(node.key.as_str()) {
        Ordering::Less => {
            let (child, created) = insert_node(node.left.take(), key, doc_id, score);
            node.left = Some(child);
            created
        }
        Ordering::Greater => {
            let (child, created) = insert_node(node.right.take(), key, doc_id, score);
            node.right = Some(child);
            created
        }
        Ordering::Equal => {
            node.postings.insert(doc_id, score);
            false
        }
    };
    if created {
        (rebalance(node, key), true)
    } else {
        (node, false)
    }
}

fn walk<F: FnMut(&str, &PostingStore)>(link: &Link, f: &mut F) {
    if let Some(node) = link {
        walk(&node.left, f);
        f(&node.key, &node.postings);
        walk(&node.right, f);
    }
}

fn walk_mut<F: FnMut(&str, &mut PostingStore)>(link: &mut Link, f: &mut F) {
    if let Some(node) = link {
        let node = &mut **node;
        walk_mut(&mut node.left, f);
        f(&node.key, &mut node.postings);
        walk_mut(&mut node.right, f);
    }
}

fn count(link: &Link) -> usize {
    link.as_ref().map_or(0, |n| 1 + count(&n.left) + count(&n.right))
}

/// Checks ordering, balance and the height cache; returns the subtree height.
fn validate_node(link: &Link, lower: Option<&str>, upper: Option<&str>) -> Result<usize, String> {
    let Some(node) = link else { return Ok(0) };
    if lower.map_or(false, |lo| node.key.as_str() <= lo) || upper.map_or(false, |hi| node.key.as_str() >= hi) {
        return Err(format!("key {:?} out of order", node.key));
    }
    let lh = validate_node(&node.left, lower, Some(node.key.as_str()))?;
    let rh = validate_node(&node.right, Some(node.key.as_str()), upper)?;
    if lh.abs_diff(rh) > 1 {
        return Err(format!("node {:?} unbalanced ({lh} vs {rh})", node.key));
    }
    let h = 1 + lh.max(rh);
    if h != node.height {
        return Err(format!("node {:?} caches height {} but is {h}", node.key, node.height));
    }
    Ok(h)
}

/// Self-balancing ordered map from key to [`PostingStore`].
#[derive(Debug, Default)]
pub struct KeyIndex {
    root: Link,
    len: usize,
}

impl KeyIndex {
    pub fn new() -> Self { Self::default() }

    pub(crate) fn from_root(root: Option<Box<Node>>) -> Self {
        let len = count(&root);
        Self { root, len }
    }

    pub(crate) fn root(&self) -> Option<&Node> { self.root.as_deref() }

    /// Insert or overwrite the posting `(doc_id, score)` under `key`.
    ///
    /// Rebalancing only follows the creation of a new node; updating an
    /// existing key leaves the shape untouched.
    pub fn insert(&mut self, key: &str, doc_id: &str, score: f64) {
        let (root, created) = insert_node(self.root.take(), key, doc_id, score);
        self.root = Some(root);
        if created {
            self.len += 1;
        }
    }

    pub fn postings(&self, key: &str) -> Option<&PostingStore> {
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            cur = match key.cmp(node.key.as_str()) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(&node.postings),
            };
        }
        None
    }

    /// All postings for `key` in unspecified order; empty when absent.
    pub fn search(&self, key: &str) -> Vec<(String, f64)> {
        self.postings(key).map(PostingStore::to_vec).unwrap_or_default()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.root.is_none() }

    pub fn height(&self) -> usize { height(&self.root) }

    /// In-order visit of every key with its postings.
    pub fn for_each<F: FnMut(&str, &PostingStore)>(&self, mut f: F) { walk(&self.root, &mut f); }

    /// In-order visit allowing postings to be rewritten in place.
    pub fn for_each_mut<F: FnMut(&str, &mut PostingStore)>(&mut self, mut f: F) { walk_mut(&mut self.root, &mut f); }

    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len);
        self.for_each(|k, _| keys.push(k.to_owned()));
        keys
    }

    /// Verify BST order, AVL balance and cached heights across the whole tree.
    pub fn validate(&self) -> Result<(), String> {
        validate_node(&self.root, None, None).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_search() {
        let mut tree = KeyIndex::new();
        tree.insert("apple", "doc1", 1.0);
        tree.insert("banana", "doc1", 2.0);
        tree.insert("orange", "doc2", 3.0);

        assert_eq!(tree.search("apple"), vec![("doc1".to_string(), 1.0)]);
        assert!(tree.search("nonexistent").is_empty());
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn same_key_collects_documents() {
        let mut tree = KeyIndex::new();
        tree.insert("common", "doc1", 1.0);
        tree.insert("common", "doc2", 2.0);
        tree.insert("common", "doc3", 3.0);

        let mut ids: Vec<String> = tree.search("common").into_iter().map(|(d, _)| d).collect();
        ids.sort();
        assert_eq!(ids, vec!["doc1", "doc2", "doc3"]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.height(), 1);
    }

    #[test]
    fn overwrite_replaces_score() {
        let mut tree = KeyIndex::new();
        tree.insert("k", "d", 0.25);
        tree.insert("k", "d", 0.75);
        assert_eq!(tree.search("k"), vec![("d".to_string(), 0.75)]);
    }

    #[test]
    fn existing_key_does_not_restructure() {
        let mut tree = KeyIndex::new();
        for k in ["b", "a", "c"] {
            tree.insert(k, "d1", 1.0);
        }
        let before = tree.keys();
        tree.insert("a", "d2", 2.0);
        assert_eq!(tree.root().map(|n| n.key.as_str()), Some("b"));
        assert_eq!(tree.keys(), before);
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn all_four_rotation_cases_balance() {
        for order in [["c", "b", "a"], ["a", "b", "c"], ["c", "a", "b"], ["a", "c", "b"]] {
            let mut tree = KeyIndex::new();
            for k in order {
                tree.insert(k, "d", 1.0);
            }
            assert_eq!(tree.root().map(|n| n.key.as_str()), Some("b"), "order {order:?}");
            assert_eq!(tree.height(), 2);
            tree.validate().unwrap();
        }
    }

    #[test]
    fn sequential_inserts_stay_logarithmic() {
        let mut tree = KeyIndex::new();
        for i in 0..1024 {
            tree.insert(&format!("key{i:05}"), "d", i as f64);
        }
        tree.validate().unwrap();
        assert_eq!(tree.len(), 1024);
        // AVL bound: h < 1.44 log2(n + 2)
        assert!(tree.height() <= 14, "height {}", tree.height());
    }

    #[test]
    fn for_each_mut_rewrites_in_place() {
        let mut tree = KeyIndex::new();
        tree.insert("x", "d1", 2.0);
        tree.insert("y", "d1", 4.0);
        tree.for_each_mut(|_, store| store.iter_mut().for_each(|(_, s)| *s /= 2.0));
        assert_eq!(tree.postings("x").and_then(|p| p.get("d1")), Some(1.0));
        assert_eq!(tree.postings("y").and_then(|p| p.get("d1")), Some(2.0));
    }
}
