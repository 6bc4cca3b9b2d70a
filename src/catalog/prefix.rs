//! Character trie over lowercased titles.
//!
//! Children live in a `BTreeMap`, so prefix results come back in a stable
//! order: a node's own payloads (in insertion order) first, then each child
//! subtree in ascending character order. There is no in-place removal;
//! callers rebuild the whole trie after a delete or title change.

use std::collections::BTreeMap;

#[derive(Debug)]
struct TrieNode<T> {
    children: BTreeMap<char, TrieNode<T>>,
    is_terminal: bool,
    records: Vec<T>,
}

impl<T> Default for TrieNode<T> {
    fn default() -> Self {
        Self {
            children: BTreeMap::new(),
            is_terminal: false,
            records: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct PrefixIndex<T> {
    root: TrieNode<T>,
    len: usize,
}

impl<T> Default for PrefixIndex<T> {
    fn default() -> Self {
        Self {
            root: TrieNode::default(),
            len: 0,
        }
    }
}

impl<T: Clone> PrefixIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `record` under `title`. Identical titles are kept side by side.
    pub fn insert(&mut self, title: &str, record: T) {
        let mut node = &mut self.root;
        for ch in title.chars().flat_map(char::to_lowercase) {
            node = node.children.entry(ch).or_default();
        }
        node.is_terminal = true;
        node.records.push(record);
        self.len += 1;
    }

    /// Every record whose lowercased title starts with `prefix`.
    pub fn search_prefix(&self, prefix: &str) -> Vec<T> {
        let mut node = &self.root;
        for ch in prefix.chars().flat_map(char::to_lowercase) {
            match node.children.get(&ch) {
                Some(child) => node = child,
                None => return Vec::new(),
            }
        }

        let mut results = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.is_terminal {
                results.extend(current.records.iter().cloned());
            }
            // Reverse so the smallest character is popped first.
            stack.extend(current.children.values().rev());
        }
        results
    }

    /// Replace the contents with `entries`.
    pub fn rebuild<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
    {
        self.clear();
        for (title, record) in entries {
            self.insert(title.as_ref(), record);
        }
    }
}

impl<T> PrefixIndex<T> {
    /// Number of indexed records (not distinct titles).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.root = TrieNode::default();
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PrefixIndex<&'static str> {
        let mut trie = PrefixIndex::new();
        trie.insert("Harry Potter and the Sorcerer's Stone", "1234");
        trie.insert("Harry Potter and the Chamber of Secrets", "5678");
        trie.insert("The Hobbit", "9012");
        trie.insert("Hatchet", "3456");
        trie
    }

    #[test]
    fn every_prefix_finds_its_record() {
        let trie = sample();
        let title = "The Hobbit";
        for end in 0..=title.len() {
            let hits = trie.search_prefix(&title[..end]);
            assert!(hits.contains(&"9012"), "prefix {:?}", &title[..end]);
        }
    }

    #[test]
    fn prefix_search_is_case_insensitive_and_ordered() {
        let trie = sample();
        assert_eq!(trie.search_prefix("HAR"), vec!["5678", "1234"]);
        assert_eq!(trie.search_prefix("ha"), vec!["5678", "1234", "3456"]);
    }

    #[test]
    fn unknown_prefix_returns_empty() {
        let trie = sample();
        assert!(trie.search_prefix("hobbit").is_empty());
        assert!(trie.search_prefix("harry potter and the z").is_empty());
    }

    #[test]
    fn shared_titles_keep_both_records() {
        let mut trie = PrefixIndex::new();
        trie.insert("Dune", "first");
        trie.insert("dune", "second");
        trie.insert("Dune Messiah", "third");
        assert_eq!(trie.search_prefix("dune"), vec!["first", "second", "third"]);
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn empty_prefix_lists_everything() {
        let trie = sample();
        assert_eq!(trie.search_prefix("").len(), 4);
    }

    #[test]
    fn rebuild_drops_stale_titles() {
        let mut trie = sample();
        trie.rebuild(vec![("Hatchet", "3456")]);
        assert!(trie.search_prefix("harry").is_empty());
        assert_eq!(trie.search_prefix("hat"), vec!["3456"]);
        assert_eq!(trie.len(), 1);
    }
}
