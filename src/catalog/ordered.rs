//! Unbalanced binary search tree used as the ISBN-ordered secondary index.
//!
//! Nodes are strictly owned (`Option<Box<Node>>`), so there are no parent
//! pointers. Lookups are O(log n) for reasonably shuffled keys and degrade to
//! O(n) when keys arrive already sorted; the tree never rebalances.

use std::cmp::Ordering;
use std::fmt::Debug;

use tracing::trace;

type Link<K, V> = Option<Box<Node<K, V>>>;

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
}

impl<K, V> Node<K, V> {
    fn leaf(key: K, value: V) -> Box<Self> {
        Box::new(Self {
            key,
            value,
            left: None,
            right: None,
        })
    }
}

#[derive(Debug)]
pub struct OrderedIndex<K, V> {
    root: Link<K, V>,
    len: usize,
}

impl<K, V> Default for OrderedIndex<K, V> {
    fn default() -> Self {
        Self { root: None, len: 0 }
    }
}

impl<K: Ord + Debug, V> OrderedIndex<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns `true` when a new node was attached.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        trace!(?key, "ordered index insert");
        let mut slot = &mut self.root;
        while let Some(node) = slot {
            match key.cmp(&node.key) {
                Ordering::Less => {
                    trace!(at = ?node.key, "insert: go left");
                    slot = &mut node.left;
                }
                Ordering::Greater => {
                    trace!(at = ?node.key, "insert: go right");
                    slot = &mut node.right;
                }
                Ordering::Equal => {
                    trace!(at = ?node.key, "insert: update payload");
                    node.value = value;
                    return false;
                }
            }
        }
        *slot = Some(Node::leaf(key, value));
        self.len += 1;
        true
    }

    pub fn search(&self, key: &K) -> Option<&V> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            match key.cmp(&node.key) {
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Greater => current = node.right.as_deref(),
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    pub fn contains(&self, key: &K) -> bool {
        self.search(key).is_some()
    }

    /// Remove `key`. A node with two children takes over the key and payload
    /// of its in-order successor, which is then unlinked from the right
    /// subtree.
    pub fn delete(&mut self, key: &K) -> bool {
        trace!(?key, "ordered index delete");
        let removed = remove_from(&mut self.root, key);
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Throw away every node and re-insert from `entries`.
    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.clear();
        for (key, value) in entries {
            self.insert(key, value);
        }
    }
}

impl<K, V> OrderedIndex<K, V> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of nodes on the longest root-to-leaf path; 0 for an empty tree.
    pub fn height(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(&Node<K, V>, usize)> = Vec::new();
        if let Some(root) = self.root.as_deref() {
            stack.push((root, 1));
        }
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Some(left) = node.left.as_deref() {
                stack.push((left, depth + 1));
            }
            if let Some(right) = node.right.as_deref() {
                stack.push((right, depth + 1));
            }
        }
        deepest
    }

    /// Key stored at the root, if any.
    pub fn root_key(&self) -> Option<&K> {
        self.root.as_ref().map(|node| &node.key)
    }

    pub fn clear(&mut self) {
        drain(self.root.take());
        self.len = 0;
    }

    /// Left, node, right. Keys come out ascending.
    pub fn inorder(&self) -> Inorder<'_, K, V> {
        let mut iter = Inorder { stack: Vec::new() };
        iter.push_left(self.root.as_deref());
        iter
    }

    /// Node, left, right.
    pub fn preorder(&self) -> Preorder<'_, K, V> {
        Preorder {
            stack: self.root.as_deref().into_iter().collect(),
        }
    }

    /// Left, right, node.
    pub fn postorder(&self) -> Postorder<'_, K, V> {
        Postorder {
            stack: self
                .root
                .as_deref()
                .map(|node| (node, false))
                .into_iter()
                .collect(),
        }
    }
}

impl<K, V> Drop for OrderedIndex<K, V> {
    fn drop(&mut self) {
        drain(self.root.take());
    }
}

/// Tear a subtree down without recursing, so a degenerate tree cannot blow
/// the stack on drop.
fn drain<K, V>(root: Link<K, V>) {
    let mut stack: Vec<Box<Node<K, V>>> = root.into_iter().collect();
    while let Some(mut node) = stack.pop() {
        stack.extend(node.left.take());
        stack.extend(node.right.take());
    }
}

fn remove_from<K: Ord + Debug, V>(slot: &mut Link<K, V>, key: &K) -> bool {
    let Some(node) = slot else {
        return false;
    };
    match key.cmp(&node.key) {
        Ordering::Less => remove_from(&mut node.left, key),
        Ordering::Greater => remove_from(&mut node.right, key),
        Ordering::Equal => {
            match (node.left.take(), node.right.take()) {
                (None, None) => {
                    trace!("delete: detach leaf");
                    *slot = None;
                }
                (Some(child), None) | (None, Some(child)) => {
                    trace!("delete: splice single child");
                    *slot = Some(child);
                }
                (Some(left), Some(right)) => {
                    node.left = Some(left);
                    node.right = Some(right);
                    if let Some(successor) = take_min(&mut node.right) {
                        trace!(successor = ?successor.key, "delete: replace with successor");
                        let successor = *successor;
                        node.key = successor.key;
                        node.value = successor.value;
                    }
                }
            }
            true
        }
    }
}

/// Unlink the minimum node of a subtree, splicing its right child into its
/// place.
fn take_min<K, V>(slot: &mut Link<K, V>) -> Option<Box<Node<K, V>>> {
    match slot {
        Some(node) if node.left.is_some() => take_min(&mut node.left),
        _ => {
            let mut min = slot.take()?;
            *slot = min.right.take();
            Some(min)
        }
    }
}

pub struct Inorder<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
}

impl<'a, K, V> Inorder<'a, K, V> {
    fn push_left(&mut self, mut node: Option<&'a Node<K, V>>) {
        while let Some(current) = node {
            self.stack.push(current);
            node = current.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Inorder<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        Some((&node.key, &node.value))
    }
}

pub struct Preorder<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
}

impl<'a, K, V> Iterator for Preorder<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Some(right) = node.right.as_deref() {
            self.stack.push(right);
        }
        if let Some(left) = node.left.as_deref() {
            self.stack.push(left);
        }
        Some((&node.key, &node.value))
    }
}

pub struct Postorder<'a, K, V> {
    /// The flag marks nodes whose children are already on the stack.
    stack: Vec<(&'a Node<K, V>, bool)>,
}

impl<'a, K, V> Iterator for Postorder<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, expanded)) = self.stack.pop() {
            if expanded {
                return Some((&node.key, &node.value));
            }
            self.stack.push((node, true));
            if let Some(right) = node.right.as_deref() {
                self.stack.push((right, false));
            }
            if let Some(left) = node.left.as_deref() {
                self.stack.push((left, false));
            }
        }
        None
    }
}
