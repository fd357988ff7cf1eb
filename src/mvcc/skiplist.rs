//! Arena-backed multi-version skip list
//!
//! Nodes live in a `Vec` and link to each other by index, so splicing a new
//! node in never leaves a dangling reference. Index 0 is the sentinel head:
//! an empty key with a tower as tall as the configured maximum level.
//!
//! ```text
//! Level 2:  HEAD ─────────────────────────► b@1 ─────────────────► NIL
//! Level 1:  HEAD ──────────► a@3 ─────────► b@1 ──────────► c@2 ─► NIL
//! Level 0:  HEAD ──► a@1 ──► a@3 ──► a@7 ─► b@1 ──► b@4 ──► c@2 ─► NIL
//! ```
//!
//! Nodes are never updated or removed once linked; a newer version of a key
//! is always a new node.

use rand::Rng;

use super::{LevelGenerator, Value, VersionedKey};

const HEAD: usize = 0;

struct Node {
    key: VersionedKey,
    value: Value,
    /// Forward links, one per level the node occupies
    tower: Vec<Option<usize>>,
}

/// A sorted map from `VersionedKey` to `Value`.
///
/// Not synchronized on its own; [`MemTable`](super::MemTable) puts it behind
/// a reader/writer lock.
pub struct SkipList {
    nodes: Vec<Node>,
    levels: LevelGenerator,
}

impl SkipList {
    pub fn new(max_level: u8) -> Self {
        Self::with_generator(LevelGenerator::new(max_level))
    }

    pub fn with_generator(levels: LevelGenerator) -> Self {
        let head = Node {
            key: VersionedKey::default(),
            value: Value::default(),
            tower: vec![None; usize::from(levels.max_level())],
        };
        Self {
            nodes: vec![head],
            levels,
        }
    }

    pub fn max_level(&self) -> usize {
        self.nodes[HEAD].tower.len()
    }

    /// Number of stored versions (the sentinel is not counted)
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a new version. Returns false if this exact key and version is
    /// already present; the existing value is left untouched.
    pub fn insert(&mut self, key: VersionedKey, value: Value) -> bool {
        self.insert_with(key, value, &mut rand::thread_rng())
    }

    /// Insert drawing the tower height from `rng`
    pub fn insert_with<R: Rng + ?Sized>(
        &mut self,
        key: VersionedKey,
        value: Value,
        rng: &mut R,
    ) -> bool {
        let max_level = self.max_level();
        let mut preceding = vec![HEAD; max_level];
        let current = self.descend(&key, |level, node| preceding[level] = node);

        if let Some(next) = self.nodes[current].tower[0] {
            if self.nodes[next].key == key {
                return false;
            }
        }

        let height = usize::from(self.levels.generate_with(rng)).min(max_level);
        let index = self.nodes.len();
        let tower = preceding[..height]
            .iter()
            .enumerate()
            .map(|(level, &node)| self.nodes[node].tower[level])
            .collect();
        self.nodes.push(Node { key, value, tower });

        for (level, &node) in preceding[..height].iter().enumerate() {
            self.nodes[node].tower[level] = Some(index);
        }
        true
    }

    /// Value of the greatest stored version of `key.key()` that is not newer
    /// than `key.version()`.
    pub fn get(&self, key: &VersionedKey) -> Option<&Value> {
        let current = self.descend(key, |_, _| {});

        // Landed just before an exact match
        if let Some(next) = self.nodes[current].tower[0] {
            if self.nodes[next].key == *key {
                return Some(&self.nodes[next].value);
            }
        }

        // Landed on an older version of the same key
        if current != HEAD && self.nodes[current].key.matches_key(key.key()) {
            return Some(&self.nodes[current].value);
        }
        None
    }

    /// All entries in sort order, oldest version of each key first
    pub fn iter(&self) -> SkipListIter<'_> {
        SkipListIter {
            list: self,
            next: self.nodes[HEAD].tower[0],
        }
    }

    /// Walk from the head towards `target`, moving right while the next node
    /// sorts strictly before it. `on_descend(level, node)` sees the last node
    /// visited on each level before dropping down. Returns the level-0
    /// predecessor of `target`.
    fn descend(&self, target: &VersionedKey, mut on_descend: impl FnMut(usize, usize)) -> usize {
        let mut current = HEAD;
        for level in (0..self.max_level()).rev() {
            while let Some(next) = self.nodes[current].tower[level] {
                if self.nodes[next].key < *target {
                    current = next;
                } else {
                    break;
                }
            }
            on_descend(level, current);
        }
        current
    }
}

/// Iterator over level 0
pub struct SkipListIter<'a> {
    list: &'a SkipList,
    next: Option<usize>,
}

impl<'a> Iterator for SkipListIter<'a> {
    type Item = (&'a VersionedKey, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        let node = &self.list.nodes[self.next?];
        self.next = node.tower[0];
        Some((&node.key, &node.value))
    }
}
