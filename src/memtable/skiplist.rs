//! Skip-list memtable variant.
//!
//! Nodes live in an arena (`Vec<Node>`) and link to each other by index,
//! so the classic forward-pointer towers need no raw pointers and no
//! reference counting. `None` in a link slot means "end of list"; `None`
//! as a predecessor means the head.
//!
//! Tower heights come from repeated fair coin flips capped at the
//! configured maximum level. Entries are never physically removed —
//! deletes replace the record with a tombstone in place — so the arena
//! only grows until the whole table is dropped at flush.

use rand::Rng;

use super::{Memtable, Record};

struct Node {
    record: Record,
    /// Forward links; `next.len()` is this node's tower height.
    next: Vec<Option<usize>>,
}

/// A randomized skip list over byte keys.
pub struct SkipListMemtable {
    nodes: Vec<Node>,
    /// Head forward links, one per possible level.
    head: Vec<Option<usize>>,
    /// Highest tower height currently in use.
    level: usize,
    max_level: usize,
    capacity: usize,
}

impl SkipListMemtable {
    /// Creates an empty list with towers capped at `max_level`.
    pub fn new(max_level: usize, capacity: usize) -> Self {
        let max_level = max_level.max(1);
        Self {
            nodes: Vec::new(),
            head: vec![None; max_level],
            level: 0,
            max_level,
            capacity,
        }
    }

    fn next_of(&self, prev: Option<usize>, lvl: usize) -> Option<usize> {
        match prev {
            None => self.head[lvl],
            Some(idx) => self.nodes[idx].next[lvl],
        }
    }

    fn set_next(&mut self, prev: Option<usize>, lvl: usize, target: Option<usize>) {
        match prev {
            None => self.head[lvl] = target,
            Some(idx) => self.nodes[idx].next[lvl] = target,
        }
    }

    /// Fair coin flips until tails, capped at `max_level`.
    fn roll(&self) -> usize {
        let mut rng = rand::rng();
        let mut height = 1;
        while height < self.max_level && rng.random_bool(0.5) {
            height += 1;
        }
        height
    }

    /// Locates `key`, returning the node index on a hit and the strict
    /// predecessor at every level (for relinking on insert).
    fn find(&self, key: &[u8]) -> (Option<usize>, Vec<Option<usize>>) {
        let mut preds: Vec<Option<usize>> = vec![None; self.max_level];
        let mut prev: Option<usize> = None;

        for lvl in (0..self.level).rev() {
            while let Some(next) = self.next_of(prev, lvl) {
                if self.nodes[next].record.key.as_slice() < key {
                    prev = Some(next);
                } else {
                    break;
                }
            }
            preds[lvl] = prev;
        }

        let candidate = if self.level == 0 {
            None
        } else {
            self.next_of(prev, 0)
        };
        let hit = candidate.filter(|&idx| self.nodes[idx].record.key.as_slice() == key);
        (hit, preds)
    }
}

impl Memtable for SkipListMemtable {
    fn insert(&mut self, record: Record) {
        let (hit, preds) = self.find(&record.key);

        // In-place replace: a put clears an earlier tombstone, a tombstone
        // shadows an earlier value. Entry count is unchanged.
        if let Some(idx) = hit {
            self.nodes[idx].record = record;
            return;
        }

        let height = self.roll();
        let mut next = vec![None; height];
        for (lvl, slot) in next.iter_mut().enumerate() {
            *slot = self.next_of(preds[lvl], lvl);
        }

        let idx = self.nodes.len();
        self.nodes.push(Node { record, next });
        for lvl in 0..height {
            self.set_next(preds[lvl], lvl, Some(idx));
        }
        if height > self.level {
            self.level = height;
        }
    }

    fn get(&self, key: &[u8]) -> Option<&Record> {
        let (hit, _) = self.find(key);
        hit.map(|idx| &self.nodes[idx].record)
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn is_full(&self) -> bool {
        self.nodes.len() >= self.capacity
    }

    fn sorted_keys(&self) -> Vec<Vec<u8>> {
        let mut keys = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.head[0];
        while let Some(idx) = cursor {
            keys.push(self.nodes[idx].record.key.clone());
            cursor = self.nodes[idx].next[0];
        }
        keys
    }
}
