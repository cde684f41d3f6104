//! Key edge detection.
//!
//! Key events carry the full set of held keys. [`KeyTracker`] turns successive
//! sets into individual press and release edges.

use crate::types::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEdge {
    Down(Key),
    Up(Key),
}

impl KeyEdge {
    pub fn key(&self) -> Key {
        match self {
            KeyEdge::Down(key) | KeyEdge::Up(key) => *key,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyTracker {
    held: Vec<Key>,
}

impl KeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently held keys in the order the device reported them.
    pub fn held(&self) -> &[Key] {
        &self.held
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Replaces the held set and returns the edges. Releases come first, in the
    /// order the keys were held, followed by presses in report order.
    pub fn update(&mut self, keys: &[Key]) -> Vec<KeyEdge> {
        let mut next: Vec<Key> = Vec::with_capacity(keys.len());
        for &key in keys {
            if !next.contains(&key) {
                next.push(key);
            }
        }

        let released = self.held.iter().filter(|key| !next.contains(key)).map(|&key| KeyEdge::Up(key));
        let pressed = next.iter().filter(|key| !self.held.contains(key)).map(|&key| KeyEdge::Down(key));
        let edges = released.chain(pressed).collect();

        self.held = next;
        edges
    }

    /// Releases everything still held, e.g. when the device goes away.
    pub fn release_all(&mut self) -> Vec<KeyEdge> {
        self.update(&[])
    }
}
