// Packr
// Copyright (c) 2026 The Project Packr Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `dict` module implements the bounded LRU dictionaries that back the one-byte reference
//! tokens. An encoder and decoder each carry three independent instances: field names, strings,
//! and MAC addresses.

use std::collections::HashMap;
use std::hash::Hash;

use packr_core::value::MacAddr;

/// The number of slots in each dictionary. Reference tokens carry the slot index in their low 6
/// bits, so this is fixed by the wire format.
pub const DICT_SIZE: usize = 64;

/// Sentinel link index marking the end of the recency list.
const NIL: u8 = DICT_SIZE as u8;

/// A bounded dictionary mapping keys to slot indices in `[0, 64)` with LRU eviction.
///
/// Slots are handed out sequentially until all 64 are occupied; after that, inserting a new key
/// reuses the slot of the least-recently-used occupant. Lookups, insertions, and slot reads all
/// refresh a key's recency. Eviction is O(1) via a doubly-linked recency order threaded through
/// fixed index arrays.
pub struct Dictionary<K> {
    slots: Vec<Option<K>>,
    index: HashMap<K, u8>,
    prev: [u8; DICT_SIZE],
    next: [u8; DICT_SIZE],
    lru: u8,
    mru: u8,
    len: usize,
}

impl<K: Eq + Hash + Clone> Dictionary<K> {
    /// Instantiate a new empty `Dictionary`.
    pub fn new() -> Self {
        Dictionary {
            slots: (0..DICT_SIZE).map(|_| None).collect(),
            index: HashMap::new(),
            prev: [NIL; DICT_SIZE],
            next: [NIL; DICT_SIZE],
            lru: NIL,
            mru: NIL,
            len: 0,
        }
    }

    /// Gets the number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Looks up a key, refreshing its recency if present.
    pub fn lookup(&mut self, key: &K) -> Option<u8> {
        let idx = *self.index.get(key)?;
        self.touch(idx);
        Some(idx)
    }

    /// Gets the index for a key, inserting it if absent. Returns the slot index and whether the
    /// key was newly inserted. Inserting into a full dictionary evicts the least-recently-used
    /// occupant and reuses its slot.
    pub fn get_or_add(&mut self, key: K) -> (u8, bool) {
        if let Some(idx) = self.lookup(&key) {
            return (idx, false);
        }

        let idx = if self.len < DICT_SIZE {
            let idx = self.len as u8;
            self.len += 1;
            idx
        }
        else {
            let idx = self.unlink_lru();
            if let Some(old) = self.slots[idx as usize].take() {
                self.index.remove(&old);
            }
            idx
        };

        self.slots[idx as usize] = Some(key.clone());
        self.index.insert(key, idx);
        self.push_mru(idx);

        (idx, true)
    }

    /// Gets the key stored at a slot, refreshing its recency if occupied.
    pub fn get(&mut self, idx: u8) -> Option<&K> {
        if usize::from(idx) >= DICT_SIZE || self.slots[usize::from(idx)].is_none() {
            return None;
        }
        self.touch(idx);
        self.slots[usize::from(idx)].as_ref()
    }

    /// Clears all slots, returning the dictionary to its initial empty state.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.index.clear();
        self.prev = [NIL; DICT_SIZE];
        self.next = [NIL; DICT_SIZE];
        self.lru = NIL;
        self.mru = NIL;
        self.len = 0;
    }

    /// Moves a linked slot to the most-recently-used end of the recency order.
    fn touch(&mut self, idx: u8) {
        if self.mru == idx {
            return;
        }
        self.unlink(idx);
        self.push_mru(idx);
    }

    fn unlink(&mut self, idx: u8) {
        let (p, n) = (self.prev[idx as usize], self.next[idx as usize]);

        if p != NIL {
            self.next[p as usize] = n;
        }
        else if self.lru == idx {
            self.lru = n;
        }

        if n != NIL {
            self.prev[n as usize] = p;
        }
        else if self.mru == idx {
            self.mru = p;
        }

        self.prev[idx as usize] = NIL;
        self.next[idx as usize] = NIL;
    }

    fn push_mru(&mut self, idx: u8) {
        self.prev[idx as usize] = self.mru;
        self.next[idx as usize] = NIL;

        if self.mru != NIL {
            self.next[self.mru as usize] = idx;
        }
        self.mru = idx;

        if self.lru == NIL {
            self.lru = idx;
        }
    }

    fn unlink_lru(&mut self) -> u8 {
        debug_assert!(self.lru != NIL);
        let idx = self.lru;
        self.unlink(idx);
        idx
    }
}

impl<K: Eq + Hash + Clone> Default for Dictionary<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// The three dictionaries carried by an encoder or decoder. They live and reset together, and a
/// frame is the atomic unit of their state.
#[derive(Default)]
pub struct DictionarySet {
    pub fields: Dictionary<String>,
    pub strings: Dictionary<String>,
    pub macs: Dictionary<MacAddr>,
}

impl DictionarySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets all three dictionaries.
    pub fn reset(&mut self) {
        self.fields.reset();
        self.strings.reset();
        self.macs.reset();
    }

    /// Returns true if all three dictionaries are empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.strings.is_empty() && self.macs.is_empty()
    }
}
