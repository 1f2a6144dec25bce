//! Data-oriented atom storage.
//!
//! The table is a structure of arrays: every per-atom attribute lives in its
//! own vector, all indexed by slot.  Hot numeric data (truth and attention
//! values) sits in [`PackedCell`]s so it can be read and updated without the
//! table lock; cold data (names, outgoing sets, incoming sets) is plain and
//! only touched under the owner's write lock.
//!
//! Slots are recycled through a free list.  Each recycle bumps the slot's
//! generation, so an [`AtomId`] held across a removal stops resolving in
//! O(1) instead of silently aliasing the slot's next tenant.  A slot whose
//! generation counter would wrap is retired instead of reused.

use std::collections::HashMap;

use crate::index::IndexManager;
use crate::space::SpaceError;
use crate::types::{AtomHeader, AtomId, AttentionValue, TruthValue, TypeTag};
use crate::{atomic_try_update, PackedCell};

const INITIAL_CAPACITY: usize = 1024;

pub struct AtomTable {
    headers: Vec<AtomHeader>,
    truth_values: Vec<PackedCell<TruthValue>>,
    attention_values: Vec<PackedCell<AttentionValue>>,
    generations: Vec<u16>,
    /// Name, if the slot holds a node.  Empty otherwise.
    node_data: Vec<String>,
    /// Outgoing set, if the slot holds a link.  Empty otherwise.
    link_data: Vec<Vec<AtomId>>,
    /// Links whose outgoing set contains this slot's atom.
    incoming_sets: Vec<Vec<AtomId>>,
    /// Insertion journal backing whole-table iteration order.  Removed ids
    /// are filtered lazily and compacted once they outnumber the live ones.
    order: Vec<AtomId>,
    free_slots: Vec<u32>,
    /// Dedup oracles: identical content must resolve to the identical id.
    node_index: HashMap<TypeTag, HashMap<String, AtomId>>,
    link_index: HashMap<TypeTag, HashMap<Vec<AtomId>, AtomId>>,
    live_nodes: usize,
    live_links: usize,
}

impl Default for AtomTable {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomTable {
    pub fn new() -> Self {
        Self {
            headers: Vec::with_capacity(INITIAL_CAPACITY),
            truth_values: Vec::with_capacity(INITIAL_CAPACITY),
            attention_values: Vec::with_capacity(INITIAL_CAPACITY),
            generations: Vec::with_capacity(INITIAL_CAPACITY),
            node_data: Vec::with_capacity(INITIAL_CAPACITY),
            link_data: Vec::with_capacity(INITIAL_CAPACITY),
            incoming_sets: Vec::with_capacity(INITIAL_CAPACITY),
            order: Vec::with_capacity(INITIAL_CAPACITY),
            free_slots: Vec::new(),
            node_index: HashMap::new(),
            link_index: HashMap::new(),
            live_nodes: 0,
            live_links: 0,
        }
    }

    /// Resolves an id to its slot.  Fails for the invalid id, out-of-range
    /// indexes, stale generations, and vacant slots.
    fn slot(&self, id: AtomId) -> Option<usize> {
        if !id.valid() {
            return None;
        }
        let i = id.index() as usize;
        if i >= self.generations.len()
            || self.generations[i] != id.generation()
            || self.headers[i].atom_type().raw() == 0
        {
            return None;
        }
        Some(i)
    }

    pub fn contains(&self, id: AtomId) -> bool {
        self.slot(id).is_some()
    }

    fn alloc(&mut self, tag: TypeTag, arity: u16, link: bool, tv: TruthValue) -> (usize, AtomId) {
        let mut header = AtomHeader::new(tag, arity, 0);
        if link {
            header.set_flag(AtomHeader::FLAG_LINK);
        }
        if let Some(slot) = self.free_slots.pop() {
            let slot = slot as usize;
            // The generation was bumped when the slot was vacated, so the
            // stored value is already this tenant's generation.
            let generation = self.generations[slot];
            debug_assert!(generation != 0);
            header.set_generation(generation);
            self.headers[slot] = header;
            self.truth_values[slot].store(tv);
            self.attention_values[slot].store(AttentionValue::default());
            (slot, AtomId::pack(slot as u64, generation))
        } else {
            let slot = self.headers.len();
            let generation = 1u16;
            header.set_generation(generation);
            self.headers.push(header);
            self.truth_values.push(PackedCell::new(tv));
            self.attention_values.push(PackedCell::default());
            self.generations.push(generation);
            self.node_data.push(String::new());
            self.link_data.push(Vec::new());
            self.incoming_sets.push(Vec::new());
            (slot, AtomId::pack(slot as u64, generation))
        }
    }

    /// Deduplicating node insert.  Returns the existing id when
    /// `(tag, name)` is already present; the provided truth value is only
    /// used for a fresh atom.
    pub fn add_node(
        &mut self,
        indices: &mut IndexManager,
        tag: TypeTag,
        name: &str,
        tv: TruthValue,
    ) -> AtomId {
        if let Some(&id) = self.node_index.get(&tag).and_then(|m| m.get(name)) {
            return id;
        }
        let (slot, id) = self.alloc(tag, 0, false, tv);
        self.node_data[slot] = name.to_string();
        self.node_index
            .entry(tag)
            .or_default()
            .insert(name.to_string(), id);
        indices.insert_atom(tag, id);
        self.order.push(id);
        self.live_nodes += 1;
        id
    }

    /// Deduplicating link insert.  Every outgoing id must name a live atom.
    pub fn add_link(
        &mut self,
        indices: &mut IndexManager,
        tag: TypeTag,
        outgoing: &[AtomId],
        tv: TruthValue,
    ) -> Result<AtomId, SpaceError> {
        for &target in outgoing {
            if self.slot(target).is_none() {
                return Err(SpaceError::InvalidReference);
            }
        }
        debug_assert!(outgoing.len() <= u16::MAX as usize);
        if let Some(&id) = self.link_index.get(&tag).and_then(|m| m.get(outgoing)) {
            return Ok(id);
        }
        let (slot, id) = self.alloc(tag, outgoing.len() as u16, true, tv);
        self.link_data[slot] = outgoing.to_vec();
        for &target in outgoing {
            if let Some(ts) = self.slot(target) {
                if !self.incoming_sets[ts].contains(&id) {
                    self.incoming_sets[ts].push(id);
                }
            }
        }
        self.link_index
            .entry(tag)
            .or_default()
            .insert(outgoing.to_vec(), id);
        indices.insert_atom(tag, id);
        indices.insert_link_targets(tag, id, outgoing);
        self.order.push(id);
        self.live_links += 1;
        Ok(id)
    }

    /// Removes an atom.  Non-recursive removal of an atom with a non-empty
    /// incoming set fails; recursive removal takes the incoming links down
    /// first, depth-first, visiting each atom once.
    pub fn remove(&mut self, indices: &mut IndexManager, id: AtomId, recursive: bool) -> bool {
        let Some(slot) = self.slot(id) else {
            return false;
        };
        if self.headers[slot].has_flag(AtomHeader::FLAG_CHECKED) {
            // Already being removed further up the recursion.
            return false;
        }
        if !self.incoming_sets[slot].is_empty() {
            if !recursive {
                return false;
            }
            self.headers[slot].set_flag(AtomHeader::FLAG_CHECKED);
            let incoming = self.incoming_sets[slot].clone();
            for link in incoming {
                self.remove(indices, link, true);
            }
            self.headers[slot].clear_flag(AtomHeader::FLAG_CHECKED);
            debug_assert!(self.incoming_sets[slot].is_empty());
        }
        self.remove_single(indices, id, slot);
        true
    }

    fn remove_single(&mut self, indices: &mut IndexManager, id: AtomId, slot: usize) {
        let tag = self.headers[slot].atom_type();
        if self.headers[slot].has_flag(AtomHeader::FLAG_LINK) {
            let outgoing = std::mem::take(&mut self.link_data[slot]);
            for &target in &outgoing {
                if let Some(ts) = self.slot(target) {
                    self.incoming_sets[ts].retain(|&l| l != id);
                }
            }
            indices.remove_link_targets(tag, id, &outgoing);
            if let Some(map) = self.link_index.get_mut(&tag) {
                map.remove(&outgoing);
            }
            self.live_links -= 1;
        } else {
            let name = std::mem::take(&mut self.node_data[slot]);
            if let Some(map) = self.node_index.get_mut(&tag) {
                map.remove(&name);
            }
            self.live_nodes -= 1;
        }
        indices.remove_atom(tag, id);
        self.incoming_sets[slot].clear();
        self.truth_values[slot].store(TruthValue::default());
        self.attention_values[slot].store(AttentionValue::default());
        self.vacate(slot);
        self.maybe_compact_order();
    }

    /// Bumps the slot's generation and returns it to the free list, or
    /// retires it when the counter would wrap back to zero.
    fn vacate(&mut self, slot: usize) {
        let next = self.generations[slot].wrapping_add(1);
        self.generations[slot] = next;
        self.headers[slot] = AtomHeader::default();
        if next != 0 {
            self.free_slots.push(slot as u32);
        }
    }

    fn maybe_compact_order(&mut self) {
        if self.order.len() > 2 * self.size() + 16 {
            let generations = &self.generations;
            let headers = &self.headers;
            self.order.retain(|&id| {
                let i = id.index() as usize;
                i < generations.len()
                    && generations[i] == id.generation()
                    && headers[i].atom_type().raw() != 0
            });
        }
    }

    // ------------------------------------------------------------------
    // Accessors.  Stale or invalid ids yield defaults, never panics.
    // ------------------------------------------------------------------

    pub fn atom_type(&self, id: AtomId) -> Option<TypeTag> {
        self.slot(id).map(|s| self.headers[s].atom_type())
    }

    pub fn name(&self, id: AtomId) -> Option<&str> {
        let slot = self.slot(id)?;
        if self.headers[slot].has_flag(AtomHeader::FLAG_LINK) {
            None
        } else {
            Some(&self.node_data[slot])
        }
    }

    pub fn is_link(&self, id: AtomId) -> bool {
        self.slot(id)
            .is_some_and(|s| self.headers[s].has_flag(AtomHeader::FLAG_LINK))
    }

    pub fn outgoing(&self, id: AtomId) -> &[AtomId] {
        self.slot(id).map_or(&[], |s| &self.link_data[s])
    }

    pub fn arity(&self, id: AtomId) -> usize {
        self.slot(id)
            .map_or(0, |s| usize::from(self.headers[s].arity()))
    }

    pub fn incoming(&self, id: AtomId) -> &[AtomId] {
        self.slot(id).map_or(&[], |s| &self.incoming_sets[s])
    }

    pub fn tv(&self, id: AtomId) -> TruthValue {
        self.slot(id)
            .map_or_else(TruthValue::default, |s| self.truth_values[s].load())
    }

    pub fn av(&self, id: AtomId) -> AttentionValue {
        self.slot(id)
            .map_or_else(AttentionValue::default, |s| self.attention_values[s].load())
    }

    pub fn set_tv(&self, id: AtomId, tv: TruthValue) -> bool {
        match self.slot(id) {
            Some(s) => {
                self.truth_values[s].store(tv);
                true
            }
            None => false,
        }
    }

    pub fn set_av(&self, id: AtomId, av: AttentionValue) -> bool {
        match self.slot(id) {
            Some(s) => {
                self.attention_values[s].store(av);
                true
            }
            None => false,
        }
    }

    /// Read-modify-write on an attention value through the CAS loop.
    /// `None` if the id no longer resolves.
    pub fn try_update_av<F, R>(&self, id: AtomId, func: F) -> Option<R>
    where
        F: Fn(&mut AttentionValue) -> (bool, R),
    {
        let slot = self.slot(id)?;
        Some(atomic_try_update(&self.attention_values[slot], func))
    }

    /// Read-modify-write on a truth value through the CAS loop.
    pub fn try_update_tv<F, R>(&self, id: AtomId, func: F) -> Option<R>
    where
        F: Fn(&mut TruthValue) -> (bool, R),
    {
        let slot = self.slot(id)?;
        Some(atomic_try_update(&self.truth_values[slot], func))
    }

    pub fn get_node(&self, tag: TypeTag, name: &str) -> Option<AtomId> {
        self.node_index.get(&tag)?.get(name).copied()
    }

    pub fn get_link(&self, tag: TypeTag, outgoing: &[AtomId]) -> Option<AtomId> {
        self.link_index.get(&tag)?.get(outgoing).copied()
    }

    pub fn size(&self) -> usize {
        self.live_nodes + self.live_links
    }

    pub fn node_count(&self) -> usize {
        self.live_nodes
    }

    pub fn link_count(&self) -> usize {
        self.live_links
    }

    /// Live atoms in insertion order.
    pub fn iter_ids(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.order.iter().copied().filter(|&id| self.contains(id))
    }

    /// Drops every atom and resets the dedup maps, but keeps (and bumps)
    /// the generation counters so ids issued before the clear stay invalid.
    pub fn clear(&mut self, indices: &mut IndexManager) {
        self.free_slots.clear();
        for slot in 0..self.headers.len() {
            if self.headers[slot].atom_type().raw() != 0 {
                self.incoming_sets[slot].clear();
                self.node_data[slot].clear();
                self.link_data[slot].clear();
                self.truth_values[slot].store(TruthValue::default());
                self.attention_values[slot].store(AttentionValue::default());
                self.vacate(slot);
            } else if self.generations[slot] != 0 {
                // Was already free; keep it reusable.
                self.free_slots.push(slot as u32);
            }
        }
        self.node_index.clear();
        self.link_index.clear();
        self.order.clear();
        self.live_nodes = 0;
        self.live_links = 0;
        indices.clear();
    }
}
