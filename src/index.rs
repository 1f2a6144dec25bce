//! Secondary indices over the atom table: by type, and by (type, target)
//! for typed incoming queries.
//!
//! The index manager is only ever mutated from inside the table's write
//! path, under the same write lock, so readers always observe the table and
//! the indices agreeing with each other.

use std::collections::HashMap;

use crate::types::{AtomId, TypeTag};

#[derive(Default)]
pub struct IndexManager {
    /// type -> live atoms of that type, in insertion order.
    by_type: HashMap<TypeTag, Vec<AtomId>>,
    /// (link type, target) -> links of that type whose outgoing set
    /// contains the target.
    by_type_and_target: HashMap<(TypeTag, AtomId), Vec<AtomId>>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_atom(&mut self, tag: TypeTag, id: AtomId) {
        self.by_type.entry(tag).or_default().push(id);
    }

    /// Registers a link under each of its targets.  A target appearing
    /// twice in the outgoing set is indexed once.
    pub fn insert_link_targets(&mut self, tag: TypeTag, id: AtomId, outgoing: &[AtomId]) {
        for &target in outgoing {
            let links = self.by_type_and_target.entry((tag, target)).or_default();
            if !links.contains(&id) {
                links.push(id);
            }
        }
    }

    pub fn remove_atom(&mut self, tag: TypeTag, id: AtomId) {
        if let Some(ids) = self.by_type.get_mut(&tag) {
            ids.retain(|&other| other != id);
            if ids.is_empty() {
                self.by_type.remove(&tag);
            }
        }
    }

    pub fn remove_link_targets(&mut self, tag: TypeTag, id: AtomId, outgoing: &[AtomId]) {
        for &target in outgoing {
            if let Some(links) = self.by_type_and_target.get_mut(&(tag, target)) {
                links.retain(|&other| other != id);
                if links.is_empty() {
                    self.by_type_and_target.remove(&(tag, target));
                }
            }
        }
    }

    /// Live atoms of a type, oldest first.
    pub fn atoms_of_type(&self, tag: TypeTag) -> &[AtomId] {
        self.by_type.get(&tag).map_or(&[], Vec::as_slice)
    }

    pub fn count_of_type(&self, tag: TypeTag) -> usize {
        self.by_type.get(&tag).map_or(0, Vec::len)
    }

    /// Links of `link_tag` that point at `target`.
    pub fn links_to_target(&self, link_tag: TypeTag, target: AtomId) -> &[AtomId] {
        self.by_type_and_target
            .get(&(link_tag, target))
            .map_or(&[], Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.by_type.clear();
        self.by_type_and_target.clear();
    }
}
