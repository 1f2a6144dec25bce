//! The `AtomSpace` facade: the public API over the atom table and its
//! indices, plus external handles and the user-defined type registry.
//!
//! Structural operations (add, remove, clear) take the write half of a
//! single reader-writer lock covering the table and indices together, so a
//! reader sees either all of an operation's effects or none of them.
//! Truth- and attention-value updates only take the read half; the values
//! themselves are CAS-updated in place.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display, Write as _};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;
use static_assertions::assert_eq_size;

use crate::index::IndexManager;
use crate::table::AtomTable;
use crate::types::{
    self, AtomId, AttentionValue, TruthValue, TypeKind, TypeTag, USER_DEFINED,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceError {
    /// An outgoing id does not refer to a live atom.
    InvalidReference,
    /// Non-recursive removal of an atom with a non-empty incoming set.
    Occupied,
    /// A lookup that the API contract requires to succeed found nothing.
    NotFound,
}

impl Error for SpaceError {}

impl Display for SpaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Per-space registry for atom types beyond the built-in enumeration.
/// Tags are handed out sequentially from [`USER_DEFINED`].
#[derive(Default)]
struct TypeRegistry {
    next: u16,
    names: HashMap<TypeTag, String>,
    kinds: HashMap<TypeTag, TypeKind>,
    by_name: HashMap<String, TypeTag>,
}

impl TypeRegistry {
    fn register(&mut self, name: &str, kind: TypeKind) -> TypeTag {
        if let Some(&tag) = self.by_name.get(name) {
            return tag;
        }
        let tag = TypeTag::from_raw(USER_DEFINED + self.next);
        self.next += 1;
        self.names.insert(tag, name.to_string());
        self.kinds.insert(tag, kind);
        self.by_name.insert(name.to_string(), tag);
        tag
    }
}

struct Inner {
    table: AtomTable,
    indices: IndexManager,
    registry: TypeRegistry,
}

/// The central knowledge hypergraph.
///
/// All methods take `&self`; interior locking makes the space shareable
/// across threads by reference.  Methods accept anything convertible to an
/// [`AtomId`] — ids themselves or [`Handle`]s.
pub struct AtomSpace {
    inner: RwLock<Inner>,
}

impl Default for AtomSpace {
    fn default() -> Self {
        Self::new()
    }
}

/// Externally visible capability for one atom: the id plus a back-reference
/// to the owning space.  Copying or dropping a handle does nothing to the
/// atom; a handle is valid only while its generation matches the slot's.
#[derive(Clone, Copy)]
pub struct Handle<'a> {
    id: AtomId,
    space: &'a AtomSpace,
}

impl<'a> Handle<'a> {
    pub fn id(self) -> AtomId {
        self.id
    }

    pub fn valid(self) -> bool {
        self.id.valid() && self.space.contains(self.id)
    }

    pub fn atom_type(self) -> Option<TypeTag> {
        self.space.get_type(self.id)
    }

    pub fn name(self) -> Option<String> {
        self.space.get_name(self.id)
    }

    pub fn outgoing(self) -> Vec<AtomId> {
        self.space.get_outgoing(self.id)
    }

    pub fn incoming(self) -> Vec<AtomId> {
        self.space.get_incoming(self.id)
    }

    pub fn arity(self) -> usize {
        self.space.get_arity(self.id)
    }

    pub fn tv(self) -> TruthValue {
        self.space.get_tv(self.id)
    }

    pub fn av(self) -> AttentionValue {
        self.space.get_av(self.id)
    }
}

impl fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("id", &self.id).finish()
    }
}

impl PartialEq for Handle<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handle<'_> {}

impl From<Handle<'_>> for AtomId {
    fn from(h: Handle<'_>) -> AtomId {
        h.id
    }
}

assert_eq_size!(Handle<'static>, [u64; 2]);

impl AtomSpace {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                table: AtomTable::new(),
                indices: IndexManager::new(),
                registry: TypeRegistry::default(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        // A poisoned lock means a writer panicked mid-mutation; there is no
        // consistent state to expose, so propagate the panic.
        self.inner.read().expect("atomspace lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("atomspace lock poisoned")
    }

    /// Runs `func` with the table and indices under one read guard, so a
    /// multi-step read (one matcher candidate, one rendered tree) observes
    /// a single consistent snapshot.
    pub(crate) fn with_read<R>(&self, func: impl FnOnce(&AtomTable, &IndexManager) -> R) -> R {
        let inner = self.read();
        func(&inner.table, &inner.indices)
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Adds a node with the default truth value, or returns the existing
    /// atom with the same type and name.
    pub fn add_node(&self, tag: impl Into<TypeTag>, name: &str) -> Handle<'_> {
        self.add_node_with_tv(tag, name, TruthValue::default())
    }

    pub fn add_node_with_tv(
        &self,
        tag: impl Into<TypeTag>,
        name: &str,
        tv: TruthValue,
    ) -> Handle<'_> {
        let tag = tag.into();
        let mut inner = self.write();
        let Inner { table, indices, .. } = &mut *inner;
        let id = table.add_node(indices, tag, name, tv);
        Handle { id, space: self }
    }

    /// Adds a link with the default truth value, or returns the existing
    /// atom with the same type and outgoing set.
    pub fn add_link<I>(
        &self,
        tag: impl Into<TypeTag>,
        outgoing: &[I],
    ) -> Result<Handle<'_>, SpaceError>
    where
        I: Into<AtomId> + Copy,
    {
        self.add_link_with_tv(tag, outgoing, TruthValue::default())
    }

    pub fn add_link_with_tv<I>(
        &self,
        tag: impl Into<TypeTag>,
        outgoing: &[I],
        tv: TruthValue,
    ) -> Result<Handle<'_>, SpaceError>
    where
        I: Into<AtomId> + Copy,
    {
        let tag = tag.into();
        let ids: Vec<AtomId> = outgoing.iter().map(|&i| i.into()).collect();
        let mut inner = self.write();
        let Inner { table, indices, .. } = &mut *inner;
        let id = table.add_link(indices, tag, &ids, tv)?;
        Ok(Handle { id, space: self })
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Removes an atom.  With `recursive = false`, fails (returns false)
    /// when the atom still has incoming links; with `recursive = true`,
    /// removes the incoming links first.
    pub fn remove(&self, id: impl Into<AtomId>, recursive: bool) -> bool {
        let id = id.into();
        let mut inner = self.write();
        let Inner { table, indices, .. } = &mut *inner;
        table.remove(indices, id, recursive)
    }

    /// Like [`AtomSpace::remove`], but explains a refusal: `NotFound` for a
    /// stale or absent id, `Occupied` for a non-recursive removal blocked
    /// by incoming links.
    pub fn try_remove(&self, id: impl Into<AtomId>, recursive: bool) -> Result<(), SpaceError> {
        let id = id.into();
        let mut inner = self.write();
        let Inner { table, indices, .. } = &mut *inner;
        if !table.contains(id) {
            return Err(SpaceError::NotFound);
        }
        if !recursive && !table.incoming(id).is_empty() {
            return Err(SpaceError::Occupied);
        }
        if table.remove(indices, id, recursive) {
            Ok(())
        } else {
            Err(SpaceError::NotFound)
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn get_node(&self, tag: impl Into<TypeTag>, name: &str) -> Option<Handle<'_>> {
        let id = self.read().table.get_node(tag.into(), name)?;
        Some(Handle { id, space: self })
    }

    pub fn get_link<I>(&self, tag: impl Into<TypeTag>, outgoing: &[I]) -> Option<Handle<'_>>
    where
        I: Into<AtomId> + Copy,
    {
        let ids: Vec<AtomId> = outgoing.iter().map(|&i| i.into()).collect();
        let id = self.read().table.get_link(tag.into(), &ids)?;
        Some(Handle { id, space: self })
    }

    pub fn contains(&self, id: impl Into<AtomId>) -> bool {
        self.read().table.contains(id.into())
    }

    pub fn make_handle(&self, id: AtomId) -> Handle<'_> {
        Handle { id, space: self }
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub fn get_type(&self, id: impl Into<AtomId>) -> Option<TypeTag> {
        self.read().table.atom_type(id.into())
    }

    pub fn get_name(&self, id: impl Into<AtomId>) -> Option<String> {
        self.read().table.name(id.into()).map(str::to_string)
    }

    pub fn get_outgoing(&self, id: impl Into<AtomId>) -> Vec<AtomId> {
        self.read().table.outgoing(id.into()).to_vec()
    }

    pub fn get_arity(&self, id: impl Into<AtomId>) -> usize {
        self.read().table.arity(id.into())
    }

    pub fn get_tv(&self, id: impl Into<AtomId>) -> TruthValue {
        self.read().table.tv(id.into())
    }

    pub fn set_tv(&self, id: impl Into<AtomId>, tv: TruthValue) -> bool {
        self.read().table.set_tv(id.into(), tv)
    }

    pub fn get_av(&self, id: impl Into<AtomId>) -> AttentionValue {
        self.read().table.av(id.into())
    }

    pub fn set_av(&self, id: impl Into<AtomId>, av: AttentionValue) -> bool {
        self.read().table.set_av(id.into(), av)
    }

    /// CAS update of an attention value; see
    /// [`AtomTable::try_update_av`](crate::table::AtomTable::try_update_av).
    pub fn try_update_av<F, R>(&self, id: impl Into<AtomId>, func: F) -> Option<R>
    where
        F: Fn(&mut AttentionValue) -> (bool, R),
    {
        self.read().table.try_update_av(id.into(), func)
    }

    /// CAS update of a truth value.
    pub fn try_update_tv<F, R>(&self, id: impl Into<AtomId>, func: F) -> Option<R>
    where
        F: Fn(&mut TruthValue) -> (bool, R),
    {
        self.read().table.try_update_tv(id.into(), func)
    }

    // ------------------------------------------------------------------
    // Incoming sets and type queries
    // ------------------------------------------------------------------

    /// Links whose outgoing set contains this atom.
    pub fn get_incoming(&self, id: impl Into<AtomId>) -> Vec<AtomId> {
        self.read().table.incoming(id.into()).to_vec()
    }

    /// Incoming links of a specific type.
    pub fn get_incoming_by_type(
        &self,
        id: impl Into<AtomId>,
        tag: impl Into<TypeTag>,
    ) -> Vec<AtomId> {
        self.read()
            .indices
            .links_to_target(tag.into(), id.into())
            .to_vec()
    }

    /// All atoms of a type, in insertion order.
    pub fn get_atoms_by_type(&self, tag: impl Into<TypeTag>) -> Vec<AtomId> {
        self.read().indices.atoms_of_type(tag.into()).to_vec()
    }

    pub fn count_atoms(&self, tag: impl Into<TypeTag>) -> usize {
        self.read().indices.count_of_type(tag.into())
    }

    // ------------------------------------------------------------------
    // Iteration
    // ------------------------------------------------------------------

    /// Calls `func` for every live atom, in insertion order, under the
    /// read lock.
    pub fn for_each_atom(&self, mut func: impl FnMut(Handle<'_>)) {
        let inner = self.read();
        for id in inner.table.iter_ids() {
            func(Handle { id, space: self });
        }
    }

    pub fn for_each_atom_of_type(
        &self,
        tag: impl Into<TypeTag>,
        mut func: impl FnMut(Handle<'_>),
    ) {
        let inner = self.read();
        for &id in inner.indices.atoms_of_type(tag.into()) {
            func(Handle { id, space: self });
        }
    }

    /// Snapshot of every live id, in insertion order.
    pub fn all_atoms(&self) -> Vec<AtomId> {
        self.read().table.iter_ids().collect()
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    pub fn size(&self) -> usize {
        self.read().table.size()
    }

    pub fn node_count(&self) -> usize {
        self.read().table.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.read().table.link_count()
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    /// Registers (or looks up) a user-defined atom type.
    pub fn register_type(&self, name: &str, kind: TypeKind) -> TypeTag {
        self.write().registry.register(name, kind)
    }

    /// Name of a type tag, consulting the user registry for extension tags.
    pub fn type_name(&self, tag: TypeTag) -> String {
        if tag.is_user_defined() {
            if let Some(name) = self.read().registry.names.get(&tag) {
                return name.clone();
            }
        }
        types::type_name(tag).to_string()
    }

    /// Resolves a type name, consulting the user registry after the
    /// built-ins.
    pub fn type_from_name(&self, name: &str) -> Option<TypeTag> {
        if let Some(t) = types::type_from_name(name) {
            return Some(t.into());
        }
        self.read().registry.by_name.get(name).copied()
    }

    /// Whether a tag names a node type, consulting the registry for
    /// user-defined tags.
    pub fn is_node_type(&self, tag: TypeTag) -> bool {
        if tag.is_user_defined() {
            return self.read().registry.kinds.get(&tag) == Some(&TypeKind::Node);
        }
        types::is_node_type(tag)
    }

    // ------------------------------------------------------------------
    // Utilities
    // ------------------------------------------------------------------

    /// Drops every atom.  Generation counters are preserved, so handles
    /// issued before the clear remain invalid afterwards.
    pub fn clear(&self) {
        let mut inner = self.write();
        let size = inner.table.size();
        let Inner { table, indices, .. } = &mut *inner;
        table.clear(indices);
        debug!("cleared atomspace ({size} atoms dropped)");
    }

    /// Renders an atom in its canonical human-readable form:
    /// `TypeName "Name" <strength, confidence>` for nodes, an indented
    /// tree for links.
    pub fn to_string(&self, id: impl Into<AtomId>) -> String {
        let inner = self.read();
        let mut out = String::new();
        self.render(&inner, id.into(), 0, &mut out);
        out
    }

    /// One-line rendering without the truth value.
    pub fn to_short_string(&self, id: impl Into<AtomId>) -> String {
        let id = id.into();
        let inner = self.read();
        let Some(tag) = inner.table.atom_type(id) else {
            return "<invalid>".to_string();
        };
        match inner.table.name(id) {
            Some(name) => format!("{} \"{}\"", self.tag_name(&inner, tag), name),
            None => format!(
                "{} /{}",
                self.tag_name(&inner, tag),
                inner.table.arity(id)
            ),
        }
    }

    fn tag_name<'g>(&self, inner: &'g Inner, tag: TypeTag) -> &'g str {
        if tag.is_user_defined() {
            if let Some(name) = inner.registry.names.get(&tag) {
                return name;
            }
        }
        types::type_name(tag)
    }

    fn render(&self, inner: &Inner, id: AtomId, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        let Some(tag) = inner.table.atom_type(id) else {
            out.push_str("<invalid>\n");
            return;
        };
        let tv = inner.table.tv(id);
        match inner.table.name(id) {
            Some(name) => {
                let _ = writeln!(
                    out,
                    "{} \"{}\" <{:.3}, {:.3}>",
                    self.tag_name(inner, tag),
                    name,
                    tv.strength,
                    tv.confidence
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "{} <{:.3}, {:.3}>",
                    self.tag_name(inner, tag),
                    tv.strength,
                    tv.confidence
                );
                for &target in inner.table.outgoing(id) {
                    self.render(inner, target, depth + 1, out);
                }
            }
        }
    }
}
