//! In-memory hypergraph knowledge store with truth-valued atoms, economic
//! attention allocation, lazy pattern matching, and probabilistic-logic
//! inference.
//!
//! The central structure is the [`AtomSpace`]: a deduplicating table of
//! *atoms* (nodes and links) addressed by stable, generation-stamped
//! [`AtomId`]s.  Links may target any atom, including other links, so the
//! store is a typed hypergraph.  Per-atom truth and attention values live in
//! lock-free cells so that inference and attention updates never block
//! readers; structural changes (add/remove) go through a single
//! reader-writer lock.
//!
//! On top of the store sit three engines:
//!
//! - [`matcher::PatternMatcher`] walks the hypergraph lazily, yielding one
//!   binding set at a time and backtracking between calls.
//! - [`pln`] implements the probabilistic truth-value formulas (revision,
//!   deduction, inversion, abduction and friends), in scalar and slice form.
//! - [`inference`] drives forward and backward chaining over declarative
//!   rules, and [`attention::AttentionBank`] manages the STI/LTI economy
//!   that decides which atoms are worth keeping.
//!
//! ```
//! use atomspace::{AtomSpace, AtomType};
//!
//! let space = AtomSpace::new();
//! let cat = space.add_node(AtomType::ConceptNode, "Cat");
//! let animal = space.add_node(AtomType::ConceptNode, "Animal");
//! let inh = space
//!     .add_link(AtomType::InheritanceLink, &[cat, animal])
//!     .unwrap();
//! assert_eq!(space.get_incoming(cat), vec![inh.id()]);
//! ```

use std::marker::PhantomData;

use crossbeam_utils::atomic::AtomicCell;

pub mod attention;
pub mod index;
pub mod inference;
pub mod matcher;
pub mod pattern;
pub mod pln;
pub mod space;
pub mod table;
pub mod types;

pub use attention::{AttentionBank, ECANConfig, ForgettingAgent, ImportanceDiffusionAgent};
pub use inference::{backward_chain, forward_chain, InferenceConfig, InferenceError, Rule};
pub use matcher::{MatchResult, MatcherConfig, PatternMatcher, Query};
pub use pattern::{BindingSet, Pattern, Term};
pub use space::{AtomSpace, Handle, SpaceError};
pub use types::{AtomId, AtomType, AttentionValue, TruthValue, TypeKind, TypeTag};

/// A value that can be represented losslessly as a single 64-bit word.
///
/// All of the store's hot per-atom state (truth values, attention values,
/// the attention bank's funds) is eight bytes or less, which means it fits
/// in one hardware compare-and-swap.  Packing is explicit rather than a
/// byte-level transmute so that padding can never leak into the comparison:
/// two logically equal values always produce the same word.
pub trait Packable: Copy {
    fn pack(self) -> u64;
    fn unpack(bits: u64) -> Self;
}

impl Packable for u64 {
    fn pack(self) -> u64 {
        self
    }
    fn unpack(bits: u64) -> Self {
        bits
    }
}

impl Packable for f32 {
    fn pack(self) -> u64 {
        u64::from(self.to_bits())
    }
    fn unpack(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

/// A cell holding an instance of `T` as an atomic 64-bit word.
///
/// This is the store's one concurrency primitive for numeric state.  Readers
/// `load()` without synchronization; writers either `store()` blindly or go
/// through [`atomic_try_update`] when the new value depends on the old one.
pub struct PackedCell<T: Packable> {
    inner: AtomicCell<u64>,
    _marker: PhantomData<T>,
}

impl<T: Packable> PackedCell<T> {
    pub fn new(val: T) -> Self {
        Self {
            inner: AtomicCell::new(val.pack()),
            _marker: PhantomData,
        }
    }

    pub fn load(&self) -> T {
        T::unpack(self.inner.load())
    }

    pub fn store(&self, val: T) {
        self.inner.store(val.pack());
    }
}

impl<T: Packable + Default> Default for PackedCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Compare-and-swap retry loop over a [`PackedCell`].
///
/// The lambda receives the current value and may update it in place.  It
/// returns a `(commit, result)` pair: if `commit` is false the loop
/// terminates without writing and `result` is handed back to the caller;
/// if it is true, the updated value is compare-and-swapped against the word
/// that was read.  On contention the lambda runs again with a fresh value.
///
/// The lambda must be a pure function of its argument and captured
/// immutable state: it can run any number of times before one of its
/// executions commits, and non-committing executions must leave no trace.
/// Unlike a raw union-cast CAS loop there is no way to smuggle a pointer
/// through the cell, so the contract is enforced by the type system rather
/// than by a safety comment.
pub fn atomic_try_update<T, F, R>(cell: &PackedCell<T>, func: F) -> R
where
    T: Packable,
    F: Fn(&mut T) -> (bool, R),
{
    let mut old = cell.inner.load();
    loop {
        let mut val = T::unpack(old);
        let (commit, res) = func(&mut val);
        if !commit {
            return res;
        }
        match cell.inner.compare_exchange(old, val.pack()) {
            Ok(_) => return res,
            Err(cur) => old = cur,
        }
    }
}
