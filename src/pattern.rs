//! The pattern language: term trees matched against the hypergraph, and
//! the binding sets a match produces.
//!
//! Terms form a closed family of tagged variants; the matcher dispatches on
//! the tag.  Free builder functions (`var`, `ground`, `typed`, `link`, …)
//! keep pattern construction terse.

use std::collections::hash_map::{self, HashMap};

use crate::types::{AtomId, TypeTag};

/// One node of a pattern tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// Matches any atom (optionally constrained by type) and binds it to a
    /// name.  Binding the same name twice to different atoms fails that
    /// branch of the match.
    Variable {
        name: String,
        type_constraint: Option<TypeTag>,
    },
    /// Matches exactly one atom.
    Grounded(AtomId),
    /// Matches any atom of the given type.
    Typed(TypeTag),
    /// Matches a link of the given type whose outgoing atoms match the
    /// sub-terms positionally.
    Link {
        link_type: TypeTag,
        outgoing: Vec<Term>,
    },
    /// Matches iff every sub-term matches the same atom.
    And(Vec<Term>),
    /// Matches iff at least one sub-term matches; alternatives are tried
    /// in declaration order.
    Or(Vec<Term>),
    /// Matches iff the sub-term does not match.  No bindings escape the
    /// sub-match.
    Not(Box<Term>),
    /// Inside a link's outgoing sequence, consumes between `min_count` and
    /// `max_count` contiguous positions.  The name binds to the first atom
    /// of the span.
    Glob {
        name: String,
        min_count: usize,
        max_count: usize,
    },
}

pub fn var(name: &str) -> Term {
    Term::Variable {
        name: name.to_string(),
        type_constraint: None,
    }
}

pub fn vart(name: &str, tag: impl Into<TypeTag>) -> Term {
    Term::Variable {
        name: name.to_string(),
        type_constraint: Some(tag.into()),
    }
}

pub fn ground(id: AtomId) -> Term {
    Term::Grounded(id)
}

pub fn typed(tag: impl Into<TypeTag>) -> Term {
    Term::Typed(tag.into())
}

pub fn link(tag: impl Into<TypeTag>, outgoing: Vec<Term>) -> Term {
    Term::Link {
        link_type: tag.into(),
        outgoing,
    }
}

pub fn and_terms(terms: Vec<Term>) -> Term {
    Term::And(terms)
}

pub fn or_terms(terms: Vec<Term>) -> Term {
    Term::Or(terms)
}

pub fn not_term(term: Term) -> Term {
    Term::Not(Box::new(term))
}

pub fn glob(name: &str, min_count: usize, max_count: usize) -> Term {
    debug_assert!(min_count >= 1 && min_count <= max_count);
    Term::Glob {
        name: name.to_string(),
        min_count,
        max_count,
    }
}

impl Default for Term {
    /// The vacuous conjunction, which matches nothing.
    fn default() -> Self {
        Term::And(Vec::new())
    }
}

/// A term plus the set of variable names whose bindings are reported.
/// An empty declaration reports every binding the match produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pattern {
    pub variables: Vec<String>,
    pub body: Term,
}

impl Pattern {
    pub fn new(body: Term) -> Self {
        Self {
            variables: Vec::new(),
            body,
        }
    }

    pub fn with_variables(variables: Vec<String>, body: Term) -> Self {
        Self { variables, body }
    }
}

/// Variable name → atom bindings accumulated during a match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingSet {
    map: HashMap<String, AtomId>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a name.  Returns false (and changes nothing) when the name is
    /// already bound to a different atom.
    pub fn bind(&mut self, name: &str, id: AtomId) -> bool {
        match self.map.get(name) {
            Some(&existing) => existing == id,
            None => {
                self.map.insert(name.to_string(), id);
                true
            }
        }
    }

    /// The atom bound to a name, or the invalid id when unbound.
    pub fn get(&self, name: &str) -> AtomId {
        self.map.get(name).copied().unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, AtomId> {
        self.map.iter()
    }

    /// Drops every binding whose name is not in `declared`.  No-op when
    /// `declared` is empty.
    pub fn restrict_to(&mut self, declared: &[String]) {
        if !declared.is_empty() {
            self.map.retain(|name, _| declared.contains(name));
        }
    }
}
