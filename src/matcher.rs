//! Lazy, backtracking pattern matcher.
//!
//! A matcher call produces a [`Matches`] sequence; each `next()` does only
//! the work needed for one result, holding the space's read lock for one
//! candidate at a time and releasing it between yields.  Mutating the space
//! between `next()` calls is legal: candidates invalidated by the mutation
//! simply fail their generation check and are skipped.
//!
//! Results come out in deterministic order — candidate roots ascending by
//! id, and within a root, choices in declaration order (alternatives of an
//! `Or` left to right, glob spans shortest first).

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::trace;

use crate::index::IndexManager;
use crate::pattern::{BindingSet, Pattern, Term};
use crate::space::AtomSpace;
use crate::table::AtomTable;
use crate::types::{AtomId, TypeTag};

#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Upper bound on emitted results.  `None` is unbounded.
    pub max_results: Option<usize>,
    /// Log every candidate considered, at trace level.
    pub trace: bool,
    /// Sort candidate roots by id before matching.  On by default; turning
    /// it off yields roots in insertion order instead.
    pub deterministic_order: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_results: None,
            trace: false,
            deterministic_order: true,
        }
    }
}

/// One match: the atom the pattern's root matched, and the variable
/// bindings that made the match work.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched_atom: AtomId,
    pub bindings: BindingSet,
}

pub struct PatternMatcher<'a> {
    space: &'a AtomSpace,
    config: MatcherConfig,
}

impl<'a> PatternMatcher<'a> {
    pub fn new(space: &'a AtomSpace) -> Self {
        Self::with_config(space, MatcherConfig::default())
    }

    pub fn with_config(space: &'a AtomSpace, config: MatcherConfig) -> Self {
        Self { space, config }
    }

    /// Lazy sequence of matches.
    pub fn matches(&self, pattern: &Pattern) -> Matches<'a> {
        self.matches_seeded(pattern, BindingSet::new())
    }

    /// Lazy sequence of matches with some variables pre-bound.  Used by
    /// the rule engine to join premises on shared variables.
    pub fn matches_seeded(&self, pattern: &Pattern, seed: BindingSet) -> Matches<'a> {
        let mut candidates = self
            .space
            .with_read(|table, indices| root_candidates(table, indices, &pattern.body));
        if self.config.deterministic_order {
            candidates.sort_unstable();
            candidates.dedup();
        }
        Matches {
            space: self.space,
            pattern: pattern.clone(),
            seed,
            candidates,
            pos: 0,
            pending: VecDeque::new(),
            emitted: 0,
            max_results: self.config.max_results,
            trace: self.config.trace,
            cancel: None,
            cancelled: false,
        }
    }

    pub fn find_first(&self, pattern: &Pattern) -> Option<MatchResult> {
        self.matches(pattern).next()
    }

    pub fn find_all(&self, pattern: &Pattern) -> Vec<MatchResult> {
        self.matches(pattern).collect()
    }

    pub fn find_all_seeded(&self, pattern: &Pattern, seed: BindingSet) -> Vec<MatchResult> {
        self.matches_seeded(pattern, seed).collect()
    }

    pub fn any_match(&self, pattern: &Pattern) -> bool {
        self.find_first(pattern).is_some()
    }

    pub fn count_matches(&self, pattern: &Pattern) -> usize {
        self.matches(pattern).count()
    }

    /// Ids of all atoms of a type, in the matcher's candidate order.
    pub fn filter_by_type(&self, tag: impl Into<TypeTag>) -> Vec<AtomId> {
        let mut ids = self.space.get_atoms_by_type(tag);
        if self.config.deterministic_order {
            ids.sort_unstable();
        }
        ids
    }
}

/// Lazy match sequence.  Pulls one candidate root per `next()` call (plus
/// however many produced no match); results already found for the current
/// root are buffered and handed out one at a time.
pub struct Matches<'a> {
    space: &'a AtomSpace,
    pattern: Pattern,
    seed: BindingSet,
    candidates: Vec<AtomId>,
    pos: usize,
    pending: VecDeque<MatchResult>,
    emitted: usize,
    max_results: Option<usize>,
    trace: bool,
    cancel: Option<Arc<AtomicBool>>,
    cancelled: bool,
}

impl<'a> Matches<'a> {
    /// Installs a cancellation flag, checked between yielded results.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// True once iteration has ended because the cancellation flag fired.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    fn at_limit(&self) -> bool {
        self.max_results.is_some_and(|max| self.emitted >= max)
    }
}

impl Iterator for Matches<'_> {
    type Item = MatchResult;

    fn next(&mut self) -> Option<MatchResult> {
        if self.cancelled || self.at_limit() {
            return None;
        }
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                self.cancelled = true;
                return None;
            }
        }
        if let Some(result) = self.pending.pop_front() {
            self.emitted += 1;
            return Some(result);
        }
        while self.pos < self.candidates.len() {
            let root = self.candidates[self.pos];
            self.pos += 1;
            let results = self.space.with_read(|table, _| {
                if !table.contains(root) {
                    // Removed since the candidate set was computed.
                    return Vec::new();
                }
                if self.trace {
                    trace!("matcher: trying candidate {:?}", root);
                }
                match_term(table, &self.pattern.body, root, &self.seed)
            });
            if results.is_empty() {
                continue;
            }
            for mut bindings in results {
                bindings.restrict_to(&self.pattern.variables);
                self.pending.push_back(MatchResult {
                    matched_atom: root,
                    bindings,
                });
            }
            self.emitted += 1;
            return self.pending.pop_front();
        }
        None
    }
}

/// Candidate roots for a term, before structural matching.
fn root_candidates(table: &AtomTable, indices: &IndexManager, term: &Term) -> Vec<AtomId> {
    match term {
        Term::Grounded(id) => {
            if table.contains(*id) {
                vec![*id]
            } else {
                Vec::new()
            }
        }
        Term::Typed(tag)
        | Term::Link {
            link_type: tag, ..
        } => indices.atoms_of_type(*tag).to_vec(),
        Term::Variable {
            type_constraint: Some(tag),
            ..
        } => indices.atoms_of_type(*tag).to_vec(),
        Term::Variable {
            type_constraint: None,
            ..
        }
        | Term::Not(_)
        | Term::Glob { .. } => table.iter_ids().collect(),
        Term::And(terms) => {
            let mut terms = terms.iter();
            let Some(first) = terms.next() else {
                return Vec::new();
            };
            let mut result = root_candidates(table, indices, first);
            for term in terms {
                let keep: HashSet<AtomId> =
                    root_candidates(table, indices, term).into_iter().collect();
                result.retain(|id| keep.contains(id));
            }
            result
        }
        Term::Or(terms) => {
            let mut seen = HashSet::new();
            let mut result = Vec::new();
            for term in terms {
                for id in root_candidates(table, indices, term) {
                    if seen.insert(id) {
                        result.push(id);
                    }
                }
            }
            result
        }
    }
}

/// Every way `term` can match `atom` starting from `bindings`.
fn match_term(table: &AtomTable, term: &Term, atom: AtomId, bindings: &BindingSet) -> Vec<BindingSet> {
    match term {
        Term::Variable {
            name,
            type_constraint,
        } => {
            if let Some(tag) = type_constraint {
                if table.atom_type(atom) != Some(*tag) {
                    return Vec::new();
                }
            }
            bind_one(name, atom, bindings)
        }
        Term::Grounded(id) => {
            if *id == atom {
                vec![bindings.clone()]
            } else {
                Vec::new()
            }
        }
        Term::Typed(tag) => {
            if table.atom_type(atom) == Some(*tag) {
                vec![bindings.clone()]
            } else {
                Vec::new()
            }
        }
        Term::Link {
            link_type,
            outgoing,
        } => {
            if table.atom_type(atom) != Some(*link_type) || !table.is_link(atom) {
                return Vec::new();
            }
            match_seq(table, outgoing, table.outgoing(atom), bindings)
        }
        Term::And(terms) => {
            let mut states = vec![bindings.clone()];
            for term in terms {
                let mut next = Vec::new();
                for state in &states {
                    next.extend(match_term(table, term, atom, state));
                }
                if next.is_empty() {
                    return Vec::new();
                }
                states = next;
            }
            states
        }
        Term::Or(terms) => {
            let mut out = Vec::new();
            for term in terms {
                out.extend(match_term(table, term, atom, bindings));
            }
            out
        }
        Term::Not(inner) => {
            if match_term(table, inner, atom, bindings).is_empty() {
                vec![bindings.clone()]
            } else {
                Vec::new()
            }
        }
        // A glob outside a link sequence degenerates to a variable.
        Term::Glob { name, .. } => bind_one(name, atom, bindings),
    }
}

fn bind_one(name: &str, atom: AtomId, bindings: &BindingSet) -> Vec<BindingSet> {
    let mut next = bindings.clone();
    if next.bind(name, atom) {
        vec![next]
    } else {
        Vec::new()
    }
}

/// Positional match of a term sequence against an outgoing sequence, with
/// glob expansion.  Globs try the shortest admissible span first.
fn match_seq(
    table: &AtomTable,
    terms: &[Term],
    atoms: &[AtomId],
    bindings: &BindingSet,
) -> Vec<BindingSet> {
    let Some((first, rest)) = terms.split_first() else {
        return if atoms.is_empty() {
            vec![bindings.clone()]
        } else {
            Vec::new()
        };
    };
    if let Term::Glob {
        name,
        min_count,
        max_count,
    } = first
    {
        let lo = (*min_count).max(1);
        let mut out = Vec::new();
        for span in lo..=*max_count {
            if span > atoms.len() {
                break;
            }
            let mut state = bindings.clone();
            if !state.bind(name, atoms[0]) {
                break;
            }
            out.extend(match_seq(table, rest, &atoms[span..], &state));
        }
        return out;
    }
    let Some((&head, tail)) = atoms.split_first() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for state in match_term(table, first, head, bindings) {
        out.extend(match_seq(table, rest, tail, &state));
    }
    out
}

/// Fluent query interface over a space.
///
/// ```
/// use atomspace::{AtomSpace, AtomType, Query};
/// use atomspace::pattern::{ground, var};
///
/// let space = AtomSpace::new();
/// let cat = space.add_node(AtomType::ConceptNode, "Cat");
/// let animal = space.add_node(AtomType::ConceptNode, "Animal");
/// space.add_link(AtomType::InheritanceLink, &[cat, animal]).unwrap();
///
/// let found = Query::new(&space)
///     .variable("X")
///     .match_link(AtomType::InheritanceLink, vec![var("X"), ground(animal.id())])
///     .exists();
/// assert!(found);
/// ```
pub struct Query<'a> {
    space: &'a AtomSpace,
    declared: Vec<(String, Option<TypeTag>)>,
    body: Option<Term>,
    predicate: Option<Box<dyn Fn(&MatchResult) -> bool + 'a>>,
    limit: Option<usize>,
}

impl<'a> Query<'a> {
    pub fn new(space: &'a AtomSpace) -> Self {
        Self {
            space,
            declared: Vec::new(),
            body: None,
            predicate: None,
            limit: None,
        }
    }

    /// Declares a reported variable.
    pub fn variable(mut self, name: &str) -> Self {
        self.declared.push((name.to_string(), None));
        self
    }

    /// Declares a reported variable with a type constraint.  The
    /// constraint is applied to unconstrained occurrences of the variable
    /// in the body.
    pub fn variable_typed(mut self, name: &str, tag: impl Into<TypeTag>) -> Self {
        self.declared.push((name.to_string(), Some(tag.into())));
        self
    }

    /// Match links of a type against positional sub-terms.
    pub fn match_link(mut self, tag: impl Into<TypeTag>, outgoing: Vec<Term>) -> Self {
        self.body = Some(Term::Link {
            link_type: tag.into(),
            outgoing,
        });
        self
    }

    /// Match any atom of a type.
    pub fn match_type(mut self, tag: impl Into<TypeTag>) -> Self {
        self.body = Some(Term::Typed(tag.into()));
        self
    }

    /// Keep only results the predicate accepts.
    pub fn filter(mut self, pred: impl Fn(&MatchResult) -> bool + 'a) -> Self {
        self.predicate = Some(Box::new(pred));
        self
    }

    /// Upper bound on emitted results.  Never a precondition: fewer
    /// matches than the limit is fine.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    fn build(&self) -> Pattern {
        let mut body = self.body.clone().unwrap_or_default();
        for (name, tag) in &self.declared {
            if let Some(tag) = tag {
                constrain(&mut body, name, *tag);
            }
        }
        Pattern {
            variables: self.declared.iter().map(|(n, _)| n.clone()).collect(),
            body,
        }
    }

    fn results(self) -> impl Iterator<Item = MatchResult> + 'a {
        let pattern = self.build();
        let matcher = PatternMatcher::new(self.space);
        let predicate = self.predicate;
        let limit = self.limit.unwrap_or(usize::MAX);
        matcher
            .matches(&pattern)
            .filter(move |r| predicate.as_ref().map_or(true, |p| p(r)))
            .take(limit)
    }

    pub fn collect(self) -> Vec<MatchResult> {
        self.results().collect()
    }

    pub fn first(self) -> Option<MatchResult> {
        self.results().next()
    }

    pub fn exists(self) -> bool {
        self.first().is_some()
    }

    pub fn count(self) -> usize {
        self.results().count()
    }
}

/// Applies a type constraint to unconstrained occurrences of a variable.
fn constrain(term: &mut Term, name: &str, tag: TypeTag) {
    match term {
        Term::Variable {
            name: n,
            type_constraint,
        } if n.as_str() == name && type_constraint.is_none() => {
            *type_constraint = Some(tag);
        }
        Term::Link { outgoing, .. } => {
            for sub in outgoing {
                constrain(sub, name, tag);
            }
        }
        Term::And(terms) | Term::Or(terms) => {
            for sub in terms {
                constrain(sub, name, tag);
            }
        }
        Term::Not(inner) => constrain(inner, name, tag),
        _ => {}
    }
}
