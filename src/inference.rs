//! Rule-driven inference over the hypergraph.
//!
//! A [`Rule`] pairs premise patterns with a conclusion template and a
//! truth-value formula.  Forward chaining matches premises against the
//! space, instantiates conclusions, and revises truth values until nothing
//! changes by more than epsilon or the budget runs out.  Backward chaining
//! decomposes a goal into sub-goals through rules whose conclusions could
//! produce it.
//!
//! Each (rule, premise-binding) pair contributes its evidence to a
//! conclusion exactly once per chaining run; without that, re-deriving the
//! same conclusion every iteration would inflate its confidence without
//! bound and the fixed point would never be reached.

use std::collections::HashSet;
use std::error::Error;
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::matcher::{MatchResult, PatternMatcher};
use crate::pattern::{link, var, BindingSet, Pattern, Term};
use crate::pln;
use crate::space::AtomSpace;
use crate::types::{AtomId, AtomType, TruthValue, TypeTag};

/// Read access to truth values for conclusion formulas.
pub trait TvLookup {
    fn tv(&self, id: AtomId) -> TruthValue;
    fn link_tv(&self, tag: TypeTag, outgoing: &[AtomId]) -> Option<TruthValue>;
}

impl TvLookup for AtomSpace {
    fn tv(&self, id: AtomId) -> TruthValue {
        self.get_tv(id)
    }

    fn link_tv(&self, tag: TypeTag, outgoing: &[AtomId]) -> Option<TruthValue> {
        self.get_link(tag, outgoing).map(|h| h.tv())
    }
}

/// One argument slot of a conclusion template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArg {
    /// Filled from the premise bindings.
    Var(String),
    /// A fixed atom.
    Fixed(AtomId),
}

/// What a rule concludes: an atom to add (or revise) once the template's
/// variables are filled in from the premise bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum Conclusion {
    Node {
        node_type: TypeTag,
        name: String,
    },
    Link {
        link_type: TypeTag,
        outgoing: Vec<TemplateArg>,
    },
}

type ConcludeFn =
    Box<dyn Fn(&BindingSet, &dyn TvLookup) -> Option<(Conclusion, TruthValue)> + Send + Sync>;

/// An inference rule: premise patterns joined on shared variables, plus a
/// formula producing the conclusion and its truth value.  Returning `None`
/// from the formula vetoes the firing (degenerate bindings, vanishing
/// confidence).
pub struct Rule {
    pub name: String,
    pub premises: Vec<Pattern>,
    /// Type of the atoms this rule concludes, used to prune rules during
    /// backward chaining.  `None` disables pruning for this rule.
    pub conclusion_type: Option<TypeTag>,
    conclude: ConcludeFn,
}

impl Rule {
    pub fn new(
        name: &str,
        premises: Vec<Pattern>,
        conclusion_type: Option<TypeTag>,
        conclude: impl Fn(&BindingSet, &dyn TvLookup) -> Option<(Conclusion, TruthValue)>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            premises,
            conclusion_type,
            conclude: Box::new(conclude),
        }
    }

    pub fn conclude(
        &self,
        bindings: &BindingSet,
        tvs: &dyn TvLookup,
    ) -> Option<(Conclusion, TruthValue)> {
        (self.conclude)(bindings, tvs)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("premises", &self.premises.len())
            .finish()
    }
}

#[derive(Clone)]
pub struct InferenceConfig {
    /// Forward: maximum chaining iterations.  Backward: maximum recursion
    /// depth.
    pub max_iterations: usize,
    /// A truth value that moves by no more than this is considered
    /// unchanged when testing for the fixed point.
    pub epsilon: f32,
    /// Wall-clock cap for the whole run.
    pub deadline: Option<Duration>,
    /// Cooperative cancellation, checked between iterations.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            epsilon: 1e-4,
            deadline: None,
            cancel: None,
        }
    }
}

impl InferenceConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceStats {
    pub iterations: usize,
    pub atoms_added: usize,
    pub tvs_revised: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum InferenceError {
    /// The iteration, depth, or wall-clock budget ran out.  Carries the
    /// partial result.
    BudgetExceeded(InferenceStats),
    /// The cancellation flag fired.
    Cancelled,
}

impl Error for InferenceError {}

impl Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One rule application in a backward-chaining proof.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofStep {
    pub rule: String,
    pub conclusion: AtomId,
}

/// A successful backward-chaining run: the rule applications performed and
/// the match that finally satisfied the goal.
#[derive(Debug, Clone, PartialEq)]
pub struct Proof {
    pub steps: Vec<ProofStep>,
    pub result: MatchResult,
}

/// Fingerprint of one rule firing, so each body of evidence is counted
/// once per run.
type Firing = (usize, AtomId, Vec<(String, AtomId)>);

struct Run<'a> {
    space: &'a AtomSpace,
    config: &'a InferenceConfig,
    started: Instant,
    seen: HashSet<Firing>,
    stats: InferenceStats,
}

impl<'a> Run<'a> {
    fn new(space: &'a AtomSpace, config: &'a InferenceConfig) -> Self {
        Self {
            space,
            config,
            started: Instant::now(),
            seen: HashSet::new(),
            stats: InferenceStats::default(),
        }
    }

    fn check_budget(&self) -> Result<(), InferenceError> {
        if let Some(flag) = &self.config.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(InferenceError::Cancelled);
            }
        }
        if let Some(deadline) = self.config.deadline {
            if self.started.elapsed() >= deadline {
                return Err(InferenceError::BudgetExceeded(self.stats));
            }
        }
        Ok(())
    }

    /// Cross-joins a rule's premises through seeded matching.
    fn join_premises(&self, premises: &[Pattern]) -> Vec<BindingSet> {
        let matcher = PatternMatcher::new(self.space);
        let mut states = vec![BindingSet::new()];
        for premise in premises {
            let mut next = Vec::new();
            for state in &states {
                for m in matcher.find_all_seeded(premise, state.clone()) {
                    next.push(m.bindings);
                }
            }
            states = next;
            if states.is_empty() {
                break;
            }
        }
        states
    }

    /// Fires a rule over every premise match.  Returns true when the space
    /// changed (a new atom, or a truth value moving more than epsilon).
    fn apply_rule(&mut self, rule_idx: usize, rule: &Rule) -> Result<bool, InferenceError> {
        let mut changed = false;
        for bindings in self.join_premises(&rule.premises) {
            self.check_budget()?;
            let Some((conclusion, tv)) = rule.conclude(&bindings, self.space) else {
                continue;
            };
            let Some((id, created)) = self.instantiate(&conclusion, &bindings, tv) else {
                continue;
            };
            let mut fingerprint: Vec<(String, AtomId)> = bindings
                .iter()
                .map(|(name, &atom)| (name.clone(), atom))
                .collect();
            fingerprint.sort();
            if !self.seen.insert((rule_idx, id, fingerprint)) {
                continue;
            }
            if created {
                trace!("{}: added {:?}", rule.name, id);
                self.stats.atoms_added += 1;
                changed = true;
            } else {
                let old = self.space.get_tv(id);
                let new = if old.confidence > 0.0 {
                    pln::revision(old, tv)
                } else {
                    tv
                };
                let moved = (new.strength - old.strength)
                    .abs()
                    .max((new.confidence - old.confidence).abs());
                if moved > self.config.epsilon {
                    self.space.set_tv(id, new);
                    self.stats.tvs_revised += 1;
                    changed = true;
                }
            }
        }
        Ok(changed)
    }

    /// Materializes a conclusion template.  Returns the atom and whether
    /// it was freshly created; `None` when a binding went stale.
    fn instantiate(
        &self,
        conclusion: &Conclusion,
        bindings: &BindingSet,
        tv: TruthValue,
    ) -> Option<(AtomId, bool)> {
        match conclusion {
            Conclusion::Node { node_type, name } => {
                if let Some(existing) = self.space.get_node(*node_type, name) {
                    return Some((existing.id(), false));
                }
                let h = self.space.add_node_with_tv(*node_type, name, tv);
                Some((h.id(), true))
            }
            Conclusion::Link {
                link_type,
                outgoing,
            } => {
                let mut ids = Vec::with_capacity(outgoing.len());
                for arg in outgoing {
                    let id = match arg {
                        TemplateArg::Var(name) => bindings.get(name),
                        TemplateArg::Fixed(id) => *id,
                    };
                    if !id.valid() {
                        return None;
                    }
                    ids.push(id);
                }
                if let Some(existing) = self.space.get_link(*link_type, &ids) {
                    return Some((existing.id(), false));
                }
                match self.space.add_link_with_tv(*link_type, &ids, tv) {
                    Ok(h) => Some((h.id(), true)),
                    Err(_) => None,
                }
            }
        }
    }
}

/// Data-driven inference: fires every rule against every premise match,
/// iterating until a fixed point or the budget runs out.
pub fn forward_chain(
    space: &AtomSpace,
    rules: &[Rule],
    config: &InferenceConfig,
) -> Result<InferenceStats, InferenceError> {
    let mut run = Run::new(space, config);
    loop {
        run.check_budget()?;
        if run.stats.iterations >= config.max_iterations {
            return Err(InferenceError::BudgetExceeded(run.stats));
        }
        run.stats.iterations += 1;
        let mut changed = false;
        for (idx, rule) in rules.iter().enumerate() {
            changed |= run.apply_rule(idx, rule)?;
        }
        if !changed {
            break;
        }
    }
    debug!(
        "forward chaining reached fixed point: {} iterations, {} atoms added, {} revisions",
        run.stats.iterations, run.stats.atoms_added, run.stats.tvs_revised
    );
    Ok(run.stats)
}

/// Goal-driven inference: satisfies the goal directly when possible, and
/// otherwise recursively establishes the premises of rules that could
/// conclude it, applying them until the goal matches.
pub fn backward_chain(
    space: &AtomSpace,
    goal: &Pattern,
    rules: &[Rule],
    config: &InferenceConfig,
) -> Result<Option<Proof>, InferenceError> {
    let mut run = Run::new(space, config);
    let mut steps = Vec::new();
    let result = prove(&mut run, goal, rules, 0, &mut steps)?;
    Ok(result.map(|result| Proof { steps, result }))
}

fn prove(
    run: &mut Run<'_>,
    goal: &Pattern,
    rules: &[Rule],
    depth: usize,
    steps: &mut Vec<ProofStep>,
) -> Result<Option<MatchResult>, InferenceError> {
    run.check_budget()?;
    if let Some(m) = PatternMatcher::new(run.space).find_first(goal) {
        return Ok(Some(m));
    }
    if depth >= run.config.max_iterations {
        return Ok(None);
    }
    let goal_type = root_type(&goal.body);
    for (idx, rule) in rules.iter().enumerate() {
        if let (Some(goal_tag), Some(rule_tag)) = (goal_type, rule.conclusion_type) {
            if goal_tag != rule_tag {
                continue;
            }
        }
        // Establish each premise, recursing where the space cannot satisfy
        // it directly.
        let mut satisfiable = true;
        for premise in &rule.premises {
            if PatternMatcher::new(run.space).any_match(premise) {
                continue;
            }
            if prove(run, premise, rules, depth + 1, steps)?.is_none() {
                satisfiable = false;
                break;
            }
        }
        if !satisfiable {
            continue;
        }
        let before = run.stats;
        run.apply_rule(idx, rule)?;
        if run.stats != before {
            trace!("backward chaining applied {}", rule.name);
        }
        if let Some(m) = PatternMatcher::new(run.space).find_first(goal) {
            steps.push(ProofStep {
                rule: rule.name.clone(),
                conclusion: m.matched_atom,
            });
            return Ok(Some(m));
        }
    }
    Ok(None)
}

fn root_type(term: &Term) -> Option<TypeTag> {
    match term {
        Term::Typed(tag) => Some(*tag),
        Term::Link { link_type, .. } => Some(*link_type),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Built-in rules
// ----------------------------------------------------------------------

/// Inheritance transitivity: from `A → B` and `B → C`, conclude `A → C`
/// with the deduction formula.
pub fn deduction_rule() -> Rule {
    let inh: TypeTag = AtomType::InheritanceLink.into();
    Rule::new(
        "deduction",
        vec![
            Pattern::new(link(inh, vec![var("A"), var("B")])),
            Pattern::new(link(inh, vec![var("B"), var("C")])),
        ],
        Some(inh),
        move |bindings, tvs| {
            let a = bindings.get("A");
            let b = bindings.get("B");
            let c = bindings.get("C");
            if !a.valid() || !b.valid() || !c.valid() || a == b || b == c || a == c {
                return None;
            }
            let ab = tvs.link_tv(inh, &[a, b])?;
            let bc = tvs.link_tv(inh, &[b, c])?;
            let tv = pln::deduction(ab, bc, tvs.tv(b), tvs.tv(c));
            if tv.confidence <= 0.0 {
                return None;
            }
            Some((
                Conclusion::Link {
                    link_type: inh,
                    outgoing: vec![TemplateArg::Fixed(a), TemplateArg::Fixed(c)],
                },
                tv,
            ))
        },
    )
}

/// Similarity is symmetric: from `Similarity(A, B)`, conclude
/// `Similarity(B, A)` with the same truth value.
pub fn similarity_symmetry_rule() -> Rule {
    let sim: TypeTag = AtomType::SimilarityLink.into();
    Rule::new(
        "similarity-symmetry",
        vec![Pattern::new(link(sim, vec![var("A"), var("B")]))],
        Some(sim),
        move |bindings, tvs| {
            let a = bindings.get("A");
            let b = bindings.get("B");
            if !a.valid() || !b.valid() || a == b {
                return None;
            }
            let tv = tvs.link_tv(sim, &[a, b])?;
            Some((
                Conclusion::Link {
                    link_type: sim,
                    outgoing: vec![TemplateArg::Fixed(b), TemplateArg::Fixed(a)],
                },
                tv,
            ))
        },
    )
}
