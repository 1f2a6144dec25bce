//! Core value types: atom identifiers, truth values, attention values, the
//! atom-type enumeration, and the compact per-slot header.
//!
//! Everything here is small, `Copy`, and laid out deliberately: ids, truth
//! values, and attention values each fit a single 64-bit word so they can be
//! read and updated lock-free, and the header is exactly sixteen bytes so a
//! table slot's hot metadata stays within a quarter cache line.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use static_assertions::assert_eq_size;

use crate::Packable;

/// Stable identifier for an atom: a 48-bit slot index packed above a 16-bit
/// generation counter.
///
/// The generation is bumped every time a slot is vacated, so an id held
/// across a removal stops resolving instead of aliasing whatever reuses the
/// slot.  The all-zero id is the invalid default; no live atom ever has
/// generation 0.  Ordering and equality are over the full word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomId {
    value: u64,
}

const GENERATION_BITS: u32 = 16;
const GENERATION_MASK: u64 = (1 << GENERATION_BITS) - 1;
const MAX_INDEX: u64 = (1 << 48) - 1;

impl AtomId {
    /// Packs a slot index and generation into an id.  `generation` must be
    /// nonzero for the id to be considered valid.
    pub fn pack(index: u64, generation: u16) -> Self {
        debug_assert!(index <= MAX_INDEX);
        Self {
            value: (index << GENERATION_BITS) | u64::from(generation),
        }
    }

    pub fn index(self) -> u64 {
        self.value >> GENERATION_BITS
    }

    pub fn generation(self) -> u16 {
        (self.value & GENERATION_MASK) as u16
    }

    /// True if this id could name a live atom.  Resolution still has to
    /// check the generation against the owning table.
    pub fn valid(self) -> bool {
        self.generation() != 0
    }

    pub fn raw(self) -> u64 {
        self.value
    }
}

/// Probability-of-truth and certainty, both in `[0, 1]`.
///
/// Confidence maps bijectively onto an evidence *count* through the
/// lookahead constant `K`: `count = K * c / (1 - c)`.  Revision adds counts,
/// so the mapping is what lets two truth values combine as evidence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TruthValue {
    pub strength: f32,
    pub confidence: f32,
}

/// Evidence-count lookahead.  See `DESIGN.md` for the choice of constant.
pub const CONFIDENCE_K: f32 = 800.0;

const DEFAULT_TRUTH_THRESHOLD: f32 = 0.5;

impl TruthValue {
    pub fn new(strength: f32, confidence: f32) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A strength with the conventional 0.9 confidence.
    pub fn simple(strength: f32) -> Self {
        Self::new(strength, 0.9)
    }

    /// The number of observations this truth value is worth.
    pub fn count(self) -> f32 {
        if self.confidence >= 1.0 {
            f32::MAX
        } else {
            CONFIDENCE_K * self.confidence / (1.0 - self.confidence)
        }
    }

    /// Reconstructs a truth value from a strength and an evidence count.
    /// Inverse of [`TruthValue::count`] to within 0.01.
    pub fn from_count(strength: f32, count: f32) -> Self {
        let count = count.max(0.0);
        Self::new(strength, count / (count + CONFIDENCE_K))
    }

    pub fn is_true(self) -> bool {
        self.is_true_with(DEFAULT_TRUTH_THRESHOLD)
    }

    pub fn is_true_with(self, threshold: f32) -> bool {
        self.strength > threshold
    }
}

impl Packable for TruthValue {
    fn pack(self) -> u64 {
        (u64::from(self.strength.to_bits()) << 32) | u64::from(self.confidence.to_bits())
    }
    fn unpack(bits: u64) -> Self {
        Self {
            strength: f32::from_bits((bits >> 32) as u32),
            confidence: f32::from_bits(bits as u32),
        }
    }
}

/// Short-term importance (a signed float), long-term importance (a signed
/// 16-bit integer), and the very-long-term flag.  `vlti != 0` makes an atom
/// immune to forgetting regardless of its STI.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttentionValue {
    pub sti: f32,
    pub lti: i16,
    pub vlti: u8,
}

impl AttentionValue {
    pub fn new(sti: f32, lti: i16, vlti: u8) -> Self {
        Self { sti, lti, vlti }
    }

    /// An attention value that marks its atom as a forgetting candidate.
    pub fn disposable() -> Self {
        Self::new(-1.0, 0, 0)
    }

    pub fn is_disposable(self) -> bool {
        self.sti <= 0.0 && self.vlti == 0
    }

    pub fn in_focus(self, af_boundary: f32) -> bool {
        self.sti >= af_boundary
    }
}

impl Packable for AttentionValue {
    // 63..32 sti, 31..16 lti, 15..8 vlti, 7..0 zero.  Explicit layout keeps
    // the packed word deterministic; struct padding never reaches the CAS.
    fn pack(self) -> u64 {
        (u64::from(self.sti.to_bits()) << 32)
            | (u64::from(self.lti as u16) << 16)
            | (u64::from(self.vlti) << 8)
    }
    fn unpack(bits: u64) -> Self {
        Self {
            sti: f32::from_bits((bits >> 32) as u32),
            lti: (bits >> 16) as u16 as i16,
            vlti: (bits >> 8) as u8,
        }
    }
}

/// The built-in atom types.  Discriminants are partitioned: node types live
/// in `[NODE_BASE, LINK_BASE)`, link types in `[LINK_BASE, USER_DEFINED)`.
/// Everything at or above [`USER_DEFINED`] belongs to per-space extension
/// registries (see [`crate::space::AtomSpace::register_type`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum AtomType {
    // Nodes
    Node = NODE_BASE,
    ConceptNode,
    PredicateNode,
    VariableNode,
    NumberNode,
    TypeNode,
    SchemaNode,
    AnchorNode,

    // Links
    Link = LINK_BASE,
    OrderedLink,
    UnorderedLink,
    ListLink,
    MemberLink,
    AndLink,
    OrLink,
    NotLink,
    InheritanceLink,
    SimilarityLink,
    SubsetLink,
    EvaluationLink,
    ExecutionLink,
    ImplicationLink,
    EquivalenceLink,
    ContextLink,
    StateLink,
    DefineLink,
    LambdaLink,
    BindLink,
    GetLink,
    PutLink,
    ForAllLink,
    ExistsLink,
}

pub const NODE_BASE: u16 = 1;
pub const LINK_BASE: u16 = 64;
/// First tag value available to per-space user-defined types.
pub const USER_DEFINED: u16 = 1024;

/// A type tag as stored in atom headers and indices: either a built-in
/// [`AtomType`] or a user-defined tag allocated at or above
/// [`USER_DEFINED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TypeTag(u16);

impl TypeTag {
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// The built-in type this tag names, if it is not user-defined.
    pub fn builtin(self) -> Option<AtomType> {
        AtomType::try_from(self.0).ok()
    }

    pub fn is_user_defined(self) -> bool {
        self.0 >= USER_DEFINED
    }
}

impl From<AtomType> for TypeTag {
    fn from(t: AtomType) -> Self {
        Self(t.into())
    }
}

impl PartialEq<AtomType> for TypeTag {
    fn eq(&self, other: &AtomType) -> bool {
        self.0 == u16::from(*other)
    }
}

impl PartialEq<TypeTag> for AtomType {
    fn eq(&self, other: &TypeTag) -> bool {
        other == self
    }
}

/// Whether a type names a node or a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Node,
    Link,
}

/// True for built-in node types.  User-defined tags carry their kind in the
/// space's registry, not here.
pub fn is_node_type(tag: TypeTag) -> bool {
    (NODE_BASE..LINK_BASE).contains(&tag.raw())
}

/// True for built-in link types.
pub fn is_link_type(tag: TypeTag) -> bool {
    (LINK_BASE..USER_DEFINED).contains(&tag.raw())
}

/// Canonical name of a built-in type, or `"UserDefinedType"` at or above
/// the extension threshold.
pub fn type_name(tag: TypeTag) -> &'static str {
    let Some(builtin) = tag.builtin() else {
        return if tag.is_user_defined() {
            "UserDefinedType"
        } else {
            "UnknownType"
        };
    };
    match builtin {
        AtomType::Node => "Node",
        AtomType::ConceptNode => "ConceptNode",
        AtomType::PredicateNode => "PredicateNode",
        AtomType::VariableNode => "VariableNode",
        AtomType::NumberNode => "NumberNode",
        AtomType::TypeNode => "TypeNode",
        AtomType::SchemaNode => "SchemaNode",
        AtomType::AnchorNode => "AnchorNode",
        AtomType::Link => "Link",
        AtomType::OrderedLink => "OrderedLink",
        AtomType::UnorderedLink => "UnorderedLink",
        AtomType::ListLink => "ListLink",
        AtomType::MemberLink => "MemberLink",
        AtomType::AndLink => "AndLink",
        AtomType::OrLink => "OrLink",
        AtomType::NotLink => "NotLink",
        AtomType::InheritanceLink => "InheritanceLink",
        AtomType::SimilarityLink => "SimilarityLink",
        AtomType::SubsetLink => "SubsetLink",
        AtomType::EvaluationLink => "EvaluationLink",
        AtomType::ExecutionLink => "ExecutionLink",
        AtomType::ImplicationLink => "ImplicationLink",
        AtomType::EquivalenceLink => "EquivalenceLink",
        AtomType::ContextLink => "ContextLink",
        AtomType::StateLink => "StateLink",
        AtomType::DefineLink => "DefineLink",
        AtomType::LambdaLink => "LambdaLink",
        AtomType::BindLink => "BindLink",
        AtomType::GetLink => "GetLink",
        AtomType::PutLink => "PutLink",
        AtomType::ForAllLink => "ForAllLink",
        AtomType::ExistsLink => "ExistsLink",
    }
}

/// Inverse of [`type_name`] for built-in types.
pub fn type_from_name(name: &str) -> Option<AtomType> {
    let t = match name {
        "Node" => AtomType::Node,
        "ConceptNode" => AtomType::ConceptNode,
        "PredicateNode" => AtomType::PredicateNode,
        "VariableNode" => AtomType::VariableNode,
        "NumberNode" => AtomType::NumberNode,
        "TypeNode" => AtomType::TypeNode,
        "SchemaNode" => AtomType::SchemaNode,
        "AnchorNode" => AtomType::AnchorNode,
        "Link" => AtomType::Link,
        "OrderedLink" => AtomType::OrderedLink,
        "UnorderedLink" => AtomType::UnorderedLink,
        "ListLink" => AtomType::ListLink,
        "MemberLink" => AtomType::MemberLink,
        "AndLink" => AtomType::AndLink,
        "OrLink" => AtomType::OrLink,
        "NotLink" => AtomType::NotLink,
        "InheritanceLink" => AtomType::InheritanceLink,
        "SimilarityLink" => AtomType::SimilarityLink,
        "SubsetLink" => AtomType::SubsetLink,
        "EvaluationLink" => AtomType::EvaluationLink,
        "ExecutionLink" => AtomType::ExecutionLink,
        "ImplicationLink" => AtomType::ImplicationLink,
        "EquivalenceLink" => AtomType::EquivalenceLink,
        "ContextLink" => AtomType::ContextLink,
        "StateLink" => AtomType::StateLink,
        "DefineLink" => AtomType::DefineLink,
        "LambdaLink" => AtomType::LambdaLink,
        "BindLink" => AtomType::BindLink,
        "GetLink" => AtomType::GetLink,
        "PutLink" => AtomType::PutLink,
        "ForAllLink" => AtomType::ForAllLink,
        "ExistsLink" => AtomType::ExistsLink,
        _ => return None,
    };
    Some(t)
}

/// Sixteen-byte per-slot header: type tag, arity, current generation, and a
/// flag word.  Arity is 0 for nodes.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct AtomHeader {
    atom_type: u16,
    arity: u16,
    generation: u16,
    _reserved: u16,
    flags: u64,
}

impl AtomHeader {
    /// Transient mark used by traversals (recursive removal) to guarantee
    /// each atom is visited once.  Always cleared before the traversal
    /// returns.
    pub const FLAG_CHECKED: u64 = 1;
    /// Set at creation for links.  Arity alone cannot discriminate, since
    /// a link may have an empty outgoing set.
    pub const FLAG_LINK: u64 = 2;

    pub fn new(tag: TypeTag, arity: u16, generation: u16) -> Self {
        Self {
            atom_type: tag.raw(),
            arity,
            generation,
            _reserved: 0,
            flags: 0,
        }
    }

    pub fn atom_type(&self) -> TypeTag {
        TypeTag::from_raw(self.atom_type)
    }

    pub fn arity(&self) -> u16 {
        self.arity
    }

    pub fn generation(&self) -> u16 {
        self.generation
    }

    pub fn set_generation(&mut self, generation: u16) {
        self.generation = generation;
    }

    pub fn has_flag(&self, flag: u64) -> bool {
        self.flags & flag != 0
    }

    pub fn set_flag(&mut self, flag: u64) {
        self.flags |= flag;
    }

    pub fn clear_flag(&mut self, flag: u64) {
        self.flags &= !flag;
    }
}

assert_eq_size!(AtomId, u64);
assert_eq_size!(TruthValue, u64);
assert_eq_size!(AttentionValue, u64);
assert_eq_size!(AtomHeader, [u64; 2]);
