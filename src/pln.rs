//! Probabilistic-logic truth-value formulas.
//!
//! Every formula exists in scalar form and in a slice form that processes
//! parallel input arrays.  The slice forms call the scalar kernels
//! element-wise — one implementation of the arithmetic — so the two paths
//! agree bit-for-bit on finite inputs.
//!
//! Wherever a denominator vanishes, the formulas return the default
//! `(0, 0)` truth value instead of dividing.

use crate::types::TruthValue;

/// Confidence penalty applied by the derivation formulas (deduction,
/// inversion, abduction, conjunction, disjunction).  Derived evidence is
/// worth less than observed evidence.
pub const CONFIDENCE_DISCOUNT: f32 = 0.9;

const EPSILON: f32 = 1e-6;

/// Combines two independent bodies of evidence about the same statement.
/// Counts add; strength is the count-weighted mean.  Commutative and
/// associative up to floating-point rounding.
pub fn revision(a: TruthValue, b: TruthValue) -> TruthValue {
    let na = a.count();
    let nb = b.count();
    let n = na + nb;
    if n <= EPSILON {
        return TruthValue::default();
    }
    let strength = (a.strength * na + b.strength * nb) / n;
    TruthValue::from_count(strength, n)
}

/// From `A → B` and `B → C`, derives `A → C`.  `b` and `c` are the truth
/// values of the intermediate and final terms themselves.
pub fn deduction(ab: TruthValue, bc: TruthValue, b: TruthValue, c: TruthValue) -> TruthValue {
    let denom = 1.0 - b.strength;
    if denom <= EPSILON {
        return TruthValue::default();
    }
    let strength = ab.strength * bc.strength
        + (1.0 - ab.strength) * (c.strength - b.strength * bc.strength) / denom;
    let confidence = ab
        .confidence
        .min(bc.confidence)
        .min(b.confidence)
        .min(c.confidence)
        * CONFIDENCE_DISCOUNT;
    TruthValue::new(strength.clamp(0.0, 1.0), confidence)
}

/// Bayes' rule: from `A → B` and the term probabilities, derives `B → A`.
pub fn inversion(ab: TruthValue, a: TruthValue, b: TruthValue) -> TruthValue {
    if b.strength <= EPSILON {
        return TruthValue::default();
    }
    let strength = ab.strength * a.strength / b.strength;
    let confidence = ab.confidence.min(a.confidence).min(b.confidence) * CONFIDENCE_DISCOUNT;
    TruthValue::new(strength.clamp(0.0, 1.0), confidence)
}

/// From `A → B` and `C → B`, derives `A → C` by running deduction through
/// the common consequent: invert the second premise, then deduce.
pub fn abduction(ab: TruthValue, cb: TruthValue, b: TruthValue, c: TruthValue) -> TruthValue {
    let bc = inversion(cb, c, b);
    deduction(ab, bc, b, c)
}

/// Conjunction under independence: strengths multiply.
pub fn conjunction(a: TruthValue, b: TruthValue) -> TruthValue {
    TruthValue::new(
        a.strength * b.strength,
        a.confidence.min(b.confidence) * CONFIDENCE_DISCOUNT,
    )
}

/// Disjunction by inclusion-exclusion.
pub fn disjunction(a: TruthValue, b: TruthValue) -> TruthValue {
    TruthValue::new(
        a.strength + b.strength - a.strength * b.strength,
        a.confidence.min(b.confidence) * CONFIDENCE_DISCOUNT,
    )
}

/// Negation: strength complements, confidence carries over.
pub fn negation(a: TruthValue) -> TruthValue {
    TruthValue::new(1.0 - a.strength, a.confidence)
}

// ----------------------------------------------------------------------
// Slice variants.  Inputs are parallel arrays of equal length; mismatched
// lengths are a caller bug.
// ----------------------------------------------------------------------

pub fn revision_slice(a: &[TruthValue], b: &[TruthValue], out: &mut [TruthValue]) {
    debug_assert!(a.len() == b.len() && a.len() == out.len());
    for i in 0..out.len() {
        out[i] = revision(a[i], b[i]);
    }
}

pub fn deduction_slice(
    ab: &[TruthValue],
    bc: &[TruthValue],
    b: &[TruthValue],
    c: &[TruthValue],
    out: &mut [TruthValue],
) {
    debug_assert!(
        ab.len() == bc.len() && ab.len() == b.len() && ab.len() == c.len() && ab.len() == out.len()
    );
    for i in 0..out.len() {
        out[i] = deduction(ab[i], bc[i], b[i], c[i]);
    }
}

pub fn inversion_slice(
    ab: &[TruthValue],
    a: &[TruthValue],
    b: &[TruthValue],
    out: &mut [TruthValue],
) {
    debug_assert!(ab.len() == a.len() && ab.len() == b.len() && ab.len() == out.len());
    for i in 0..out.len() {
        out[i] = inversion(ab[i], a[i], b[i]);
    }
}

pub fn abduction_slice(
    ab: &[TruthValue],
    cb: &[TruthValue],
    b: &[TruthValue],
    c: &[TruthValue],
    out: &mut [TruthValue],
) {
    debug_assert!(
        ab.len() == cb.len() && ab.len() == b.len() && ab.len() == c.len() && ab.len() == out.len()
    );
    for i in 0..out.len() {
        out[i] = abduction(ab[i], cb[i], b[i], c[i]);
    }
}

pub fn conjunction_slice(a: &[TruthValue], b: &[TruthValue], out: &mut [TruthValue]) {
    debug_assert!(a.len() == b.len() && a.len() == out.len());
    for i in 0..out.len() {
        out[i] = conjunction(a[i], b[i]);
    }
}

pub fn disjunction_slice(a: &[TruthValue], b: &[TruthValue], out: &mut [TruthValue]) {
    debug_assert!(a.len() == b.len() && a.len() == out.len());
    for i in 0..out.len() {
        out[i] = disjunction(a[i], b[i]);
    }
}

pub fn negation_slice(a: &[TruthValue], out: &mut [TruthValue]) {
    debug_assert!(a.len() == out.len());
    for i in 0..out.len() {
        out[i] = negation(a[i]);
    }
}
