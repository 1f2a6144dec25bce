use atomspace::pln::{
    abduction, abduction_slice, conjunction, conjunction_slice, deduction, deduction_slice,
    disjunction, disjunction_slice, inversion, inversion_slice, negation, negation_slice,
    revision, revision_slice,
};
use atomspace::TruthValue;
use rand::{rngs::ThreadRng, Rng};

const TOLERANCE: f32 = 1e-4;

fn close(a: TruthValue, b: TruthValue) -> bool {
    (a.strength - b.strength).abs() < TOLERANCE && (a.confidence - b.confidence).abs() < TOLERANCE
}

fn random_tv(rand: &mut ThreadRng) -> TruthValue {
    TruthValue::new(rand.gen_range(0.0..=1.0), rand.gen_range(0.0..0.95))
}

#[test]
fn revision_accumulates_evidence() {
    let a = TruthValue::new(0.8, 0.5);
    let b = TruthValue::new(0.4, 0.5);

    let merged = revision(a, b);
    // Equal counts: strength is the mean, confidence rises.
    assert!((merged.strength - 0.6).abs() < TOLERANCE);
    assert!(merged.confidence > a.confidence);
}

#[test]
fn revision_of_defaults_is_default() {
    let merged = revision(TruthValue::default(), TruthValue::default());
    assert_eq!(merged, TruthValue::default());
}

#[test]
fn revision_commutative_and_associative() {
    let mut rand = ThreadRng::default();
    for _ in 0..10_000 {
        let a = random_tv(&mut rand);
        let b = random_tv(&mut rand);
        let c = random_tv(&mut rand);

        assert!(close(revision(a, b), revision(b, a)));
        assert!(close(
            revision(revision(a, b), c),
            revision(a, revision(b, c))
        ));
    }
}

#[test]
fn deduction_formula() {
    let ab = TruthValue::new(0.9, 0.9);
    let bc = TruthValue::new(0.9, 0.9);
    let b = TruthValue::new(0.5, 0.9);
    let c = TruthValue::new(0.5, 0.9);

    let ac = deduction(ab, bc, b, c);
    // 0.9*0.9 + 0.1 * (0.5 - 0.45) / 0.5 = 0.82
    assert!((ac.strength - 0.82).abs() < TOLERANCE);
    // min of the input confidences, discounted.
    assert!((ac.confidence - 0.81).abs() < TOLERANCE);
}

#[test]
fn deduction_degenerate_denominator() {
    let ab = TruthValue::new(0.9, 0.9);
    let bc = TruthValue::new(0.9, 0.9);
    let saturated = TruthValue::new(1.0, 0.9);
    let c = TruthValue::new(0.5, 0.9);

    assert_eq!(deduction(ab, bc, saturated, c), TruthValue::default());
}

#[test]
fn deduction_strength_stays_in_range() {
    let mut rand = ThreadRng::default();
    for _ in 0..10_000 {
        let ac = deduction(
            random_tv(&mut rand),
            random_tv(&mut rand),
            random_tv(&mut rand),
            random_tv(&mut rand),
        );
        assert!((0.0..=1.0).contains(&ac.strength));
        assert!((0.0..=1.0).contains(&ac.confidence));
    }
}

#[test]
fn inversion_is_bayes() {
    let ab = TruthValue::new(0.8, 0.9);
    let a = TruthValue::new(0.2, 0.9);
    let b = TruthValue::new(0.4, 0.9);

    let ba = inversion(ab, a, b);
    assert!((ba.strength - 0.4).abs() < TOLERANCE);
    assert!(ba.confidence < 0.9);
}

#[test]
fn inversion_degenerate_denominator() {
    let ab = TruthValue::new(0.8, 0.9);
    let a = TruthValue::new(0.2, 0.9);
    let empty = TruthValue::new(0.0, 0.9);

    assert_eq!(inversion(ab, a, empty), TruthValue::default());
}

#[test]
fn abduction_runs_through_the_consequent() {
    let ab = TruthValue::new(0.8, 0.9);
    let cb = TruthValue::new(0.7, 0.9);
    let b = TruthValue::new(0.5, 0.9);
    let c = TruthValue::new(0.4, 0.9);

    let ac = abduction(ab, cb, b, c);
    assert!((0.0..=1.0).contains(&ac.strength));
    assert!(ac.confidence > 0.0);

    // Equivalent to inverting the second premise and deducing.
    let bc = inversion(cb, c, b);
    assert_eq!(ac, deduction(ab, bc, b, c));
}

#[test]
fn conjunction_multiplies_strengths() {
    let a = TruthValue::new(0.8, 0.9);
    let b = TruthValue::new(0.5, 0.7);

    let both = conjunction(a, b);
    assert!((both.strength - 0.4).abs() < TOLERANCE);
    assert!((both.confidence - 0.63).abs() < TOLERANCE);
}

#[test]
fn disjunction_inclusion_exclusion() {
    let a = TruthValue::new(0.8, 0.9);
    let b = TruthValue::new(0.5, 0.7);

    let either = disjunction(a, b);
    assert!((either.strength - 0.9).abs() < TOLERANCE);
}

#[test]
fn negation_complements_strength() {
    let a = TruthValue::new(0.8, 0.9);
    let not_a = negation(a);
    assert!((not_a.strength - 0.2).abs() < TOLERANCE);
    assert_eq!(not_a.confidence, a.confidence);
    assert!(close(negation(not_a), a));
}

#[test]
fn slice_paths_are_bit_identical() {
    let mut rand = ThreadRng::default();
    const N: usize = 1024;

    let ab: Vec<TruthValue> = (0..N).map(|_| random_tv(&mut rand)).collect();
    let bc: Vec<TruthValue> = (0..N).map(|_| random_tv(&mut rand)).collect();
    let b: Vec<TruthValue> = (0..N).map(|_| random_tv(&mut rand)).collect();
    let c: Vec<TruthValue> = (0..N).map(|_| random_tv(&mut rand)).collect();
    let mut out = vec![TruthValue::default(); N];

    let bits = |tv: TruthValue| (tv.strength.to_bits(), tv.confidence.to_bits());

    revision_slice(&ab, &bc, &mut out);
    for i in 0..N {
        assert_eq!(bits(out[i]), bits(revision(ab[i], bc[i])));
    }

    deduction_slice(&ab, &bc, &b, &c, &mut out);
    for i in 0..N {
        assert_eq!(bits(out[i]), bits(deduction(ab[i], bc[i], b[i], c[i])));
    }

    inversion_slice(&ab, &b, &c, &mut out);
    for i in 0..N {
        assert_eq!(bits(out[i]), bits(inversion(ab[i], b[i], c[i])));
    }

    abduction_slice(&ab, &bc, &b, &c, &mut out);
    for i in 0..N {
        assert_eq!(bits(out[i]), bits(abduction(ab[i], bc[i], b[i], c[i])));
    }

    conjunction_slice(&ab, &bc, &mut out);
    for i in 0..N {
        assert_eq!(bits(out[i]), bits(conjunction(ab[i], bc[i])));
    }

    disjunction_slice(&ab, &bc, &mut out);
    for i in 0..N {
        assert_eq!(bits(out[i]), bits(disjunction(ab[i], bc[i])));
    }

    negation_slice(&ab, &mut out);
    for i in 0..N {
        assert_eq!(bits(out[i]), bits(negation(ab[i])));
    }
}
