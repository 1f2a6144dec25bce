use atomspace::types::{
    is_link_type, is_node_type, type_from_name, type_name, AtomHeader, AtomId, AtomType,
    AttentionValue, TruthValue, TypeTag,
};
use atomspace::Packable;
use rand::{rngs::ThreadRng, Rng};

#[test]
fn atom_id_default_is_invalid() {
    let id = AtomId::default();
    assert!(!id.valid());
    assert_eq!(id.index(), 0);
    assert_eq!(id.generation(), 0);
}

#[test]
fn atom_id_pack_roundtrip() {
    let mut rand = ThreadRng::default();
    for _ in 0..100_000 {
        let index = rand.gen_range(0..1u64 << 48);
        let generation = rand.gen_range(1..=u16::MAX);
        let id = AtomId::pack(index, generation);
        assert_eq!(id.index(), index);
        assert_eq!(id.generation(), generation);
        assert!(id.valid());
    }
}

#[test]
fn atom_id_orders_over_full_word() {
    let a = AtomId::pack(10, 1);
    let b = AtomId::pack(20, 1);
    let c = AtomId::pack(10, 1);
    let d = AtomId::pack(10, 2);

    assert_eq!(a, c);
    assert_ne!(a, b);
    assert!(a < b);
    assert!(a < d);
}

#[test]
fn truth_value_default_is_zero() {
    let tv = TruthValue::default();
    assert_eq!(tv.strength, 0.0);
    assert_eq!(tv.confidence, 0.0);
}

#[test]
fn truth_value_clamps_on_construction() {
    let tv = TruthValue::new(1.5, -0.25);
    assert_eq!(tv.strength, 1.0);
    assert_eq!(tv.confidence, 0.0);
}

#[test]
fn truth_value_simple() {
    let tv = TruthValue::simple(0.7);
    assert!((tv.strength - 0.7).abs() < 1e-4);
    assert!((tv.confidence - 0.9).abs() < 1e-4);
}

#[test]
fn truth_value_is_true() {
    let high = TruthValue::new(0.8, 0.9);
    let low = TruthValue::new(0.2, 0.9);

    assert!(high.is_true());
    assert!(!low.is_true());
    assert!(low.is_true_with(0.1));
}

#[test]
fn truth_value_count_roundtrip() {
    let tv = TruthValue::new(0.7, 0.5);
    let count = tv.count();
    assert!(count > 0.0);

    let reconstructed = TruthValue::from_count(0.7, count);
    assert!((reconstructed.strength - tv.strength).abs() < 0.01);
    assert!((reconstructed.confidence - tv.confidence).abs() < 0.01);
}

#[test]
fn truth_value_count_roundtrip_randomized() {
    let mut rand = ThreadRng::default();
    for _ in 0..10_000 {
        let tv = TruthValue::new(rand.gen_range(0.0..=1.0), rand.gen_range(0.0..0.99));
        let back = TruthValue::from_count(tv.strength, tv.count());
        assert!((back.strength - tv.strength).abs() < 0.01);
        assert!((back.confidence - tv.confidence).abs() < 0.01);
    }
}

#[test]
fn attention_value_default() {
    let av = AttentionValue::default();
    assert_eq!(av.sti, 0.0);
    assert_eq!(av.lti, 0);
    assert_eq!(av.vlti, 0);
}

#[test]
fn attention_value_disposable() {
    let av = AttentionValue::disposable();
    assert!(av.is_disposable());
    assert!(!av.in_focus(0.0));
}

#[test]
fn vlti_blocks_disposal() {
    let av = AttentionValue::new(-10.0, 0, 1);
    assert!(!av.is_disposable());
}

#[test]
fn packed_values_roundtrip() {
    let mut rand = ThreadRng::default();
    for _ in 0..10_000 {
        let tv = TruthValue::new(rand.gen_range(0.0..=1.0), rand.gen_range(0.0..=1.0));
        assert_eq!(TruthValue::unpack(tv.pack()), tv);

        let av = AttentionValue::new(
            rand.gen_range(-1000.0..1000.0),
            rand.gen_range(i16::MIN..=i16::MAX),
            rand.gen_range(0..=1),
        );
        assert_eq!(AttentionValue::unpack(av.pack()), av);
    }
}

#[test]
fn type_partition() {
    assert!(is_node_type(AtomType::ConceptNode.into()));
    assert!(is_node_type(AtomType::VariableNode.into()));
    assert!(!is_node_type(AtomType::InheritanceLink.into()));

    assert!(is_link_type(AtomType::InheritanceLink.into()));
    assert!(is_link_type(AtomType::AndLink.into()));
    assert!(!is_link_type(AtomType::ConceptNode.into()));
}

#[test]
fn type_name_lookup() {
    assert_eq!(type_name(AtomType::ConceptNode.into()), "ConceptNode");
    assert_eq!(
        type_name(AtomType::InheritanceLink.into()),
        "InheritanceLink"
    );
    assert_eq!(type_name(AtomType::AndLink.into()), "AndLink");
    assert_eq!(type_name(TypeTag::from_raw(2048)), "UserDefinedType");
}

#[test]
fn type_from_name_lookup() {
    assert_eq!(type_from_name("ConceptNode"), Some(AtomType::ConceptNode));
    assert_eq!(
        type_from_name("InheritanceLink"),
        Some(AtomType::InheritanceLink)
    );
    assert_eq!(type_from_name("NoSuchType"), None);
}

#[test]
fn header_flags() {
    let mut header = AtomHeader::new(AtomType::ConceptNode.into(), 0, 1);
    assert!(!header.has_flag(AtomHeader::FLAG_CHECKED));

    header.set_flag(AtomHeader::FLAG_CHECKED);
    assert!(header.has_flag(AtomHeader::FLAG_CHECKED));

    header.clear_flag(AtomHeader::FLAG_CHECKED);
    assert!(!header.has_flag(AtomHeader::FLAG_CHECKED));
}

#[test]
fn compact_layouts() {
    assert_eq!(std::mem::size_of::<AtomId>(), 8);
    assert_eq!(std::mem::size_of::<TruthValue>(), 8);
    assert_eq!(std::mem::size_of::<AttentionValue>(), 8);
    assert_eq!(std::mem::size_of::<AtomHeader>(), 16);
}
