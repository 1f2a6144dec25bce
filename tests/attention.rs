use atomspace::{
    AtomSpace, AtomType, AttentionBank, AttentionValue, ECANConfig, ForgettingAgent,
    ImportanceDiffusionAgent,
};

const FUND_TOLERANCE: f32 = 1e-2;

/// `sti_funds + Σ sti` must stay where it started, modulo top-ups and
/// removals.
fn economy_total(bank: &AttentionBank<'_>) -> f32 {
    bank.get_sti_funds() + bank.get_total_sti()
}

#[test]
fn initial_funds_from_config() {
    let space = AtomSpace::new();
    let bank = AttentionBank::with_config(
        &space,
        ECANConfig {
            initial_sti_funds: 1000.0,
            initial_lti_funds: 500.0,
            ..ECANConfig::default()
        },
    );

    assert_eq!(bank.get_sti_funds(), 1000.0);
    assert_eq!(bank.get_lti_funds(), 500.0);
}

#[test]
fn stimulate_moves_funds_to_atom() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let cat = space.add_node(AtomType::ConceptNode, "Cat");
    let initial_funds = bank.get_sti_funds();

    let new_sti = bank.stimulate(cat, 10.0);
    assert_eq!(new_sti, 10.0);
    assert_eq!(bank.get_sti_funds(), initial_funds - 10.0);
    assert_eq!(space.get_av(cat).sti, 10.0);
}

#[test]
fn stimulate_is_bounded_by_funds() {
    let space = AtomSpace::new();
    let bank = AttentionBank::with_config(
        &space,
        ECANConfig {
            initial_sti_funds: 5.0,
            ..ECANConfig::default()
        },
    );

    let cat = space.add_node(AtomType::ConceptNode, "Cat");
    let new_sti = bank.stimulate(cat, 100.0);
    assert_eq!(new_sti, 5.0);
    assert_eq!(bank.get_sti_funds(), 0.0);

    // Nothing left to hand out.
    assert_eq!(bank.stimulate(cat, 1.0), 5.0);
}

#[test]
fn stimulate_invalid_atom_keeps_funds() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let cat = space.add_node(AtomType::ConceptNode, "Cat").id();
    space.remove(cat, false);

    assert_eq!(bank.stimulate(cat, 50.0), 0.0);
    assert_eq!(bank.get_sti_funds(), bank.config().initial_sti_funds);
}

#[test]
fn transfer_sti_between_atoms() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let cat = space.add_node(AtomType::ConceptNode, "Cat");
    let dog = space.add_node(AtomType::ConceptNode, "Dog");

    bank.stimulate(cat, 20.0);
    let moved = bank.transfer_sti(cat, dog, 5.0);
    assert_eq!(moved, 5.0);

    assert_eq!(space.get_av(cat).sti, 15.0);
    assert_eq!(space.get_av(dog).sti, 5.0);

    // Bounded by what the source actually has.
    let moved = bank.transfer_sti(dog, cat, 100.0);
    assert_eq!(moved, 5.0);
    assert_eq!(space.get_av(dog).sti, 0.0);
}

#[test]
fn add_funds() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let sti = bank.get_sti_funds();
    let lti = bank.get_lti_funds();

    bank.add_sti_funds(100.0);
    bank.add_lti_funds(50.0);

    assert_eq!(bank.get_sti_funds(), sti + 100.0);
    assert_eq!(bank.get_lti_funds(), lti + 50.0);
}

#[test]
fn attentional_focus() {
    let space = AtomSpace::new();
    let bank = AttentionBank::with_config(
        &space,
        ECANConfig {
            af_boundary: 5.0,
            ..ECANConfig::default()
        },
    );

    let high = space.add_node(AtomType::ConceptNode, "High");
    let low = space.add_node(AtomType::ConceptNode, "Low");

    bank.stimulate(high, 20.0);
    bank.stimulate(low, 1.0);

    assert!(bank.in_attentional_focus(high));
    assert!(!bank.in_attentional_focus(low));
    assert_eq!(bank.get_attentional_focus(), vec![high.id()]);
}

#[test]
fn forgetting_respects_vlti() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let disposable = space.add_node(AtomType::ConceptNode, "Disposable");
    space.set_av(disposable, AttentionValue::new(-10.0, 0, 0));

    let important = space.add_node(AtomType::ConceptNode, "Important");
    space.set_av(important, AttentionValue::new(-10.0, 0, 1));

    let marked = bank.mark_for_forgetting();
    assert_eq!(marked, vec![disposable.id()]);
}

#[test]
fn update_cycle_collects_rent() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let cat = space.add_node(AtomType::ConceptNode, "Cat");
    bank.stimulate(cat, 100.0);

    let before = space.get_av(cat).sti;
    let total_before = economy_total(&bank);
    bank.update_cycle();

    assert!(space.get_av(cat).sti < before);
    assert!((economy_total(&bank) - total_before).abs() < FUND_TOLERANCE);
}

#[test]
fn update_cycle_pays_wages_to_focus() {
    let space = AtomSpace::new();
    let bank = AttentionBank::with_config(
        &space,
        ECANConfig {
            af_boundary: 5.0,
            rent_rate: 0.0,
            age_rate: 0.0,
            wage_rate: 2.0,
            ..ECANConfig::default()
        },
    );

    let focused = space.add_node(AtomType::ConceptNode, "Focused");
    let idle = space.add_node(AtomType::ConceptNode, "Idle");
    bank.stimulate(focused, 10.0);

    bank.update_cycle();

    assert_eq!(space.get_av(focused).sti, 12.0);
    assert_eq!(space.get_av(idle).sti, 0.0);
}

#[test]
fn spread_activation_conserves_sti() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let a = space.add_node(AtomType::ConceptNode, "A");
    let b = space.add_node(AtomType::ConceptNode, "B");
    space.add_link(AtomType::SimilarityLink, &[a, b]).unwrap();

    bank.stimulate(a, 100.0);
    let before = space.get_av(a).sti;
    bank.spread_activation(a);

    let a_sti = space.get_av(a).sti;
    let b_sti = space.get_av(b).sti;
    assert!(b_sti > 0.0);
    assert!(a_sti < before);
    assert!((a_sti + b_sti - before).abs() < FUND_TOLERANCE);
}

#[test]
fn spreading_reaches_link_targets() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let a = space.add_node(AtomType::ConceptNode, "A");
    let b = space.add_node(AtomType::ConceptNode, "B");
    let c = space.add_node(AtomType::ConceptNode, "C");
    space.add_link(AtomType::SimilarityLink, &[a, b]).unwrap();
    space.add_link(AtomType::SimilarityLink, &[a, c]).unwrap();

    bank.stimulate(a, 90.0);
    bank.spread_activation(a);

    // Both neighbours get an equal share.
    assert_eq!(space.get_av(b).sti, space.get_av(c).sti);
    assert!(space.get_av(b).sti > 0.0);
}

#[test]
fn conservation_across_operation_sequence() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let a = space.add_node(AtomType::ConceptNode, "A");
    let b = space.add_node(AtomType::ConceptNode, "B");
    let c = space.add_node(AtomType::ConceptNode, "C");
    space.add_link(AtomType::InheritanceLink, &[a, b]).unwrap();
    space.add_link(AtomType::InheritanceLink, &[b, c]).unwrap();

    let total = economy_total(&bank);

    bank.stimulate(a, 128.0);
    bank.stimulate(b, 64.0);
    bank.transfer_sti(a, c, 32.0);
    bank.spread_activation(a);
    bank.spread_activation(b);
    bank.update_cycle();
    bank.update_cycle();

    assert!((economy_total(&bank) - total).abs() < FUND_TOLERANCE);
}

#[test]
fn total_min_max_sti() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let high = space.add_node(AtomType::ConceptNode, "High");
    let low = space.add_node(AtomType::ConceptNode, "Low");

    bank.stimulate(high, 100.0);
    bank.stimulate(low, 10.0);

    assert_eq!(bank.get_total_sti(), 110.0);
    assert_eq!(bank.get_max_sti(), 100.0);
    assert_eq!(bank.get_min_sti(), 10.0);
}

#[test]
fn forget_returns_sti_to_funds() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let a = space.add_node(AtomType::ConceptNode, "A");
    let b = space.add_node(AtomType::ConceptNode, "B");
    space.add_link(AtomType::SimilarityLink, &[a, b]).unwrap();

    bank.stimulate(a, 40.0);
    let total = economy_total(&bank);

    assert!(bank.forget(a));
    assert!(!space.contains(a));
    assert!((economy_total(&bank) - total).abs() < FUND_TOLERANCE);
}

#[test]
fn importance_diffusion_agent_runs() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);
    let agent = ImportanceDiffusionAgent::new(&bank);

    let a = space.add_node(AtomType::ConceptNode, "A");
    let b = space.add_node(AtomType::ConceptNode, "B");
    space.add_link(AtomType::InheritanceLink, &[a, b]).unwrap();

    bank.stimulate(a, 50.0);
    let total = economy_total(&bank);
    agent.run_once();

    assert!(space.get_av(b).sti > 0.0);
    assert!((economy_total(&bank) - total).abs() < FUND_TOLERANCE);
}

#[test]
fn forgetting_agent_removes_disposable_atoms() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);
    let agent = ForgettingAgent::new(&bank);

    let doomed = space.add_node(AtomType::ConceptNode, "Doomed");
    space.set_av(doomed, AttentionValue::new(-1000.0, 0, 0));

    let kept = space.add_node(AtomType::ConceptNode, "Kept");
    space.set_av(kept, AttentionValue::new(-1000.0, 0, 1));

    let removed = agent.run_once();
    assert_eq!(removed, 1);
    assert!(!space.contains(doomed));
    assert!(space.contains(kept));
}
