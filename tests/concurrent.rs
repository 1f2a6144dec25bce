use std::sync::atomic::{AtomicU64, Ordering};

use atomspace::{AtomSpace, AtomType, AttentionBank, PatternMatcher, Pattern};
use atomspace::pattern::typed;
use rand::Rng;

const NUM_THREADS: usize = 8;
const OPS_PER_THREAD: usize = 1000;

#[test]
fn concurrent_add_node_dedups() {
    let space = AtomSpace::new();
    let names: Vec<String> = (0..64).map(|i| format!("Concept{i}")).collect();

    std::thread::scope(|s| {
        for _ in 0..NUM_THREADS {
            let space = &space;
            let names = &names;
            s.spawn(move || {
                let mut rand = rand::thread_rng();
                for _ in 0..OPS_PER_THREAD {
                    let name = &names[rand.gen_range(0..names.len())];
                    let h = space.add_node(AtomType::ConceptNode, name);
                    assert!(h.valid());
                }
            });
        }
    });

    // Every thread raced to insert from the same name pool; dedup must
    // leave exactly one atom per name.
    assert_eq!(space.size(), names.len());
    for name in &names {
        assert!(space.get_node(AtomType::ConceptNode, name).is_some());
    }
}

#[test]
fn concurrent_stimulation_conserves_funds() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let atoms: Vec<_> = (0..16)
        .map(|i| space.add_node(AtomType::ConceptNode, &format!("A{i}")).id())
        .collect();
    let initial = bank.get_sti_funds();

    std::thread::scope(|s| {
        for _ in 0..NUM_THREADS {
            let bank = &bank;
            let atoms = &atoms;
            s.spawn(move || {
                let mut rand = rand::thread_rng();
                for _ in 0..OPS_PER_THREAD {
                    // Integer amounts stay exact in f32, so conservation
                    // can be asserted tightly.
                    let amount = rand.gen_range(1..4) as f32;
                    let idx = rand.gen_range(0..atoms.len());
                    bank.stimulate(atoms[idx], amount);
                }
            });
        }
    });

    let total = bank.get_sti_funds() + bank.get_total_sti();
    assert!(
        (total - initial).abs() < 1e-3,
        "economy drifted: {total} vs {initial}"
    );
}

#[test]
fn concurrent_transfers_conserve_sti() {
    let space = AtomSpace::new();
    let bank = AttentionBank::new(&space);

    let atoms: Vec<_> = (0..8)
        .map(|i| space.add_node(AtomType::ConceptNode, &format!("T{i}")).id())
        .collect();
    for &id in &atoms {
        bank.stimulate(id, 100.0);
    }
    let initial = bank.get_sti_funds() + bank.get_total_sti();

    std::thread::scope(|s| {
        for _ in 0..NUM_THREADS {
            let bank = &bank;
            let atoms = &atoms;
            s.spawn(move || {
                let mut rand = rand::thread_rng();
                for _ in 0..OPS_PER_THREAD {
                    let src = atoms[rand.gen_range(0..atoms.len())];
                    let dst = atoms[rand.gen_range(0..atoms.len())];
                    if src != dst {
                        bank.transfer_sti(src, dst, rand.gen_range(1..4) as f32);
                    }
                }
            });
        }
    });

    let total = bank.get_sti_funds() + bank.get_total_sti();
    assert!(
        (total - initial).abs() < 1e-3,
        "economy drifted: {total} vs {initial}"
    );
}

#[test]
fn readers_run_against_a_writer() {
    let space = AtomSpace::new();
    let animal = space.add_node(AtomType::ConceptNode, "Animal").id();
    let observed = AtomicU64::new(0);

    std::thread::scope(|s| {
        // One writer grows the graph.
        let writer_space = &space;
        s.spawn(move || {
            for i in 0..OPS_PER_THREAD {
                let node = writer_space.add_node(AtomType::ConceptNode, &format!("N{i}"));
                writer_space
                    .add_link(AtomType::InheritanceLink, &[node.id(), animal])
                    .unwrap();
            }
        });

        // Readers continuously query and match; every snapshot they see
        // must be internally consistent.
        for _ in 0..NUM_THREADS - 1 {
            let space = &space;
            let observed = &observed;
            s.spawn(move || {
                let matcher = PatternMatcher::new(space);
                let pattern = Pattern::new(typed(AtomType::InheritanceLink));
                for _ in 0..50 {
                    for m in matcher.matches(&pattern) {
                        // Invariant: a matched link's targets are live and
                        // list the link in their incoming sets.
                        let outgoing = space.get_outgoing(m.matched_atom);
                        if outgoing.is_empty() {
                            continue; // link removed in race
                        }
                        for target in outgoing {
                            let incoming = space.get_incoming(target);
                            assert!(incoming.contains(&m.matched_atom));
                        }
                        observed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(space.link_count(), OPS_PER_THREAD);
    assert!(observed.load(Ordering::Relaxed) > 0);
}

#[test]
fn concurrent_tv_updates_last_write_wins() {
    let space = AtomSpace::new();
    let atom = space.add_node(AtomType::ConceptNode, "Shared").id();

    std::thread::scope(|s| {
        for t in 0..NUM_THREADS {
            let space = &space;
            s.spawn(move || {
                for i in 0..OPS_PER_THREAD {
                    let strength = ((t * OPS_PER_THREAD + i) % 100) as f32 / 100.0;
                    space.set_tv(atom, atomspace::TruthValue::new(strength, 0.5));
                }
            });
        }
    });

    // Whatever interleaving happened, the final value is one that some
    // thread actually wrote.
    let tv = space.get_tv(atom);
    assert!((0.0..1.0).contains(&tv.strength));
    assert_eq!(tv.confidence, 0.5);
}
