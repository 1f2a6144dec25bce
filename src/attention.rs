//! Economic attention allocation (ECAN).
//!
//! The bank owns two scalar funds and moves short-term importance between
//! the funds and atoms: stimulation and wages pay out of the funds, rent
//! flows back in, and spreading moves STI between neighbouring atoms.
//! Outside of explicit top-ups and atom removal, `sti_funds + Σ sti(a)` is
//! conserved by every operation here — each movement withdraws an exact
//! amount from one place and deposits exactly that amount in another, with
//! failed deposits refunded.
//!
//! All movement goes through [`atomic_try_update`], so concurrent callers
//! never create or destroy importance, only interleave transfers.

use std::collections::HashSet;

use log::debug;

use crate::space::AtomSpace;
use crate::types::{AtomId, AttentionValue};
use crate::{atomic_try_update, PackedCell};

#[derive(Debug, Clone)]
pub struct ECANConfig {
    pub initial_sti_funds: f32,
    pub initial_lti_funds: f32,
    /// STI at or above which an atom is in the attentional focus.
    pub af_boundary: f32,
    /// STI at or below which a non-VLTI atom becomes a forgetting
    /// candidate.
    pub forgetting_threshold: f32,
    /// Fraction of each atom's positive STI returned to the funds per
    /// update cycle.
    pub rent_rate: f32,
    /// STI paid from the funds to each focus atom per update cycle.
    pub wage_rate: f32,
    /// Fraction of an atom's STI pushed to its neighbours by one
    /// spreading step.
    pub spread_rate: f32,
    /// Fraction of each atom's STI converted toward LTI per update cycle.
    pub age_rate: f32,
}

impl Default for ECANConfig {
    fn default() -> Self {
        Self {
            initial_sti_funds: 10_000.0,
            initial_lti_funds: 10_000.0,
            af_boundary: 10.0,
            forgetting_threshold: 0.0,
            rent_rate: 0.01,
            wage_rate: 1.0,
            spread_rate: 0.5,
            age_rate: 0.001,
        }
    }
}

pub struct AttentionBank<'a> {
    space: &'a AtomSpace,
    config: ECANConfig,
    sti_funds: PackedCell<f32>,
    lti_funds: PackedCell<f32>,
}

impl<'a> AttentionBank<'a> {
    pub fn new(space: &'a AtomSpace) -> Self {
        Self::with_config(space, ECANConfig::default())
    }

    pub fn with_config(space: &'a AtomSpace, config: ECANConfig) -> Self {
        Self {
            space,
            sti_funds: PackedCell::new(config.initial_sti_funds),
            lti_funds: PackedCell::new(config.initial_lti_funds),
            config,
        }
    }

    pub fn config(&self) -> &ECANConfig {
        &self.config
    }

    pub fn get_sti_funds(&self) -> f32 {
        self.sti_funds.load()
    }

    pub fn get_lti_funds(&self) -> f32 {
        self.lti_funds.load()
    }

    pub fn add_sti_funds(&self, amount: f32) {
        atomic_try_update(&self.sti_funds, |funds| {
            *funds += amount;
            (true, ())
        });
    }

    pub fn add_lti_funds(&self, amount: f32) {
        atomic_try_update(&self.lti_funds, |funds| {
            *funds += amount;
            (true, ())
        });
    }

    /// Withdraws up to `amount` from the STI funds.  Returns the amount
    /// actually obtained.
    fn withdraw_funds(&self, amount: f32) -> f32 {
        atomic_try_update(&self.sti_funds, |funds| {
            let take = amount.clamp(0.0, funds.max(0.0));
            if take <= 0.0 {
                return (false, 0.0);
            }
            *funds -= take;
            (true, take)
        })
    }

    fn refund_funds(&self, amount: f32) {
        if amount > 0.0 {
            self.add_sti_funds(amount);
        }
    }

    /// Deposits STI on an atom.  False when the atom no longer resolves;
    /// the caller must refund the amount somewhere.
    fn deposit(&self, id: AtomId, amount: f32) -> bool {
        self.space
            .try_update_av(id, |av| {
                av.sti += amount;
                (true, ())
            })
            .is_some()
    }

    /// Transfers up to `amount` from the STI funds to the atom, bounded by
    /// the funds available.  Returns the atom's new STI.
    pub fn stimulate(&self, id: impl Into<AtomId>, amount: f32) -> f32 {
        let id = id.into();
        if !self.space.contains(id) {
            return 0.0;
        }
        let withdrawn = self.withdraw_funds(amount);
        match self.space.try_update_av(id, |av| {
            av.sti += withdrawn;
            (true, av.sti)
        }) {
            Some(sti) => sti,
            None => {
                // Removed in race; the economy keeps the money.
                self.refund_funds(withdrawn);
                0.0
            }
        }
    }

    /// Moves up to `amount` of STI from one atom to another, bounded by
    /// the source's (positive) STI.  Returns the amount moved.
    pub fn transfer_sti(
        &self,
        src: impl Into<AtomId>,
        dst: impl Into<AtomId>,
        amount: f32,
    ) -> f32 {
        let (src, dst) = (src.into(), dst.into());
        let moved = self
            .space
            .try_update_av(src, |av| {
                let take = amount.clamp(0.0, av.sti.max(0.0));
                if take <= 0.0 {
                    return (false, 0.0);
                }
                av.sti -= take;
                (true, take)
            })
            .unwrap_or(0.0);
        if moved > 0.0 && !self.deposit(dst, moved) {
            self.refund_funds(moved);
        }
        moved
    }

    /// Pushes `spread_rate * sti / degree` of this atom's STI to each
    /// neighbour: the other members of every link in the atom's incoming
    /// set, plus the atom's own targets when it is a link.  Spreading
    /// neither creates nor destroys STI.
    pub fn spread_activation(&self, id: impl Into<AtomId>) {
        let id = id.into();
        let neighbours = self.space.with_read(|table, _| {
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            for &l in table.incoming(id) {
                for &member in table.outgoing(l) {
                    if member != id && seen.insert(member) {
                        out.push(member);
                    }
                }
            }
            for &target in table.outgoing(id) {
                if target != id && seen.insert(target) {
                    out.push(target);
                }
            }
            out
        });
        if neighbours.is_empty() {
            return;
        }
        let withdrawn = self
            .space
            .try_update_av(id, |av| {
                let total = self.config.spread_rate * av.sti;
                if total <= 0.0 {
                    return (false, 0.0);
                }
                av.sti -= total;
                (true, total)
            })
            .unwrap_or(0.0);
        if withdrawn <= 0.0 {
            return;
        }
        let share = withdrawn / neighbours.len() as f32;
        for &neighbour in &neighbours {
            if !self.deposit(neighbour, share) {
                // Neighbour vanished; give its share back to the source,
                // or to the funds if the source is gone too.
                if !self.deposit(id, share) {
                    self.refund_funds(share);
                }
            }
        }
    }

    /// One economic cycle: collect rent on positive STI, pay wages to the
    /// attentional focus, and age STI toward LTI.
    pub fn update_cycle(&self) {
        let ids = self.space.all_atoms();

        let mut rent_total = 0.0;
        for &id in &ids {
            rent_total += self
                .space
                .try_update_av(id, |av| {
                    if av.sti <= 0.0 {
                        return (false, 0.0);
                    }
                    let rent = self.config.rent_rate * av.sti;
                    av.sti -= rent;
                    (true, rent)
                })
                .unwrap_or(0.0);
        }
        self.refund_funds(rent_total);

        for &id in &ids {
            if !self.in_attentional_focus(id) {
                continue;
            }
            let wage = self.withdraw_funds(self.config.wage_rate);
            if wage > 0.0 && !self.deposit(id, wage) {
                self.refund_funds(wage);
            }
        }

        for &id in &ids {
            self.age_atom(id);
        }
    }

    /// Decays a slice of the atom's STI back to the funds and accrues the
    /// integral part as LTI, paid out of the LTI funds.
    fn age_atom(&self, id: AtomId) {
        let aged = self
            .space
            .try_update_av(id, |av| {
                let delta = self.config.age_rate * av.sti;
                if delta <= 0.0 {
                    return (false, 0.0);
                }
                av.sti -= delta;
                (true, delta)
            })
            .unwrap_or(0.0);
        if aged <= 0.0 {
            return;
        }
        self.refund_funds(aged);
        let credit = atomic_try_update(&self.lti_funds, |funds| {
            let want = aged.round();
            let take = want.clamp(0.0, funds.max(0.0)).floor();
            if take < 1.0 {
                return (false, 0.0);
            }
            *funds -= take;
            (true, take)
        });
        if credit >= 1.0 {
            let granted = self
                .space
                .try_update_av(id, |av| {
                    av.lti = av.lti.saturating_add(credit as i16);
                    (true, ())
                })
                .is_some();
            if !granted {
                atomic_try_update(&self.lti_funds, |funds| {
                    *funds += credit;
                    (true, ())
                });
            }
        }
    }

    pub fn in_attentional_focus(&self, id: impl Into<AtomId>) -> bool {
        self.space
            .get_av(id)
            .in_focus(self.config.af_boundary)
    }

    /// Atoms currently in the attentional focus, in insertion order.
    pub fn get_attentional_focus(&self) -> Vec<AtomId> {
        self.space
            .all_atoms()
            .into_iter()
            .filter(|&id| self.in_attentional_focus(id))
            .collect()
    }

    /// Atoms eligible for forgetting: STI at or below the threshold and
    /// VLTI clear.
    pub fn mark_for_forgetting(&self) -> Vec<AtomId> {
        self.space
            .all_atoms()
            .into_iter()
            .filter(|&id| {
                let av = self.space.get_av(id);
                av.sti <= self.config.forgetting_threshold && av.vlti == 0
            })
            .collect()
    }

    /// Recursively removes an atom and returns the removed atoms' STI to
    /// the funds, keeping the economy balanced across forgetting.
    pub fn forget(&self, id: impl Into<AtomId>) -> bool {
        let id = id.into();
        // Recursive removal takes down the atom and its transitive
        // incoming links; sum their STI before they disappear.
        let reclaimed = self.space.with_read(|table, _| {
            let mut seen = HashSet::new();
            let mut stack = vec![id];
            let mut total = 0.0;
            while let Some(atom) = stack.pop() {
                if !table.contains(atom) || !seen.insert(atom) {
                    continue;
                }
                total += table.av(atom).sti;
                stack.extend(table.incoming(atom).iter().copied());
            }
            total
        });
        if self.space.remove(id, true) {
            self.refund_funds(reclaimed);
            true
        } else {
            false
        }
    }

    pub fn get_total_sti(&self) -> f32 {
        self.space
            .all_atoms()
            .into_iter()
            .map(|id| self.space.get_av(id).sti)
            .sum()
    }

    pub fn get_max_sti(&self) -> f32 {
        let ids = self.space.all_atoms();
        if ids.is_empty() {
            return 0.0;
        }
        ids.into_iter()
            .map(|id| self.space.get_av(id).sti)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn get_min_sti(&self) -> f32 {
        let ids = self.space.all_atoms();
        if ids.is_empty() {
            return 0.0;
        }
        ids.into_iter()
            .map(|id| self.space.get_av(id).sti)
            .fold(f32::INFINITY, f32::min)
    }

    /// Direct attention-value read, for callers that already hold an id.
    pub fn get_av(&self, id: impl Into<AtomId>) -> AttentionValue {
        self.space.get_av(id)
    }
}

/// Runs one spreading step over every atom in the space.
pub struct ImportanceDiffusionAgent<'b, 'a> {
    bank: &'b AttentionBank<'a>,
}

impl<'b, 'a> ImportanceDiffusionAgent<'b, 'a> {
    pub fn new(bank: &'b AttentionBank<'a>) -> Self {
        Self { bank }
    }

    pub fn run_once(&self) {
        for id in self.bank.space.all_atoms() {
            self.bank.spread_activation(id);
        }
    }
}

/// Removes every forgetting candidate, reclaiming its STI for the funds.
pub struct ForgettingAgent<'b, 'a> {
    bank: &'b AttentionBank<'a>,
}

impl<'b, 'a> ForgettingAgent<'b, 'a> {
    pub fn new(bank: &'b AttentionBank<'a>) -> Self {
        Self { bank }
    }

    /// Returns the number of atoms removed.
    pub fn run_once(&self) -> usize {
        let marked = self.bank.mark_for_forgetting();
        let mut removed = 0;
        for id in marked {
            // Earlier removals may have taken this one down transitively.
            if self.bank.forget(id) {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("forgetting agent removed {removed} atoms");
        }
        removed
    }
}
