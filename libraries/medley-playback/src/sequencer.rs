//! Section-set sequencing automaton
//!
//! Sampling without replacement over layered section sets: each set is a row
//! of a boolean visitation grid, a pick consumes the entry, and the grid is
//! reinstated only when a traversal would otherwise break - some row
//! exhausted exactly as the cursor wraps to set 0. Every full cycle samples
//! every set exactly once without repetition, and the same fragment is never
//! picked in adjacent cycles while alternatives remain.

use crate::choice::pick_uniform;
use crate::types::EndScope;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Where the sequencer currently stands within a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayCursor {
    /// Stopped; nothing picked
    Idle,

    /// Playing the intro, before the first section
    Intro,

    /// Playing a picked section
    Section {
        /// Section set index
        set: usize,
        /// Section index within the set
        section: usize,
    },
}

/// The section-set sequencer
#[derive(Debug, Clone)]
pub struct Sequencer {
    /// `visitation[set][section]`: still eligible in the current full cycle
    visitation: Vec<Vec<bool>>,
    cursor: PlayCursor,
}

impl Sequencer {
    /// Build a sequencer over sets of the given sizes, fully eligible
    pub fn new(set_sizes: &[usize]) -> Self {
        Self {
            visitation: set_sizes.iter().map(|&len| vec![true; len]).collect(),
            cursor: PlayCursor::Idle,
        }
    }

    /// Number of section sets
    pub fn num_sets(&self) -> usize {
        self.visitation.len()
    }

    /// Current cursor
    pub fn cursor(&self) -> PlayCursor {
        self.cursor
    }

    /// Put the cursor on the intro
    pub fn begin_intro(&mut self) {
        self.cursor = PlayCursor::Intro;
    }

    /// Set index the next advance will land on
    pub fn next_set(&self) -> usize {
        match self.cursor {
            PlayCursor::Idle | PlayCursor::Intro => 0,
            PlayCursor::Section { set, .. } => (set + 1) % self.visitation.len(),
        }
    }

    /// True when the next advance wraps to set 0 with the grid no longer
    /// able to complete a cycle - the caller must reinstate eligibility
    /// (and announce the full-cycle boundary) before picking.
    pub fn wrap_exhausted(&self) -> bool {
        !self.visitation.is_empty() && self.next_set() == 0 && !self.cycle_exists()
    }

    /// Reinstate eligibility for every set
    pub fn reset_visitation(&mut self) {
        for row in &mut self.visitation {
            row.fill(true);
        }
    }

    /// Reinstate eligibility and clear the cursor
    pub fn reset(&mut self) {
        self.reset_visitation();
        self.cursor = PlayCursor::Idle;
    }

    /// Advance into the next set and consume a uniformly-picked eligible
    /// section. Returns the new `(set, section)` position, or `None` when
    /// the target set has no eligible entries (degenerate configuration).
    pub fn advance_pick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<(usize, usize)> {
        if self.visitation.is_empty() {
            return None;
        }

        let set = self.next_set();
        let eligible: Vec<usize> = self.visitation[set]
            .iter()
            .enumerate()
            .filter_map(|(index, &open)| open.then_some(index))
            .collect();

        let section = eligible[pick_uniform(rng, eligible.len())?];
        self.visitation[set][section] = false;
        self.cursor = PlayCursor::Section { set, section };
        Some((set, section))
    }

    /// True iff every set still has at least one eligible section,
    /// i.e. one more pick from every set is completable without repetition
    pub fn cycle_exists(&self) -> bool {
        self.visitation
            .iter()
            .all(|row| row.iter().any(|&open| open))
    }

    /// Whether the section at the cursor is the last one before an
    /// auto-stop under the given end scope
    pub fn is_last_before_stop(&self, scope: EndScope) -> bool {
        let at_last_set = matches!(
            self.cursor,
            PlayCursor::Section { set, .. } if set + 1 == self.visitation.len()
        );

        match scope {
            EndScope::Section => true,
            EndScope::Cycle => at_last_set,
            EndScope::FullCycle => at_last_set && !self.cycle_exists(),
            EndScope::Loop => false,
        }
    }

    /// Check eligibility of one entry (test hook)
    pub fn is_eligible(&self, set: usize, section: usize) -> bool {
        self.visitation
            .get(set)
            .and_then(|row| row.get(section))
            .copied()
            .unwrap_or(false)
    }

    /// Number of still-eligible sections in a set
    pub fn remaining_in(&self, set: usize) -> usize {
        self.visitation
            .get(set)
            .map_or(0, |row| row.iter().filter(|&&open| open).count())
    }
}
