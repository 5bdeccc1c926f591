//! Core value types for the sequencing engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Play state of a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayState {
    /// Nothing sounding, cursor cleared
    Stopped,

    /// Currently playing
    Playing,

    /// Paused mid-section
    Paused,
}

/// When a piece stops on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndScope {
    /// Stop after a single section
    Section,

    /// Stop after one pick from every set (one cycle)
    Cycle,

    /// Stop once no further cycle is completable without repetition
    FullCycle,

    /// Never stop on its own
    Loop,
}

/// Configuration for a playback session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Master volume applied to whichever piece is playing (0.0-1.0)
    pub master_volume: f32,

    /// Whether the session starts muted
    pub muted: bool,

    /// Fade-out length used when switching between pieces
    pub switch_fade: Duration,

    /// Fade priority used by piece switches
    pub switch_priority: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            muted: false,
            switch_fade: Duration::from_millis(800),
            switch_priority: 2,
        }
    }
}
