//! Priority-arbitrated volume fades
//!
//! Every fadeable entity owns a [`FadeController`]: a time-boxed volume ramp
//! with a priority lock. A fade in flight can only be preempted by a request
//! of equal or higher priority; the losing request's handle settles cancelled
//! immediately and the winner installs its own priority as the new lock.
//!
//! The controller owns no clock. The host drives it by calling
//! [`FadeController::step`] on its tick (around 15 ms resolution is plenty);
//! the ramp is guaranteed to apply the exact target gain at or before the
//! deadline, never to overshoot, and never to run indefinitely.

use crate::handle::{TaskHandle, TaskOutcome};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::time::Duration;

/// Gain difference below which a fade request applies immediately
pub const GAIN_EPSILON: f32 = 1e-3;

/// Fade easing curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FadeCurve {
    /// Cosine ease: `1 - cos(πt/2)`, slow start with a committed finish
    #[default]
    Cosine,

    /// Straight line
    Linear,

    /// S-curve: `(1 - cos(πt)) / 2`, slow start and slow end
    SCurve,

    /// Equal power: `sin(πt/2)`, constant perceived loudness in crossfades
    EqualPower,
}

impl FadeCurve {
    /// Map normalized ramp time `t` in 0.0-1.0 to an easing factor in 0.0-1.0
    #[inline]
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FadeCurve::Cosine => 1.0 - (PI * t * 0.5).cos(),
            FadeCurve::Linear => t,
            FadeCurve::SCurve => (1.0 - (PI * t).cos()) * 0.5,
            FadeCurve::EqualPower => (PI * t * 0.5).sin(),
        }
    }

    /// Human-readable curve name
    pub fn display_name(&self) -> &'static str {
        match self {
            FadeCurve::Cosine => "Cosine",
            FadeCurve::Linear => "Linear",
            FadeCurve::SCurve => "S-Curve",
            FadeCurve::EqualPower => "Equal Power",
        }
    }
}

/// A fade request
///
/// Target gain and duration are required by construction; the rest comes
/// from the builder methods.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeRequest {
    /// Target gain (0.0-1.0)
    pub to: f32,

    /// Ramp length; a hard deadline
    pub duration: Duration,

    /// Starting gain; defaults to the entity's current gain
    pub from: Option<f32>,

    /// Priority for the fade lock (higher wins)
    pub priority: i32,

    /// Easing curve
    pub curve: FadeCurve,
}

impl FadeRequest {
    /// Fade to `to` over `duration` at priority 0 with the default curve
    pub fn new(to: f32, duration: Duration) -> Self {
        Self {
            to,
            duration,
            from: None,
            priority: 0,
            curve: FadeCurve::default(),
        }
    }

    /// Override the starting gain
    pub fn from_gain(mut self, from: f32) -> Self {
        self.from = Some(from);
        self
    }

    /// Set the fade priority
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the easing curve
    pub fn curve(mut self, curve: FadeCurve) -> Self {
        self.curve = curve;
        self
    }
}

/// One sample of an active ramp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeStep {
    /// Gain the owner should apply now
    pub gain: f32,

    /// True on the final step (exact target gain, handle settled)
    pub done: bool,
}

/// In-flight fade state; at most one per controller
#[derive(Debug)]
struct FadeState {
    from: f32,
    to: f32,
    duration: Duration,
    started: Duration,
    priority: i32,
    curve: FadeCurve,
    handle: TaskHandle,
}

/// Priority-locked, cancellable volume ramp scheduler
#[derive(Debug, Default)]
pub struct FadeController {
    active: Option<FadeState>,
}

impl FadeController {
    /// Create a controller with no fade in flight
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Request a fade.
    ///
    /// Arbitration: an in-flight fade with strictly higher priority wins -
    /// the request fails with an already-cancelled handle and the current
    /// fade is untouched. Otherwise any in-flight fade is cancelled (its
    /// handle settles cancelled) and the new fade takes over.
    ///
    /// Fast path: if the target is within [`GAIN_EPSILON`] of `current_gain`
    /// or the duration is zero, no ramp is installed and the returned handle
    /// is already completed - the caller applies the target gain right away.
    pub fn begin(&mut self, request: FadeRequest, current_gain: f32, now: Duration) -> TaskHandle {
        if let Some(active) = &self.active {
            if active.priority > request.priority {
                tracing::debug!(
                    held = active.priority,
                    requested = request.priority,
                    "fade request lost priority arbitration"
                );
                return TaskHandle::settled(TaskOutcome::Cancelled);
            }
        }

        if let Some(superseded) = self.active.take() {
            superseded.handle.settle(TaskOutcome::Cancelled);
        }

        if (request.to - current_gain).abs() < GAIN_EPSILON || request.duration.is_zero() {
            return TaskHandle::settled(TaskOutcome::Completed);
        }

        let handle = TaskHandle::pending();
        self.active = Some(FadeState {
            from: request.from.unwrap_or(current_gain),
            to: request.to,
            duration: request.duration,
            started: now,
            priority: request.priority,
            curve: request.curve,
            handle: handle.clone(),
        });
        handle
    }

    /// Sample the ramp at `now`.
    ///
    /// Returns `None` when no fade is in flight. Once `elapsed >= duration`
    /// the exact target gain is returned, the handle settles completed, and
    /// the fade is retired.
    pub fn step(&mut self, now: Duration) -> Option<FadeStep> {
        let state = self.active.as_ref()?;
        let elapsed = now.saturating_sub(state.started);

        if elapsed >= state.duration {
            let state = self.active.take()?;
            state.handle.settle(TaskOutcome::Completed);
            return Some(FadeStep {
                gain: state.to,
                done: true,
            });
        }

        let t = elapsed.as_secs_f32() / state.duration.as_secs_f32();
        let gain = state.from + (state.to - state.from) * state.curve.apply(t);
        Some(FadeStep { gain, done: false })
    }

    /// Cancel the in-flight fade if its priority is at most `priority`.
    ///
    /// Gain already applied by earlier steps stays where it is.
    pub fn cancel(&mut self, priority: i32) {
        let cancels = self
            .active
            .as_ref()
            .is_some_and(|state| state.priority <= priority);
        if cancels {
            if let Some(state) = self.active.take() {
                state.handle.settle(TaskOutcome::Cancelled);
            }
        }
    }

    /// Check if a fade is in flight
    pub fn is_fading(&self) -> bool {
        self.active.is_some()
    }

    /// Priority of the in-flight fade, if any
    pub fn active_priority(&self) -> Option<i32> {
        self.active.as_ref().map(|state| state.priority)
    }
}
