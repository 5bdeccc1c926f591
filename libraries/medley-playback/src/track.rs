//! Playable-track capability and the engine-side voice wrapper
//!
//! The engine never decodes or loads audio. Platforms implement [`Track`]
//! for their playable handles (a streaming decoder, a web audio node, a
//! test stub) and the engine drives them purely through this interface.

use crate::fade::{FadeController, FadeRequest};
use crate::handle::TaskHandle;
use std::time::Duration;

/// Platform-supplied playable audio handle
///
/// The engine is single-threaded and cooperative: it calls these methods
/// from explicit API calls and from `tick`, never concurrently. `play()`
/// after `pause()` resumes; `play()` after `stop()` starts from the top.
pub trait Track {
    /// Start or resume playback
    fn play(&mut self);

    /// Pause playback, keeping position
    fn pause(&mut self);

    /// Stop playback and rewind
    fn stop(&mut self);

    /// Apply a gain in 0.0-1.0
    fn set_gain(&mut self, gain: f32);

    /// Current applied gain
    fn gain(&self) -> f32;

    /// Silence output without losing the applied gain
    fn mute(&mut self);

    /// Undo [`mute`](Self::mute)
    fn unmute(&mut self);

    /// Total track length
    fn duration(&self) -> Duration;

    /// Current playback position
    fn position(&self) -> Duration;

    /// Check if playback reached the natural end
    fn is_finished(&self) -> bool;

    /// A second independently-playable handle to the same audio,
    /// for concurrently overlapping instances
    fn clone_handle(&self) -> Box<dyn Track>;
}

/// A track paired with its fade state
///
/// `Voice` owns the [`FadeController`] for one track and keeps the track's
/// *logical* gain separate from what is applied: while muted the applied
/// gain is forced to zero, but the logical gain keeps tracking fades so
/// unmuting restores the right level.
pub struct Voice {
    track: Box<dyn Track>,
    fader: FadeController,
    gain: f32,
    muted: bool,
}

impl Voice {
    /// Wrap a track at unity gain
    pub fn new(track: Box<dyn Track>) -> Self {
        Self::with_gain(track, 1.0)
    }

    /// Wrap a track at a specific logical gain
    pub fn with_gain(mut track: Box<dyn Track>, gain: f32) -> Self {
        let gain = gain.clamp(0.0, 1.0);
        track.set_gain(gain);
        Self {
            track,
            fader: FadeController::new(),
            gain,
            muted: false,
        }
    }

    /// Start or resume the track
    pub fn play(&mut self) {
        self.track.play();
    }

    /// Pause the track
    pub fn pause(&mut self) {
        self.track.pause();
    }

    /// Stop the track and cancel any in-flight fade
    pub fn stop(&mut self) {
        self.fader.cancel(i32::MAX);
        self.track.stop();
    }

    /// Request a fade on this voice.
    ///
    /// On the fast path (already at target, or zero duration) the target
    /// gain is applied immediately and the returned handle is completed.
    pub fn fade(&mut self, request: FadeRequest, now: Duration) -> TaskHandle {
        let handle = self.fader.begin(request, self.gain, now);
        if handle.is_completed() {
            self.apply_gain(request.to);
        }
        handle
    }

    /// Advance the fade ramp, if one is in flight
    pub fn tick(&mut self, now: Duration) {
        if let Some(step) = self.fader.step(now) {
            self.apply_gain(step.gain);
        }
    }

    /// Set the logical gain and apply it.
    ///
    /// Callers that must not clobber an active ramp check
    /// [`is_fading`](Self::is_fading) first.
    pub fn set_gain(&mut self, gain: f32) {
        self.apply_gain(gain);
    }

    fn apply_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
        let effective = if self.muted { 0.0 } else { self.gain };
        self.track.set_gain(effective);
    }

    /// Logical gain (what unmuting restores)
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Mute the track; the logical gain keeps tracking fades
    pub fn mute(&mut self) {
        self.muted = true;
        self.track.mute();
        self.track.set_gain(0.0);
    }

    /// Unmute the track and restore the logical gain
    pub fn unmute(&mut self) {
        self.muted = false;
        self.track.unmute();
        self.track.set_gain(self.gain);
    }

    /// Check mute state
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Check if a fade is in flight
    pub fn is_fading(&self) -> bool {
        self.fader.is_fading()
    }

    /// Cancel the in-flight fade if its priority is at most `priority`
    pub fn cancel_fade(&mut self, priority: i32) {
        self.fader.cancel(priority);
    }

    /// Track length
    pub fn duration(&self) -> Duration {
        self.track.duration()
    }

    /// Current track position
    pub fn position(&self) -> Duration {
        self.track.position()
    }

    /// Check if the track reached its natural end
    pub fn is_finished(&self) -> bool {
        self.track.is_finished()
    }

    /// Borrow the underlying track
    pub fn track(&self) -> &dyn Track {
        self.track.as_ref()
    }
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("gain", &self.gain)
            .field("muted", &self.muted)
            .field("fading", &self.fader.is_fading())
            .finish()
    }
}
