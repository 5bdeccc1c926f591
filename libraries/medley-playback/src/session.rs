//! Session-level orchestration over a library of pieces
//!
//! A [`PlaybackSession`] holds a registry of named pieces, keeps at most one
//! of them as the active piece, and turns "switch to X" into a fade-out of
//! whatever is sounding followed by a clean start of the target. Pieces are
//! built lazily: registration stores a factory and the piece is constructed
//! the first time it is needed.

use crate::error::{PlaybackError, Result};
use crate::fade::FadeRequest;
use crate::handle::{TaskHandle, TaskOutcome};
use crate::shuffle::Shuffle;
use crate::track::{Track, Voice};
use crate::types::{PlayState, SessionConfig};
use std::collections::HashMap;
use std::time::Duration;

/// A single track played start to finish, no sequencing
pub struct Single {
    voice: Voice,
    state: PlayState,
}

impl Single {
    /// Wrap one track as a playable piece
    pub fn new(track: Box<dyn Track>) -> Self {
        Self {
            voice: Voice::new(track),
            state: PlayState::Stopped,
        }
    }

    fn play(&mut self) {
        self.voice.play();
        self.state = PlayState::Playing;
    }

    fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.voice.pause();
            self.state = PlayState::Paused;
        }
    }

    fn stop(&mut self) {
        self.voice.stop();
        self.state = PlayState::Stopped;
    }

    fn tick(&mut self, now: Duration) {
        self.voice.tick(now);
        if self.state == PlayState::Playing && self.voice.is_finished() {
            self.stop();
        }
    }
}

/// Anything the session can hold in its library
pub enum Playable {
    /// A shuffled piece
    Piece(Shuffle),

    /// A plain single track
    Single(Single),
}

impl Playable {
    /// Wrap one track as a playable
    pub fn single(track: Box<dyn Track>) -> Self {
        Self::Single(Single::new(track))
    }

    /// Start or resume
    pub fn play(&mut self) -> Result<()> {
        match self {
            Self::Piece(piece) => piece.play(),
            Self::Single(single) => {
                single.play();
                Ok(())
            }
        }
    }

    /// Pause in place
    pub fn pause(&mut self) {
        match self {
            Self::Piece(piece) => piece.pause(),
            Self::Single(single) => single.pause(),
        }
    }

    /// Stop and rewind
    pub fn stop(&mut self) {
        match self {
            Self::Piece(piece) => piece.stop(),
            Self::Single(single) => single.stop(),
        }
    }

    /// Advance by one host tick
    pub fn tick(&mut self, now: Duration) {
        match self {
            Self::Piece(piece) => piece.tick(now),
            Self::Single(single) => single.tick(now),
        }
    }

    /// Request a fade of the piece's gain
    pub fn fade(&mut self, request: FadeRequest, now: Duration) -> TaskHandle {
        match self {
            Self::Piece(piece) => piece.fade(request, now),
            Self::Single(single) => single.voice.fade(request, now),
        }
    }

    /// Cancel an in-flight fade if its priority is at most `priority`
    pub fn cancel_fade(&mut self, priority: i32) {
        match self {
            Self::Piece(piece) => piece.cancel_fade(priority),
            Self::Single(single) => single.voice.cancel_fade(priority),
        }
    }

    /// Check if a fade is in flight
    pub fn is_fading(&self) -> bool {
        match self {
            Self::Piece(piece) => piece.is_fading(),
            Self::Single(single) => single.voice.is_fading(),
        }
    }

    /// Set the logical gain
    pub fn set_volume(&mut self, gain: f32) {
        match self {
            Self::Piece(piece) => piece.set_volume(gain),
            Self::Single(single) => single.voice.set_gain(gain),
        }
    }

    /// Mute, keeping the logical gain
    pub fn mute(&mut self) {
        match self {
            Self::Piece(piece) => piece.mute(),
            Self::Single(single) => single.voice.mute(),
        }
    }

    /// Unmute, restoring the logical gain
    pub fn unmute(&mut self) {
        match self {
            Self::Piece(piece) => piece.unmute(),
            Self::Single(single) => single.voice.unmute(),
        }
    }

    /// Current play state
    pub fn state(&self) -> PlayState {
        match self {
            Self::Piece(piece) => piece.state(),
            Self::Single(single) => single.state,
        }
    }

    /// Borrow the shuffled piece, if this playable is one
    /// (to reach its event bus, say)
    pub fn as_shuffle_mut(&mut self) -> Option<&mut Shuffle> {
        match self {
            Self::Piece(piece) => Some(piece),
            Self::Single(_) => None,
        }
    }
}

impl From<Shuffle> for Playable {
    fn from(piece: Shuffle) -> Self {
        Self::Piece(piece)
    }
}

struct PieceEntry {
    factory: Option<Box<dyn FnOnce() -> Playable>>,
    piece: Option<Playable>,
}

struct Transition {
    /// `None` means "fade out and stop" rather than a switch
    target: Option<String>,
    fade: TaskHandle,
    handle: TaskHandle,
}

/// The session: a piece library plus one active slot
pub struct PlaybackSession {
    library: HashMap<String, PieceEntry>,
    now_playing: Option<String>,
    transition: Option<Transition>,
    master_volume: f32,
    muted: bool,
    config: SessionConfig,
}

impl PlaybackSession {
    /// Create a session from its configuration
    pub fn new(config: SessionConfig) -> Self {
        Self {
            library: HashMap::new(),
            now_playing: None,
            transition: None,
            master_volume: config.master_volume.clamp(0.0, 1.0),
            muted: config.muted,
            config,
        }
    }

    /// Register a piece under a name. The factory runs the first time the
    /// piece is switched to; re-registering a name replaces the entry.
    pub fn register(&mut self, id: impl Into<String>, factory: impl FnOnce() -> Playable + 'static) {
        self.library.insert(
            id.into(),
            PieceEntry {
                factory: Some(Box::new(factory)),
                piece: None,
            },
        );
    }

    /// Names of every registered piece
    pub fn piece_ids(&self) -> impl Iterator<Item = &str> {
        self.library.keys().map(String::as_str)
    }

    /// Name of the active piece
    pub fn now_playing(&self) -> Option<&str> {
        self.now_playing.as_deref()
    }

    /// Check if a switch or stop fade is in flight
    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// Master volume
    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Check mute state
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Play state of the active piece
    pub fn state(&self) -> PlayState {
        self.now_playing
            .as_ref()
            .and_then(|id| self.library.get(id))
            .and_then(|entry| entry.piece.as_ref())
            .map_or(PlayState::Stopped, Playable::state)
    }

    /// Switch to the named piece.
    ///
    /// Whatever is sounding fades out over the configured switch fade; the
    /// target starts once the fade settles (on a later `tick`). The returned
    /// handle completes when the target is playing, and is cancelled if
    /// another switch supersedes this one first. Switching to the piece that
    /// is already active cancels any pending switch and fades the piece back
    /// to the master level.
    pub fn switch_to(&mut self, id: &str, now: Duration) -> Result<TaskHandle> {
        if !self.library.contains_key(id) {
            return Err(PlaybackError::UnknownPiece(id.to_string()));
        }

        if self.now_playing.as_deref() == Some(id) {
            self.cancel_transition();
            let request = FadeRequest::new(self.master_volume, self.config.switch_fade)
                .priority(self.config.switch_priority);
            if let Some(piece) = self.built_mut(id) {
                piece.fade(request, now);
            }
            return Ok(TaskHandle::settled(TaskOutcome::Completed));
        }

        self.cancel_transition();
        self.begin_transition(Some(id.to_string()), now)
    }

    /// Fade out and stop the active piece.
    ///
    /// The returned handle completes once everything is silent. With no
    /// active piece this is a no-op and the handle is already completed.
    pub fn stop(&mut self, now: Duration) -> TaskHandle {
        self.cancel_transition();
        if self.now_playing.is_none() {
            return TaskHandle::settled(TaskOutcome::Completed);
        }
        // now_playing is set, so begin_transition cannot fail
        self.begin_transition(None, now)
            .unwrap_or_else(|_| TaskHandle::settled(TaskOutcome::Cancelled))
    }

    fn begin_transition(&mut self, target: Option<String>, now: Duration) -> Result<TaskHandle> {
        let handle = TaskHandle::pending();

        let Some(current_id) = self.now_playing.clone() else {
            // Nothing sounding: install the target right away
            self.install(target, &handle)?;
            return Ok(handle);
        };

        let request = FadeRequest::new(0.0, self.config.switch_fade)
            .priority(self.config.switch_priority);
        let fade = match self.built_mut(&current_id) {
            Some(piece) if piece.state() != PlayState::Stopped => piece.fade(request, now),
            _ => TaskHandle::settled(TaskOutcome::Completed),
        };

        self.transition = Some(Transition {
            target,
            fade,
            handle: handle.clone(),
        });
        // A zero-length or fast-path fade settles immediately
        self.finish_ready_transition()?;
        Ok(handle)
    }

    /// Advance the session by one host tick: drive every built piece and
    /// complete a pending transition whose fade has settled.
    pub fn tick(&mut self, now: Duration) {
        for entry in self.library.values_mut() {
            if let Some(piece) = entry.piece.as_mut() {
                piece.tick(now);
            }
        }
        if let Err(error) = self.finish_ready_transition() {
            tracing::warn!(%error, "piece switch failed to start its target");
        }
    }

    fn finish_ready_transition(&mut self) -> Result<()> {
        let ready = self
            .transition
            .as_ref()
            .is_some_and(|t| t.fade.is_settled());
        if !ready {
            return Ok(());
        }

        if let Some(transition) = self.transition.take() {
            if transition.fade.is_cancelled() {
                transition.handle.settle(TaskOutcome::Cancelled);
                return Ok(());
            }
            if let Err(error) = self.install(transition.target, &transition.handle) {
                transition.handle.settle(TaskOutcome::Cancelled);
                return Err(error);
            }
        }
        Ok(())
    }

    /// Stop everything except the target, then build and start the target
    fn install(&mut self, target: Option<String>, handle: &TaskHandle) -> Result<()> {
        for (id, entry) in &mut self.library {
            if target.as_deref() != Some(id.as_str()) {
                if let Some(piece) = entry.piece.as_mut() {
                    piece.stop();
                }
            }
        }

        self.now_playing = target.clone();
        if let Some(id) = target {
            let volume = self.master_volume;
            let muted = self.muted;
            if let Some(piece) = self.piece_mut(&id) {
                piece.set_volume(volume);
                if muted {
                    piece.mute();
                } else {
                    piece.unmute();
                }
                piece.play()?;
            }
            tracing::debug!(piece = %id, "now playing");
        }

        handle.settle(TaskOutcome::Completed);
        Ok(())
    }

    /// Drop a pending transition, cancelling its fade and its handle
    fn cancel_transition(&mut self) {
        if let Some(transition) = self.transition.take() {
            let priority = self.config.switch_priority;
            if let Some(id) = self.now_playing.clone() {
                if let Some(piece) = self.built_mut(&id) {
                    piece.cancel_fade(priority);
                }
            }
            transition.handle.settle(TaskOutcome::Cancelled);
        }
    }

    /// Set the master volume and propagate it to the active piece
    pub fn set_master_volume(&mut self, gain: f32) {
        self.master_volume = gain.clamp(0.0, 1.0);
        let volume = self.master_volume;
        if let Some(id) = self.now_playing.clone() {
            if let Some(piece) = self.built_mut(&id) {
                // A ramp in flight owns the gain; it will land where it lands
                if !piece.is_fading() {
                    piece.set_volume(volume);
                }
            }
        }
    }

    /// Mute every built piece, keeping logical gains
    pub fn mute(&mut self) {
        self.muted = true;
        for entry in self.library.values_mut() {
            if let Some(piece) = entry.piece.as_mut() {
                piece.mute();
            }
        }
    }

    /// Unmute every built piece
    pub fn unmute(&mut self) {
        self.muted = false;
        for entry in self.library.values_mut() {
            if let Some(piece) = entry.piece.as_mut() {
                piece.unmute();
            }
        }
    }

    /// Borrow a piece, building it on first access
    pub fn piece_mut(&mut self, id: &str) -> Option<&mut Playable> {
        let entry = self.library.get_mut(id)?;
        if entry.piece.is_none() {
            if let Some(factory) = entry.factory.take() {
                entry.piece = Some(factory());
            }
        }
        entry.piece.as_mut()
    }

    /// Borrow a piece only if it has already been built
    fn built_mut(&mut self, id: &str) -> Option<&mut Playable> {
        self.library.get_mut(id).and_then(|e| e.piece.as_mut())
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("pieces", &self.library.len())
            .field("now_playing", &self.now_playing)
            .field("transitioning", &self.transition.is_some())
            .field("master_volume", &self.master_volume)
            .field("muted", &self.muted)
            .finish()
    }
}
