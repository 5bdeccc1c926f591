//! Medley - Procedural Music Sequencing
//!
//! Platform-agnostic sequencing engine for generative, layered music.
//!
//! This crate provides:
//! - Shuffled pieces: section sets sampled without replacement per cycle
//! - End scopes (stop after a section, a cycle, a full cycle, or loop)
//! - Overlapping section chaining and a finale early warning
//! - Priority-locked, cancellable gain fades with selectable curves
//! - A piece library with fade-out/fade-in switching between pieces
//! - Lifecycle events (section, cycle, finale, end) per piece
//!
//! # Architecture
//!
//! `medley-playback` is completely platform-agnostic: it never decodes or
//! outputs audio and owns no clock. Platforms implement [`Track`] for their
//! playable handles and drive the engine with `tick(now)` from whatever
//! timing source they have (an audio callback, a frame loop, a timer).
//!
//! # Example: A Shuffled Piece
//!
//! ```rust
//! use medley_playback::{
//!     EndScope, PieceEvent, Reactions, SectionSpec, Shuffle, ShuffleConfig, Track,
//! };
//! use std::time::Duration;
//!
//! // Implement Track for your platform's playable handle
//! #[derive(Clone)]
//! struct Clip {
//!     length: Duration,
//!     at: Duration,
//!     gain: f32,
//! }
//!
//! impl Track for Clip {
//!     fn play(&mut self) {}
//!     fn pause(&mut self) {}
//!     fn stop(&mut self) {
//!         self.at = Duration::ZERO;
//!     }
//!     fn set_gain(&mut self, gain: f32) {
//!         self.gain = gain;
//!     }
//!     fn gain(&self) -> f32 {
//!         self.gain
//!     }
//!     fn mute(&mut self) {}
//!     fn unmute(&mut self) {}
//!     fn duration(&self) -> Duration {
//!         self.length
//!     }
//!     fn position(&self) -> Duration {
//!         self.at
//!     }
//!     fn is_finished(&self) -> bool {
//!         self.at >= self.length
//!     }
//!     fn clone_handle(&self) -> Box<dyn Track> {
//!         Box::new(self.clone())
//!     }
//! }
//!
//! fn clip(secs: u64) -> SectionSpec {
//!     SectionSpec::new(Box::new(Clip {
//!         length: Duration::from_secs(secs),
//!         at: Duration::ZERO,
//!         gain: 1.0,
//!     }))
//! }
//!
//! // Two section sets; one pick from each per cycle, then stop
//! let config = ShuffleConfig {
//!     end_scope: EndScope::Cycle,
//!     ..ShuffleConfig::default()
//! };
//! let mut piece = Shuffle::new(vec![vec![clip(8), clip(9)], vec![clip(12)]], config);
//!
//! piece.events_mut().subscribe(|event: &PieceEvent, _: &mut Reactions| {
//!     if let PieceEvent::SectionBegin { set, section } = event {
//!         println!("now sounding: set {set}, section {section}");
//!     }
//! });
//!
//! piece.play()?;
//! piece.tick(Duration::from_millis(16));
//! # Ok::<(), medley_playback::PlaybackError>(())
//! ```
//!
//! # Example: Switching Pieces in a Session
//!
//! ```rust
//! use medley_playback::{
//!     Playable, PlaybackSession, SectionSpec, SessionConfig, Shuffle, ShuffleConfig, Track,
//! };
//! use std::time::Duration;
//!
//! # #[derive(Clone)]
//! # struct Clip {
//! #     length: Duration,
//! #     at: Duration,
//! #     gain: f32,
//! # }
//! # impl Track for Clip {
//! #     fn play(&mut self) {}
//! #     fn pause(&mut self) {}
//! #     fn stop(&mut self) {
//! #         self.at = Duration::ZERO;
//! #     }
//! #     fn set_gain(&mut self, gain: f32) {
//! #         self.gain = gain;
//! #     }
//! #     fn gain(&self) -> f32 {
//! #         self.gain
//! #     }
//! #     fn mute(&mut self) {}
//! #     fn unmute(&mut self) {}
//! #     fn duration(&self) -> Duration {
//! #         self.length
//! #     }
//! #     fn position(&self) -> Duration {
//! #         self.at
//! #     }
//! #     fn is_finished(&self) -> bool {
//! #         self.at >= self.length
//! #     }
//! #     fn clone_handle(&self) -> Box<dyn Track> {
//! #         Box::new(self.clone())
//! #     }
//! # }
//! # fn clip(secs: u64) -> SectionSpec {
//! #     SectionSpec::new(Box::new(Clip {
//! #         length: Duration::from_secs(secs),
//! #         at: Duration::ZERO,
//! #         gain: 1.0,
//! #     }))
//! # }
//! let mut session = PlaybackSession::new(SessionConfig::default());
//!
//! // Pieces are built lazily, the first time they are switched to
//! session.register("menu", move || {
//!     Playable::from(Shuffle::new(vec![vec![clip(8)]], ShuffleConfig::default()))
//! });
//!
//! let switched = session.switch_to("menu", Duration::ZERO)?;
//! assert!(switched.is_completed());
//!
//! // Host loop: drive fades, terminals, and pending switches
//! session.tick(Duration::from_millis(16));
//! # Ok::<(), medley_playback::PlaybackError>(())
//! ```

mod choice;
mod error;
mod events;
mod fade;
mod handle;
mod sequencer;
mod session;
mod shuffle;
mod track;
pub mod types;

// Public exports
pub use choice::{pick_uniform, pick_weighted};
pub use error::{PlaybackError, Result};
pub use events::{EventBus, PieceEvent, SubscriberId};
pub use fade::{FadeController, FadeCurve, FadeRequest, FadeStep, GAIN_EPSILON};
pub use handle::{TaskHandle, TaskOutcome};
pub use sequencer::{PlayCursor, Sequencer};
pub use session::{Playable, PlaybackSession, Single};
pub use shuffle::{Reactions, SectionSpec, Shuffle, ShuffleConfig};
pub use track::{Track, Voice};
pub use types::{EndScope, PlayState, SessionConfig};
