//! The shuffled piece: sequencer, voices, and lifecycle in one entity
//!
//! A [`Shuffle`] owns an optional intro and a list of section sets. The
//! [`Sequencer`](crate::sequencer::Sequencer) decides which section sounds
//! next; this module wires that decision to the platform tracks, watches
//! section terminals and the finale deadline from `tick`, and publishes the
//! piece's lifecycle on its [`EventBus`].

use crate::error::{PlaybackError, Result};
use crate::events::{EventBus, PieceEvent};
use crate::fade::{FadeController, FadeRequest};
use crate::handle::TaskHandle;
use crate::sequencer::{PlayCursor, Sequencer};
use crate::track::{Track, Voice};
use crate::types::{EndScope, PlayState};
use std::time::Duration;

/// One playable fragment handed in by the caller
pub struct SectionSpec {
    /// Platform track for this section
    pub track: Box<dyn Track>,

    /// Overlap point: once the playhead passes this, the next section may
    /// start while this one keeps ringing. Only honored when the piece is
    /// configured with overlaps.
    pub overlap_after: Option<Duration>,
}

impl SectionSpec {
    /// A section with no overlap point
    pub fn new(track: Box<dyn Track>) -> Self {
        Self {
            track,
            overlap_after: None,
        }
    }

    /// Set the overlap point
    pub fn overlap_after(mut self, at: Duration) -> Self {
        self.overlap_after = Some(at);
        self
    }
}

/// Piece-level configuration
#[derive(Debug, Clone, Copy)]
pub struct ShuffleConfig {
    /// When the piece stops on its own
    pub end_scope: EndScope,

    /// Whether section terminals are overlap points rather than track ends
    pub has_overlaps: bool,

    /// How far ahead of the final section's terminal to announce the finale
    pub finale_lead: Option<Duration>,

    /// Initial logical gain
    pub gain: f32,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            end_scope: EndScope::Loop,
            has_overlaps: false,
            finale_lead: None,
            gain: 1.0,
        }
    }
}

/// State changes listeners may request during event dispatch
///
/// Handlers never get `&mut Shuffle` (the bus is borrowed during dispatch);
/// they record requests here and the piece applies them once delivery
/// finishes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Reactions {
    stop: bool,
    pause: bool,
    end: bool,
}

impl Reactions {
    /// Ask the piece to stop after dispatch
    pub fn request_stop(&mut self) {
        self.stop = true;
    }

    /// Ask the piece to pause after dispatch
    pub fn request_pause(&mut self) {
        self.pause = true;
    }

    /// Ask the piece to end: emit [`PieceEvent::End`], then stop
    pub fn request_end(&mut self) {
        self.end = true;
    }
}

struct Section {
    voice: Voice,
    overlap_after: Option<Duration>,
}

impl Section {
    fn from_spec(spec: SectionSpec, gain: f32) -> Self {
        Self {
            voice: Voice::with_gain(spec.track, gain),
            overlap_after: spec.overlap_after,
        }
    }
}

/// A piece that shuffles through its section sets
pub struct Shuffle {
    intro: Option<Section>,
    sets: Vec<Vec<Section>>,
    sequencer: Sequencer,
    config: ShuffleConfig,
    state: PlayState,
    events: EventBus<PieceEvent, Reactions>,
    fader: FadeController,
    gain: f32,
    muted: bool,
    finale_at: Option<Duration>,
    finale_fired: bool,
    terminal_fired: bool,
}

impl Shuffle {
    /// Build a piece over the given section sets
    pub fn new(sets: Vec<Vec<SectionSpec>>, config: ShuffleConfig) -> Self {
        Self::build(None, sets, config)
    }

    /// Build a piece that plays an intro before the first pick
    pub fn with_intro(
        intro: SectionSpec,
        sets: Vec<Vec<SectionSpec>>,
        config: ShuffleConfig,
    ) -> Self {
        Self::build(Some(intro), sets, config)
    }

    fn build(intro: Option<SectionSpec>, sets: Vec<Vec<SectionSpec>>, config: ShuffleConfig) -> Self {
        let gain = config.gain.clamp(0.0, 1.0);
        let set_sizes: Vec<usize> = sets.iter().map(Vec::len).collect();

        let mut piece = Self {
            intro: intro.map(|spec| Section::from_spec(spec, gain)),
            sets: sets
                .into_iter()
                .map(|set| {
                    set.into_iter()
                        .map(|spec| Section::from_spec(spec, gain))
                        .collect()
                })
                .collect(),
            sequencer: Sequencer::new(&set_sizes),
            config,
            state: PlayState::Stopped,
            events: EventBus::new(),
            fader: FadeController::new(),
            gain,
            muted: false,
            finale_at: None,
            finale_fired: false,
            terminal_fired: false,
        };
        piece.install_auto_stop();
        piece
    }

    /// Bind the end scope to the matching lifecycle event. Keyed so a
    /// rebuild of the piece's listeners cannot double-register it.
    fn install_auto_stop(&mut self) {
        let scope = self.config.end_scope;
        self.events
            .subscribe_replacing("auto-stop", move |event, reactions: &mut Reactions| {
                let ends = match scope {
                    EndScope::Section => matches!(event, PieceEvent::SectionEnd { .. }),
                    EndScope::Cycle => matches!(event, PieceEvent::CycleEnd),
                    EndScope::FullCycle => matches!(event, PieceEvent::FullCycle),
                    EndScope::Loop => false,
                };
                if ends {
                    reactions.request_end();
                }
            });
    }

    /// Subscribe to the piece's lifecycle events
    pub fn events_mut(&mut self) -> &mut EventBus<PieceEvent, Reactions> {
        &mut self.events
    }

    /// Current play state
    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Logical gain
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Check mute state
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Whether the section at the cursor is the final one before auto-stop
    pub fn is_last_before_stop(&self) -> bool {
        self.sequencer.is_last_before_stop(self.config.end_scope)
    }

    /// Emit an event, then apply whatever the listeners requested
    fn emit(&mut self, event: PieceEvent) {
        let mut reactions = Reactions::default();
        self.events.emit(&event, &mut reactions);

        if reactions.end {
            let mut after_end = Reactions::default();
            self.events.emit(&PieceEvent::End, &mut after_end);
            self.stop();
        } else if reactions.stop {
            self.stop();
        } else if reactions.pause {
            self.pause();
        }
    }

    /// Start (or resume) the piece.
    ///
    /// Resuming from pause continues the current section. Starting from
    /// stopped plays the intro when one exists, otherwise advances straight
    /// into the first pick.
    pub fn play(&mut self) -> Result<()> {
        if self.sets.is_empty() || self.sets.iter().any(Vec::is_empty) {
            return Err(PlaybackError::EmptySections);
        }

        match self.state {
            PlayState::Playing => Ok(()),
            PlayState::Paused => {
                self.state = PlayState::Playing;
                if let Some(voice) = self.current_voice_mut() {
                    voice.play();
                }
                self.emit(PieceEvent::Play);
                Ok(())
            }
            PlayState::Stopped => {
                self.state = PlayState::Playing;
                self.emit(PieceEvent::Play);
                if self.state != PlayState::Playing {
                    return Ok(());
                }
                if self.intro.is_some() {
                    self.sequencer.begin_intro();
                    self.start_current();
                } else {
                    self.advance();
                }
                Ok(())
            }
        }
    }

    /// Pause the current section in place
    pub fn pause(&mut self) {
        if self.state != PlayState::Playing {
            return;
        }
        self.state = PlayState::Paused;
        if let Some(voice) = self.current_voice_mut() {
            voice.pause();
        }
        self.emit(PieceEvent::Pause);
    }

    /// Stop every voice, cancel fades, and reset the sequencer
    pub fn stop(&mut self) {
        if self.state == PlayState::Stopped {
            return;
        }
        tracing::debug!("stopping piece");
        self.state = PlayState::Stopped;
        self.fader.cancel(i32::MAX);
        if let Some(intro) = &mut self.intro {
            intro.voice.stop();
        }
        for set in &mut self.sets {
            for section in set {
                section.voice.stop();
            }
        }
        self.sequencer.reset();
        self.finale_at = None;
        self.finale_fired = false;
        self.terminal_fired = false;
        self.emit(PieceEvent::Stop);
    }

    /// Mute every voice, keeping the logical gain
    pub fn mute(&mut self) {
        if self.muted {
            return;
        }
        self.muted = true;
        if let Some(intro) = &mut self.intro {
            intro.voice.mute();
        }
        for set in &mut self.sets {
            for section in set {
                section.voice.mute();
            }
        }
        self.emit(PieceEvent::Mute);
    }

    /// Unmute every voice, restoring the logical gain
    pub fn unmute(&mut self) {
        if !self.muted {
            return;
        }
        self.muted = false;
        if let Some(intro) = &mut self.intro {
            intro.voice.unmute();
        }
        for set in &mut self.sets {
            for section in set {
                section.voice.unmute();
            }
        }
        self.emit(PieceEvent::Unmute);
    }

    /// Set the piece's logical gain and propagate it
    pub fn set_volume(&mut self, gain: f32) {
        self.apply_gain(gain);
        self.emit(PieceEvent::Volume { gain: self.gain });
    }

    /// Request a piece-level fade.
    ///
    /// The ramp is advanced by [`tick`](Self::tick) and propagated to every
    /// voice that is not running its own fade.
    pub fn fade(&mut self, request: FadeRequest, now: Duration) -> TaskHandle {
        let handle = self.fader.begin(request, self.gain, now);
        if handle.is_completed() {
            self.apply_gain(request.to);
        }
        handle
    }

    /// Cancel the in-flight piece fade if its priority is at most `priority`
    pub fn cancel_fade(&mut self, priority: i32) {
        self.fader.cancel(priority);
    }

    /// Check if a piece-level fade is in flight
    pub fn is_fading(&self) -> bool {
        self.fader.is_fading()
    }

    fn apply_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
        let target = self.gain;
        if let Some(intro) = &mut self.intro {
            if !intro.voice.is_fading() {
                intro.voice.set_gain(target);
            }
        }
        for set in &mut self.sets {
            for section in set {
                if !section.voice.is_fading() {
                    section.voice.set_gain(target);
                }
            }
        }
    }

    /// Advance the piece by one host tick.
    ///
    /// Drives the piece fade and every voice fade, fires the finale warning,
    /// detects section terminals, and chains into the next pick.
    pub fn tick(&mut self, now: Duration) {
        if let Some(step) = self.fader.step(now) {
            self.apply_gain(step.gain);
        }
        if let Some(intro) = &mut self.intro {
            intro.voice.tick(now);
        }
        for set in &mut self.sets {
            for section in set {
                section.voice.tick(now);
            }
        }

        if self.state != PlayState::Playing {
            return;
        }

        if !self.finale_fired {
            if let (Some(at), Some(position)) = (self.finale_at, self.current_position()) {
                if position >= at {
                    self.finale_fired = true;
                    self.emit(PieceEvent::Finale);
                    if self.state != PlayState::Playing {
                        return;
                    }
                }
            }
        }

        if !self.terminal_fired && self.current_terminal_reached() {
            self.terminal_fired = true;
            self.on_terminal();
        }
    }

    /// Whether the current section's terminal point has been passed
    fn current_terminal_reached(&self) -> bool {
        let Some(section) = self.current_section() else {
            return false;
        };
        match (self.config.has_overlaps, section.overlap_after) {
            (true, Some(at)) => section.voice.position() >= at,
            _ => section.voice.is_finished(),
        }
    }

    fn on_terminal(&mut self) {
        match self.sequencer.cursor() {
            PlayCursor::Idle => {}
            PlayCursor::Intro => {
                // The intro chains into the first pick without section events
                if !self.config.has_overlaps {
                    if let Some(intro) = &mut self.intro {
                        intro.voice.stop();
                    }
                }
                self.advance();
            }
            PlayCursor::Section { set, section } => {
                // Without overlaps the terminal is the natural end: release
                // the finished voice. With overlaps it keeps ringing.
                if !self.config.has_overlaps {
                    if let Some(voice) = self.current_voice_mut() {
                        voice.stop();
                    }
                }
                let last_set = set + 1 == self.sequencer.num_sets();
                self.emit(PieceEvent::SectionEnd { set, section });
                if last_set && self.state != PlayState::Stopped {
                    self.emit(PieceEvent::CycleEnd);
                }
                if self.state == PlayState::Playing {
                    self.advance();
                }
            }
        }
    }

    /// Pick and start the next section.
    ///
    /// A wrap over an exhausted grid reinstates visitation and announces the
    /// full-cycle boundary first; listeners (the auto-stop binding included)
    /// may end the piece right there.
    fn advance(&mut self) {
        if self.sequencer.wrap_exhausted() {
            self.emit(PieceEvent::FullCycle);
            if self.state != PlayState::Playing {
                return;
            }
            self.sequencer.reset_visitation();
        }

        let mut rng = rand::thread_rng();
        let Some((set, section)) = self.sequencer.advance_pick(&mut rng) else {
            return;
        };
        tracing::debug!(set, section, "advancing to next section");

        if set == 0 {
            self.emit(PieceEvent::CycleBegin);
            if self.state != PlayState::Playing {
                return;
            }
        }
        self.emit(PieceEvent::SectionBegin { set, section });
        if self.state != PlayState::Playing {
            return;
        }

        self.start_current();
    }

    /// Start the voice at the cursor and arm its deadlines
    fn start_current(&mut self) {
        let gain = self.gain;
        let muted = self.muted;
        // The finale is armed only on the run's final section, never on the
        // intro (an intro always chains into a pick).
        let arm_finale = match self.sequencer.cursor() {
            PlayCursor::Section { .. } => self.is_last_before_stop(),
            _ => false,
        };
        let finale_lead = self.config.finale_lead;

        let Some(voice) = self.current_voice_mut() else {
            return;
        };
        // A re-picked voice may still sit at its natural end (or be ringing
        // from a previous cycle); restart it from the top.
        voice.stop();
        voice.set_gain(gain);
        if muted {
            voice.mute();
        }
        voice.play();

        self.finale_at = match (finale_lead, arm_finale) {
            (Some(lead), true) => Some(self.current_duration().unwrap_or_default().saturating_sub(lead)),
            _ => None,
        };
        self.finale_fired = false;
        self.terminal_fired = false;
    }

    fn current_section(&self) -> Option<&Section> {
        match self.sequencer.cursor() {
            PlayCursor::Idle => None,
            PlayCursor::Intro => self.intro.as_ref(),
            PlayCursor::Section { set, section } => {
                self.sets.get(set).and_then(|s| s.get(section))
            }
        }
    }

    fn current_voice_mut(&mut self) -> Option<&mut Voice> {
        match self.sequencer.cursor() {
            PlayCursor::Idle => None,
            PlayCursor::Intro => self.intro.as_mut().map(|s| &mut s.voice),
            PlayCursor::Section { set, section } => self
                .sets
                .get_mut(set)
                .and_then(|s| s.get_mut(section))
                .map(|s| &mut s.voice),
        }
    }

    fn current_position(&self) -> Option<Duration> {
        self.current_section().map(|s| s.voice.position())
    }

    fn current_duration(&self) -> Option<Duration> {
        self.current_section().map(|s| s.voice.duration())
    }
}

impl std::fmt::Debug for Shuffle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shuffle")
            .field("state", &self.state)
            .field("cursor", &self.sequencer.cursor())
            .field("gain", &self.gain)
            .field("muted", &self.muted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::testing::{StubPhase, StubTrack};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn section(duration: Duration) -> (SectionSpec, StubTrack) {
        let stub = StubTrack::new(duration);
        (SectionSpec::new(Box::new(stub.clone())), stub)
    }

    type Log = Rc<RefCell<Vec<PieceEvent>>>;

    fn record_events(piece: &mut Shuffle) -> Log {
        let log: Log = Rc::default();
        let sink = Rc::clone(&log);
        piece
            .events_mut()
            .subscribe(move |event: &PieceEvent, _: &mut Reactions| {
                sink.borrow_mut().push(event.clone());
            });
        log
    }

    fn playing_count(stubs: &[StubTrack]) -> usize {
        stubs
            .iter()
            .filter(|s| s.state.borrow().phase == StubPhase::Playing)
            .count()
    }

    #[test]
    fn play_with_no_sections_is_an_error() {
        let mut piece = Shuffle::new(vec![], ShuffleConfig::default());
        assert!(matches!(piece.play(), Err(PlaybackError::EmptySections)));

        let (spec, _stub) = section(secs(5));
        let mut piece = Shuffle::new(vec![vec![spec], vec![]], ShuffleConfig::default());
        assert!(matches!(piece.play(), Err(PlaybackError::EmptySections)));
    }

    #[test]
    fn play_starts_exactly_one_section() {
        let (spec_a, stub_a) = section(secs(5));
        let (spec_b, stub_b) = section(secs(5));
        let mut piece = Shuffle::new(vec![vec![spec_a, spec_b]], ShuffleConfig::default());
        let log = record_events(&mut piece);

        piece.play().unwrap();

        assert_eq!(piece.state(), PlayState::Playing);
        assert_eq!(playing_count(&[stub_a, stub_b]), 1);

        let events = log.borrow();
        assert_eq!(events[0], PieceEvent::Play);
        assert_eq!(events[1], PieceEvent::CycleBegin);
        assert!(
            matches!(events[2], PieceEvent::SectionBegin { set: 0, section } if section < 2),
            "unexpected third event {:?}",
            events[2]
        );
    }

    #[test]
    fn section_end_chains_into_the_next_set() {
        let (spec_a, stub_a) = section(secs(4));
        let (spec_b, stub_b) = section(secs(4));
        let mut piece = Shuffle::new(vec![vec![spec_a], vec![spec_b]], ShuffleConfig::default());
        let log = record_events(&mut piece);

        piece.play().unwrap();
        assert_eq!(stub_a.state.borrow().phase, StubPhase::Playing);

        stub_a.advance(secs(4));
        piece.tick(secs(4));

        assert_eq!(stub_b.state.borrow().phase, StubPhase::Playing);
        assert!(log
            .borrow()
            .contains(&PieceEvent::SectionEnd { set: 0, section: 0 }));
        assert!(log
            .borrow()
            .contains(&PieceEvent::SectionBegin { set: 1, section: 0 }));
    }

    #[test]
    fn section_scope_auto_stops_after_one_section() {
        let (spec, stub) = section(secs(3));
        let config = ShuffleConfig {
            end_scope: EndScope::Section,
            ..ShuffleConfig::default()
        };
        let mut piece = Shuffle::new(vec![vec![spec]], config);
        let log = record_events(&mut piece);

        piece.play().unwrap();
        stub.advance(secs(3));
        piece.tick(secs(3));

        assert_eq!(piece.state(), PlayState::Stopped);
        assert_eq!(stub.state.borrow().phase, StubPhase::Idle);
        let events = log.borrow();
        let end_at = events.iter().position(|e| *e == PieceEvent::End).unwrap();
        let stop_at = events.iter().position(|e| *e == PieceEvent::Stop).unwrap();
        assert!(end_at < stop_at, "End must precede Stop: {:?}", *events);
    }

    #[test]
    fn cycle_scope_auto_stops_after_every_set_played_once() {
        let (spec_a, stub_a) = section(secs(2));
        let (spec_b, stub_b) = section(secs(2));
        let config = ShuffleConfig {
            end_scope: EndScope::Cycle,
            ..ShuffleConfig::default()
        };
        let mut piece = Shuffle::new(vec![vec![spec_a], vec![spec_b]], config);
        let log = record_events(&mut piece);

        piece.play().unwrap();
        stub_a.advance(secs(2));
        piece.tick(secs(2));
        assert_eq!(piece.state(), PlayState::Playing);

        stub_b.advance(secs(2));
        piece.tick(secs(4));

        assert_eq!(piece.state(), PlayState::Stopped);
        let events = log.borrow();
        assert!(events.contains(&PieceEvent::CycleEnd));
        assert!(events.contains(&PieceEvent::End));
    }

    #[test]
    fn full_cycle_scope_plays_every_section_before_stopping() {
        let (spec_a, stub_a) = section(secs(1));
        let (spec_b, stub_b) = section(secs(1));
        let config = ShuffleConfig {
            end_scope: EndScope::FullCycle,
            ..ShuffleConfig::default()
        };
        let mut piece = Shuffle::new(vec![vec![spec_a, spec_b]], config);
        let log = record_events(&mut piece);

        piece.play().unwrap();

        // Two sections in the single set: both must sound before the end
        let stubs = [stub_a, stub_b];
        let mut now = Duration::ZERO;
        for _ in 0..2 {
            for stub in &stubs {
                stub.advance(secs(1));
            }
            now += secs(1);
            piece.tick(now);
        }

        assert_eq!(piece.state(), PlayState::Stopped);
        assert_eq!(stubs[0].state.borrow().plays + stubs[1].state.borrow().plays, 2);
        assert!(log.borrow().contains(&PieceEvent::FullCycle));
        assert!(log.borrow().contains(&PieceEvent::End));
    }

    #[test]
    fn loop_scope_reinstates_visitation_and_keeps_playing() {
        let (spec, stub) = section(secs(1));
        let mut piece = Shuffle::new(vec![vec![spec]], ShuffleConfig::default());
        let log = record_events(&mut piece);

        piece.play().unwrap();

        let mut now = Duration::ZERO;
        for _ in 0..3 {
            stub.advance(secs(1));
            now += secs(1);
            piece.tick(now);
            // The single section is re-picked; natural end restarts it
            assert_eq!(piece.state(), PlayState::Playing);
        }

        let full_cycles = log
            .borrow()
            .iter()
            .filter(|e| **e == PieceEvent::FullCycle)
            .count();
        assert_eq!(full_cycles, 3);
        assert!(!log.borrow().contains(&PieceEvent::End));
    }

    #[test]
    fn overlap_point_starts_next_section_while_previous_rings() {
        let stub_a = StubTrack::new(secs(6));
        let spec_a = SectionSpec::new(Box::new(stub_a.clone())).overlap_after(secs(2));
        let (spec_b, stub_b) = section(secs(6));
        let config = ShuffleConfig {
            has_overlaps: true,
            ..ShuffleConfig::default()
        };
        let mut piece = Shuffle::new(vec![vec![spec_a], vec![spec_b]], config);

        piece.play().unwrap();
        stub_a.advance(secs(2));
        piece.tick(secs(2));

        // Both voices sound at once past the overlap point
        assert_eq!(stub_a.state.borrow().phase, StubPhase::Playing);
        assert_eq!(stub_b.state.borrow().phase, StubPhase::Playing);
    }

    #[test]
    fn finale_fires_ahead_of_the_final_terminal() {
        let (spec, stub) = section(secs(5));
        let config = ShuffleConfig {
            end_scope: EndScope::Cycle,
            finale_lead: Some(secs(1)),
            ..ShuffleConfig::default()
        };
        let mut piece = Shuffle::new(vec![vec![spec]], config);
        let log = record_events(&mut piece);

        piece.play().unwrap();
        stub.advance(secs(3));
        piece.tick(secs(3));
        assert!(!log.borrow().contains(&PieceEvent::Finale));

        stub.advance(secs(1));
        piece.tick(secs(4));
        assert!(log.borrow().contains(&PieceEvent::Finale));
        assert_eq!(piece.state(), PlayState::Playing);

        // Fires once, not on every subsequent tick
        piece.tick(secs(4) + Duration::from_millis(100));
        let finales = log
            .borrow()
            .iter()
            .filter(|e| **e == PieceEvent::Finale)
            .count();
        assert_eq!(finales, 1);
    }

    #[test]
    fn pause_and_resume_keep_the_current_section() {
        let (spec, stub) = section(secs(5));
        let mut piece = Shuffle::new(vec![vec![spec]], ShuffleConfig::default());
        let log = record_events(&mut piece);

        piece.play().unwrap();
        stub.advance(secs(2));
        piece.pause();

        assert_eq!(piece.state(), PlayState::Paused);
        assert_eq!(stub.state.borrow().phase, StubPhase::Paused);
        assert_eq!(stub.state.borrow().position, secs(2));

        piece.play().unwrap();
        assert_eq!(piece.state(), PlayState::Playing);
        assert_eq!(stub.state.borrow().phase, StubPhase::Playing);
        assert_eq!(stub.state.borrow().position, secs(2));
        assert!(log.borrow().contains(&PieceEvent::Pause));
    }

    #[test]
    fn intro_plays_before_the_first_pick() {
        let (intro_spec, intro_stub) = section(secs(2));
        let (spec, stub) = section(secs(5));
        let mut piece = Shuffle::with_intro(intro_spec, vec![vec![spec]], ShuffleConfig::default());
        let log = record_events(&mut piece);

        piece.play().unwrap();
        assert_eq!(intro_stub.state.borrow().phase, StubPhase::Playing);
        assert_eq!(stub.state.borrow().phase, StubPhase::Idle);
        assert!(!log
            .borrow()
            .iter()
            .any(|e| matches!(e, PieceEvent::SectionBegin { .. })));

        intro_stub.advance(secs(2));
        piece.tick(secs(2));
        assert_eq!(stub.state.borrow().phase, StubPhase::Playing);
        assert!(log.borrow().contains(&PieceEvent::CycleBegin));
    }

    #[test]
    fn listener_can_stop_the_piece_mid_advance() {
        let (spec, stub) = section(secs(5));
        let mut piece = Shuffle::new(vec![vec![spec]], ShuffleConfig::default());
        piece
            .events_mut()
            .subscribe(|event: &PieceEvent, reactions: &mut Reactions| {
                if matches!(event, PieceEvent::SectionBegin { .. }) {
                    reactions.request_stop();
                }
            });

        piece.play().unwrap();

        assert_eq!(piece.state(), PlayState::Stopped);
        assert_eq!(stub.state.borrow().phase, StubPhase::Idle);
    }

    #[test]
    fn volume_and_mute_propagate_to_voices() {
        let (spec, stub) = section(secs(5));
        let mut piece = Shuffle::new(vec![vec![spec]], ShuffleConfig::default());
        let log = record_events(&mut piece);

        piece.play().unwrap();
        piece.set_volume(0.4);
        assert_eq!(stub.state.borrow().gain, 0.4);
        assert!(log.borrow().contains(&PieceEvent::Volume { gain: 0.4 }));

        piece.mute();
        assert_eq!(stub.state.borrow().gain, 0.0);
        assert!(stub.state.borrow().muted);

        piece.unmute();
        assert_eq!(stub.state.borrow().gain, 0.4);
    }

    #[test]
    fn piece_fade_ramps_every_voice() {
        let (spec, stub) = section(secs(30));
        let mut piece = Shuffle::new(vec![vec![spec]], ShuffleConfig::default());

        piece.play().unwrap();
        let handle = piece.fade(FadeRequest::new(0.0, Duration::from_millis(200)), secs(0));

        piece.tick(Duration::from_millis(100));
        let mid = stub.state.borrow().gain;
        assert!(mid > 0.0 && mid < 1.0, "mid-ramp gain was {}", mid);

        piece.tick(Duration::from_millis(200));
        assert_eq!(stub.state.borrow().gain, 0.0);
        assert!(handle.is_completed());
        // Fading does not stop playback by itself
        assert_eq!(piece.state(), PlayState::Playing);
    }

    #[test]
    fn stop_resets_sequencer_state() {
        let (spec_a, stub_a) = section(secs(5));
        let (spec_b, _stub_b) = section(secs(5));
        let mut piece = Shuffle::new(vec![vec![spec_a, spec_b]], ShuffleConfig::default());

        piece.play().unwrap();
        piece.stop();
        assert_eq!(piece.state(), PlayState::Stopped);
        assert_eq!(stub_a.state.borrow().phase, StubPhase::Idle);

        // A fresh start is a full restart, not a resume
        piece.play().unwrap();
        assert_eq!(piece.state(), PlayState::Playing);
    }
}
