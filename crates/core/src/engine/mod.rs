//! The frame loop: one poll of the hand tracker per tick, then detection,
//! resolution, arbitration and synthesis, all on the calling thread.
//!
//! [`Session`] owns both external resources. [`Session::end`] (or dropping the
//! session) stops polling, stops the beat timer, releases the tracker and
//! then disposes the audio backend, in that order. Once ended nothing reaches
//! the backend again, not even a frame handed in late.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, trace, warn};

use crate::{
    arbiter::{ArbiterDecision, NoteArbiter},
    audio::{AudioBackend, AudioEngine},
    config::AppConfig,
    gesture::{FingerKey, PressDetector},
    mapping::AssignmentTable,
    render::RenderSink,
    resolver::resolve,
    scale::{Octave, ScaleTable, SwaraVariant},
    session::{SessionSnapshot, SessionState, TriggerPosition},
    timeline::{BeatTick, BeatTimer},
    tracking::{HandTracker, LandmarkFrame, PollOutcome},
    Result, SwaraError,
};

/// Cloneable flag that asks a running session to stop at its next tick.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A note that made it all the way to the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayedNote {
    pub key: FingerKey,
    pub variant: SwaraVariant,
    pub octave: Octave,
    /// `None` if the backend dropped the call.
    pub frequency_hz: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The tracker had nothing new this tick.
    NotReady,
    Frame(Vec<PlayedNote>),
    /// The tracker will never produce another frame.
    Closed,
    /// The session was cancelled or has ended.
    Stopped,
}

/// Totals reported when [`Session::run`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub frames: u64,
    pub notes: u64,
    pub score: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Ended,
}

/// A play session bound to one tracker and one audio backend.
pub struct Session<T: HandTracker, B: AudioBackend> {
    tracker: T,
    audio: AudioEngine<B>,
    table: ScaleTable,
    assignments: AssignmentTable,
    detector: PressDetector,
    arbiter: NoteArbiter,
    state: SessionState,
    beat: BeatTimer,
    drone_octave: Octave,
    frame_interval: Duration,
    cancel: CancellationToken,
    phase: Phase,
}

impl<T: HandTracker, B: AudioBackend> Session<T, B> {
    /// Validates `config`, brings up the tracker and then the audio backend.
    ///
    /// Either initialization failing is fatal: whatever was already acquired
    /// is released and the error is returned without retrying.
    pub fn start(
        mut tracker: T,
        backend: B,
        config: &AppConfig,
        table: ScaleTable,
    ) -> Result<Self> {
        let mut config = config.clone();
        config.validate(&table)?;

        let assignments = if config.assignments.is_empty() {
            AssignmentTable::traditional()
        } else {
            AssignmentTable::from_descriptors(&config.assignments)?
        };
        let raga = table
            .raga(&config.session.raga)
            .cloned()
            .ok_or_else(|| SwaraError::msg(format!("unknown raga `{}`", config.session.raga)))?;
        let tala = table
            .tala(&config.session.tala)
            .cloned()
            .ok_or_else(|| SwaraError::msg(format!("unknown tala `{}`", config.session.tala)))?;

        let engine = &config.engine;
        let mut audio = AudioEngine::with_settings(
            backend,
            engine.base_pitch_hz,
            config.voices,
            engine.note_length,
        );

        tracker.initialize()?;
        if let Err(err) = audio.initialize() {
            tracker.release();
            audio.dispose();
            return Err(err);
        }

        let mut state = SessionState::new(raga, tala, config.session.octave);
        state.set_drone_volume_db(config.session.drone_volume_db);

        let mut session = Self {
            tracker,
            audio,
            table,
            assignments,
            detector: PressDetector::new(engine.trigger_threshold),
            arbiter: NoteArbiter::new(engine.cooldown(), engine.reward),
            state,
            beat: BeatTimer::new(engine.beat_interval()),
            drone_octave: config.session.drone_octave,
            frame_interval: engine.frame_interval(),
            cancel: CancellationToken::new(),
            phase: Phase::Running,
        };

        if config.session.drone_enabled {
            session.set_drone(true);
        }
        session.beat.start(Instant::now());

        info!(
            raga = %session.state.raga().name,
            tala = %session.state.tala().name,
            octave = session.state.octave().number(),
            "session started"
        );
        Ok(session)
    }

    /// Handle that stops [`run`](Self::run) from another thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// False once cancelled or ended.
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running && !self.cancel.is_cancelled()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current finger states.
    pub fn detector(&self) -> &PressDetector {
        &self.detector
    }

    pub fn audio(&self) -> &AudioEngine<B> {
        &self.audio
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn table(&self) -> &ScaleTable {
        &self.table
    }

    /// One loop iteration: a single non-blocking tracker poll.
    pub fn step(&mut self, now: Instant) -> StepOutcome {
        if !self.is_running() {
            return StepOutcome::Stopped;
        }

        if let Some(ticks) = self.beat.poll(now) {
            let tick = BeatTick::at(ticks, self.state.tala());
            self.state.set_beat(tick.beat);
        }

        match self.tracker.poll() {
            PollOutcome::NotReady => {
                trace!("tracker not ready");
                StepOutcome::NotReady
            }
            PollOutcome::Closed => StepOutcome::Closed,
            PollOutcome::Ready(frame) => StepOutcome::Frame(self.process_frame(&frame, now)),
        }
    }

    /// Runs one landmark frame through the pipeline.
    ///
    /// Rising edges are handled independently in detection order. Ignored
    /// once the session has ended.
    pub fn process_frame(&mut self, frame: &LandmarkFrame, now: Instant) -> Vec<PlayedNote> {
        if self.phase == Phase::Ended {
            trace!("frame delivered after session end");
            return Vec::new();
        }

        let mut played = Vec::new();
        for key in self.detector.update_frame(frame) {
            let Some(degree) = self.assignments.swara_for(key) else {
                continue;
            };

            let resolution = resolve(degree, self.state.raga());
            match self.arbiter.arbitrate(resolution, &mut self.state, now) {
                ArbiterDecision::Accepted(onset) => {
                    let frequency_hz = self.audio.play(onset);
                    if let Some(hand) = frame.hand(key.hand) {
                        let tip = hand.point(key.finger.tip());
                        self.state.set_trigger(TriggerPosition {
                            x: tip.x,
                            y: tip.y,
                            variant: onset.variant,
                        });
                    }
                    played.push(PlayedNote {
                        key,
                        variant: onset.variant,
                        octave: onset.octave,
                        frequency_hz,
                    });
                }
                ArbiterDecision::Suppressed => {
                    trace!(swara = %degree, raga = %self.state.raga().name, "swara not in raga");
                }
                ArbiterDecision::CoolingDown { .. } => {}
            }
        }
        played
    }

    /// Renderer view. Consumes the one-shot trigger cue.
    pub fn snapshot(&mut self) -> SessionSnapshot {
        self.state.snapshot(&self.detector)
    }

    /// Polls once per frame interval until cancelled or the tracker closes,
    /// presenting a snapshot to `sink` after every tick.
    pub fn run<S: RenderSink + ?Sized>(&mut self, sink: &mut S) -> Result<RunSummary> {
        if self.phase == Phase::Ended {
            return Err(SwaraError::SessionEnded);
        }

        let mut summary = RunSummary::default();
        loop {
            let outcome = self.step(Instant::now());
            summary.ticks += 1;
            match outcome {
                StepOutcome::Stopped | StepOutcome::Closed => break,
                StepOutcome::NotReady => {}
                StepOutcome::Frame(notes) => {
                    summary.frames += 1;
                    summary.notes += notes.len() as u64;
                }
            }
            let snapshot = self.snapshot();
            sink.present(&snapshot);
            thread::sleep(self.frame_interval);
        }

        summary.score = self.state.score();
        Ok(summary)
    }

    /// Selects a raga by key. Unknown keys keep the current raga.
    pub fn set_raga(&mut self, key: &str) -> bool {
        self.state.set_raga(&self.table, key)
    }

    /// Selects a tala by key. Unknown keys keep the current tala.
    pub fn set_tala(&mut self, key: &str) -> bool {
        self.state.set_tala(&self.table, key)
    }

    /// Accepts 3, 4 or 5.
    pub fn set_octave(&mut self, octave: u8) -> bool {
        let changed = self.state.set_octave(octave);
        if changed {
            info!(octave, "octave selected");
        }
        changed
    }

    /// Turns the tonic/fifth drone on or off.
    pub fn set_drone(&mut self, enabled: bool) {
        if self.phase == Phase::Ended {
            return;
        }
        if enabled {
            if self.audio.start_drone(self.drone_octave) {
                self.state.set_drone_enabled(true);
                self.audio.set_drone_volume_db(self.state.drone_volume_db());
            } else {
                warn!("drone requested but audio backend is not initialized");
            }
        } else {
            self.audio.stop_drone();
            self.state.set_drone_enabled(false);
        }
    }

    /// Sets the drone gain, clamped to `[-60, 0]` dB.
    pub fn set_drone_volume_db(&mut self, db: f32) {
        let db = self.state.set_drone_volume_db(db);
        if self.phase == Phase::Running {
            self.audio.set_drone_volume_db(db);
        }
    }

    /// Clears score and progress and restarts the tala cycle from `now`.
    /// Raga, tala and octave are kept.
    pub fn restart(&mut self, now: Instant) {
        info!("session restarted");
        self.state.restart();
        if self.phase == Phase::Running {
            self.beat.start(now);
        }
    }

    /// Tears the session down. Safe to call more than once.
    pub fn end(&mut self) {
        if self.phase == Phase::Ended {
            return;
        }
        self.cancel.cancel();
        self.phase = Phase::Ended;
        self.beat.stop();
        self.tracker.release();
        self.audio.dispose();
        info!(
            score = self.state.score(),
            notes = self.state.notes_played(),
            "session ended"
        );
    }
}

impl<T: HandTracker, B: AudioBackend> Drop for Session<T, B> {
    fn drop(&mut self) {
        self.end();
    }
}

impl<T: HandTracker, B: AudioBackend> std::fmt::Debug for Session<T, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase)
            .field("raga", &self.state.raga().key)
            .field("octave", &self.state.octave())
            .field("score", &self.state.score())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{AudioCommand, NoteLength, RecordingBackend, Voice},
        gesture::Finger,
        tracking::{HandLandmarks, Handedness, ScriptedTracker},
    };

    fn session(frames: Vec<Option<LandmarkFrame>>) -> Session<ScriptedTracker, RecordingBackend> {
        Session::start(
            ScriptedTracker::new(frames),
            RecordingBackend::new(),
            &AppConfig::default(),
            ScaleTable::builtin(),
        )
        .unwrap()
    }

    fn pinch(hand: Handedness, finger: Finger) -> LandmarkFrame {
        LandmarkFrame::new(vec![HandLandmarks::open(hand).pinching(finger)])
    }

    #[test]
    fn unassigned_finger_plays_nothing() {
        let mut session = session(Vec::new());
        let frame = pinch(Handedness::Right, Finger::Pinky);
        let played = session.process_frame(&frame, Instant::now());
        assert!(played.is_empty());
        assert!(session
            .detector()
            .is_pressed(FingerKey::new(Handedness::Right, Finger::Pinky)));
    }

    #[test]
    fn suppressed_swara_scores_nothing() {
        let mut session = session(Vec::new());
        assert!(session.set_raga("mohanam"));
        // Left index carries Ma, which Mohanam omits.
        let played = session.process_frame(&pinch(Handedness::Left, Finger::Index), Instant::now());
        assert!(played.is_empty());
        assert_eq!(session.state().score(), 0);
        assert_eq!(session.audio().backend().log().notes().unwrap(), 0);
    }

    #[test]
    fn two_fingers_in_one_frame_both_play() {
        let mut session = session(Vec::new());
        let frame = LandmarkFrame::new(vec![HandLandmarks::open(Handedness::Right)
            .pinching(Finger::Index)
            .pinching(Finger::Middle)]);

        let played = session.process_frame(&frame, Instant::now());
        let variants: Vec<SwaraVariant> = played.iter().map(|note| note.variant).collect();
        assert_eq!(variants, vec![SwaraVariant::Pa, SwaraVariant::Da1]);
        assert_eq!(session.state().notes_played(), 2);
    }

    #[test]
    fn trigger_position_is_the_fingertip() {
        let mut session = session(Vec::new());
        let frame = pinch(Handedness::Left, Finger::Pinky);
        let tip = *frame.hands[0].point(Finger::Pinky.tip());
        session.process_frame(&frame, Instant::now());

        let snapshot = session.snapshot();
        let trigger = snapshot.trigger.unwrap();
        assert_eq!((trigger.x, trigger.y), (tip.x, tip.y));
        assert_eq!(trigger.variant, SwaraVariant::Sa);
        assert!(session.snapshot().trigger.is_none());
    }

    #[test]
    fn step_reports_not_ready_and_closed() {
        let mut session = session(vec![None, Some(LandmarkFrame::empty())]);
        let now = Instant::now();
        assert_eq!(session.step(now), StepOutcome::NotReady);
        assert_eq!(session.step(now), StepOutcome::Frame(Vec::new()));
        assert_eq!(session.step(now), StepOutcome::Closed);
    }

    #[test]
    fn cancelled_session_stops_polling() {
        let mut session = session(vec![Some(pinch(Handedness::Left, Finger::Ring))]);
        session.cancellation_token().cancel();
        assert_eq!(session.step(Instant::now()), StepOutcome::Stopped);
        assert_eq!(session.tracker().remaining(), 1);
    }

    #[test]
    fn drone_toggle_reaches_backend() {
        let mut session = session(Vec::new());
        session.set_drone(true);
        session.set_drone_volume_db(-30.0);
        session.set_drone(false);

        let commands = session.audio().backend().log().commands().unwrap();
        assert!(matches!(commands[0], AudioCommand::StartDrone { .. }));
        assert_eq!(commands[1], AudioCommand::SetDroneVolume(-20.0));
        assert_eq!(commands[2], AudioCommand::SetDroneVolume(-30.0));
        assert_eq!(commands[3], AudioCommand::StopDrone);
        assert!(!session.state().drone_enabled());
    }

    /// Tracker that only records its lifecycle calls.
    #[derive(Default)]
    struct LifecycleTracker {
        initialized: Arc<AtomicBool>,
        released: Arc<AtomicBool>,
    }

    impl HandTracker for LifecycleTracker {
        fn initialize(&mut self) -> Result<()> {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn poll(&mut self) -> PollOutcome {
            PollOutcome::NotReady
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    /// Backend whose device is still warming up: initialization succeeds
    /// but nothing is accepted yet.
    struct WarmingBackend;

    impl AudioBackend for WarmingBackend {
        fn initialize(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            false
        }

        fn play_note(&mut self, _voice: Voice, _frequency_hz: f32, _length: NoteLength) {}

        fn start_drone(&mut self, _tonic_hz: f32, _fifth_hz: f32, _fifth_delay: Duration) {}

        fn stop_drone(&mut self) {}

        fn set_drone_volume_db(&mut self, _db: f32) {}

        fn dispose(&mut self) {}
    }

    #[test]
    fn failing_audio_releases_tracker() {
        let tracker = LifecycleTracker::default();
        let released = tracker.released.clone();
        let backend = RecordingBackend::failing("device busy");
        let log = backend.log();

        let config = AppConfig::default();
        let result = Session::start(tracker, backend, &config, ScaleTable::builtin());

        assert!(matches!(result, Err(SwaraError::AudioInit(_))));
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(log.commands().unwrap(), vec![AudioCommand::Dispose]);
    }

    #[test]
    fn invalid_config_acquires_nothing() {
        let tracker = LifecycleTracker::default();
        let initialized = tracker.initialized.clone();
        let backend = RecordingBackend::new();
        let log = backend.log();
        let mut config = AppConfig::default();
        config.session.tala = "jhampa".to_string();

        let result = Session::start(tracker, backend, &config, ScaleTable::builtin());

        assert!(result.is_err());
        assert!(!initialized.load(Ordering::SeqCst));
        assert!(log.commands().unwrap().is_empty());
    }

    #[test]
    fn drone_flag_follows_the_backend() {
        let mut session = Session::start(
            ScriptedTracker::new(Vec::new()),
            WarmingBackend,
            &AppConfig::default(),
            ScaleTable::builtin(),
        )
        .unwrap();

        session.set_drone(true);
        assert!(!session.state().drone_enabled());
        assert!(!session.snapshot().drone_enabled);
    }

    #[test]
    fn restart_begins_a_new_tala_cycle() {
        let mut session = session(Vec::new());
        let start = Instant::now();

        session.step(start + Duration::from_millis(1600));
        assert!(session.state().beat() >= 3);

        session.restart(start + Duration::from_millis(1600));
        assert_eq!(session.state().beat(), 0);

        session.step(start + Duration::from_millis(2100));
        assert_eq!(session.state().beat(), 1);
    }

    #[test]
    fn run_drains_script_and_reports_totals() {
        let frames = vec![
            Some(pinch(Handedness::Left, Finger::Ring)),
            None,
            Some(LandmarkFrame::empty()),
            Some(pinch(Handedness::Right, Finger::Ring)),
        ];
        let mut session = session(frames);
        let mut presented = 0;
        let summary = session.run(&mut |_: &SessionSnapshot| presented += 1).unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.notes, 2);
        assert_eq!(summary.score, 20);
        assert_eq!(presented, 4);
    }
}
