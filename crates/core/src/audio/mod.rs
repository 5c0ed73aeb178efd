//! Pitch computation and the synthesis control surface.
//!
//! The synthesizer itself sits behind [`AudioBackend`]. [`AudioEngine`] turns
//! accepted note onsets into frequencies, picks a voice, and drives the
//! tonic/fifth drone. Every call is fire-and-forget; while the backend is not
//! initialized they are silently dropped.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    arbiter::NoteOnset,
    scale::{Octave, SwaraVariant},
    session::clamp_drone_db,
    Result, SwaraError,
};

/// C4, the tonic used when nothing else is configured.
pub const DEFAULT_BASE_PITCH_HZ: f32 = 261.63;

/// Offset of the drone's fifth relative to its tonic.
pub const DRONE_FIFTH_DELAY: Duration = Duration::from_millis(100);

/// `base × ratio(variant) × 2^(octave − 4)`.
pub fn frequency(base_pitch_hz: f32, variant: SwaraVariant, octave: Octave) -> f32 {
    base_pitch_hz * variant.ratio() * octave.multiplier()
}

/// Musical duration token handed to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteLength {
    Whole,
    Half,
    Quarter,
    #[default]
    Eighth,
    Sixteenth,
}

impl NoteLength {
    /// Transport-style token, e.g. `8n` for an eighth note.
    pub fn token(self) -> &'static str {
        match self {
            NoteLength::Whole => "1n",
            NoteLength::Half => "2n",
            NoteLength::Quarter => "4n",
            NoteLength::Eighth => "8n",
            NoteLength::Sixteenth => "16n",
        }
    }
}

/// FM voice parameters. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoiceProfile {
    pub harmonicity: f32,
    pub modulation_index: f32,
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub volume_db: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Voice {
    Shared,
    Mandra,
    Madhya,
    Tara,
}

impl Voice {
    /// Timbre for this voice. The octave voices brighten and shorten as the
    /// register rises.
    pub fn profile(self) -> VoiceProfile {
        match self {
            Voice::Mandra => VoiceProfile {
                harmonicity: 2.0,
                modulation_index: 10.0,
                attack: 0.01,
                decay: 0.5,
                sustain: 0.1,
                release: 0.8,
                volume_db: -6.0,
            },
            Voice::Shared | Voice::Madhya => VoiceProfile {
                harmonicity: 1.5,
                modulation_index: 8.0,
                attack: 0.01,
                decay: 0.5,
                sustain: 0.1,
                release: 0.8,
                volume_db: -10.0,
            },
            Voice::Tara => VoiceProfile {
                harmonicity: 1.5,
                modulation_index: 12.0,
                attack: 0.01,
                decay: 0.3,
                sustain: 0.1,
                release: 0.6,
                volume_db: -12.0,
            },
        }
    }
}

/// How notes are routed to voices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoicePolicy {
    /// One voice for every register.
    Shared,
    /// A distinct timbre per octave register.
    #[default]
    PerOctave,
}

impl VoicePolicy {
    /// Voice that notes in `octave` are routed to.
    pub fn voice_for(self, octave: Octave) -> Voice {
        match (self, octave) {
            (VoicePolicy::Shared, _) => Voice::Shared,
            (VoicePolicy::PerOctave, Octave::Mandra) => Voice::Mandra,
            (VoicePolicy::PerOctave, Octave::Madhya) => Voice::Madhya,
            (VoicePolicy::PerOctave, Octave::Tara) => Voice::Tara,
        }
    }
}

/// Control interface of the external synthesizer.
pub trait AudioBackend {
    /// Idempotent. Failures are fatal to the session.
    fn initialize(&mut self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    fn play_note(&mut self, voice: Voice, frequency_hz: f32, length: NoteLength);

    /// Starts the tonic now and the fifth after `fifth_delay`.
    fn start_drone(&mut self, tonic_hz: f32, fifth_hz: f32, fifth_delay: Duration);

    fn stop_drone(&mut self);

    fn set_drone_volume_db(&mut self, db: f32);

    /// Releases every voice. Idempotent.
    fn dispose(&mut self);
}

impl<T: AudioBackend + ?Sized> AudioBackend for Box<T> {
    fn initialize(&mut self) -> Result<()> {
        (**self).initialize()
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }

    fn play_note(&mut self, voice: Voice, frequency_hz: f32, length: NoteLength) {
        (**self).play_note(voice, frequency_hz, length)
    }

    fn start_drone(&mut self, tonic_hz: f32, fifth_hz: f32, fifth_delay: Duration) {
        (**self).start_drone(tonic_hz, fifth_hz, fifth_delay)
    }

    fn stop_drone(&mut self) {
        (**self).stop_drone()
    }

    fn set_drone_volume_db(&mut self, db: f32) {
        (**self).set_drone_volume_db(db)
    }

    fn dispose(&mut self) {
        (**self).dispose()
    }
}

/// Note and drone mapper sitting in front of an [`AudioBackend`].
#[derive(Debug)]
pub struct AudioEngine<B> {
    backend: B,
    base_pitch_hz: f32,
    policy: VoicePolicy,
    note_length: NoteLength,
    drone_active: bool,
}

impl<B: AudioBackend> AudioEngine<B> {
    /// Engine with the default tonic, per-octave voices and eighth notes.
    pub fn new(backend: B) -> Self {
        Self::with_settings(
            backend,
            DEFAULT_BASE_PITCH_HZ,
            VoicePolicy::default(),
            NoteLength::default(),
        )
    }

    pub fn with_settings(
        backend: B,
        base_pitch_hz: f32,
        policy: VoicePolicy,
        note_length: NoteLength,
    ) -> Self {
        Self {
            backend,
            base_pitch_hz,
            policy,
            note_length,
            drone_active: false,
        }
    }

    /// Brings the backend up. Errors are returned as-is, never retried.
    pub fn initialize(&mut self) -> Result<()> {
        self.backend.initialize()
    }

    /// Whether calls will currently reach the backend.
    pub fn is_initialized(&self) -> bool {
        self.backend.is_initialized()
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> VoicePolicy {
        self.policy
    }

    /// Changes voice routing for subsequent notes.
    pub fn set_policy(&mut self, policy: VoicePolicy) {
        self.policy = policy;
    }

    /// True between a successful [`start_drone`](Self::start_drone) and the
    /// next stop or dispose.
    pub fn drone_active(&self) -> bool {
        self.drone_active
    }

    /// Frequency of `variant` at `octave` for this engine's tonic.
    pub fn frequency(&self, variant: SwaraVariant, octave: Octave) -> f32 {
        frequency(self.base_pitch_hz, variant, octave)
    }

    /// Sounds an accepted onset. Returns the frequency if a note was issued.
    pub fn play(&mut self, onset: NoteOnset) -> Option<f32> {
        if !self.backend.is_initialized() {
            return None;
        }
        let hz = self.frequency(onset.variant, onset.octave);
        let voice = self.policy.voice_for(onset.octave);
        self.backend.play_note(voice, hz, self.note_length);
        Some(hz)
    }

    /// Starts the tonic + fifth drone at `octave`, replacing any running one.
    pub fn start_drone(&mut self, octave: Octave) -> bool {
        if !self.backend.is_initialized() {
            return false;
        }
        if self.drone_active {
            self.backend.stop_drone();
        }
        let tonic = self.frequency(SwaraVariant::Sa, octave);
        let fifth = self.frequency(SwaraVariant::Pa, octave);
        debug!(tonic, fifth, "drone started");
        self.backend.start_drone(tonic, fifth, DRONE_FIFTH_DELAY);
        self.drone_active = true;
        true
    }

    /// Releases the drone voices if any are sounding.
    pub fn stop_drone(&mut self) {
        if self.drone_active && self.backend.is_initialized() {
            debug!("drone stopped");
            self.backend.stop_drone();
        }
        self.drone_active = false;
    }

    /// Clamps to `[-60, 0]` dB and forwards the gain.
    pub fn set_drone_volume_db(&mut self, db: f32) {
        if self.backend.is_initialized() {
            self.backend.set_drone_volume_db(clamp_drone_db(db));
        }
    }

    /// Stops the drone and releases the backend's voices.
    pub fn dispose(&mut self) {
        self.stop_drone();
        self.backend.dispose();
    }
}

/// Command as seen by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AudioCommand {
    PlayNote {
        voice: Voice,
        frequency_hz: f32,
        length: NoteLength,
    },
    StartDrone {
        tonic_hz: f32,
        fifth_hz: f32,
        fifth_delay: Duration,
    },
    StopDrone,
    SetDroneVolume(f32),
    Dispose,
}

/// Shared view over the commands a [`RecordingBackend`] has received.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    shared: Arc<Mutex<Vec<AudioCommand>>>,
}

impl CommandLog {
    /// Copy of every command received so far, oldest first.
    pub fn commands(&self) -> Result<Vec<AudioCommand>> {
        self.shared
            .lock()
            .map(|log| log.clone())
            .map_err(|_| SwaraError::msg("audio command log has been poisoned"))
    }

    /// Number of notes played so far.
    pub fn notes(&self) -> Result<usize> {
        Ok(self
            .commands()?
            .iter()
            .filter(|command| matches!(command, AudioCommand::PlayNote { .. }))
            .count())
    }

    fn push(&self, command: AudioCommand) {
        if let Ok(mut log) = self.shared.lock() {
            log.push(command);
        }
    }
}

/// In-memory backend that keeps a copy of every command for inspection.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    log: CommandLog,
    initialized: bool,
    disposed: bool,
    fail_with: Option<String>,
}

impl RecordingBackend {
    /// Backend that initializes successfully.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose initialization always fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Handle onto this backend's command log. Stays readable after the
    /// backend itself has been moved into a session.
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }
}

impl AudioBackend for RecordingBackend {
    fn initialize(&mut self) -> Result<()> {
        if let Some(reason) = &self.fail_with {
            return Err(SwaraError::AudioInit(reason.clone()));
        }
        if self.disposed {
            return Err(SwaraError::AudioInit("backend was already disposed".into()));
        }
        if !self.initialized {
            info!("recording audio backend ready");
            self.initialized = true;
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized && !self.disposed
    }

    fn play_note(&mut self, voice: Voice, frequency_hz: f32, length: NoteLength) {
        debug!(?voice, frequency_hz, length = length.token(), "recorded note");
        self.log.push(AudioCommand::PlayNote {
            voice,
            frequency_hz,
            length,
        });
    }

    fn start_drone(&mut self, tonic_hz: f32, fifth_hz: f32, fifth_delay: Duration) {
        self.log.push(AudioCommand::StartDrone {
            tonic_hz,
            fifth_hz,
            fifth_delay,
        });
    }

    fn stop_drone(&mut self) {
        self.log.push(AudioCommand::StopDrone);
    }

    fn set_drone_volume_db(&mut self, db: f32) {
        debug!(db, "drone volume");
        self.log.push(AudioCommand::SetDroneVolume(db));
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.log.push(AudioCommand::Dispose);
            self.disposed = true;
            self.initialized = false;
        }
    }
}

/// Headless backend for the command line: every command becomes a `tracing`
/// event, notes carry the timbre they would be synthesized with.
#[derive(Debug, Default)]
pub struct LogBackend {
    initialized: bool,
    disposed: bool,
    drone: bool,
    notes: u64,
}

impl LogBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes issued since initialization.
    pub fn notes(&self) -> u64 {
        self.notes
    }

    pub fn drone_sounding(&self) -> bool {
        self.drone
    }
}

impl AudioBackend for LogBackend {
    fn initialize(&mut self) -> Result<()> {
        if self.disposed {
            return Err(SwaraError::AudioInit("backend was already disposed".into()));
        }
        if !self.initialized {
            info!("log audio backend ready");
            self.initialized = true;
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized && !self.disposed
    }

    fn play_note(&mut self, voice: Voice, frequency_hz: f32, length: NoteLength) {
        let profile = voice.profile();
        info!(
            ?voice,
            frequency_hz,
            length = length.token(),
            harmonicity = profile.harmonicity,
            modulation_index = profile.modulation_index,
            release = profile.release,
            volume_db = profile.volume_db,
            "note"
        );
        self.notes += 1;
    }

    fn start_drone(&mut self, tonic_hz: f32, fifth_hz: f32, fifth_delay: Duration) {
        info!(tonic_hz, fifth_hz, delay_ms = fifth_delay.as_millis() as u64, "drone on");
        self.drone = true;
    }

    fn stop_drone(&mut self) {
        info!("drone off");
        self.drone = false;
    }

    fn set_drone_volume_db(&mut self, db: f32) {
        info!(db, "drone volume");
    }

    fn dispose(&mut self) {
        if !self.disposed {
            info!(notes = self.notes, "log audio backend disposed");
            self.disposed = true;
            self.initialized = false;
            self.drone = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn engine() -> (AudioEngine<RecordingBackend>, CommandLog) {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let mut engine = AudioEngine::new(backend);
        engine.initialize().unwrap();
        (engine, log)
    }

    #[test]
    fn frequency_follows_ratio_and_octave() {
        assert!(close(frequency(261.63, SwaraVariant::Pa, Octave::Madhya), 261.63 * 1.5));
        assert!(close(frequency(261.63, SwaraVariant::Sa, Octave::Tara), 261.63 * 2.0));
        assert!(close(frequency(261.63, SwaraVariant::Sa, Octave::Mandra), 261.63 * 0.5));
    }

    #[test]
    fn per_octave_policy_selects_register_voice() {
        let (mut engine, log) = engine();
        engine.play(NoteOnset {
            variant: SwaraVariant::Ga3,
            octave: Octave::Tara,
        });
        engine.set_policy(VoicePolicy::Shared);
        engine.play(NoteOnset {
            variant: SwaraVariant::Ga3,
            octave: Octave::Tara,
        });

        let commands = log.commands().unwrap();
        assert!(matches!(
            commands[0],
            AudioCommand::PlayNote { voice: Voice::Tara, length: NoteLength::Eighth, .. }
        ));
        assert!(matches!(commands[1], AudioCommand::PlayNote { voice: Voice::Shared, .. }));
    }

    #[test]
    fn calls_are_dropped_before_initialization() {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let mut engine = AudioEngine::new(backend);

        let played = engine.play(NoteOnset {
            variant: SwaraVariant::Sa,
            octave: Octave::Madhya,
        });
        assert_eq!(played, None);
        assert!(!engine.start_drone(Octave::Mandra));
        engine.set_drone_volume_db(-10.0);
        assert!(log.commands().unwrap().is_empty());
    }

    #[test]
    fn drone_plays_tonic_and_delayed_fifth() {
        let (mut engine, log) = engine();
        assert!(engine.start_drone(Octave::Mandra));
        engine.set_drone_volume_db(-90.0);
        engine.stop_drone();

        let commands = log.commands().unwrap();
        match commands[0] {
            AudioCommand::StartDrone {
                tonic_hz,
                fifth_hz,
                fifth_delay,
            } => {
                assert!(close(tonic_hz, 130.815));
                assert!(close(fifth_hz, 196.2225));
                assert_eq!(fifth_delay, DRONE_FIFTH_DELAY);
            }
            ref other => panic!("expected drone start, got {other:?}"),
        }
        assert_eq!(commands[1], AudioCommand::SetDroneVolume(-60.0));
        assert_eq!(commands[2], AudioCommand::StopDrone);
    }

    #[test]
    fn dispose_stops_drone_first() {
        let (mut engine, log) = engine();
        engine.start_drone(Octave::Madhya);
        engine.dispose();
        engine.dispose();

        let commands = log.commands().unwrap();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[1], AudioCommand::StopDrone);
        assert_eq!(commands[2], AudioCommand::Dispose);
        assert!(!engine.is_initialized());
    }

    #[test]
    fn failing_backend_reports_audio_init() {
        let mut engine = AudioEngine::new(RecordingBackend::failing("no output device"));
        assert!(matches!(engine.initialize(), Err(SwaraError::AudioInit(_))));
    }

    #[test]
    fn octave_voices_differ_in_timbre() {
        assert_ne!(Voice::Mandra.profile(), Voice::Tara.profile());
        assert_eq!(Voice::Shared.profile(), Voice::Madhya.profile());
    }

    #[test]
    fn log_backend_counts_notes_and_tracks_drone() {
        let mut engine = AudioEngine::new(LogBackend::new());
        let onset = NoteOnset {
            variant: SwaraVariant::Ga3,
            octave: Octave::Tara,
        };
        assert_eq!(engine.play(onset), None);

        engine.initialize().unwrap();
        assert!(engine.play(onset).is_some());
        assert!(engine.start_drone(Octave::Mandra));
        assert!(engine.backend().drone_sounding());

        engine.dispose();
        assert_eq!(engine.backend().notes(), 1);
        assert!(!engine.backend().drone_sounding());
        assert!(engine.initialize().is_err());
    }
}
