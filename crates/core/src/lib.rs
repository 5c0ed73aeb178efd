//! Core library for the Swara Gesture instrument.
//!
//! Hand landmarks come in, raga-correct note onsets go out. Each module owns
//! one stage of that path (press detection, swara resolution, cooldown
//! arbitration, pitch mapping) and [`engine::Session`] strings them together
//! into a single-threaded, poll-driven frame loop.

pub mod arbiter;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod mapping;
pub mod render;
pub mod resolver;
pub mod scale;
pub mod session;
pub mod timeline;
pub mod tracking;

pub use arbiter::{ArbiterDecision, NoteArbiter, NoteOnset};
pub use audio::{
    AudioBackend, AudioCommand, AudioEngine, CommandLog, LogBackend, NoteLength,
    RecordingBackend, Voice, VoicePolicy, VoiceProfile,
};
pub use config::{AppConfig, EngineConfig, SessionConfig};
pub use engine::{CancellationToken, PlayedNote, RunSummary, Session, StepOutcome};
pub use error::{Result, SwaraError};
pub use gesture::{Finger, FingerKey, FingerState, PressDetector};
pub use mapping::{AssignmentTable, MappingDescriptor};
pub use render::{LogSink, NullSink, RenderSink};
pub use resolver::{resolve, Resolution};
pub use scale::{Octave, Raga, ScaleTable, Swara, SwaraVariant, Tala};
pub use session::{SessionSnapshot, SessionState, TriggerPosition};
pub use timeline::{BeatTick, BeatTimer};
pub use tracking::{
    HandLandmarks, HandTracker, Handedness, Landmark, LandmarkFrame, PollOutcome,
    ScriptedTracker,
};
