use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    arbiter::{DEFAULT_COOLDOWN, DEFAULT_REWARD},
    audio::{NoteLength, VoicePolicy, DEFAULT_BASE_PITCH_HZ},
    gesture::DEFAULT_TRIGGER_THRESHOLD,
    mapping::MappingDescriptor,
    scale::{Octave, ScaleTable},
    session::clamp_drone_db,
    timeline::DEFAULT_BEAT_INTERVAL,
    Result, SwaraError,
};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub session: SessionConfig,
    pub voices: VoicePolicy,
    /// Custom finger layout. Empty means the traditional layout.
    pub assignments: Vec<MappingDescriptor>,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(json)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks the values against `table` and normalizes the drone volume.
    pub fn validate(&mut self, table: &ScaleTable) -> Result<()> {
        let engine = &self.engine;
        if !(engine.trigger_threshold > 0.0 && engine.trigger_threshold.is_finite()) {
            return Err(SwaraError::msg(format!(
                "trigger threshold must be positive, got {}",
                engine.trigger_threshold
            )));
        }
        if !(engine.base_pitch_hz > 0.0 && engine.base_pitch_hz.is_finite()) {
            return Err(SwaraError::msg(format!(
                "base pitch must be positive, got {}",
                engine.base_pitch_hz
            )));
        }
        if engine.frame_interval_ms == 0 || engine.beat_interval_ms == 0 {
            return Err(SwaraError::msg("frame and beat intervals must be non-zero"));
        }
        if table.raga(&self.session.raga).is_none() {
            return Err(SwaraError::msg(format!("unknown raga `{}`", self.session.raga)));
        }
        if table.tala(&self.session.tala).is_none() {
            return Err(SwaraError::msg(format!("unknown tala `{}`", self.session.tala)));
        }
        self.session.drone_volume_db = clamp_drone_db(self.session.drone_volume_db);
        Ok(())
    }
}

/// Detector, arbiter and pitch constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub trigger_threshold: f32,
    pub cooldown_ms: u64,
    pub reward: u32,
    pub base_pitch_hz: f32,
    pub note_length: NoteLength,
    pub frame_interval_ms: u64,
    pub beat_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
            cooldown_ms: DEFAULT_COOLDOWN.as_millis() as u64,
            reward: DEFAULT_REWARD,
            base_pitch_hz: DEFAULT_BASE_PITCH_HZ,
            note_length: NoteLength::Eighth,
            frame_interval_ms: 16,
            beat_interval_ms: DEFAULT_BEAT_INTERVAL.as_millis() as u64,
        }
    }
}

impl EngineConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn beat_interval(&self) -> Duration {
        Duration::from_millis(self.beat_interval_ms)
    }
}

/// Initial selections for a play session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub raga: String,
    pub tala: String,
    pub octave: Octave,
    pub drone_enabled: bool,
    pub drone_octave: Octave,
    pub drone_volume_db: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            raga: "mayamalavagowla".to_string(),
            tala: "adi".to_string(),
            octave: Octave::Madhya,
            drone_enabled: false,
            drone_octave: Octave::Mandra,
            drone_volume_db: -20.0,
        }
    }
}
