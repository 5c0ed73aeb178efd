//! Session state: the single value the frame loop owns and threads through
//! the detector, arbiter and synthesis mapper.

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::{
    gesture::{Finger, FingerKey, PressDetector},
    scale::{Octave, Raga, ScaleTable, SwaraVariant, Tala},
    tracking::Handedness,
};

/// Lowest drone gain the configuration surface accepts.
pub const MIN_DRONE_DB: f32 = -60.0;
pub const MAX_DRONE_DB: f32 = 0.0;

/// Where the last accepted note was triggered, for a one-shot visual cue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TriggerPosition {
    pub x: f32,
    pub y: f32,
    pub variant: SwaraVariant,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    raga: Raga,
    tala: Tala,
    octave: Octave,
    drone_enabled: bool,
    drone_volume_db: f32,
    score: u64,
    notes_played: u64,
    current: Option<SwaraVariant>,
    cooldowns: HashMap<SwaraVariant, Instant>,
    beat: usize,
    trigger: Option<TriggerPosition>,
}

impl SessionState {
    /// Fresh state: nothing played, drone off at -20 dB.
    pub fn new(raga: Raga, tala: Tala, octave: Octave) -> Self {
        Self {
            raga,
            tala,
            octave,
            drone_enabled: false,
            drone_volume_db: -20.0,
            score: 0,
            notes_played: 0,
            current: None,
            cooldowns: HashMap::new(),
            beat: 0,
            trigger: None,
        }
    }

    pub fn raga(&self) -> &Raga {
        &self.raga
    }

    pub fn tala(&self) -> &Tala {
        &self.tala
    }

    pub fn octave(&self) -> Octave {
        self.octave
    }

    pub fn drone_enabled(&self) -> bool {
        self.drone_enabled
    }

    pub fn drone_volume_db(&self) -> f32 {
        self.drone_volume_db
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn notes_played(&self) -> u64 {
        self.notes_played
    }

    pub fn current(&self) -> Option<SwaraVariant> {
        self.current
    }

    /// Position in the current tala cycle, from zero.
    pub fn beat(&self) -> usize {
        self.beat
    }

    /// Switches raga. Unknown keys leave the current raga in place.
    pub fn set_raga(&mut self, table: &ScaleTable, key: &str) -> bool {
        match table.raga(key) {
            Some(raga) => {
                info!(raga = %raga.name, "raga selected");
                self.raga = raga.clone();
                true
            }
            None => false,
        }
    }

    /// Switches tala. Unknown keys are ignored.
    pub fn set_tala(&mut self, table: &ScaleTable, key: &str) -> bool {
        match table.tala(key) {
            Some(tala) => {
                info!(tala = %tala.name, "tala selected");
                self.tala = tala.clone();
                self.beat %= self.tala.beats();
                true
            }
            None => false,
        }
    }

    /// Accepts 3, 4 or 5; anything else keeps the current octave.
    pub fn set_octave(&mut self, octave: u8) -> bool {
        match Octave::try_from(octave) {
            Ok(octave) => {
                self.octave = octave;
                true
            }
            Err(_) => false,
        }
    }

    pub fn set_drone_enabled(&mut self, enabled: bool) {
        self.drone_enabled = enabled;
    }

    /// Stores the drone gain clamped to `[-60, 0]` dB and returns it.
    pub fn set_drone_volume_db(&mut self, db: f32) -> f32 {
        self.drone_volume_db = clamp_drone_db(db);
        self.drone_volume_db
    }

    /// When `variant` was last accepted, if ever.
    pub fn last_trigger(&self, variant: SwaraVariant) -> Option<Instant> {
        self.cooldowns.get(&variant).copied()
    }

    pub(crate) fn record_onset(&mut self, variant: SwaraVariant, reward: u32, now: Instant) {
        self.cooldowns.insert(variant, now);
        self.notes_played += 1;
        self.score += u64::from(reward);
        self.current = Some(variant);
    }

    pub(crate) fn set_trigger(&mut self, trigger: TriggerPosition) {
        self.trigger = Some(trigger);
    }

    /// Takes the pending trigger cue; later calls return `None` until the
    /// next accepted note.
    pub fn take_trigger(&mut self) -> Option<TriggerPosition> {
        self.trigger.take()
    }

    pub(crate) fn set_beat(&mut self, beat: usize) {
        self.beat = beat % self.tala.beats();
    }

    /// Clears score, note count, current swara and cooldowns. Raga, tala,
    /// octave and drone settings survive.
    pub fn restart(&mut self) {
        self.score = 0;
        self.notes_played = 0;
        self.current = None;
        self.cooldowns.clear();
        self.trigger = None;
        self.beat = 0;
    }

    /// Read-only view for the renderer. Consumes the pending trigger cue.
    pub fn snapshot(&mut self, detector: &PressDetector) -> SessionSnapshot {
        let fingers = FingerKey::tracked()
            .map(|key| FingerFlag {
                hand: key.hand,
                finger: key.finger,
                pressed: detector.is_pressed(key),
            })
            .collect();

        SessionSnapshot {
            raga: self.raga.name.clone(),
            tala: self.tala.name.clone(),
            octave: self.octave,
            current: self.current,
            score: self.score,
            notes_played: self.notes_played,
            fingers,
            drone_enabled: self.drone_enabled,
            drone_volume_db: self.drone_volume_db,
            beat: self.beat,
            strong_beat: self.tala.is_strong(self.beat),
            trigger: self.take_trigger(),
        }
    }
}

pub(crate) fn clamp_drone_db(db: f32) -> f32 {
    if db.is_nan() {
        MIN_DRONE_DB
    } else {
        db.clamp(MIN_DRONE_DB, MAX_DRONE_DB)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FingerFlag {
    pub hand: Handedness,
    pub finger: Finger,
    pub pressed: bool,
}

/// What the renderer gets to see each frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub raga: String,
    pub tala: String,
    pub octave: Octave,
    pub current: Option<SwaraVariant>,
    pub score: u64,
    pub notes_played: u64,
    pub fingers: Vec<FingerFlag>,
    pub drone_enabled: bool,
    pub drone_volume_db: f32,
    pub beat: usize,
    pub strong_beat: bool,
    pub trigger: Option<TriggerPosition>,
}

impl SessionSnapshot {
    /// Display label for the current swara, `--` when nothing has played.
    pub fn current_label(&self) -> &'static str {
        self.current.map_or("--", SwaraVariant::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        let table = ScaleTable::builtin();
        SessionState::new(
            table.raga("mayamalavagowla").unwrap().clone(),
            table.tala("adi").unwrap().clone(),
            Octave::Madhya,
        )
    }

    #[test]
    fn invalid_keys_keep_previous_selection() {
        let table = ScaleTable::builtin();
        let mut state = state();
        assert!(!state.set_raga(&table, "nonexistent"));
        assert_eq!(state.raga().key, "mayamalavagowla");
        assert!(state.set_raga(&table, "kalyani"));
        assert_eq!(state.raga().key, "kalyani");

        assert!(!state.set_tala(&table, "teentaal"));
        assert_eq!(state.tala().key, "adi");

        assert!(!state.set_octave(7));
        assert_eq!(state.octave(), Octave::Madhya);
        assert!(state.set_octave(5));
        assert_eq!(state.octave(), Octave::Tara);
    }

    #[test]
    fn drone_volume_is_clamped() {
        let mut state = state();
        assert_eq!(state.set_drone_volume_db(-80.0), -60.0);
        assert_eq!(state.set_drone_volume_db(6.0), 0.0);
        assert_eq!(state.set_drone_volume_db(-12.5), -12.5);
    }

    #[test]
    fn restart_clears_progress_but_keeps_selection() {
        let table = ScaleTable::builtin();
        let mut state = state();
        state.set_raga(&table, "hindolam");
        state.set_octave(3);
        state.record_onset(SwaraVariant::Ga2, 10, Instant::now());
        assert_eq!(state.score(), 10);

        state.restart();
        assert_eq!(state.score(), 0);
        assert_eq!(state.notes_played(), 0);
        assert_eq!(state.current(), None);
        assert_eq!(state.last_trigger(SwaraVariant::Ga2), None);
        assert_eq!(state.raga().key, "hindolam");
        assert_eq!(state.octave(), Octave::Mandra);
    }

    #[test]
    fn snapshot_consumes_trigger_once() {
        let mut state = state();
        let detector = PressDetector::default();
        state.set_trigger(TriggerPosition {
            x: 0.4,
            y: 0.6,
            variant: SwaraVariant::Pa,
        });

        let first = state.snapshot(&detector);
        assert!(first.trigger.is_some());
        assert_eq!(first.fingers.len(), 8);
        assert_eq!(first.current_label(), "--");

        let second = state.snapshot(&detector);
        assert!(second.trigger.is_none());
    }
}
