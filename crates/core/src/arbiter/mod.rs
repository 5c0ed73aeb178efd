//! Cooldown gate between resolved swaras and audible note onsets.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::{
    resolver::Resolution,
    scale::{Octave, SwaraVariant},
    session::SessionState,
};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1000);
pub const DEFAULT_REWARD: u32 = 10;

/// A note that passed the gate and should be sounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteOnset {
    pub variant: SwaraVariant,
    pub octave: Octave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterDecision {
    Accepted(NoteOnset),
    /// The resolver suppressed the swara; nothing to gate.
    Suppressed,
    /// Same variant fired within the cooldown window.
    CoolingDown { remaining: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteArbiter {
    cooldown: Duration,
    reward: u32,
}

impl Default for NoteArbiter {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN, DEFAULT_REWARD)
    }
}

impl NoteArbiter {
    pub fn new(cooldown: Duration, reward: u32) -> Self {
        Self { cooldown, reward }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn reward(&self) -> u32 {
        self.reward
    }

    /// Gates one resolved trigger.
    ///
    /// Accepting updates the cooldown timestamp, note count, score and
    /// current swara in `state`. Cooldowns are tracked per variant, so two
    /// different variants in the same frame never block each other.
    pub fn arbitrate(
        &self,
        resolution: Resolution,
        state: &mut SessionState,
        now: Instant,
    ) -> ArbiterDecision {
        let Resolution::Play(variant) = resolution else {
            return ArbiterDecision::Suppressed;
        };

        if let Some(last) = state.last_trigger(variant) {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                trace!(%variant, ?remaining, "trigger discarded during cooldown");
                return ArbiterDecision::CoolingDown { remaining };
            }
        }

        state.record_onset(variant, self.reward, now);
        let onset = NoteOnset {
            variant,
            octave: state.octave(),
        };
        debug!(
            %variant,
            octave = onset.octave.number(),
            score = state.score(),
            "note accepted"
        );
        ArbiterDecision::Accepted(onset)
    }
}
