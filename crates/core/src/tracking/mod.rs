//! Landmark frames and the hand tracker seam.
//!
//! The pose estimator itself lives outside this crate. All the engine sees is
//! a [`HandTracker`] that can be polled once per rendering tick and answers
//! either "not ready" or a [`LandmarkFrame`] with zero, one or two hands.

use std::collections::VecDeque;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{gesture::Finger, Result, SwaraError};

/// Number of landmarks the pose model reports per hand.
pub const LANDMARK_COUNT: usize = 21;

pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_TIP: usize = 12;
pub const RING_TIP: usize = 16;
pub const PINKY_TIP: usize = 20;

/// Which hand a set of landmarks belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub const BOTH: [Handedness; 2] = [Handedness::Left, Handedness::Right];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// A single landmark. `x` and `y` are normalized to `[0, 1]` image space.
///
/// Serialized as a plain `[x, y, z]` triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Distance to `other` in the image plane, ignoring depth.
    pub fn planar_distance(&self, other: &Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<[f32; 3]> for Landmark {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Landmark> for [f32; 3] {
    fn from(value: Landmark) -> Self {
        [value.x, value.y, value.z]
    }
}

/// The 21 landmarks of one detected hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHand", into = "RawHand")]
pub struct HandLandmarks {
    handedness: Handedness,
    points: [Landmark; LANDMARK_COUNT],
}

#[derive(Serialize, Deserialize)]
struct RawHand {
    handedness: Handedness,
    landmarks: Vec<Landmark>,
}

impl TryFrom<RawHand> for HandLandmarks {
    type Error = SwaraError;

    fn try_from(raw: RawHand) -> Result<Self> {
        Self::new(raw.handedness, raw.landmarks)
    }
}

impl From<HandLandmarks> for RawHand {
    fn from(hand: HandLandmarks) -> Self {
        RawHand {
            handedness: hand.handedness,
            landmarks: hand.points.to_vec(),
        }
    }
}

impl HandLandmarks {
    /// Wraps tracker output, rejecting hands without exactly 21 points.
    pub fn new(handedness: Handedness, points: Vec<Landmark>) -> Result<Self> {
        let found = points.len();
        let points: [Landmark; LANDMARK_COUNT] =
            points.try_into().map_err(|_| SwaraError::InvalidLandmarks {
                expected: LANDMARK_COUNT,
                found,
            })?;
        Ok(Self { handedness, points })
    }

    /// A relaxed open hand: every fingertip well clear of the thumb tip.
    pub fn open(handedness: Handedness) -> Self {
        let mut points = [Landmark::new(0.5, 0.8, 0.0); LANDMARK_COUNT];
        points[THUMB_TIP] = Landmark::new(0.35, 0.55, 0.0);
        points[INDEX_TIP] = Landmark::new(0.42, 0.30, 0.0);
        points[MIDDLE_TIP] = Landmark::new(0.50, 0.25, 0.0);
        points[RING_TIP] = Landmark::new(0.58, 0.30, 0.0);
        points[PINKY_TIP] = Landmark::new(0.65, 0.38, 0.0);
        Self { handedness, points }
    }

    /// Moves `finger`'s tip onto the thumb tip.
    pub fn pinching(mut self, finger: Finger) -> Self {
        let thumb = self.points[THUMB_TIP];
        self.points[finger.tip()] = Landmark::new(thumb.x + 0.005, thumb.y, thumb.z);
        self
    }

    /// Places `finger`'s tip at `distance` to the right of the thumb tip.
    pub fn with_gap(mut self, finger: Finger, distance: f32) -> Self {
        let thumb = self.points[THUMB_TIP];
        self.points[finger.tip()] = Landmark::new(thumb.x + distance, thumb.y, thumb.z);
        self
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    pub fn point(&self, index: usize) -> &Landmark {
        &self.points[index]
    }

    pub fn thumb_tip(&self) -> &Landmark {
        &self.points[THUMB_TIP]
    }

    pub fn points(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.points
    }
}

/// Everything the tracker saw in one camera frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkFrame {
    pub hands: Vec<HandLandmarks>,
}

impl LandmarkFrame {
    pub fn new(hands: Vec<HandLandmarks>) -> Self {
        Self { hands }
    }

    /// Frame in which no hand was detected.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Landmarks for `handedness`. If the tracker labelled two hands the
    /// same way the later one wins.
    pub fn hand(&self, handedness: Handedness) -> Option<&HandLandmarks> {
        self.hands
            .iter()
            .rev()
            .find(|hand| hand.handedness == handedness)
    }
}

/// Result of a single non-blocking tracker poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// No new camera frame yet; try again next tick.
    NotReady,
    Ready(LandmarkFrame),
    /// The source has no more frames and will never produce another.
    Closed,
}

/// Pose estimator seam.
pub trait HandTracker {
    /// Brings the tracker up. Failures are fatal to the session.
    fn initialize(&mut self) -> Result<()>;

    /// Non-blocking. Must not be called more than once per rendering tick.
    fn poll(&mut self) -> PollOutcome;

    /// Releases the model and camera. Idempotent.
    fn release(&mut self);
}

impl<T: HandTracker + ?Sized> HandTracker for Box<T> {
    fn initialize(&mut self) -> Result<()> {
        (**self).initialize()
    }

    fn poll(&mut self) -> PollOutcome {
        (**self).poll()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Tracker that replays a fixed list of frames, one per poll.
///
/// A `None` entry stands for a tick on which the camera had nothing new.
#[derive(Debug, Default)]
pub struct ScriptedTracker {
    frames: VecDeque<Option<LandmarkFrame>>,
    initialized: bool,
    released: bool,
}

impl ScriptedTracker {
    pub fn new(frames: Vec<Option<LandmarkFrame>>) -> Self {
        Self {
            frames: frames.into(),
            initialized: false,
            released: false,
        }
    }

    /// Parses a script: a JSON array whose entries are `null` or a list of
    /// `{ "handedness": "Left", "landmarks": [[x, y, z], ...] }` objects.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let frames: Vec<Option<LandmarkFrame>> = serde_json::from_str(json)?;
        Ok(Self::new(frames))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn push(&mut self, frame: Option<LandmarkFrame>) {
        self.frames.push_back(frame);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl HandTracker for ScriptedTracker {
    fn initialize(&mut self) -> Result<()> {
        if self.released {
            return Err(SwaraError::TrackerInit("tracker was already released".into()));
        }
        if !self.initialized {
            info!(frames = self.frames.len(), "scripted tracker ready");
            self.initialized = true;
        }
        Ok(())
    }

    fn poll(&mut self) -> PollOutcome {
        if self.released {
            return PollOutcome::Closed;
        }
        if !self.initialized {
            return PollOutcome::NotReady;
        }
        match self.frames.pop_front() {
            Some(Some(frame)) => PollOutcome::Ready(frame),
            Some(None) => PollOutcome::NotReady,
            None => PollOutcome::Closed,
        }
    }

    fn release(&mut self) {
        if !self.released {
            debug!(unplayed = self.frames.len(), "scripted tracker released");
            self.frames.clear();
            self.released = true;
            self.initialized = false;
        }
    }
}
