//! Finger press detection.
//!
//! A finger is "pressed" while its tip sits within the trigger threshold of
//! the thumb tip. The detector only reports the Idle -> Pressed edge, so a
//! held pinch plays once rather than every frame.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::tracking::{
    HandLandmarks, Handedness, LandmarkFrame, INDEX_TIP, MIDDLE_TIP, PINKY_TIP, RING_TIP,
    THUMB_TIP,
};

/// Default pinch distance in normalized image units.
pub const DEFAULT_TRIGGER_THRESHOLD: f32 = 0.04;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// Fingers that can be pressed against the thumb.
    pub const TRACKED: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Landmark index of the fingertip.
    pub fn tip(self) -> usize {
        match self {
            Finger::Thumb => THUMB_TIP,
            Finger::Index => INDEX_TIP,
            Finger::Middle => MIDDLE_TIP,
            Finger::Ring => RING_TIP,
            Finger::Pinky => PINKY_TIP,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }
}

/// A finger on a specific hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FingerKey {
    pub hand: Handedness,
    pub finger: Finger,
}

impl FingerKey {
    /// Number of distinct keys, thumbs included.
    pub const COUNT: usize = 10;

    pub const fn new(hand: Handedness, finger: Finger) -> Self {
        Self { hand, finger }
    }

    /// Dense index into per-finger tables.
    pub fn index(self) -> usize {
        self.hand.index() * 5 + self.finger.index()
    }

    /// All eight keys that carry press state, left hand first.
    pub fn tracked() -> impl Iterator<Item = FingerKey> {
        Handedness::BOTH.into_iter().flat_map(|hand| {
            Finger::TRACKED
                .into_iter()
                .map(move |finger| FingerKey::new(hand, finger))
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FingerState {
    #[default]
    Idle,
    Pressed,
}

/// Per-finger edge detector for both hands.
#[derive(Debug, Clone)]
pub struct PressDetector {
    threshold: f32,
    states: [FingerState; FingerKey::COUNT],
}

impl Default for PressDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_THRESHOLD)
    }
}

impl PressDetector {
    /// Detector with every finger idle.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            states: [FingerState::Idle; FingerKey::COUNT],
        }
    }

    /// Pinch distance below which a finger counts as pressed.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Last known state of `key`.
    pub fn state(&self, key: FingerKey) -> FingerState {
        self.states[key.index()]
    }

    pub fn is_pressed(&self, key: FingerKey) -> bool {
        self.state(key) == FingerState::Pressed
    }

    /// Runs both hands of `frame`, left first, and returns every rising edge.
    pub fn update_frame(&mut self, frame: &LandmarkFrame) -> Vec<FingerKey> {
        let mut edges = Vec::new();
        for hand in Handedness::BOTH {
            edges.extend(self.update_hand(hand, frame.hand(hand)));
        }
        edges
    }

    /// Updates one hand's four tracked fingers.
    ///
    /// A missing hand releases all of its fingers and reports nothing.
    pub fn update_hand(
        &mut self,
        hand: Handedness,
        landmarks: Option<&HandLandmarks>,
    ) -> Vec<FingerKey> {
        let Some(landmarks) = landmarks else {
            for finger in Finger::TRACKED {
                self.states[FingerKey::new(hand, finger).index()] = FingerState::Idle;
            }
            return Vec::new();
        };

        let thumb = landmarks.thumb_tip();
        let mut edges = Vec::new();
        for finger in Finger::TRACKED {
            let key = FingerKey::new(hand, finger);
            let distance = landmarks.point(finger.tip()).planar_distance(thumb);
            let touching = distance < self.threshold;
            let state = &mut self.states[key.index()];

            match (*state, touching) {
                (FingerState::Idle, true) => {
                    *state = FingerState::Pressed;
                    trace!(hand = hand.as_str(), finger = finger.as_str(), distance, "press");
                    edges.push(key);
                }
                (FingerState::Pressed, false) => {
                    *state = FingerState::Idle;
                }
                _ => {}
            }
        }
        edges
    }

    /// Returns every finger to Idle.
    pub fn reset(&mut self) {
        self.states = [FingerState::Idle; FingerKey::COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEFT_RING: FingerKey = FingerKey::new(Handedness::Left, Finger::Ring);

    fn hand_with_gap(distance: f32) -> HandLandmarks {
        HandLandmarks::open(Handedness::Left).with_gap(Finger::Ring, distance)
    }

    #[test]
    fn held_pinch_reports_a_single_edge() {
        let mut detector = PressDetector::default();
        let distances = [0.10, 0.02, 0.01, 0.03, 0.02, 0.05, 0.01, 0.01];
        let mut edges = 0;
        for distance in distances {
            let hand = hand_with_gap(distance);
            edges += detector
                .update_hand(Handedness::Left, Some(&hand))
                .iter()
                .filter(|key| **key == LEFT_RING)
                .count();
        }
        // One edge for each approach from >= threshold.
        assert_eq!(edges, 2);
        assert!(detector.is_pressed(LEFT_RING));
    }

    #[test]
    fn threshold_is_exclusive() {
        use crate::tracking::Landmark;

        let mut points = vec![Landmark::new(0.5, 0.0, 0.0); 21];
        points[THUMB_TIP] = Landmark::new(0.5, 0.5, 0.0);
        points[RING_TIP] = Landmark::new(0.75, 0.5, 0.0);
        let hand = HandLandmarks::new(Handedness::Left, points).unwrap();

        let mut detector = PressDetector::new(0.25);
        assert!(detector.update_hand(Handedness::Left, Some(&hand)).is_empty());
        assert!(!detector.is_pressed(LEFT_RING));
    }

    #[test]
    fn losing_the_hand_releases_its_fingers() {
        let mut detector = PressDetector::default();
        let pinch = hand_with_gap(0.0);
        assert_eq!(detector.update_hand(Handedness::Left, Some(&pinch)), vec![LEFT_RING]);

        assert!(detector.update_hand(Handedness::Left, None).is_empty());
        assert_eq!(detector.state(LEFT_RING), FingerState::Idle);

        // Re-acquiring the hand mid-pinch counts as a fresh press.
        assert_eq!(detector.update_hand(Handedness::Left, Some(&pinch)), vec![LEFT_RING]);
    }

    #[test]
    fn hands_are_independent() {
        let mut detector = PressDetector::default();
        let frame = LandmarkFrame::new(vec![
            HandLandmarks::open(Handedness::Left).pinching(Finger::Index),
            HandLandmarks::open(Handedness::Right)
                .pinching(Finger::Index)
                .pinching(Finger::Middle),
        ]);

        let edges = detector.update_frame(&frame);
        assert_eq!(
            edges,
            vec![
                FingerKey::new(Handedness::Left, Finger::Index),
                FingerKey::new(Handedness::Right, Finger::Index),
                FingerKey::new(Handedness::Right, Finger::Middle),
            ]
        );

        let left_only = LandmarkFrame::new(vec![
            HandLandmarks::open(Handedness::Left).pinching(Finger::Index)
        ]);
        assert!(detector.update_frame(&left_only).is_empty());
        assert!(!detector.is_pressed(FingerKey::new(Handedness::Right, Finger::Index)));
        assert!(detector.is_pressed(FingerKey::new(Handedness::Left, Finger::Index)));
    }

    #[test]
    fn tracked_keys_have_distinct_indices() {
        let mut seen: Vec<usize> = FingerKey::tracked().map(FingerKey::index).collect();
        assert_eq!(seen.len(), 8);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 8);
    }
}
