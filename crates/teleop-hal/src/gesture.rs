//! Hand-gesture classification.
//!
//! The pipeline is `image → landmarks → finger flags → Action`.  Landmark
//! extraction is an external capability modelled by [`LandmarkDetector`];
//! everything after it is a pure function of the landmark geometry.
//!
//! | Flags (thumb … pinky) | Action |
//! |---|---|
//! | `0 0 0 0 0` | `STOP` (fist) |
//! | `1 1 1 1 1` | `FORWARD` (open palm) |
//! | `0 1 0 0 0` | `LEFT` |
//! | `0 1 1 0 0` | `RIGHT` |
//! | `1 0 0 0 0` | `BACK` (thumb only) |
//! | anything else | `NONE` |

use std::fmt;
use std::str::FromStr;

use teleop_types::{Action, TeleopError};

use crate::camera::RasterImage;
use crate::sensor::Classifier;

/// Number of landmarks in a hand skeleton.
pub const HAND_LANDMARKS: usize = 21;

const FINGER_TIPS: [usize; 5] = [4, 8, 12, 16, 20];

/// One normalized landmark; `x`/`y` are in `[0, 1]` image coordinates with
/// `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A 21-point hand skeleton in the conventional wrist-first ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks(pub [Landmark; HAND_LANDMARKS]);

/// Extension state of the five fingers, thumb first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FingerFlags(pub [bool; 5]);

impl FingerFlags {
    /// Build flags from `0`/`1` integers, thumb first.
    pub fn from_bits(bits: [u8; 5]) -> Self {
        Self(bits.map(|b| b != 0))
    }
}

impl fmt::Display for FingerFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for up in self.0 {
            f.write_str(if up { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for FingerFlags {
    type Err = TeleopError;

    /// Parse `"01100"`, `"0 1 1 0 0"` or `"0,1,1,0,0"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<char> = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .collect();
        if digits.len() != 5 {
            return Err(TeleopError::Sensor(format!(
                "expected 5 finger flags, got {:?}",
                s.trim()
            )));
        }
        let mut flags = [false; 5];
        for (slot, c) in flags.iter_mut().zip(digits) {
            *slot = match c {
                '0' => false,
                '1' => true,
                other => {
                    return Err(TeleopError::Sensor(format!(
                        "invalid finger flag {other:?}"
                    )));
                }
            };
        }
        Ok(Self(flags))
    }
}

/// Derive finger extension flags from a hand skeleton.
///
/// The thumb counts as extended when its tip lies left of the joint below it
/// (a mirrored right hand); the other fingers when the tip is above the PIP
/// joint two landmarks down.
pub fn finger_flags(hand: &HandLandmarks) -> FingerFlags {
    let lm = &hand.0;
    let mut flags = [false; 5];
    flags[0] = lm[FINGER_TIPS[0]].x < lm[FINGER_TIPS[0] - 1].x;
    for (finger, &tip) in FINGER_TIPS.iter().enumerate().skip(1) {
        flags[finger] = lm[tip].y < lm[tip - 2].y;
    }
    FingerFlags(flags)
}

/// Map finger flags to an [`Action`].
pub fn classify(flags: FingerFlags) -> Action {
    match flags.0 {
        [false, false, false, false, false] => Action::Stop,
        [true, true, true, true, true] => Action::Forward,
        [false, true, false, false, false] => Action::Left,
        [false, true, true, false, false] => Action::Right,
        [true, false, false, false, false] => Action::Back,
        _ => Action::None,
    }
}

/// External hand-landmark inference capability.
pub trait LandmarkDetector: Send {
    /// Detect a single hand in `frame`; `None` when no hand is found.
    fn detect(&mut self, frame: &RasterImage) -> Option<HandLandmarks>;
}

/// Classifier over camera frames: detector, then flags, then [`classify`].
pub struct LandmarkClassifier<D> {
    detector: D,
}

impl<D: LandmarkDetector> LandmarkClassifier<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }
}

impl<D: LandmarkDetector> Classifier<RasterImage> for LandmarkClassifier<D> {
    fn classify(&mut self, frame: &RasterImage) -> Option<Action> {
        self.detector
            .detect(frame)
            .map(|hand| classify(finger_flags(&hand)))
    }
}

/// Classifier over already-extracted finger flags.  Always detects.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlagsClassifier;

impl Classifier<FingerFlags> for FlagsClassifier {
    fn classify(&mut self, flags: &FingerFlags) -> Option<Action> {
        Some(classify(*flags))
    }
}
