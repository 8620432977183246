//! Movement Patterns
//!
//! Each pattern produces a stream of stick positions, optional button
//! presses, and the pause before the next frame.

use std::f64::consts::TAU;
use std::fmt;
use std::time::Duration;

use pad_core::ButtonState;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Stick radius used by the smooth patterns
const SWEEP_RADIUS: f64 = 0.8;

/// Angle/phase advance per frame for the smooth patterns
const SWEEP_STEP: f64 = 0.1;

/// Frames played by the smooth patterns before they finish
const SWEEP_FRAMES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementPattern {
    Circle,
    FigureEight,
    Random,
    ButtonMash,
}

impl MovementPattern {
    pub const ALL: [MovementPattern; 4] = [
        MovementPattern::Circle,
        MovementPattern::FigureEight,
        MovementPattern::Random,
        MovementPattern::ButtonMash,
    ];

    /// Parse a setup-file behaviour; anything unknown plays `Random`
    pub fn from_behaviour(behaviour: Option<&str>) -> Self {
        match behaviour.map(str::trim) {
            Some("circle") => MovementPattern::Circle,
            Some("figure_eight") => MovementPattern::FigureEight,
            Some("button_mash") => MovementPattern::ButtonMash,
            _ => MovementPattern::Random,
        }
    }

    /// Number of frames, or `None` for patterns that run until stopped
    pub fn frame_limit(self) -> Option<usize> {
        match self {
            MovementPattern::Circle | MovementPattern::FigureEight => Some(SWEEP_FRAMES),
            MovementPattern::Random | MovementPattern::ButtonMash => None,
        }
    }

    pub fn frame_interval(self) -> Duration {
        match self {
            MovementPattern::Circle | MovementPattern::FigureEight => Duration::from_millis(100),
            MovementPattern::Random => Duration::from_millis(70),
            MovementPattern::ButtonMash => Duration::from_millis(150),
        }
    }

    /// Start a frame sequence; smooth patterns begin at a random phase
    pub fn frames<R: Rng>(self, mut rng: R) -> PatternFrames<R> {
        let phase = rng.gen_range(0.0..TAU);
        PatternFrames {
            pattern: self,
            rng,
            phase,
            emitted: 0,
        }
    }
}

impl fmt::Display for MovementPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MovementPattern::Circle => "circle",
            MovementPattern::FigureEight => "figure_eight",
            MovementPattern::Random => "random",
            MovementPattern::ButtonMash => "button_mash",
        };
        f.write_str(name)
    }
}

/// One controller update
#[derive(Debug, Clone, PartialEq)]
pub struct InputFrame {
    pub x: f64,
    pub y: f64,
    /// New button state, or `None` to keep the previous one
    pub buttons: Option<ButtonState>,
    /// Pause after sending this frame
    pub delay: Duration,
}

/// Iterator over the frames of one pattern run
#[derive(Debug)]
pub struct PatternFrames<R> {
    pattern: MovementPattern,
    rng: R,
    phase: f64,
    emitted: usize,
}

impl<R: Rng> PatternFrames<R> {
    fn press(&mut self, odds: [f64; 5]) -> ButtonState {
        ButtonState {
            a: self.rng.gen_bool(odds[0]),
            b: self.rng.gen_bool(odds[1]),
            c: self.rng.gen_bool(odds[2]),
            d: self.rng.gen_bool(odds[3]),
            button: self.rng.gen_bool(odds[4]),
        }
    }

    fn anywhere(&mut self) -> (f64, f64) {
        (self.rng.gen_range(-1.0..=1.0), self.rng.gen_range(-1.0..=1.0))
    }
}

impl<R: Rng> Iterator for PatternFrames<R> {
    type Item = InputFrame;

    fn next(&mut self) -> Option<InputFrame> {
        if let Some(limit) = self.pattern.frame_limit() {
            if self.emitted >= limit {
                return None;
            }
        }
        self.emitted += 1;

        let delay = self.pattern.frame_interval();
        let frame = match self.pattern {
            MovementPattern::Circle => {
                let t = self.phase;
                self.phase += SWEEP_STEP;
                InputFrame {
                    x: SWEEP_RADIUS * t.cos(),
                    y: SWEEP_RADIUS * t.sin(),
                    buttons: None,
                    delay,
                }
            }
            MovementPattern::FigureEight => {
                let t = self.phase;
                self.phase += SWEEP_STEP;
                InputFrame {
                    x: SWEEP_RADIUS * t.sin(),
                    y: SWEEP_RADIUS * (2.0 * t).sin(),
                    buttons: None,
                    delay,
                }
            }
            MovementPattern::Random => {
                let (x, y) = self.anywhere();
                let buttons = self.press([0.25, 0.30, 0.38, 0.35, 0.20]);
                InputFrame {
                    x,
                    y,
                    buttons: Some(buttons),
                    delay,
                }
            }
            MovementPattern::ButtonMash => {
                let buttons = self.press([0.3, 0.3, 0.4, 0.3, 0.5]);
                let (x, y) = self.anywhere();
                InputFrame {
                    x,
                    y,
                    buttons: Some(buttons),
                    delay,
                }
            }
        };

        Some(frame)
    }
}
