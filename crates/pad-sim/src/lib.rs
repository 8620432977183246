//! Padrelay Controller Simulator
//!
//! Synthetic mobile controllers that register as players and stream stick
//! and button input, used to load a game backend directly or through the
//! relay proxy.

pub mod client;
pub mod error;
pub mod fleet;
pub mod pattern;
pub mod setup;

pub use client::MobileClient;
pub use error::{Result, SimError};
pub use fleet::{Fleet, FleetReport, FleetTiming};
pub use pattern::{InputFrame, MovementPattern, PatternFrames};
pub use setup::{PlayerSetup, SimulationSetup};
