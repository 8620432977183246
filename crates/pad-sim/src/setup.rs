//! Simulation setup file
//!
//! JSON document naming the server to dial, how long to run, and which
//! movement pattern each player plays:
//!
//! ```json
//! {
//!   "websocket": "ws://localhost:8182",
//!   "duration": 30,
//!   "player1": { "behaviour": "circle" },
//!   "player3": { "behaviour": "button_mash" }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::pattern::MovementPattern;

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8182";
pub const DEFAULT_DURATION_SECS: u64 = 60;
pub const DEFAULT_CLIENTS: usize = 4;

/// Per-player section of the setup file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSetup {
    pub behaviour: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSetup {
    /// Server the controllers dial, usually the relay proxy
    pub websocket: String,

    /// Seconds of simulated play
    pub duration: u64,

    /// Log sampled inputs and pattern choices
    pub verbose: bool,

    /// Number of controllers to start
    pub clients: usize,

    /// Player sections, keyed by player name (`player1`, ...)
    #[serde(flatten)]
    pub players: HashMap<String, PlayerSetup>,
}

impl Default for SimulationSetup {
    fn default() -> Self {
        Self {
            websocket: DEFAULT_SERVER_URL.to_string(),
            duration: DEFAULT_DURATION_SECS,
            verbose: false,
            clients: DEFAULT_CLIENTS,
            players: HashMap::new(),
        }
    }
}

impl SimulationSetup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let setup: SimulationSetup = serde_json::from_str(content)?;
        setup.validate()?;
        Ok(setup)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.websocket.starts_with("ws://") {
            return Err(SimError::Setup(format!(
                "websocket must be a ws:// URL, got '{}'",
                self.websocket
            )));
        }
        if self.clients == 0 {
            return Err(SimError::Setup("clients must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration)
    }

    /// Behaviour configured for a player, if any
    pub fn behaviour_for(&self, player: &str) -> Option<&str> {
        self.players
            .get(player)
            .and_then(|p| p.behaviour.as_deref())
    }

    /// Pattern a player plays; players without a section play `Random`
    pub fn pattern_for(&self, player: &str) -> MovementPattern {
        MovementPattern::from_behaviour(self.behaviour_for(player))
    }

    pub fn with_websocket(mut self, url: impl Into<String>) -> Self {
        self.websocket = url.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration.as_secs();
        self
    }

    pub fn with_clients(mut self, clients: usize) -> Self {
        self.clients = clients;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_behaviour(mut self, player: impl Into<String>, pattern: MovementPattern) -> Self {
        self.players.insert(
            player.into(),
            PlayerSetup {
                behaviour: Some(pattern.to_string()),
            },
        );
        self
    }
}
