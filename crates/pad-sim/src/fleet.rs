//! Client Fleet
//!
//! Drives a group of mobile clients through the full test: staggered
//! connects, staggered registration, a timed play phase and staggered
//! disconnects.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::client::MobileClient;
use crate::setup::SimulationSetup;

/// Pauses between per-client steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FleetTiming {
    pub connect_stagger: Duration,
    pub register_stagger: Duration,
    pub disconnect_stagger: Duration,
}

impl Default for FleetTiming {
    fn default() -> Self {
        Self {
            connect_stagger: Duration::from_millis(500),
            register_stagger: Duration::from_millis(500),
            disconnect_stagger: Duration::from_millis(200),
        }
    }
}

impl FleetTiming {
    /// No pauses at all
    pub fn immediate() -> Self {
        Self {
            connect_stagger: Duration::ZERO,
            register_stagger: Duration::ZERO,
            disconnect_stagger: Duration::ZERO,
        }
    }
}

/// What a fleet run achieved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetReport {
    pub requested: usize,
    pub connected: usize,
    pub registered: usize,
    pub inputs_sent: u64,
    pub messages_received: u64,
    pub elapsed: Duration,
}

impl fmt::Display for FleetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} client(s) connected, {} registered, {} input(s) sent, {} message(s) received in {:.1}s",
            self.connected,
            self.requested,
            self.registered,
            self.inputs_sent,
            self.messages_received,
            self.elapsed.as_secs_f64()
        )
    }
}

pub struct Fleet {
    setup: SimulationSetup,
    timing: FleetTiming,
    cancel: CancellationToken,
    clients: Vec<Arc<MobileClient>>,
}

impl Fleet {
    pub fn new(setup: SimulationSetup) -> Self {
        Self {
            setup,
            timing: FleetTiming::default(),
            cancel: CancellationToken::new(),
            clients: Vec::new(),
        }
    }

    pub fn with_timing(mut self, timing: FleetTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Token that ends the run early when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Clients that connected successfully
    pub fn clients(&self) -> &[Arc<MobileClient>] {
        &self.clients
    }

    /// Connect, register, play for the configured duration, then disconnect
    pub async fn run(mut self) -> FleetReport {
        let started = Instant::now();
        info!(
            "Starting {} client(s) against {} for {}s",
            self.setup.clients, self.setup.websocket, self.setup.duration
        );

        let connected = self.connect_all().await;
        if connected == 0 {
            warn!("No clients connected to {}", self.setup.websocket);
        } else {
            self.register_all().await;
            self.play().await;
        }
        self.disconnect_all().await;

        let report = self.report(started.elapsed());
        info!("Simulation finished: {}", report);
        report
    }

    /// Connect every client in slot order, keeping only those that made it
    pub async fn connect_all(&mut self) -> usize {
        let mut connected = Vec::with_capacity(self.setup.clients);

        for slot in 1..=self.setup.clients {
            if !self.pause(self.timing.connect_stagger).await {
                break;
            }

            let client = MobileClient::new(
                slot,
                self.setup.websocket.as_str(),
                self.setup.pattern_for(&format!("player{}", slot)),
                self.cancel.child_token(),
            )
            .with_verbose(self.setup.verbose);

            match client.connect().await {
                Ok(()) => connected.push(Arc::new(client)),
                Err(e) => warn!("Client {} failed to connect: {}", slot, e),
            }
        }

        info!(
            "Connected {}/{} client(s)",
            connected.len(),
            self.setup.clients
        );
        self.clients = connected;
        self.clients.len()
    }

    /// Register every connected client once
    pub async fn register_all(&self) -> usize {
        let mut registered = 0;
        for client in &self.clients {
            match client.register().await {
                Ok(_) => registered += 1,
                Err(e) => warn!("Client {} failed to register: {}", client.slot(), e),
            }
            if !self.pause(self.timing.register_stagger).await {
                break;
            }
        }
        registered
    }

    /// Run every client's listener and pattern until the duration elapses or
    /// the fleet is cancelled
    pub async fn play(&self) {
        if self.clients.is_empty() {
            return;
        }

        let tracker = TaskTracker::new();
        for client in &self.clients {
            let listener = Arc::clone(client);
            tracker.spawn(async move { listener.listen().await });
            let player = Arc::clone(client);
            tracker.spawn(async move { player.run_pattern().await });
        }
        tracker.close();

        info!(
            "Simulating {}s with {} client(s)",
            self.setup.duration,
            self.clients.len()
        );
        tokio::select! {
            _ = self.cancel.cancelled() => info!("Simulation interrupted"),
            _ = tokio::time::sleep(self.setup.duration()) => {
                info!("{} seconds completed", self.setup.duration);
            }
        }

        for client in &self.clients {
            client.stop();
        }
        tracker.wait().await;
    }

    /// Close every client, pausing between each
    pub async fn disconnect_all(&self) {
        for client in &self.clients {
            client.disconnect().await;
            tokio::time::sleep(self.timing.disconnect_stagger).await;
        }
    }

    pub fn report(&self, elapsed: Duration) -> FleetReport {
        FleetReport {
            requested: self.setup.clients,
            connected: self.clients.len(),
            registered: self.clients.iter().filter(|c| c.is_registered()).count(),
            inputs_sent: self.clients.iter().map(|c| c.inputs_sent()).sum(),
            messages_received: self.clients.iter().map(|c| c.messages_received()).sum(),
            elapsed,
        }
    }

    /// Sleep unless cancelled first; false means stop
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
