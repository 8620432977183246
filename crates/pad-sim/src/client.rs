//! Mobile Client
//!
//! One simulated phone controller: connects, registers as a player, then
//! streams stick and button frames while listening for server messages.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use pad_core::{ButtonState, ControllerInput, Message, PlayerRegistration};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, SimError};
use crate::pattern::{InputFrame, MovementPattern};

/// Share of inputs echoed to the log in verbose mode
const INPUT_LOG_SAMPLE: f64 = 0.05;

type ControllerSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct MobileClient {
    slot: usize,
    server_url: String,
    registration: PlayerRegistration,
    pattern: MovementPattern,
    verbose: bool,
    writer: Mutex<Option<SplitSink<ControllerSocket, Message>>>,
    reader: Mutex<Option<SplitStream<ControllerSocket>>>,
    buttons: Mutex<ButtonState>,
    connected: AtomicBool,
    registered: AtomicBool,
    stop: CancellationToken,
    inputs_sent: AtomicU64,
    messages_received: AtomicU64,
}

impl MobileClient {
    /// Controller for the 1-based `slot`, named `player<slot>`.
    ///
    /// `stop` ends the client's listener and pattern; pass a child of a
    /// fleet-wide token to stop every client at once.
    pub fn new(
        slot: usize,
        server_url: impl Into<String>,
        pattern: MovementPattern,
        stop: CancellationToken,
    ) -> Self {
        Self {
            slot,
            server_url: server_url.into(),
            registration: PlayerRegistration::for_slot(slot),
            pattern,
            verbose: false,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            buttons: Mutex::new(ButtonState::default()),
            connected: AtomicBool::new(false),
            registered: AtomicBool::new(false),
            stop,
            inputs_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn name(&self) -> &str {
        &self.registration.name
    }

    pub fn registration(&self) -> &PlayerRegistration {
        &self.registration
    }

    pub fn pattern(&self) -> MovementPattern {
        self.pattern
    }

    /// Connected and not yet stopped
    pub fn is_running(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.stop.is_cancelled()
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn inputs_sent(&self) -> u64 {
        self.inputs_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Stop the listener and pattern; the socket stays open until `disconnect`
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Open the WebSocket to the server
    pub async fn connect(&self) -> Result<()> {
        info!("Client {} connecting to {}", self.slot, self.server_url);
        let (socket, _response) = tokio_tungstenite::connect_async(self.server_url.as_str())
            .await
            .map_err(|e| SimError::Connect {
                url: self.server_url.clone(),
                reason: e.to_string(),
            })?;

        let (writer, reader) = socket.split();
        *self.writer.lock().await = Some(writer);
        *self.reader.lock().await = Some(reader);
        self.connected.store(true, Ordering::SeqCst);
        info!("Client {} connected", self.slot);
        Ok(())
    }

    /// Send the player registration; returns false if already registered
    pub async fn register(&self) -> Result<bool> {
        if self.registered.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let message = serde_json::to_string(&self.registration)?;
        self.send_text(message).await?;
        self.registered.store(true, Ordering::SeqCst);
        info!(
            "Client {} registered as {} ({})",
            self.slot, self.registration.name, self.registration.color
        );
        Ok(true)
    }

    /// Send one stick/button frame. A failed send stops the client.
    pub async fn send_input(&self, frame: &InputFrame) -> Result<()> {
        let buttons = {
            let mut state = self.buttons.lock().await;
            if let Some(pressed) = frame.buttons {
                *state = pressed;
            }
            *state
        };

        let message = serde_json::to_string(&ControllerInput::analog(frame.x, frame.y, buttons))?;
        if let Err(e) = self.send_text(message).await {
            warn!("Client {} failed to send input: {}", self.slot, e);
            self.stop();
            return Err(e);
        }
        self.inputs_sent.fetch_add(1, Ordering::Relaxed);

        let sampled = self.verbose && rand::thread_rng().gen_bool(INPUT_LOG_SAMPLE);
        if sampled {
            info!(
                "Client {} input: x={:.2}, y={:.2}, buttons={:?}",
                self.slot, frame.x, frame.y, buttons
            );
        }
        Ok(())
    }

    async fn send_text(&self, text: String) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(SimError::NotConnected(self.slot))?;
        writer
            .send(Message::text(text))
            .await
            .map_err(|e| SimError::Send(e.to_string()))
    }

    /// Read server messages until stopped or the server goes away
    pub async fn listen(&self) {
        let Some(mut reader) = self.reader.lock().await.take() else {
            debug!("Client {} has nothing to listen on", self.slot);
            return;
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                next = reader.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    self.messages_received.fetch_add(1, Ordering::Relaxed);
                    if text.contains("controller") {
                        trace!("Client {} received: {}", self.slot, text);
                    } else {
                        debug!("Client {} received: {}", self.slot, text);
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    self.messages_received.fetch_add(1, Ordering::Relaxed);
                    trace!("Client {} received {} binary bytes", self.slot, data.len());
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("Client {} closed by server: {:?}", self.slot, frame);
                    self.stop();
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Client {} listen error: {}", self.slot, e);
                    self.stop();
                    break;
                }
                None => {
                    info!("Client {} connection closed by server", self.slot);
                    self.stop();
                    break;
                }
            }
        }

        *self.reader.lock().await = Some(reader);
    }

    /// Play the client's movement pattern until it ends or the client stops
    pub async fn run_pattern(&self) {
        if self.verbose {
            info!("Client {} starting {} movement pattern", self.slot, self.pattern);
        }

        for frame in self.pattern.frames(StdRng::from_entropy()) {
            if !self.is_running() {
                break;
            }
            if self.send_input(&frame).await.is_err() {
                break;
            }
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(frame.delay) => {}
            }
        }

        debug!(
            "Client {} finished {} after {} input(s)",
            self.slot,
            self.pattern,
            self.inputs_sent()
        );
    }

    /// Stop and close the socket; calling it again does nothing
    pub async fn disconnect(&self) {
        self.stop();
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }

        let Some(mut writer) = self.writer.lock().await.take() else {
            return;
        };
        if let Err(e) = writer.close().await {
            debug!("Client {} close failed: {}", self.slot, e);
        }
        self.reader.lock().await.take();
        info!("Client {} disconnected", self.slot);
    }
}

impl std::fmt::Debug for MobileClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MobileClient")
            .field("slot", &self.slot)
            .field("server_url", &self.server_url)
            .field("pattern", &self.pattern)
            .field("running", &self.is_running())
            .field("registered", &self.is_registered())
            .finish()
    }
}
