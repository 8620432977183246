//! Shutdown Signals
//!
//! Ctrl-C everywhere, plus SIGTERM on unix (`docker stop`, systemd).

use std::io;

use tokio::signal;

pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl ShutdownSignal {
    /// Install the handlers. From here on SIGTERM no longer kills the
    /// process; it is delivered to [`ShutdownSignal::recv`].
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: signal::unix::signal(signal::unix::SignalKind::terminate())?,
        })
    }

    /// Wait for the first shutdown signal and name it
    pub async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            tokio::select! {
                Ok(()) = signal::ctrl_c() => "Ctrl-C",
                _ = self.terminate.recv() => "SIGTERM",
            }
        }

        #[cfg(not(unix))]
        {
            if signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            "Ctrl-C"
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sigterm_is_delivered_instead_of_killing() {
        let mut signals = ShutdownSignal::install().unwrap();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let name = tokio::time::timeout(Duration::from_secs(3), signals.recv())
            .await
            .expect("SIGTERM never arrived");
        assert_eq!(name, "SIGTERM");
    }
}
