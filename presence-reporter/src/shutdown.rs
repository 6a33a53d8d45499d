//! Process shutdown hook

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Single entry point that stops the scheduler loop and the bridge
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            warn!("Terminating the program");
            self.token.cancel();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger on SIGINT, SIGTERM or SIGHUP (Ctrl-C only on non-Unix)
    pub async fn on_signal(self) {
        wait_for_signal().await;
        self.trigger();
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut term, mut hup) = match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
            (Ok(term), Ok(hup)) => (term, hup),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install SIGTERM/SIGHUP handlers: {}", e);
                return std::future::pending::<&'static str>().await;
            }
        };
        tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = hup.recv() => "SIGHUP",
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT (Ctrl-C), shutting down"),
        name = terminate => info!("Received {}, shutting down", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_cancels_token() {
        let shutdown = Shutdown::new();
        let token = shutdown.token();
        assert!(!token.is_cancelled());

        shutdown.clone().trigger();
        assert!(shutdown.is_triggered());
        token.cancelled().await;
    }
}
