use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Notify;

/// Installs SIGINT/SIGTERM handling and exposes a single atomic boolean the
/// control loop polls at every iteration and every reconnect decision point.
pub struct ShutdownHandler {
    stop_requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandler {
    pub fn new() -> Self {
        Self {
            stop_requested: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub async fn install(self) -> ShutdownGuard {
        let stop_requested = Arc::clone(&self.stop_requested);
        let notify = Arc::clone(&self.notify);

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                let mut term =
                    signal::unix::signal(signal::unix::SignalKind::terminate())
                        .expect("failed to install SIGTERM handler");
                tokio::select! {
                    _ = signal::ctrl_c() => tracing::info!("shutdown requested via SIGINT"),
                    _ = term.recv() => tracing::info!("shutdown requested via SIGTERM"),
                }
            }
            #[cfg(not(unix))]
            {
                let _ = signal::ctrl_c().await;
                tracing::info!("shutdown requested via Ctrl-C");
            }
            stop_requested.store(true, Ordering::SeqCst);
            notify.notify_waiters();
        });

        ShutdownGuard {
            stop_requested: self.stop_requested,
            notify: self.notify,
        }
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct ShutdownGuard {
    stop_requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownGuard {
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    #[cfg(test)]
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}
