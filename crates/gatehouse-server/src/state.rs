//! The composition root.
//!
//! Everything the handlers touch hangs off [`AppState`], built once at
//! startup. Decoder restarts are requested over a channel so the state
//! stays independent of the concrete edge-source type; the supervisor
//! task (spawned by the binary, which knows the hardware) answers each
//! request with the restart outcome.

use crate::auth::AuthContext;
use gatehouse_hardware::traits::{EdgePort, OutputPin};
use gatehouse_hardware::{DecoderConfig, DecoderSupervisor, RelayBank};
use gatehouse_storage::{ConfigStore, DailyStats, RuntimeConfig, TransactionLog, UserStore};
use gatehouse_uplink::ReachabilityProbe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The relay bank as the control plane sees it: pin type erased.
pub type Relays = RelayBank<Box<dyn OutputPin>>;

/// A decoder restart request, answered with the restart outcome.
pub struct DecoderReload {
    pub config: DecoderConfig,
    pub reply: oneshot::Sender<Result<(), String>>,
}

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub config: Arc<ConfigStore>,
    pub txlog: Arc<TransactionLog>,
    pub stats: Arc<DailyStats>,
    pub relays: Relays,
    pub auth: Arc<AuthContext>,
    pub probe: Arc<ReachabilityProbe>,
    pub reload_tx: mpsc::Sender<DecoderReload>,

    /// Held across config validate + persist + decoder restart so
    /// concurrent updates serialize.
    pub config_write_lock: Arc<Mutex<()>>,

    /// Whether a remote document-store client is wired in.
    pub remote_attached: bool,

    /// Decoders currently running (updated by the supervisor task).
    pub decoders_ok: Arc<AtomicBool>,

    pub storage_cap_bytes: u64,
    pub cleanup_fraction: f64,
}

/// Extract the decoder slice of the runtime config.
#[must_use]
pub fn decoder_config(config: &RuntimeConfig) -> DecoderConfig {
    DecoderConfig {
        bits: config.wiegand_bits.as_array(),
        timeout_ms: config.wiegand_timeout_ms,
    }
}

/// Serve decoder restart requests until the control plane drops its
/// sender.
pub fn spawn_decoder_reloader<P: EdgePort>(
    mut supervisor: DecoderSupervisor<P>,
    mut reload_rx: mpsc::Receiver<DecoderReload>,
    decoders_ok: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = reload_rx.recv().await {
            let result = supervisor
                .restart(&request.config)
                .await
                .map_err(|e| e.to_string());
            decoders_ok.store(result.is_ok(), Ordering::SeqCst);
            match &result {
                Ok(()) => info!("wiegand decoders restarted"),
                Err(error) => error!(%error, "wiegand decoder restart failed"),
            }
            // The requester may have given up waiting; that's fine.
            let _ = request.reply.send(result);
        }
    })
}
