//! The gatehouse binary: composition root for the access controller.
//!
//! Builds every store and worker from environment-backed settings,
//! starts the Wiegand decoders and the access pipeline, and serves the
//! HTTP control plane. Physical GPIO is an external collaborator behind
//! the hardware traits; this binary composes the channel-driven
//! implementations, which also back GPIO-less development boxes.

use anyhow::Context;
use clap::Parser;
use gatehouse_core::constants::{DEFAULT_SESSION_TTL_HOURS, RELAY_COUNT};
use gatehouse_engine::AccessPolicy;
use gatehouse_hardware::mock::{MockEdgePort, MockPin};
use gatehouse_hardware::traits::OutputPin;
use gatehouse_hardware::{DecoderSupervisor, RelayBank};
use gatehouse_server::auth::{AuthContext, Credentials, SessionStore, password_digest};
use gatehouse_server::state::{decoder_config, spawn_decoder_reloader};
use gatehouse_server::{AppState, build_router, housekeeping};
use gatehouse_storage::{
    ConfigStore, DailyStats, FailedUploadCache, RuntimeConfig, TransactionLog, UserStore,
};
use gatehouse_uplink::mock::MockStore;
use gatehouse_uplink::{CacheDrainer, ReachabilityProbe, Uploader};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
const SCAN_CHANNEL_CAPACITY: usize = 64;
const UPLOAD_CHANNEL_CAPACITY: usize = 256;

#[derive(Parser)]
#[command(name = "gatehouse", about = "Networked RFID access controller")]
struct Args {
    /// Base directory for all persisted files
    #[arg(long, default_value = "/var/lib/gatehouse", env = "GATEHOUSE_BASE_DIR")]
    base_dir: PathBuf,

    /// Control-plane listen address
    #[arg(long, default_value = "0.0.0.0:5001", env = "GATEHOUSE_LISTEN_ADDR")]
    addr: SocketAddr,

    /// Admin username
    #[arg(long, default_value = "admin", env = "GATEHOUSE_ADMIN_USERNAME")]
    admin_username: String,

    /// Admin password digest (hex SHA-256); defaults to the digest of
    /// "admin123" for first boot
    #[arg(long, env = "GATEHOUSE_ADMIN_PASSWORD_HASH")]
    admin_password_hash: Option<String>,

    /// Legacy shared secret required on mutating routes (unset = off)
    #[arg(long, env = "GATEHOUSE_API_KEY")]
    api_key: Option<String>,

    /// Session lifetime in hours
    #[arg(long, default_value_t = DEFAULT_SESSION_TTL_HOURS, env = "GATEHOUSE_SESSION_TTL_HOURS")]
    session_ttl_hours: i64,

    /// Transaction log storage cap in GB
    #[arg(long, default_value_t = 16.0, env = "GATEHOUSE_MAX_TX_STORAGE_GB")]
    max_tx_storage_gb: f64,

    /// Fraction of the cap to free when the cap is exceeded
    #[arg(long, default_value_t = 0.5, env = "GATEHOUSE_CLEANUP_FRACTION")]
    cleanup_fraction: f64,

    /// Seconds between storage cap checks
    #[arg(long, default_value_t = 300, env = "GATEHOUSE_STORAGE_CHECK_INTERVAL")]
    storage_check_interval: u64,

    /// Default scan dedup window (seconds), used when no config.json exists
    #[arg(long, default_value_t = 60, env = "GATEHOUSE_SCAN_DELAY_SECONDS")]
    scan_delay_seconds: u64,

    /// Default per-reader Wiegand widths, used when no config.json exists
    #[arg(long, default_value_t = 26, env = "GATEHOUSE_WIEGAND_BITS_READER_1")]
    wiegand_bits_reader_1: u8,
    #[arg(long, default_value_t = 26, env = "GATEHOUSE_WIEGAND_BITS_READER_2")]
    wiegand_bits_reader_2: u8,
    #[arg(long, default_value_t = 26, env = "GATEHOUSE_WIEGAND_BITS_READER_3")]
    wiegand_bits_reader_3: u8,

    /// Default Wiegand inter-bit timeout (ms), used when no config.json exists
    #[arg(long, default_value_t = 25, env = "GATEHOUSE_WIEGAND_TIMEOUT_MS")]
    wiegand_timeout_ms: u64,

    /// Entity id stamped on remote documents
    #[arg(long, default_value = "default_entity", env = "GATEHOUSE_ENTITY_ID")]
    entity_id: String,

    /// Reachability probe target
    #[arg(long, default_value = "clients3.google.com:80", env = "GATEHOUSE_PROBE_ADDR")]
    probe_addr: String,

    /// Accept uploads into an in-process store instead of a real remote
    /// (development and bench setups)
    #[arg(long, default_value_t = false, env = "GATEHOUSE_EMULATE_REMOTE")]
    emulate_remote: bool,
}

impl Args {
    fn default_runtime_config(&self) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.wiegand_bits.reader_1 = self.wiegand_bits_reader_1;
        config.wiegand_bits.reader_2 = self.wiegand_bits_reader_2;
        config.wiegand_bits.reader_3 = self.wiegand_bits_reader_3;
        config.wiegand_timeout_ms = self.wiegand_timeout_ms;
        config.scan_delay_seconds = self.scan_delay_seconds;
        config.entity_id = self.entity_id.clone();
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    let args = Args::parse();

    std::fs::create_dir_all(&args.base_dir)
        .with_context(|| format!("failed to create base dir {}", args.base_dir.display()))?;

    // Persistence
    let users = Arc::new(UserStore::load(&args.base_dir));
    let config = Arc::new(
        ConfigStore::load(&args.base_dir, args.default_runtime_config())
            .context("invalid configuration")?,
    );
    let txlog = Arc::new(TransactionLog::open(&args.base_dir)?);
    let stats = Arc::new(DailyStats::new(&args.base_dir));
    let cache = Arc::new(FailedUploadCache::new(&args.base_dir));

    // Hardware: channel-driven implementations; a real GPIO integration
    // feeds the same traits.
    let pins: Vec<Box<dyn OutputPin>> = (0..RELAY_COUNT)
        .map(|_| Box::new(MockPin::new()) as Box<dyn OutputPin>)
        .collect();
    let relays = RelayBank::new(pins).context("relay bank init failed")?;

    let (scan_tx, scan_rx) = mpsc::channel(SCAN_CHANNEL_CAPACITY);
    let (upload_tx, upload_rx) = mpsc::channel(UPLOAD_CHANNEL_CAPACITY);
    let (reload_tx, reload_rx) = mpsc::channel(4);

    let (edge_port, _reader_handle) = MockEdgePort::new();
    let mut supervisor = DecoderSupervisor::new(edge_port, scan_tx);
    supervisor
        .start(&decoder_config(&config.get()))
        .context("failed to start wiegand decoders")?;
    let decoders_ok = Arc::new(AtomicBool::new(true));
    spawn_decoder_reloader(supervisor, reload_rx, Arc::clone(&decoders_ok));

    // Access pipeline
    let policy = AccessPolicy::new(
        Arc::clone(&users),
        Arc::clone(&config),
        relays.clone(),
        Arc::clone(&txlog),
        Arc::clone(&stats),
        Arc::clone(&cache),
        upload_tx,
    );
    tokio::spawn(policy.run(scan_rx));

    // Uplink
    let probe = Arc::new(ReachabilityProbe::new(args.probe_addr.clone()));
    let remote = args.emulate_remote.then(|| Arc::new(MockStore::new()));
    let remote_attached = remote.is_some();
    tokio::spawn(
        Uploader::new(
            remote.clone(),
            Arc::clone(&probe),
            Arc::clone(&cache),
            Arc::clone(&config),
        )
        .run(upload_rx),
    );
    tokio::spawn(
        CacheDrainer::new(
            remote,
            Arc::clone(&probe),
            Arc::clone(&cache),
            Arc::clone(&config),
        )
        .run(),
    );

    // Auth
    let digest = args
        .admin_password_hash
        .clone()
        .unwrap_or_else(|| password_digest("admin123"));
    let credentials = Arc::new(Credentials::new(
        args.admin_username.clone(),
        digest,
        args.api_key.clone(),
    ));
    let sessions = Arc::new(SessionStore::new(args.session_ttl_hours));
    let auth = Arc::new(AuthContext::new(
        credentials,
        Arc::clone(&sessions),
        Arc::clone(&config),
    ));

    // Housekeeping
    let storage_cap_bytes = (args.max_tx_storage_gb * 1024.0 * 1024.0 * 1024.0) as u64;
    tokio::spawn(housekeeping::session_sweeper(
        sessions,
        SESSION_SWEEP_INTERVAL,
    ));
    tokio::spawn(housekeeping::storage_monitor(
        Arc::clone(&txlog),
        storage_cap_bytes,
        args.cleanup_fraction,
        Duration::from_secs(args.storage_check_interval),
    ));

    let state = AppState {
        users,
        config,
        txlog,
        stats,
        relays,
        auth,
        probe,
        reload_tx,
        config_write_lock: Arc::new(tokio::sync::Mutex::new(())),
        remote_attached,
        decoders_ok,
        storage_cap_bytes,
        cleanup_fraction: args.cleanup_fraction,
    };

    let app = build_router(state);
    info!(addr = %args.addr, base_dir = %args.base_dir.display(), "gatehouse ready; waiting for scans");
    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
