/// Reader / relay topology
pub const READER_COUNT: u8 = 3;
pub const RELAY_COUNT: usize = 3;

/// Wiegand frame widths accepted by the decoders
pub const WIEGAND_BITS_26: u8 = 26;
pub const WIEGAND_BITS_34: u8 = 34;

/// Config validation bounds
pub const MIN_WIEGAND_TIMEOUT_MS: u64 = 10;
pub const MAX_WIEGAND_TIMEOUT_MS: u64 = 100;
pub const MIN_SCAN_DELAY_SECS: u64 = 1;
pub const MAX_SCAN_DELAY_SECS: u64 = 300;
pub const MIN_ENTRY_EXIT_GAP_SECS: u64 = 1;
pub const MAX_ENTRY_EXIT_GAP_SECS: u64 = 300;

/// Card format (decimal digits)
pub const MIN_CARD_LENGTH: usize = 1;
pub const MAX_CARD_LENGTH: usize = 20;

/// Relay pulse default (seconds)
pub const DEFAULT_PULSE_SECS: f64 = 1.0;

/// Session tokens
pub const SESSION_TOKEN_BYTES: usize = 32;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Security settings bounds
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MIN_API_KEY_LENGTH: usize = 16;

/// Analytics scan limits
pub const ANALYTICS_MAX_DAYS: u32 = 365;
pub const ANALYTICS_TX_PER_DAY_ESTIMATE: usize = 500;
pub const ANALYTICS_SCAN_CAP: usize = 5000;
pub const REPORT_TX_PER_DAY_ESTIMATE: usize = 100;
pub const REPORT_SCAN_CAP: usize = 2000;
pub const REPORT_TIMELINE_LIMIT: usize = 20;
pub const TOP_CARDS_LIMIT: usize = 10;

/// Display names for unresolved identities
pub const NAME_UNKNOWN: &str = "Unknown";
pub const NAME_BLOCKED: &str = "Blocked";
