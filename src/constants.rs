// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3030;
pub const WS_PATH: &str = "ws";

// Connection tuning
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 54;
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4096;

// Presence tracking
pub const DEFAULT_PRESENCE_TTL_SECS: u64 = 60;
pub const DEFAULT_PRESENCE_SWEEP_SECS: u64 = 30;
pub const PRESENCE_KEY_PREFIX: &str = "presence:";

// HTTP ingestion
pub const MAX_JSON_BODY_SIZE: u64 = 16 * 1024;
pub const MAX_PRESENCE_BATCH: usize = 500;

// Upper bound for any configured duration
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;
