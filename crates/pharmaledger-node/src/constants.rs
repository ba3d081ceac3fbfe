pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 30;
/// Full re-validation every N health polls; 0 disables it.
pub const DEFAULT_VALIDATE_EVERY: u64 = 10;
pub(crate) const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
