//! Default configuration values

/// GDB binary resolved via PATH unless overridden
pub const DEFAULT_GDB_PATH: &str = "gdb";

/// Timeout for a single MI request/response round trip
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2_000;

/// Wall-clock limit for compiling submitted sources
pub const DEFAULT_COMPILE_LIMIT_MS: u64 = 10_000;

/// Capacity of the per-session debug event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// How many times session teardown retries a failing terminate
pub const DEFAULT_TERMINATE_RETRIES: u32 = 3;
