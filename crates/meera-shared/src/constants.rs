/// Application name
pub const APP_NAME: &str = "Meera";

/// Rows per history page
pub const HISTORY_PAGE_SIZE: usize = 50;

/// Retries for transient history-read failures
pub const HISTORY_MAX_RETRIES: u32 = 3;

/// Linear backoff step between history retries, in milliseconds
pub const HISTORY_RETRY_STEP_MS: u64 = 250;

/// Maximum pages a directed jump walks before giving up
pub const JUMP_MAX_PAGES: u32 = 20;

/// Wall-clock budget for a directed jump, in milliseconds
pub const JUMP_TIME_BUDGET_MS: u64 = 8_000;

/// Auto-pagination cooldown after a directed jump, in milliseconds
pub const JUMP_SCROLL_COOLDOWN_MS: u64 = 1_500;

/// Forward nudge applied when a synthesized timestamp would collide with or
/// precede the newest ledger entry, in milliseconds
pub const TIMESTAMP_NUDGE_MS: i64 = 1;

/// Clock-skew allowance when matching persisted rows against the submission
/// that produced them, in seconds
pub const RECONCILE_SKEW_SECS: i64 = 60;

/// Maximum attachment size in bytes (50 MiB)
pub const MAX_ATTACHMENT_SIZE: usize = 50 * 1024 * 1024;

/// Characters kept in a star's derived summary
pub const STAR_SUMMARY_CHARS: usize = 80;

/// Server-side wait of one realtime long-poll round, in seconds
pub const REALTIME_POLL_WAIT_SECS: u64 = 25;

/// Delay before re-polling after a realtime transport error, in seconds
pub const REALTIME_RETRY_DELAY_SECS: u64 = 3;
