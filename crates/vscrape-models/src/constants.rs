//! Pipeline-wide defaults.

/// Length assumed for search entries that report no duration, and the
/// default ceiling on how much of a source is downloaded.
pub const FIVE_MINUTES: u32 = 300;

/// Hard maximum length of an emitted clip, in seconds.
pub const MAX_VIDEO_LENGTH: u32 = 120;

/// Time budget a validator gives a miner to answer, in seconds.
pub const VALIDATOR_TIMEOUT_SECS: u64 = 90;

/// Number of parallel search attempts per query.
pub const SEARCH_FAN_OUT: usize = 3;

/// Entries requested from the provider per search attempt.
pub const SEARCH_RESULTS_PER_ATTEMPT: usize = 99;

/// Candidates fetched relative to the target count.
pub const CANDIDATE_OVERFETCH: f64 = 1.5;
