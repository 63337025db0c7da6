//! Miner configuration.

use std::path::PathBuf;
use std::time::Duration;

use vscrape_media::download::DEFAULT_MAX_FILESIZE_BYTES;
use vscrape_models::constants::{
    CANDIDATE_OVERFETCH, FIVE_MINUTES, MAX_VIDEO_LENGTH, SEARCH_FAN_OUT,
    SEARCH_RESULTS_PER_ATTEMPT, VALIDATOR_TIMEOUT_SECS,
};

/// Miner configuration.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Query used when none is given on the command line
    pub query: Option<String>,
    /// Records wanted per acquire round
    pub target_count: usize,
    /// Candidates processed concurrently
    pub max_parallel: usize,
    /// Parallel search attempts per query
    pub search_fan_out: usize,
    /// Entries requested from the provider per search attempt
    pub search_results: usize,
    /// Candidates fetched relative to the target count
    pub overfetch: f64,
    /// Maximum seconds downloaded from any source
    pub download_ceiling_secs: u32,
    /// Maximum bytes downloaded for one candidate
    pub download_max_bytes: u64,
    /// Maximum emitted clip length
    pub max_clip_secs: u32,
    /// Caller-visible deadline for one round
    pub deadline: Duration,
    /// Per-download process timeout
    pub download_timeout: Duration,
    /// Per-clip FFmpeg timeout
    pub clip_timeout: Duration,
    /// Search process timeout
    pub search_timeout: Duration,
    /// Newline or JSON-array file of already known ids
    pub known_ids_path: Option<PathBuf>,
    /// Parent directory for temporary media
    pub work_dir: Option<PathBuf>,
    /// Comma-separated proxy URLs
    pub egress_proxies: Option<String>,
    /// Rotate over discovered global IPv6 source addresses
    pub ipv6_rotation: bool,
    /// Blocked egress cooldown
    pub egress_cooldown: Duration,
    /// Serve Prometheus metrics
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            query: None,
            target_count: 8,
            max_parallel: 8,
            search_fan_out: SEARCH_FAN_OUT,
            search_results: SEARCH_RESULTS_PER_ATTEMPT,
            overfetch: CANDIDATE_OVERFETCH,
            download_ceiling_secs: FIVE_MINUTES,
            download_max_bytes: DEFAULT_MAX_FILESIZE_BYTES,
            max_clip_secs: MAX_VIDEO_LENGTH,
            deadline: Duration::from_secs(VALIDATOR_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(120),
            clip_timeout: Duration::from_secs(60),
            search_timeout: Duration::from_secs(60),
            known_ids_path: None,
            work_dir: None,
            egress_proxies: None,
            ipv6_rotation: false,
            egress_cooldown: Duration::from_secs(300),
            metrics_enabled: false,
            metrics_port: 9090,
        }
    }
}

impl MinerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            query: std::env::var("MINER_QUERY")
                .ok()
                .filter(|q| !q.trim().is_empty()),
            target_count: env_parse("MINER_TARGET_COUNT", d.target_count),
            max_parallel: env_parse("MINER_MAX_PARALLEL", d.max_parallel).max(1),
            search_fan_out: env_parse("MINER_SEARCH_FAN_OUT", d.search_fan_out).max(1),
            search_results: env_parse("MINER_SEARCH_RESULTS", d.search_results).max(1),
            overfetch: env_parse("MINER_OVERFETCH", d.overfetch).max(1.0),
            download_ceiling_secs: env_parse("MINER_DOWNLOAD_CEILING_SECS", d.download_ceiling_secs)
                .max(1),
            download_max_bytes: env_parse("MINER_DOWNLOAD_MAX_BYTES", d.download_max_bytes).max(1),
            max_clip_secs: env_parse("MINER_MAX_CLIP_SECS", d.max_clip_secs).max(1),
            deadline: Duration::from_secs(env_parse("MINER_DEADLINE_SECS", d.deadline.as_secs())),
            download_timeout: Duration::from_secs(env_parse(
                "MINER_DOWNLOAD_TIMEOUT_SECS",
                d.download_timeout.as_secs(),
            )),
            clip_timeout: Duration::from_secs(env_parse(
                "MINER_CLIP_TIMEOUT_SECS",
                d.clip_timeout.as_secs(),
            )),
            search_timeout: Duration::from_secs(env_parse(
                "MINER_SEARCH_TIMEOUT_SECS",
                d.search_timeout.as_secs(),
            )),
            known_ids_path: std::env::var("MINER_KNOWN_IDS_PATH").ok().map(PathBuf::from),
            work_dir: std::env::var("MINER_WORK_DIR").ok().map(PathBuf::from),
            egress_proxies: std::env::var("EGRESS_PROXIES")
                .ok()
                .filter(|p| !p.trim().is_empty()),
            ipv6_rotation: env_flag("EGRESS_IPV6_ROTATION"),
            egress_cooldown: Duration::from_secs(env_parse(
                "EGRESS_COOLDOWN_SECS",
                d.egress_cooldown.as_secs(),
            )),
            metrics_enabled: env_flag("METRICS_ENABLED"),
            metrics_port: env_parse("METRICS_PORT", d.metrics_port),
        }
    }

    /// Candidate count requested from the search stage for `target_count`.
    ///
    /// `max(target, floor(overfetch * target))`.
    pub fn max_results(&self, target_count: usize) -> usize {
        let scaled = (self.overfetch * target_count as f64).floor() as usize;
        scaled.max(target_count)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MinerConfig::default();
        assert_eq!(config.target_count, 8);
        assert_eq!(config.search_fan_out, 3);
        assert_eq!(config.max_clip_secs, 120);
        assert_eq!(config.download_ceiling_secs, 300);
        assert_eq!(config.download_max_bytes, 100 * 1024 * 1024);
        assert_eq!(config.deadline, Duration::from_secs(90));
    }

    #[test]
    fn test_max_results() {
        let config = MinerConfig::default();
        assert_eq!(config.max_results(8), 12);
        assert_eq!(config.max_results(1), 1);
        assert_eq!(config.max_results(3), 4);
        assert_eq!(config.max_results(0), 0);

        let no_overfetch = MinerConfig {
            overfetch: 1.0,
            ..MinerConfig::default()
        };
        assert_eq!(no_overfetch.max_results(8), 8);
    }
}
