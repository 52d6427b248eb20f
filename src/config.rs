use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Shortest capture a job will run, in seconds.
pub const MIN_DURATION_SECS: u64 = 1;
/// Longest capture a job will run, in seconds.
pub const MAX_DURATION_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Explicit tshark executable; searched for when unset.
    pub tshark_path: Option<PathBuf>,
    /// Interface selector used when a request names none.
    pub default_interface: String,
    /// Extra time a capture may take beyond its requested duration.
    pub grace: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tshark_path: None,
            default_interface: "1".to_string(),
            grace: Duration::from_secs(30),
        }
    }
}

impl CaptureConfig {
    /// Defaults overridden by `NETMAPPER_TSHARK`, `NETMAPPER_INTERFACE` and
    /// `NETMAPPER_GRACE_SECS`, read from the environment or a `.env` file.
    pub fn from_env() -> Self {
        dotenv().ok();
        let mut config = Self::default();

        if let Some(path) = non_empty_var("NETMAPPER_TSHARK") {
            config.tshark_path = Some(PathBuf::from(path));
        }
        if let Some(interface) = non_empty_var("NETMAPPER_INTERFACE") {
            config.default_interface = interface;
        }
        if let Some(grace) = non_empty_var("NETMAPPER_GRACE_SECS") {
            match grace.parse::<u64>() {
                Ok(secs) => config.grace = Duration::from_secs(secs),
                Err(_) => warn!("Ignoring NETMAPPER_GRACE_SECS={grace:?}: not a number of seconds"),
            }
        }
        config
    }

    /// Clamps a requested duration into the supported range.
    pub fn clamp_duration(secs: u64) -> u64 {
        secs.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
    }

    /// Hard limit for a capture of `secs` seconds.
    pub fn deadline(&self, secs: u64) -> Duration {
        Duration::from_secs(secs) + self.grace
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
