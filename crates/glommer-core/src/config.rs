use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for a scrape run. All have safe defaults (spec.md §6,
/// "Environment / config").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Number of channel workers (`P_c`).
    #[serde(default = "default_channel_workers")]
    pub channel_workers: usize,

    /// Number of entry workers (`P_e`).
    #[serde(default = "default_entry_workers")]
    pub entry_workers: usize,

    /// Entry queue capacity, expressed as a multiple of `entry_workers`.
    #[serde(default = "default_entry_queue_factor")]
    pub entry_queue_factor: usize,

    /// Insert buffer batch size.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-host concurrent connection cap.
    #[serde(default = "default_host_connection_limit")]
    pub host_connection_limit: usize,

    /// Per-request total timeout.
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,

    /// Deadline wrapping the whole run.
    #[serde(default = "default_global_timeout", with = "duration_secs")]
    pub global_timeout: Duration,
}

impl EngineConfig {
    pub fn entry_queue_capacity(&self) -> usize {
        self.entry_queue_factor * self.entry_workers
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            channel_workers: default_channel_workers(),
            entry_workers: default_entry_workers(),
            entry_queue_factor: default_entry_queue_factor(),
            batch_size: default_batch_size(),
            host_connection_limit: default_host_connection_limit(),
            request_timeout: default_request_timeout(),
            global_timeout: default_global_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 Gecko/20100101 glommer/1.0".to_string()
}

fn default_channel_workers() -> usize {
    2
}

fn default_entry_workers() -> usize {
    32
}

fn default_entry_queue_factor() -> usize {
    2
}

fn default_batch_size() -> usize {
    100
}

fn default_host_connection_limit() -> usize {
    2
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(6)
}

fn default_global_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
