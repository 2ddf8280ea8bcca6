use serde::{Deserialize, Serialize};
use webm_remux_media::remux::DEFAULT_WRITING_APP;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// WritingApp recorded in the output Info element
    #[serde(default = "default_writing_app")]
    pub writing_app: String,

    /// Reject outputs larger than this many bytes (default: 4 GiB)
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: u64,

    /// Run a counting pass before writing anything to disk
    #[serde(default = "default_measure_first")]
    pub measure_first: bool,

    /// Start a new cluster after this many milliseconds (0 = disabled)
    #[serde(default)]
    pub max_cluster_duration_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            writing_app: default_writing_app(),
            max_output_bytes: default_max_output_bytes(),
            measure_first: default_measure_first(),
            max_cluster_duration_ms: 0,
        }
    }
}

impl OutputConfig {
    /// Cluster duration limit in nanoseconds, as the remux core expects it.
    pub fn max_cluster_duration_ns(&self) -> u64 {
        self.max_cluster_duration_ms.saturating_mul(1_000_000)
    }
}

fn default_writing_app() -> String {
    DEFAULT_WRITING_APP.to_string()
}

fn default_max_output_bytes() -> u64 {
    4 * 1024 * 1024 * 1024
}

fn default_measure_first() -> bool {
    true
}
