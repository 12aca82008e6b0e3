//! Load generator: simulated API users driven concurrently against a host.

pub mod client;
pub mod profile;
pub mod runner;
pub mod stats;
pub mod users;

pub use client::ApiClient;
pub use profile::{LoadShape, Profile};
pub use runner::{run, RunConfig, RunReport};
pub use stats::{render_table, RequestSummary, StatsCollector};
pub use users::{UserClass, VirtualUser};

/// Route prefix of the versioned API on the target host.
pub const API_PREFIX: &str = "/api/v1";

#[derive(Debug, thiserror::Error)]
pub enum LoadTestError {
    #[error("Unknown profile '{0}', expected light, medium, heavy or stress")]
    UnknownProfile(String),

    #[error("Invalid load parameters: {0}")]
    InvalidParameters(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
