//! Test runner: turns a mode keyword into a list of commands and runs them.

pub mod plan;
pub mod process;

pub use plan::{plan, CommandSpec, PlanOptions, Step, TestMode};
pub use process::{docker_available, run_plan};

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Unknown test mode '{0}'")]
    UnknownMode(String),

    #[error("Docker is not running or `docker compose` is unavailable. Please start Docker and try again.")]
    DockerUnavailable,

    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{description} failed with exit code {code}")]
    StepFailed { description: String, code: i32 },
}

impl HarnessError {
    /// Process exit code the runner should finish with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StepFailed { code, .. } if *code != 0 => *code,
            Self::UnknownMode(_) => 2,
            _ => 1,
        }
    }
}
