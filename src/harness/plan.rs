use std::fmt;
use std::str::FromStr;

use super::HarnessError;

/// Environment every test command runs with, so tests never touch a real
/// database or secret.
pub const ISOLATED_ENV: [(&str, &str); 4] = [
    ("TESTING_MODE", "isolated"),
    ("DATABASE_URL", "sqlite::memory:"),
    ("DEBUG", "true"),
    ("SECRET_KEY", "test-secret-key-for-isolated-testing"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMode {
    All,
    Fast,
    Auth,
    Authors,
    Books,
    Coverage,
    Timing,
    Performance,
    Load,
    Parallel,
    Debug,
    Clean,
    Setup,
    Help,
}

impl TestMode {
    pub const ALL: [TestMode; 14] = [
        TestMode::All,
        TestMode::Fast,
        TestMode::Auth,
        TestMode::Authors,
        TestMode::Books,
        TestMode::Coverage,
        TestMode::Timing,
        TestMode::Performance,
        TestMode::Load,
        TestMode::Parallel,
        TestMode::Debug,
        TestMode::Clean,
        TestMode::Setup,
        TestMode::Help,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            TestMode::All => "all",
            TestMode::Fast => "fast",
            TestMode::Auth => "auth",
            TestMode::Authors => "authors",
            TestMode::Books => "books",
            TestMode::Coverage => "coverage",
            TestMode::Timing => "timing",
            TestMode::Performance => "performance",
            TestMode::Load => "load",
            TestMode::Parallel => "parallel",
            TestMode::Debug => "debug",
            TestMode::Clean => "clean",
            TestMode::Setup => "setup",
            TestMode::Help => "help",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            TestMode::All => "run every test target",
            TestMode::Fast => "unit and integration tests only",
            TestMode::Auth => "authentication tests",
            TestMode::Authors => "author tests",
            TestMode::Books => "book tests",
            TestMode::Coverage => "HTML coverage report in ./coverage",
            TestMode::Timing => "all tests with elapsed time",
            TestMode::Performance => "ignored performance tests in release mode",
            TestMode::Load => "start the stack with Docker and run the load generator",
            TestMode::Parallel => "tests with an explicit worker count",
            TestMode::Debug => "tests with captured output shown and debug logging",
            TestMode::Clean => "remove build output and test databases",
            TestMode::Setup => "start the stack with Docker",
            TestMode::Help => "show this message",
        }
    }

    pub fn requires_docker(self) -> bool {
        matches!(self, TestMode::Load | TestMode::Setup)
    }
}

impl FromStr for TestMode {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches("--").to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.keyword() == wanted)
            .ok_or_else(|| HarnessError::UnknownMode(s.to_string()))
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub description: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timed: bool,
}

impl CommandSpec {
    fn new(description: &str, program: &str, args: &[&str]) -> Self {
        Self {
            description: description.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: Vec::new(),
            timed: false,
        }
    }

    fn cargo(description: &str, args: &[&str]) -> Self {
        Self::new(description, "cargo", args).isolated()
    }

    fn isolated(mut self) -> Self {
        self.env.extend(
            ISOLATED_ENV
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        self
    }

    fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    fn timed(mut self) -> Self {
        self.timed = true;
        self
    }

    /// Shell-style rendering used in status lines.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One unit of work in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Run(CommandSpec),
    /// Runs only when Docker is reachable; skipped silently otherwise.
    RunIfDocker(CommandSpec),
    /// Deletes files in the working directory with the given extension.
    RemoveFiles { extension: String },
    PrintUsage,
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub workers: Option<usize>,
    pub host: String,
    pub profile: String,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            workers: None,
            host: "http://localhost:8000".to_string(),
            profile: "light".to_string(),
        }
    }
}

fn compose_up() -> CommandSpec {
    CommandSpec::new(
        "Starting Docker Compose",
        "docker",
        &["compose", "up", "-d", "--build"],
    )
}

fn all_tests() -> CommandSpec {
    CommandSpec::cargo("Running all tests", &["test", "--all-targets"])
}

/// Translates a mode into the steps to run. Pure: nothing is executed.
pub fn plan(mode: TestMode, options: &PlanOptions) -> Vec<Step> {
    match mode {
        TestMode::All => vec![Step::Run(all_tests())],
        TestMode::Fast => vec![Step::Run(CommandSpec::cargo(
            "Running fast tests",
            &["test", "--lib", "--test", "integration"],
        ))],
        TestMode::Auth | TestMode::Authors | TestMode::Books => {
            let filter = format!("{}_test::", mode.keyword());
            vec![Step::Run(CommandSpec::cargo(
                &format!("Running {} tests", mode.keyword()),
                &["test", "--test", "integration", &filter],
            ))]
        }
        TestMode::Coverage => vec![Step::Run(CommandSpec::cargo(
            "Running tests with coverage",
            &["llvm-cov", "--html", "--output-dir", "coverage"],
        ))],
        TestMode::Timing => vec![Step::Run(all_tests().timed())],
        TestMode::Performance => vec![Step::Run(CommandSpec::cargo(
            "Running performance tests",
            &[
                "test",
                "--release",
                "--test",
                "performance",
                "--",
                "--ignored",
                "--nocapture",
            ],
        ))],
        TestMode::Load => vec![
            Step::Run(compose_up()),
            Step::Run(
                CommandSpec::new(
                    "Running load test",
                    "cargo",
                    &[
                        "run",
                        "--release",
                        "--bin",
                        "load-test",
                        "--",
                        "--host",
                        &options.host,
                        "--profile",
                        &options.profile,
                    ],
                )
                .timed(),
            ),
        ],
        TestMode::Parallel => {
            let workers = options
                .workers
                .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
                .unwrap_or(1)
                .max(1);
            let threads = format!("--test-threads={workers}");
            vec![Step::Run(
                CommandSpec::cargo(
                    &format!("Running tests with {workers} workers"),
                    &["test", "--", &threads],
                )
                .timed(),
            )]
        }
        TestMode::Debug => vec![Step::Run(
            CommandSpec::cargo("Running tests in debug mode", &["test", "--", "--nocapture"])
                .with_env("RUST_LOG", "debug")
                .with_env("RUST_BACKTRACE", "1"),
        )],
        TestMode::Clean => vec![
            Step::Run(CommandSpec::new("Cleaning build output", "cargo", &["clean"])),
            Step::RemoveFiles {
                extension: "db".to_string(),
            },
            Step::RunIfDocker(CommandSpec::new(
                "Stopping Docker Compose",
                "docker",
                &["compose", "down", "-v"],
            )),
        ],
        TestMode::Setup => vec![Step::Run(compose_up())],
        TestMode::Help => vec![Step::PrintUsage],
    }
}

pub fn usage() -> String {
    let mut out = String::from("Usage: run-tests <mode> [--workers N] [--host URL] [--profile NAME]\n\nModes:\n");
    for mode in TestMode::ALL {
        out.push_str(&format!("  {:<12} {}\n", mode.keyword(), mode.description()));
    }
    out
}
