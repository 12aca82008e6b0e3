use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::debug;

use super::plan::{usage, CommandSpec, Step};
use super::HarnessError;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

fn status(color: &str, marker: &str, message: &str) {
    println!("{color}{marker}{RESET} {message}");
}

async fn succeeds(program: &str, args: &[&str]) -> bool {
    match Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(e) => {
            debug!("`{program}` not runnable: {e}");
            false
        }
    }
}

/// Docker is usable when the daemon answers and the compose plugin exists.
pub async fn docker_available() -> bool {
    succeeds("docker", &["info"]).await && succeeds("docker", &["compose", "version"]).await
}

async fn run_command(spec: &CommandSpec) -> Result<(), HarnessError> {
    status(CYAN, "==>", &format!("{}...", spec.description));
    println!("    {}", spec.command_line());

    let started = Instant::now();
    let exit = Command::new(&spec.program)
        .args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|source| HarnessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
    let elapsed = started.elapsed().as_secs_f64();

    if exit.success() {
        status(GREEN, "[ok]", &format!("{} completed successfully", spec.description));
        if spec.timed {
            println!("    Total time: {elapsed:.2}s");
        }
        Ok(())
    } else {
        let code = exit.code().unwrap_or(1);
        status(
            RED,
            "[failed]",
            &format!("{} failed with exit code {code}", spec.description),
        );
        if spec.timed {
            println!("    Total time: {elapsed:.2}s");
        }
        Err(HarnessError::StepFailed {
            description: spec.description.clone(),
            code,
        })
    }
}

/// Removes files directly inside `dir` whose extension matches.
pub fn remove_files(dir: &Path, extension: &str) -> std::io::Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Runs each step in order and stops at the first failure.
pub async fn run_plan(steps: &[Step], requires_docker: bool) -> Result<(), HarnessError> {
    if requires_docker && !docker_available().await {
        return Err(HarnessError::DockerUnavailable);
    }

    for step in steps {
        match step {
            Step::Run(spec) => run_command(spec).await?,
            Step::RunIfDocker(spec) => {
                if docker_available().await {
                    run_command(spec).await?;
                } else {
                    status(YELLOW, "[skip]", &format!("{} (Docker not available)", spec.description));
                }
            }
            Step::RemoveFiles { extension } => {
                let removed = remove_files(Path::new("."), extension).unwrap_or_else(|e| {
                    status(YELLOW, "[warn]", &format!("Could not remove *.{extension} files: {e}"));
                    0
                });
                status(GREEN, "[ok]", &format!("Removed {removed} *.{extension} file(s)"));
            }
            Step::PrintUsage => print!("{}", usage()),
        }
    }
    Ok(())
}
