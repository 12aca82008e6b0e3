use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::{
    render_table, ApiClient, LoadShape, LoadTestError, RequestSummary, StatsCollector, UserClass,
    VirtualUser,
};

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub host: String,
    pub shape: LoadShape,
    /// Exit with failure when the aggregate failure ratio exceeds this.
    pub fail_ratio: Option<f64>,
    pub report_interval: Duration,
}

impl RunConfig {
    pub fn check(&self) -> Result<(), LoadTestError> {
        if self.shape.users == 0 {
            return Err(LoadTestError::InvalidParameters("users must be at least 1".into()));
        }
        self.spawn_interval()?;
        self.deadline_from(tokio::time::Instant::now())?;
        if self.report_interval.is_zero() {
            return Err(LoadTestError::InvalidParameters(
                "report interval must be positive".into(),
            ));
        }
        if let Some(ratio) = self.fail_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(LoadTestError::InvalidParameters(
                    "fail ratio must be between 0 and 1".into(),
                ));
            }
        }
        Ok(())
    }

    /// Delay between two user spawns; rejects rates whose period is not a
    /// representable `Duration`.
    pub fn spawn_interval(&self) -> Result<Duration, LoadTestError> {
        let rate = self.shape.spawn_rate;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(LoadTestError::InvalidParameters(
                "spawn rate must be a positive number".into(),
            ));
        }
        Duration::try_from_secs_f64(1.0 / rate).map_err(|_| {
            LoadTestError::InvalidParameters(format!("spawn rate {rate} is too small"))
        })
    }

    fn deadline_from(
        &self,
        start: tokio::time::Instant,
    ) -> Result<tokio::time::Instant, LoadTestError> {
        start.checked_add(self.shape.run_time).ok_or_else(|| {
            LoadTestError::InvalidParameters(format!(
                "run time of {}s is too long",
                self.shape.run_time.as_secs()
            ))
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub rows: Vec<RequestSummary>,
    pub total: RequestSummary,
    pub elapsed: Duration,
    pub fail_ratio_limit: Option<f64>,
}

impl RunReport {
    pub fn exceeded_fail_ratio(&self) -> bool {
        self.fail_ratio_limit
            .is_some_and(|limit| self.total.fail_ratio() > limit)
    }

    pub fn table(&self) -> String {
        render_table(&self.rows, &self.total)
    }
}

async fn report_progress(stats: StatsCollector, interval: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (_, total) = stats.snapshot().await;
                info!(
                    "[{:>5.0}s] requests={} failures={} ({:.1}%) rps={:.2} p95={}ms",
                    stats.elapsed().as_secs_f64(),
                    total.count,
                    total.failures,
                    total.fail_ratio() * 100.0,
                    total.rps,
                    total.p95_ms,
                );
            }
            _ = stop.changed() => break,
        }
    }
}

/// Spawns users at the configured rate, lets them run for `run_time`, then
/// stops them and returns the collected statistics.
pub async fn run(config: RunConfig) -> Result<RunReport, LoadTestError> {
    config.check()?;
    let shape = config.shape;

    let stats = StatsCollector::new();
    let client = ApiClient::new(&config.host, stats.clone())?;
    let (stop_tx, stop_rx) = watch::channel(false);

    info!(
        "Starting load test against {}: {} users, {:.1} users/s, {}s",
        config.host,
        shape.users,
        shape.spawn_rate,
        shape.run_time.as_secs()
    );

    let progress = tokio::spawn(report_progress(
        stats.clone(),
        config.report_interval,
        stop_rx.clone(),
    ));

    let deadline = config.deadline_from(tokio::time::Instant::now())?;
    let spawn_every = config.spawn_interval()?;
    let mut users = JoinSet::new();

    for i in 0..shape.users {
        if tokio::time::Instant::now() >= deadline {
            warn!("Run time elapsed after spawning {i} of {} users", shape.users);
            break;
        }
        let class = UserClass::ROTATION[i % UserClass::ROTATION.len()];
        let user = VirtualUser::new(class, client.clone())?;
        users.spawn(user.run(stop_rx.clone()));
        if i + 1 < shape.users {
            tokio::select! {
                () = tokio::time::sleep(spawn_every) => {}
                () = tokio::time::sleep_until(deadline) => {}
            }
        }
    }
    info!("Spawned {} users", users.len());

    tokio::time::sleep_until(deadline).await;
    // Receivers may already be gone; nothing to do then.
    let _ = stop_tx.send(true);

    while let Some(joined) = users.join_next().await {
        if let Err(e) = joined {
            warn!("Simulated user task failed: {e}");
        }
    }
    if let Err(e) = progress.await {
        warn!("Progress reporter failed: {e}");
    }

    let (rows, total) = stats.snapshot().await;
    Ok(RunReport {
        rows,
        total,
        elapsed: stats.elapsed(),
        fail_ratio_limit: config.fail_ratio,
    })
}
