// Polling worker: fetch -> build -> publish every interval.
// Data-shape errors always end the loop; connectivity errors end it once the
// retry budget is spent (default budget 0: the first failure is fatal).

use crate::influx_repo::InfluxError;
use crate::models::{ClassificationRules, Measurement, RawSnapshot};
use crate::nut_repo::NutError;
use crate::record::{self, RecordError};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Duration;

/// Source of raw device snapshots.
pub trait SnapshotFetcher {
    fn fetch(&self, device: &str) -> impl Future<Output = Result<RawSnapshot, NutError>> + Send;
}

/// Sink for built measurements.
pub trait MeasurementPublisher {
    fn publish(
        &self,
        bucket: &str,
        org: &str,
        measurement: &Measurement,
    ) -> impl Future<Output = Result<(), InfluxError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] NutError),
    #[error("publish failed: {0}")]
    Publish(#[from] InfluxError),
    #[error("bad snapshot: {0}")]
    Record(#[from] RecordError),
}

impl CycleError {
    /// Fetcher or publisher could not be reached or refused us; the snapshot itself was fine.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, CycleError::Fetch(_) | CycleError::Publish(_))
    }

    /// Credentials were rejected by upsd or InfluxDB.
    pub fn is_auth(&self) -> bool {
        match self {
            CycleError::Fetch(e) => e.is_auth(),
            CycleError::Publish(InfluxError::Auth { .. }) => true,
            _ => false,
        }
    }
}

/// Collaborators, rules and shutdown for the worker.
pub struct WorkerDeps<F, P> {
    pub fetcher: Arc<F>,
    pub publisher: Arc<P>,
    pub rules: Arc<ClassificationRules>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Per-cycle targets and timing.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub ups_name: String,
    pub host: String,
    pub bucket: String,
    pub org: String,
    pub interval: Duration,
    pub max_connect_retries: u32,
    /// Log each built measurement as JSON.
    pub verbose: bool,
}

/// One full cycle. Returns what was published.
pub async fn run_cycle<F, P>(
    fetcher: &F,
    publisher: &P,
    rules: &ClassificationRules,
    config: &WorkerConfig,
) -> Result<Measurement, CycleError>
where
    F: SnapshotFetcher,
    P: MeasurementPublisher,
{
    let raw = fetcher.fetch(&config.ups_name).await?;
    let vars = raw.len();
    let measurement = record::build(raw, rules, &config.host)?;
    if config.verbose {
        match serde_json::to_string(&measurement) {
            Ok(json) => tracing::info!(measurement = %json, "built measurement"),
            Err(e) => tracing::warn!(error = %e, "measurement not serializable"),
        }
    }
    publisher
        .publish(&config.bucket, &config.org, &measurement)
        .await?;
    tracing::debug!(
        operation = "cycle",
        vars,
        fields = measurement.fields.len(),
        tags = measurement.tags.len(),
        "measurement published"
    );
    Ok(measurement)
}

/// Spawns the polling loop. The task ends with `Ok(())` on shutdown and with the
/// offending error when a cycle failure is fatal.
pub fn spawn<F, P>(
    deps: WorkerDeps<F, P>,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<Result<(), CycleError>>
where
    F: SnapshotFetcher + Send + Sync + 'static,
    P: MeasurementPublisher + Send + Sync + 'static,
{
    let WorkerDeps {
        fetcher,
        publisher,
        rules,
        mut shutdown_rx,
    } = deps;

    tokio::spawn(async move {
        let mut consecutive_failures: u32 = 0;
        let mut cycles_total: u64 = 0;

        loop {
            match run_cycle(fetcher.as_ref(), publisher.as_ref(), &rules, &config).await {
                Ok(_) => {
                    cycles_total += 1;
                    consecutive_failures = 0;
                    tracing::debug!(cycles_total, "cycle complete");
                }
                Err(e)
                    if e.is_connectivity()
                        && consecutive_failures < config.max_connect_retries =>
                {
                    consecutive_failures += 1;
                    tracing::warn!(
                        error = %e,
                        attempt = consecutive_failures,
                        max_connect_retries = config.max_connect_retries,
                        "cycle failed; retrying next interval"
                    );
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                _ = tokio::time::sleep(config.interval) => {}
                _ = &mut shutdown_rx => {
                    tracing::debug!(cycles_total, "Worker shutting down");
                    return Ok(());
                }
            }
        }
    })
}
