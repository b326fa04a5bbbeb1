use anyhow::Result;
use nut_influx_exporter::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    tracing::info!("{}", version::banner());

    let app_config = match config::AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return Err(e);
        }
    };
    if app_config.exporter.verbose {
        app_config.log_summary();
    }

    let nut_repo = Arc::new(nut_repo::NutRepo::new(app_config.nut.clone()));
    let influx_repo = Arc::new(influx_repo::InfluxRepo::connect(&app_config.influx)?);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tracing::info!(
        influx_url = %app_config.influx.url,
        nut_host = %app_config.nut.host,
        nut_port = app_config.nut.port,
        ups_name = %app_config.exporter.ups_name,
        interval_secs = app_config.exporter.interval.as_secs_f64(),
        "starting poller"
    );

    let mut worker_handle = worker::spawn(
        worker::WorkerDeps {
            fetcher: nut_repo,
            publisher: influx_repo,
            rules: Arc::new(app_config.rules.clone()),
            shutdown_rx,
        },
        worker::WorkerConfig {
            ups_name: app_config.exporter.ups_name.clone(),
            host: app_config.exporter.host.clone(),
            bucket: app_config.influx.bucket.clone(),
            org: app_config.influx.org.clone(),
            interval: app_config.exporter.interval,
            max_connect_retries: app_config.exporter.max_connect_retries,
            verbose: app_config.exporter.verbose,
        },
    );

    let outcome = tokio::select! {
        result = &mut worker_handle => result,
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            worker_handle.await
        }
    };

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::error!(
                error = ?e,
                connectivity = e.is_connectivity(),
                auth = e.is_auth(),
                "cycle failed, exiting"
            );
            Err(e.into())
        }
        Err(e) => Err(anyhow::anyhow!("worker task: {}", e)),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
