// InfluxDB v2 writes via the HTTP /api/v2/write endpoint (line protocol body).

pub mod line_protocol;

use crate::config::InfluxConfig;
use crate::models::Measurement;
use crate::worker::MeasurementPublisher;
use reqwest::{Client, StatusCode};
use std::future::Future;

#[derive(Debug, thiserror::Error)]
pub enum InfluxError {
    #[error("InfluxDB rejected credentials ({status}): {body}")]
    Auth { status: StatusCode, body: String },
    #[error("InfluxDB write failed ({status}): {body}")]
    Http { status: StatusCode, body: String },
    #[error("InfluxDB request timed out")]
    Timeout,
    #[error("cannot reach InfluxDB: {0}")]
    Connection(String),
    #[error("InfluxDB request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for InfluxError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InfluxError::Timeout
        } else if err.is_connect() {
            InfluxError::Connection(err.to_string())
        } else {
            InfluxError::Request(err.to_string())
        }
    }
}

pub struct InfluxRepo {
    client: Client,
    write_url: String,
    token: String,
}

impl InfluxRepo {
    pub fn connect(config: &InfluxConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            write_url: format!("{}/api/v2/write", config.url.trim_end_matches('/')),
            token: config.token.clone(),
        })
    }

    /// Write one measurement (a batch of one line) to `bucket` in `org`.
    pub async fn write(
        &self,
        bucket: &str,
        org: &str,
        measurement: &Measurement,
    ) -> Result<(), InfluxError> {
        let body = line_protocol::encode(measurement, None);
        tracing::debug!(operation = "influx_write", line = %body, "writing measurement");

        let response = self
            .client
            .post(&self.write_url)
            .query(&[("org", org), ("bucket", bucket), ("precision", "ns")])
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.token),
            )
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(InfluxError::Auth { status, body });
        }
        Err(InfluxError::Http { status, body })
    }
}

impl MeasurementPublisher for InfluxRepo {
    fn publish(
        &self,
        bucket: &str,
        org: &str,
        measurement: &Measurement,
    ) -> impl Future<Output = Result<(), InfluxError>> + Send {
        self.write(bucket, org, measurement)
    }
}
