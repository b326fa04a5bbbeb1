// Shared test helpers: sample snapshots, a fake upsd, a fake InfluxDB, scripted collaborators

#![allow(dead_code)]

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use nut_influx_exporter::config::NutConfig;
use nut_influx_exporter::influx_repo::InfluxError;
use nut_influx_exporter::models::{Measurement, RawSnapshot};
use nut_influx_exporter::nut_repo::NutError;
use nut_influx_exporter::worker::{MeasurementPublisher, SnapshotFetcher};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

pub fn snapshot(pairs: &[(&str, &str)]) -> RawSnapshot {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A typical smart-UPS reading.
pub fn sample_snapshot() -> RawSnapshot {
    snapshot(&[
        ("battery.charge", "100"),
        ("battery.mfr.date", "2020/01/01"),
        ("battery.runtime", "1530"),
        ("battery.type", "PbAc"),
        ("battery.voltage", "13.6"),
        ("device.model", "Back-UPS XS 700U"),
        ("device.serial", "4B1234P56789"),
        ("driver.name", "usbhid-ups"),
        ("driver.version.internal", "0.41"),
        ("input.voltage", "230.0"),
        ("ups.beeper.status", "enabled"),
        ("ups.load", "25"),
        ("ups.realpower.nominal", "800"),
        ("ups.status", "OL"),
    ])
}

// --- fake upsd ---

pub struct FakeUpsd {
    pub addr: SocketAddr,
    pub commands: Arc<Mutex<Vec<String>>>,
}

/// Serves `vars` for `ups`. When `password` is set, any other PASSWORD is denied.
pub async fn spawn_fake_upsd(ups: &str, vars: &[(&str, &str)], password: Option<&str>) -> FakeUpsd {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let commands = Arc::new(Mutex::new(Vec::new()));
    let ups = ups.to_string();
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let password = password.map(str::to_string);
    let log = commands.clone();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let mut stream = BufReader::new(stream);
            let mut line = String::new();
            loop {
                line.clear();
                match stream.read_line(&mut line).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let cmd = line.trim_end().to_string();
                log.lock().unwrap().push(cmd.clone());
                let words: Vec<&str> = cmd.split_whitespace().collect();
                let reply = match words.as_slice() {
                    ["USERNAME", _] => "OK\n".to_string(),
                    ["PASSWORD", given] => match &password {
                        Some(expected) if expected != given => "ERR ACCESS-DENIED\n".to_string(),
                        _ => "OK\n".to_string(),
                    },
                    ["LIST", "VAR", name] if name.trim_matches('"') == ups => {
                        let mut out = format!("BEGIN LIST VAR {}\n", ups);
                        for (k, v) in &vars {
                            let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                            out.push_str(&format!("VAR {} {} \"{}\"\n", ups, k, escaped));
                        }
                        out.push_str(&format!("END LIST VAR {}\n", ups));
                        out
                    }
                    ["LIST", "VAR", _] => "ERR UNKNOWN-UPS\n".to_string(),
                    ["LOGOUT"] => {
                        let _ = stream.get_mut().write_all(b"OK Goodbye\n").await;
                        break;
                    }
                    _ => "ERR UNKNOWN-COMMAND\n".to_string(),
                };
                if stream.get_mut().write_all(reply.as_bytes()).await.is_err() {
                    break;
                }
            }
        }
    });

    FakeUpsd { addr, commands }
}

pub fn nut_config(addr: SocketAddr) -> NutConfig {
    NutConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        username: None,
        password: None,
        timeout: Duration::from_secs(2),
        debug: false,
    }
}

// --- fake InfluxDB ---

#[derive(Debug, Clone)]
pub struct CapturedWrite {
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct InfluxState {
    status: StatusCode,
    writes: Arc<Mutex<Vec<CapturedWrite>>>,
}

pub struct FakeInflux {
    pub url: String,
    pub writes: Arc<Mutex<Vec<CapturedWrite>>>,
}

async fn write_handler(
    State(state): State<InfluxState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.writes.lock().unwrap().push(CapturedWrite {
        query,
        authorization,
        body,
    });
    let message = if state.status.is_success() {
        String::new()
    } else {
        format!("{{\"code\":\"{}\"}}", state.status.as_u16())
    };
    (state.status, message)
}

/// Fake `/api/v2/write` answering every request with `status`.
pub async fn spawn_fake_influx(status: StatusCode) -> FakeInflux {
    let writes = Arc::new(Mutex::new(Vec::new()));
    let state = InfluxState {
        status,
        writes: writes.clone(),
    };
    let app = Router::new()
        .route("/api/v2/write", post(write_handler))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    FakeInflux {
        url: format!("http://{}", addr),
        writes,
    }
}

// --- scripted collaborators for the worker ---

/// Hands out scripted results in order, then `fallback` forever.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<RawSnapshot, NutError>>>,
    fallback: RawSnapshot,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<RawSnapshot, NutError>>, fallback: RawSnapshot) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(snapshot: RawSnapshot) -> Self {
        Self::new(Vec::new(), snapshot)
    }
}

impl SnapshotFetcher for ScriptedFetcher {
    fn fetch(&self, device: &str) -> impl Future<Output = Result<RawSnapshot, NutError>> + Send {
        self.calls.lock().unwrap().push(device.to_string());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        std::future::ready(next)
    }
}

/// Records every published measurement; fails the first scripted calls.
#[derive(Default)]
pub struct RecordingPublisher {
    failures: Mutex<VecDeque<InfluxError>>,
    pub published: Mutex<Vec<(String, String, Measurement)>>,
}

impl RecordingPublisher {
    pub fn failing(failures: Vec<InfluxError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

impl MeasurementPublisher for RecordingPublisher {
    fn publish(
        &self,
        bucket: &str,
        org: &str,
        measurement: &Measurement,
    ) -> impl Future<Output = Result<(), InfluxError>> + Send {
        let result = match self.failures.lock().unwrap().pop_front() {
            Some(e) => Err(e),
            None => {
                self.published.lock().unwrap().push((
                    bucket.to_string(),
                    org.to_string(),
                    measurement.clone(),
                ));
                Ok(())
            }
        };
        std::future::ready(result)
    }
}
