// UPS status via the NUT (Network UPS Tools) upsd TCP protocol.
// One short-lived session per fetch: connect, optional login, LIST VAR, LOGOUT.

mod protocol;

use crate::config::NutConfig;
use crate::models::RawSnapshot;
use crate::worker::SnapshotFetcher;
use std::future::Future;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use protocol::ListLine;

/// upsd error codes that mean the credentials were missing or rejected.
const AUTH_ERROR_CODES: &[&str] = &[
    "ACCESS-DENIED",
    "USERNAME-REQUIRED",
    "PASSWORD-REQUIRED",
    "INVALID-USERNAME",
    "INVALID-PASSWORD",
];

#[derive(Debug, thiserror::Error)]
pub enum NutError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error talking to upsd: {0}")]
    Io(#[from] std::io::Error),
    #[error("upsd timed out during {0}")]
    Timeout(&'static str),
    #[error("upsd replied ERR {code}")]
    Server { code: String },
    #[error("upsd protocol error: {0}")]
    Protocol(String),
}

impl NutError {
    /// True when upsd rejected (or demanded) credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, NutError::Server { code } if AUTH_ERROR_CODES.contains(&code.as_str()))
    }
}

pub struct NutRepo {
    config: NutConfig,
}

impl NutRepo {
    pub fn new(config: NutConfig) -> Self {
        Self { config }
    }

    /// Fetch every variable of `ups` in a fresh session.
    pub async fn list_vars(&self, ups: &str) -> Result<RawSnapshot, NutError> {
        let mut session = Session::connect(&self.config).await?;
        if let Some(username) = &self.config.username {
            session.simple_command("USERNAME", &[username.as_str()]).await?;
        }
        if let Some(password) = &self.config.password {
            session.simple_command("PASSWORD", &[password.as_str()]).await?;
        }
        let vars = session.list_var(ups).await?;
        if let Err(e) = session.simple_command("LOGOUT", &[]).await {
            tracing::debug!(error = %e, operation = "logout", "upsd logout failed");
        }
        Ok(vars)
    }
}

impl SnapshotFetcher for NutRepo {
    fn fetch(&self, device: &str) -> impl Future<Output = Result<RawSnapshot, NutError>> + Send {
        self.list_vars(device)
    }
}

struct Session<'a> {
    stream: BufReader<TcpStream>,
    config: &'a NutConfig,
}

impl<'a> Session<'a> {
    async fn connect(config: &'a NutConfig) -> Result<Self, NutError> {
        let addr = format!("{}:{}", config.host, config.port);
        let stream = timeout(config.timeout, TcpStream::connect(addr.as_str()))
            .await
            .map_err(|_| NutError::Timeout("connect"))?
            .map_err(|source| NutError::Connect {
                addr: addr.clone(),
                source,
            })?;
        if config.debug {
            tracing::info!(addr = %addr, "connected to upsd");
        }
        Ok(Self {
            stream: BufReader::new(stream),
            config,
        })
    }

    async fn send(&mut self, verb: &str, args: &[&str]) -> Result<(), NutError> {
        let line = protocol::command(verb, args);
        if self.config.debug {
            // never echo credentials
            let shown = match verb {
                "PASSWORD" => "PASSWORD ****".to_string(),
                _ => line.trim_end().to_string(),
            };
            tracing::info!(line = %shown, "upsd <<");
        }
        let stream = self.stream.get_mut();
        timeout(self.config.timeout, async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await?;
            Ok::<_, std::io::Error>(())
        })
        .await
        .map_err(|_| NutError::Timeout("write"))??;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, NutError> {
        let mut line = String::new();
        let n = timeout(self.config.timeout, self.stream.read_line(&mut line))
            .await
            .map_err(|_| NutError::Timeout("read"))??;
        if n == 0 {
            return Err(NutError::Protocol("connection closed by upsd".into()));
        }
        if self.config.debug {
            tracing::info!(line = %line.trim_end(), "upsd >>");
        }
        Ok(line)
    }

    async fn simple_command(&mut self, verb: &str, args: &[&str]) -> Result<(), NutError> {
        self.send(verb, args).await?;
        let reply = self.read_line().await?;
        protocol::expect_ok(&reply)
    }

    async fn list_var(&mut self, ups: &str) -> Result<RawSnapshot, NutError> {
        self.send("LIST VAR", &[ups]).await?;
        let header = self.read_line().await?;
        protocol::expect_list_begin(&header, ups)?;

        let mut vars = RawSnapshot::new();
        loop {
            let line = self.read_line().await?;
            match protocol::parse_list_line(&line, ups)? {
                ListLine::Var { name, value } => {
                    vars.insert(name, value);
                }
                ListLine::End => break,
            }
        }
        Ok(vars)
    }
}
