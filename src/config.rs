// Environment-driven configuration, resolved once at startup and passed down explicitly.

use crate::models::ClassificationRules;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_NUT_HOST: &str = "127.0.0.1";
const DEFAULT_NUT_PORT: u16 = 3493;
const DEFAULT_NUT_TIMEOUT_SECS: f64 = 5.0;
const DEFAULT_INFLUX_TIMEOUT_SECS: f64 = 10.0;
const DEFAULT_INTERVAL_SECS: f64 = 21.0;
const DEFAULT_UPS_NAME: &str = "UPS";
const FALLBACK_HOSTNAME: &str = "localhost";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub influx: InfluxConfig,
    pub nut: NutConfig,
    pub exporter: ExporterConfig,
    pub rules: ClassificationRules,
}

/// Destination selection and auth for the InfluxDB v2 write API.
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: String,
    pub timeout: Duration,
}

/// Location and credentials of the NUT `upsd` server.
#[derive(Debug, Clone)]
pub struct NutConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Bound on each connect/read/write against upsd.
    pub timeout: Duration,
    /// Log every protocol line exchanged with upsd.
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Value of the `host` tag.
    pub host: String,
    /// UPS name as known to upsd.
    pub ups_name: String,
    pub interval: Duration,
    pub verbose: bool,
    /// Consecutive connectivity failures tolerated before exiting. 0 = exit on the first.
    pub max_connect_retries: u32,
}

/// Optional TOML file overriding the built-in classification sets.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesFile {
    discard_keys: Option<Vec<String>>,
    tag_keys: Option<Vec<String>>,
}

impl AppConfig {
    /// Resolve config from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Resolve and validate config from arbitrary key/value pairs (e.g. for tests).
    /// Empty values are treated as unset.
    pub fn from_vars<I, K, V>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        let get = |key: &str| vars.get(key).cloned();

        let missing: Vec<&str> = ["INFLUX_BUCKET", "INFLUX_ORG", "INFLUX_TOKEN", "INFLUX_URL"]
            .into_iter()
            .filter(|k| !vars.contains_key(*k))
            .collect();
        anyhow::ensure!(
            missing.is_empty(),
            "Provide environment: missing {}",
            missing.join(", ")
        );

        let verbose = get("VERBOSE").is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let influx = InfluxConfig {
            url: get("INFLUX_URL").unwrap_or_default(),
            org: get("INFLUX_ORG").unwrap_or_default(),
            bucket: get("INFLUX_BUCKET").unwrap_or_default(),
            token: get("INFLUX_TOKEN").unwrap_or_default(),
            timeout: parse_secs(&vars, "INFLUX_TIMEOUT_SECS", DEFAULT_INFLUX_TIMEOUT_SECS)?,
        };

        let port = match get("NUT_PORT") {
            Some(p) => p.trim().parse::<u16>().map_err(|e| {
                anyhow::anyhow!("NUT_PORT must be a port number, got {:?}: {}", p, e)
            })?,
            None => DEFAULT_NUT_PORT,
        };
        let nut = NutConfig {
            host: get("NUT_HOST").unwrap_or_else(|| DEFAULT_NUT_HOST.into()),
            port,
            username: get("NUT_USERNAME"),
            password: get("NUT_PASSWORD"),
            timeout: parse_secs(&vars, "NUT_TIMEOUT_SECS", DEFAULT_NUT_TIMEOUT_SECS)?,
            debug: verbose,
        };

        let max_connect_retries = match get("MAX_CONNECT_RETRIES") {
            Some(v) => v.trim().parse::<u32>().map_err(|e| {
                anyhow::anyhow!(
                    "MAX_CONNECT_RETRIES must be a non-negative integer, got {:?}: {}",
                    v,
                    e
                )
            })?,
            None => 0,
        };
        let exporter = ExporterConfig {
            host: get("HOSTNAME").unwrap_or_else(local_hostname),
            ups_name: get("UPS_NAME").unwrap_or_else(|| DEFAULT_UPS_NAME.into()),
            interval: parse_secs(&vars, "INTERVAL", DEFAULT_INTERVAL_SECS)?,
            verbose,
            max_connect_retries,
        };

        let nominal_power_override = match get("WATTS") {
            Some(w) => {
                let watts = w
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| anyhow::anyhow!("WATTS must be a number, got {:?}: {}", w, e))?;
                anyhow::ensure!(
                    watts.is_finite() && watts >= 0.0,
                    "WATTS must be >= 0, got {}",
                    watts
                );
                Some(watts)
            }
            None => None,
        };
        let rules = match get("RULES_FILE") {
            Some(path) => {
                let s = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("RULES_FILE {}: {}", path, e))?;
                rules_from_toml(&s, nominal_power_override)?
            }
            None => ClassificationRules {
                nominal_power_override,
                ..ClassificationRules::default()
            },
        };

        let config = AppConfig {
            influx,
            nut,
            exporter,
            rules,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.nut.port > 0,
            "NUT_PORT must be between 1 and 65535, got {}",
            self.nut.port
        );
        anyhow::ensure!(
            self.influx.url.starts_with("http://") || self.influx.url.starts_with("https://"),
            "INFLUX_URL must start with http:// or https://, got {}",
            self.influx.url
        );
        self.rules
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid classification rules: {}", e))?;
        Ok(())
    }

    /// Prints the resolved config, secrets included (only called with VERBOSE=true).
    pub fn log_summary(&self) {
        tracing::info!(
            influx_bucket = %self.influx.bucket,
            influx_token = %self.influx.token,
            influx_url = %self.influx.url,
            influx_org = %self.influx.org,
            nut_host = %self.nut.host,
            nut_port = self.nut.port,
            nut_user = ?self.nut.username,
            ups_name = %self.exporter.ups_name,
            host = %self.exporter.host,
            interval_secs = self.exporter.interval.as_secs_f64(),
            watts_override = ?self.rules.nominal_power_override,
            verbose = self.exporter.verbose,
            "resolved configuration"
        );
    }
}

/// Parse a classification rules file; absent arrays keep the built-in sets.
pub fn rules_from_toml(
    s: &str,
    nominal_power_override: Option<f64>,
) -> anyhow::Result<ClassificationRules> {
    let file: RulesFile = toml::from_str(s)?;
    let defaults = ClassificationRules::default();
    Ok(ClassificationRules {
        discard_keys: file
            .discard_keys
            .map(|keys| keys.into_iter().collect())
            .unwrap_or(defaults.discard_keys),
        tag_keys: file
            .tag_keys
            .map(|keys| keys.into_iter().collect())
            .unwrap_or(defaults.tag_keys),
        nominal_power_override,
    })
}

fn parse_secs(vars: &HashMap<String, String>, key: &str, default: f64) -> anyhow::Result<Duration> {
    let secs = match vars.get(key) {
        Some(v) => v.trim().parse::<f64>().map_err(|e| {
            anyhow::anyhow!("{} must be a number of seconds, got {:?}: {}", key, v, e)
        })?,
        None => default,
    };
    anyhow::ensure!(
        secs.is_finite() && secs > 0.0,
        "{} must be > 0, got {}",
        key,
        secs
    );
    Duration::try_from_secs_f64(secs).map_err(|e| anyhow::anyhow!("{} out of range: {}", key, e))
}

fn local_hostname() -> String {
    sysinfo::System::host_name()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| FALLBACK_HOSTNAME.into())
}
