// Record builder: turns a raw NUT snapshot into an InfluxDB measurement.
// Pure and deterministic; all I/O lives in the repos and the worker.

use crate::models::{ClassificationRules, FieldValue, Measurement, RawSnapshot};
use std::collections::BTreeMap;

/// Series name every record is written under.
pub const MEASUREMENT_NAME: &str = "ups_status";
/// Tag carrying the reporting host identity.
pub const HOST_TAG: &str = "host";
/// Synthetic field holding the derived power draw.
pub const WATTS_FIELD: &str = "watts";
/// Rated device wattage as reported by the driver.
pub const NOMINAL_POWER_KEY: &str = "ups.realpower.nominal";
/// Current load as a percentage of nominal wattage.
pub const LOAD_KEY: &str = "ups.load";

/// The snapshot lacks what the power computation needs.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecordError {
    #[error("snapshot has no '{0}' field")]
    MissingField(&'static str),
    #[error("field '{key}' is not numeric: {value:?}")]
    NonNumeric {
        key: &'static str,
        value: String,
    },
}

/// Builds the measurement for one cycle.
///
/// Every snapshot key is either dropped (`discard_keys`), copied verbatim into
/// `tags` (`tag_keys`) or coerced into `fields`. `host` is always set from the
/// caller, and `watts = nominal * 0.01 * load` is added; the nominal wattage
/// comes from the rules override when present, else from the snapshot.
pub fn build(
    raw: RawSnapshot,
    rules: &ClassificationRules,
    host: &str,
) -> Result<Measurement, RecordError> {
    let mut tags = BTreeMap::new();
    let mut fields = BTreeMap::new();

    for (key, value) in raw {
        if rules.discard_keys.contains(&key) {
            continue;
        }
        if rules.tag_keys.contains(&key) {
            tags.insert(key, value);
        } else {
            fields.insert(key, FieldValue::coerce(value));
        }
    }
    tags.insert(HOST_TAG.to_string(), host.to_string());

    let nominal = match rules.nominal_power_override {
        Some(watts) => watts,
        None => numeric_field(&fields, NOMINAL_POWER_KEY)?,
    };
    let load = numeric_field(&fields, LOAD_KEY)?;
    fields.insert(
        WATTS_FIELD.to_string(),
        FieldValue::Float(nominal * 0.01 * load),
    );

    Ok(Measurement {
        name: MEASUREMENT_NAME.to_string(),
        tags,
        fields,
    })
}

fn numeric_field(
    fields: &BTreeMap<String, FieldValue>,
    key: &'static str,
) -> Result<f64, RecordError> {
    let value = fields.get(key).ok_or(RecordError::MissingField(key))?;
    // nan/inf parse as floats but cannot yield a storable watts
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RecordError::NonNumeric {
            key,
            value: value.to_string(),
        })
}
