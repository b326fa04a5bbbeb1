// Classification rules: which snapshot keys are dropped, which become tags

use crate::record::{HOST_TAG, LOAD_KEY, NOMINAL_POWER_KEY, WATTS_FIELD};
use std::collections::BTreeSet;

/// Variables that are noisy or redundant for time-series storage.
pub const DEFAULT_DISCARD_KEYS: &[&str] = &[
    "driver.version.internal",
    "driver.version.usb",
    "ups.beeper.status",
    "driver.name",
    "battery.mfr.date",
];

/// Variables that describe the device rather than measure it.
pub const DEFAULT_TAG_KEYS: &[&str] = &[
    "battery.type",
    "device.model",
    "device.serial",
    "driver.version",
    "driver.version.data",
    "device.mfr",
    "device.type",
    "ups.mfr",
    "ups.model",
    "ups.productid",
    "ups.serial",
    "ups.vendorid",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RulesError {
    #[error("'{key}' is required for the power computation and cannot be in {set}")]
    RequiredKeyClassified {
        key: &'static str,
        set: &'static str,
    },
    #[error("'{0}' is reserved and cannot be a tag key")]
    ReservedTag(String),
    #[error("'{0}' is listed as both a discard key and a tag key")]
    Overlap(String),
}

/// Static, process-wide classification of snapshot keys. Immutable after startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRules {
    pub discard_keys: BTreeSet<String>,
    pub tag_keys: BTreeSet<String>,
    /// Rated wattage to use instead of the snapshot's `ups.realpower.nominal`.
    pub nominal_power_override: Option<f64>,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self {
            discard_keys: DEFAULT_DISCARD_KEYS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            tag_keys: DEFAULT_TAG_KEYS.iter().map(|s| s.to_string()).collect(),
            nominal_power_override: None,
        }
    }
}

impl ClassificationRules {
    pub fn new<D, T, S>(
        discard_keys: D,
        tag_keys: T,
        nominal_power_override: Option<f64>,
    ) -> Self
    where
        D: IntoIterator<Item = S>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            discard_keys: discard_keys.into_iter().map(Into::into).collect(),
            tag_keys: tag_keys.into_iter().map(Into::into).collect(),
            nominal_power_override,
        }
    }

    /// Rejects rule sets that would make the power computation impossible or
    /// break the discard/tag/field partition.
    pub fn validate(&self) -> Result<(), RulesError> {
        for key in [LOAD_KEY, NOMINAL_POWER_KEY] {
            if self.discard_keys.contains(key) {
                return Err(RulesError::RequiredKeyClassified {
                    key,
                    set: "discard_keys",
                });
            }
            if self.tag_keys.contains(key) {
                return Err(RulesError::RequiredKeyClassified {
                    key,
                    set: "tag_keys",
                });
            }
        }
        for reserved in [HOST_TAG, WATTS_FIELD] {
            if self.tag_keys.contains(reserved) {
                return Err(RulesError::ReservedTag(reserved.to_string()));
            }
        }
        if let Some(key) = self.discard_keys.intersection(&self.tag_keys).next() {
            return Err(RulesError::Overlap(key.clone()));
        }
        Ok(())
    }
}
