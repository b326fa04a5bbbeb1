// Domain models: raw snapshot in, measurement out

mod measurement;
mod rules;
mod snapshot;

pub use measurement::{FieldValue, Measurement};
pub use rules::{ClassificationRules, DEFAULT_DISCARD_KEYS, DEFAULT_TAG_KEYS, RulesError};
pub use snapshot::RawSnapshot;
