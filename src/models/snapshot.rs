// Raw device snapshot as returned by the status service

use std::collections::BTreeMap;

/// Flat `variable name -> value` reading of one device, e.g.
/// `"ups.load" -> "42"`. Keys depend on the driver and are not known in advance.
pub type RawSnapshot = BTreeMap<String, String>;
