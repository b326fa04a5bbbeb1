// InfluxDB line protocol encoding for a single measurement.

use crate::models::{FieldValue, Measurement};
use std::fmt::Write;

/// Encode as `name,tag=v,... field=v,... [timestamp]`. Without a timestamp the
/// server assigns its own write time.
pub fn encode(m: &Measurement, timestamp_ns: Option<i64>) -> String {
    let mut line = String::new();
    push_escaped(&mut line, &m.name, &[',', ' ']);

    for (key, value) in &m.tags {
        // line protocol has no representation for an empty tag value
        if value.is_empty() {
            continue;
        }
        line.push(',');
        push_escaped(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        push_escaped(&mut line, value, &[',', '=', ' ']);
    }

    let mut first = true;
    for (key, value) in &m.fields {
        if let FieldValue::Float(f) = value
            && !f.is_finite()
        {
            continue;
        }
        line.push(if first { ' ' } else { ',' });
        first = false;
        push_escaped(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        push_field_value(&mut line, value);
    }

    if let Some(ts) = timestamp_ns {
        let _ = write!(line, " {}", ts);
    }
    line
}

fn push_escaped(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

fn push_field_value(out: &mut String, value: &FieldValue) {
    match value {
        FieldValue::Integer(i) => {
            let _ = write!(out, "{}i", i);
        }
        FieldValue::Float(f) => {
            let _ = write!(out, "{}", f);
        }
        FieldValue::Text(s) => {
            out.push('"');
            push_escaped(out, s, &['"', '\\']);
            out.push('"');
        }
    }
}
