//! Critical conditions: a label plus the reading that breached it.
//!
//! Conditions are rendered as `"<Label>: <value><unit>"` on disk and in
//! tickets, but kept structured in memory. Dedup and exception matching only
//! ever look at the label.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const OFFLINE_LABEL: &str = "Offline desde";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Celsius,
    Percent,
}

impl Unit {
    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Celsius => "°C",
            Unit::Percent => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Measured { value: f64, unit: Unit },
    /// Free text, e.g. the raw collection timestamp of an offline machine.
    Text(String),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Measured { value, unit } => {
                // ties round away from zero: 70.125 -> 70.13
                let rounded = (value * 100.0).round() / 100.0;
                write!(f, "{rounded:.2}{}", unit.suffix())
            }
            Reading::Text(s) => f.write_str(s),
        }
    }
}

impl Reading {
    // Only accept a measurement if it renders back to exactly the same text.
    fn parse(text: &str) -> Reading {
        for unit in [Unit::Celsius, Unit::Percent] {
            if let Some(num) = text.strip_suffix(unit.suffix()) {
                if let Ok(value) = num.parse::<f64>() {
                    let reading = Reading::Measured { value, unit };
                    if reading.to_string() == text {
                        return reading;
                    }
                }
            }
        }
        Reading::Text(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Condition {
    label: String,
    reading: Reading,
    /// Text this was parsed from, when rendering would not reproduce it.
    raw: Option<String>,
}

impl Condition {
    pub fn measured(label: impl Into<String>, value: f64, unit: Unit) -> Self {
        Self {
            label: label.into(),
            reading: Reading::Measured { value, unit },
            raw: None,
        }
    }

    pub fn offline_since(raw_timestamp: &str) -> Self {
        Self {
            label: OFFLINE_LABEL.to_string(),
            reading: Reading::Text(raw_timestamp.to_string()),
            raw: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn reading(&self) -> &Reading {
        &self.reading
    }

    pub fn is_offline(&self) -> bool {
        self.label == OFFLINE_LABEL
    }

    pub fn same_label(&self, other: &Condition) -> bool {
        self.label == other.label
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(raw) = &self.raw {
            return f.write_str(raw);
        }
        match &self.reading {
            Reading::Text(s) if s.is_empty() => f.write_str(&self.label),
            reading => write!(f, "{}: {reading}", self.label),
        }
    }
}

/// Splits at the first `:`; a string without one is all label. Apart from
/// surrounding whitespace the text renders back exactly as it was read, so
/// snapshots survive a load/store cycle.
impl From<&str> for Condition {
    fn from(s: &str) -> Self {
        let s = s.trim();
        let mut parsed = match s.split_once(':') {
            Some((label, rest)) => Self {
                label: label.trim().to_string(),
                reading: Reading::parse(rest.trim()),
                raw: None,
            },
            None => Self {
                label: s.to_string(),
                reading: Reading::Text(String::new()),
                raw: None,
            },
        };
        if parsed.to_string() != s {
            parsed.raw = Some(s.to_string());
        }
        parsed
    }
}

impl From<String> for Condition {
    fn from(s: String) -> Self {
        Condition::from(s.as_str())
    }
}

impl From<Condition> for String {
    fn from(c: Condition) -> Self {
        c.to_string()
    }
}
