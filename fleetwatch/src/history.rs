//! Append-only incident log. Every machine with at least one critical
//! condition gets a record per cycle, whether or not it was alerted on.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use crate::condition::Condition;
use crate::error::Result;
use crate::store::{read_json_or_default, write_json_pretty};

/// label -> rendered value, kept in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedConditions(Vec<(String, String)>);

impl GroupedConditions {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[Condition]> for GroupedConditions {
    fn from(conditions: &[Condition]) -> Self {
        let mut grouped: Vec<(String, String)> = Vec::with_capacity(conditions.len());
        for c in conditions {
            let value = c.reading().to_string();
            // a later duplicate label overwrites in place, like merging objects
            match grouped.iter_mut().find(|(l, _)| l == c.label()) {
                Some(slot) => slot.1 = value,
                None => grouped.push((c.label().to_string(), value)),
            }
        }
        Self(grouped)
    }
}

impl Serialize for GroupedConditions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in &self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for GroupedConditions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = GroupedConditions;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of condition label to value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((label, value)) = access.next_entry::<String, String>()? {
                    entries.push((label, value));
                }
                Ok(GroupedConditions(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub maquina: String,
    pub ocorrencia: GroupedConditions,
    /// ISO-8601, UTC, millisecond precision.
    pub horario: String,
}

impl IncidentRecord {
    pub fn new(machine: &str, conditions: &[Condition], at: DateTime<Utc>) -> Self {
        Self {
            maquina: machine.to_string(),
            ocorrencia: GroupedConditions::from(conditions),
            horario: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IncidentHistory {
    path: PathBuf,
}

impl IncidentHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<IncidentRecord>> {
        read_json_or_default(&self.path)
    }

    /// Load, push one record, write the whole log back.
    pub fn append(
        &self,
        machine: &str,
        conditions: &[Condition],
        at: DateTime<Utc>,
    ) -> Result<IncidentRecord> {
        let mut log = self.load()?;
        let record = IncidentRecord::new(machine, conditions, at);
        log.push(record.clone());
        write_json_pretty(&self.path, &log)?;
        info!(machine, entries = log.len(), path = %self.path.display(), "history updated");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_groups_conditions_in_order() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 12, 30, 0).unwrap();
        let conditions = [
            Condition::from("RAM Uso: 85.00%"),
            Condition::from("CPU Temp: 75.00°C"),
            Condition::from("Offline desde: 16/10/2026 08:00:00"),
        ];
        let rec = IncidentRecord::new("lab-01", &conditions, at);
        let js = serde_json::to_string(&rec).unwrap();
        assert_eq!(
            js,
            r#"{"maquina":"lab-01","ocorrencia":{"RAM Uso":"85.00%","CPU Temp":"75.00°C","Offline desde":"16/10/2026 08:00:00"},"horario":"2026-10-16T12:30:00.000Z"}"#
        );
    }

    #[test]
    fn grouping_keeps_order_when_read_back() {
        let js = r#"{"Z":"1","A":"2","M":"3"}"#;
        let g: GroupedConditions = serde_json::from_str(js).unwrap();
        assert_eq!(g.labels().collect::<Vec<_>>(), ["Z", "A", "M"]);
        assert_eq!(g.get("A"), Some("2"));
    }
}
