//! Operator-configured suppression rules, keyed by upper-cased machine name.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// `"<label>"` or `["<label>", ...]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExceptionEntry {
    One(String),
    Many(Vec<String>),
}

impl ExceptionEntry {
    pub fn covers(&self, label: &str) -> bool {
        match self {
            ExceptionEntry::One(l) => l == label,
            ExceptionEntry::Many(ls) => ls.iter().any(|l| l == label),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionList(HashMap<String, ExceptionEntry>);

impl ExceptionList {
    pub fn entry_for(&self, machine: &str) -> Option<&ExceptionEntry> {
        self.0.get(&machine.to_uppercase())
    }

    pub fn is_excepted(&self, machine: &str, condition: &Condition) -> bool {
        self.entry_for(machine)
            .is_some_and(|entry| entry.covers(condition.label()))
    }

    /// Drop the conditions the operator has silenced for `machine`.
    pub fn filter(&self, machine: &str, conditions: &[Condition]) -> Vec<Condition> {
        conditions
            .iter()
            .filter(|c| !self.is_excepted(machine, c))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ExceptionEntry)> for ExceptionList {
    fn from_iter<I: IntoIterator<Item = (String, ExceptionEntry)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conds(items: &[&str]) -> Vec<Condition> {
        items.iter().map(|s| Condition::from(*s)).collect()
    }

    fn labels(cs: &[Condition]) -> Vec<&str> {
        cs.iter().map(|c| c.label()).collect()
    }

    #[test]
    fn parses_single_and_list_entries() {
        let js = r#"{"AGILENT": "Offline desde", "LAB-02": ["CPU Temp", "GPU Uso"]}"#;
        let list: ExceptionList = serde_json::from_str(js).unwrap();
        assert_eq!(
            list.entry_for("AGILENT"),
            Some(&ExceptionEntry::One("Offline desde".into()))
        );
        assert!(list.entry_for("lab-02").unwrap().covers("GPU Uso"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn single_label_entry_suppresses_only_that_label() {
        let list: ExceptionList =
            [("LAB-01".to_string(), ExceptionEntry::One("CPU Temp".into()))]
                .into_iter()
                .collect();
        let kept = list.filter("lab-01", &conds(&["CPU Temp: 75.00°C", "RAM Uso: 85.00%"]));
        assert_eq!(labels(&kept), ["RAM Uso"]);
    }

    #[test]
    fn list_entry_suppresses_every_member() {
        let list: ExceptionList = [(
            "LAB-01".to_string(),
            ExceptionEntry::Many(vec!["CPU Temp".into(), "RAM Uso".into()]),
        )]
        .into_iter()
        .collect();
        let kept = list.filter(
            "Lab-01",
            &conds(&["CPU Temp: 75.00°C", "RAM Uso: 85.00%", "GPU Temp: 81.00°C"]),
        );
        assert_eq!(labels(&kept), ["GPU Temp"]);
    }

    #[test]
    fn machine_without_entry_keeps_everything() {
        let list: ExceptionList =
            [("OTHER".to_string(), ExceptionEntry::One("CPU Temp".into()))]
                .into_iter()
                .collect();
        let all = conds(&["CPU Temp: 75.00°C"]);
        assert_eq!(list.filter("lab-01", &all), all);
        assert_eq!(ExceptionList::default().filter("lab-01", &all), all);
    }

    #[test]
    fn matching_is_on_whole_label() {
        let list: ExceptionList = [("LAB-01".to_string(), ExceptionEntry::One("CPU".into()))]
            .into_iter()
            .collect();
        let all = conds(&["CPU Temp: 75.00°C", "CPU Uso: 90.00%"]);
        assert_eq!(list.filter("lab-01", &all), all);
    }
}
