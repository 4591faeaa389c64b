//! Occurrence sets and the diff that decides what is new enough to alert on.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::exceptions::ExceptionList;

/// machine -> conditions, in evaluation order. Machines keep the order they
/// were first recorded in, which for a run is roster order.
///
/// Used for the current run, the last-known snapshot and the diff itself.
/// Equality ignores machine order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccurrenceSet(IndexMap<String, Vec<Condition>>);

impl OccurrenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was recorded for `machine` earlier in the run. The
    /// machine keeps its original position.
    pub fn record(&mut self, machine: impl Into<String>, conditions: Vec<Condition>) {
        self.0.insert(machine.into(), conditions);
    }

    pub fn get(&self, machine: &str) -> Option<&[Condition]> {
        self.0.get(machine).map(Vec::as_slice)
    }

    pub fn contains(&self, machine: &str) -> bool {
        self.0.contains_key(machine)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Condition])> {
        self.0.iter().map(|(m, cs)| (m.as_str(), cs.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn condition_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    fn knows_label(&self, machine: &str, condition: &Condition) -> bool {
        self.get(machine)
            .is_some_and(|known| known.iter().any(|k| k.same_label(condition)))
    }
}

impl<M: Into<String>> FromIterator<(M, Vec<Condition>)> for OccurrenceSet {
    fn from_iter<I: IntoIterator<Item = (M, Vec<Condition>)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(m, cs)| (m.into(), cs)).collect())
    }
}

/// Conditions in `current` that are neither excepted nor already known by
/// label in `last_known`. Machines left with nothing new are omitted.
pub fn diff(
    current: &OccurrenceSet,
    last_known: &OccurrenceSet,
    exceptions: &ExceptionList,
) -> OccurrenceSet {
    current
        .iter()
        .filter_map(|(machine, conditions)| {
            let fresh: Vec<Condition> = exceptions
                .filter(machine, conditions)
                .into_iter()
                .filter(|c| !last_known.knows_label(machine, c))
                .collect();
            (!fresh.is_empty()).then(|| (machine.to_string(), fresh))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exceptions::ExceptionEntry;

    fn set(entries: &[(&str, &[&str])]) -> OccurrenceSet {
        entries
            .iter()
            .map(|(m, cs)| (*m, cs.iter().map(|c| Condition::from(*c)).collect()))
            .collect()
    }

    fn no_exceptions() -> ExceptionList {
        ExceptionList::default()
    }

    #[test]
    fn only_new_labels_are_reported() {
        let last = set(&[("X", &["CPU Temp: 70.00°C"])]);
        let current = set(&[("X", &["CPU Temp: 82.00°C", "RAM Uso: 85.00%"])]);
        let d = diff(&current, &last, &no_exceptions());
        assert_eq!(d, set(&[("X", &["RAM Uso: 85.00%"])]));
    }

    #[test]
    fn rerun_against_own_snapshot_is_empty() {
        let current = set(&[
            ("A", &["CPU Temp: 75.00°C"]),
            ("B", &["Offline desde: 16/10/2026 08:00:00"]),
        ]);
        let first = diff(&current, &OccurrenceSet::new(), &no_exceptions());
        assert_eq!(first, current);
        // the snapshot is replaced by the current run; nothing changes upstream
        let second = diff(&current, &current, &no_exceptions());
        assert!(second.is_empty());
    }

    #[test]
    fn excepted_label_never_reported_nor_blocks_others() {
        let exceptions: ExceptionList =
            [("X".to_string(), ExceptionEntry::One("CPU Temp".into()))]
                .into_iter()
                .collect();
        let current = set(&[("x", &["CPU Temp: 90.00°C", "GPU Uso: 95.00%"])]);
        let d = diff(&current, &OccurrenceSet::new(), &exceptions);
        assert_eq!(d, set(&[("x", &["GPU Uso: 95.00%"])]));
    }

    #[test]
    fn machines_with_nothing_new_are_absent() {
        let last = set(&[("A", &["CPU Temp: 75.00°C"])]);
        let current = set(&[("A", &["CPU Temp: 76.00°C"]), ("B", &["RAM Uso: 81.00%"])]);
        let d = diff(&current, &last, &no_exceptions());
        assert!(!d.contains("A"));
        assert_eq!(d.get("B").map(<[Condition]>::len), Some(1));
    }

    #[test]
    fn machines_only_in_snapshot_contribute_nothing() {
        let last = set(&[("gone", &["CPU Temp: 75.00°C"])]);
        let d = diff(&OccurrenceSet::new(), &last, &no_exceptions());
        assert!(d.is_empty());
    }

    #[test]
    fn condition_recurring_after_a_quiet_run_is_new_again() {
        let hot = set(&[("A", &["CPU Temp: 75.00°C"])]);
        let quiet = OccurrenceSet::new();

        let run1 = diff(&hot, &OccurrenceSet::new(), &no_exceptions());
        assert_eq!(run1, hot);
        let run2 = diff(&quiet, &hot, &no_exceptions());
        assert!(run2.is_empty());
        let run3 = diff(&hot, &quiet, &no_exceptions());
        assert_eq!(run3, hot);
    }

    #[test]
    fn snapshot_shape_on_disk() {
        let s = set(&[("lab-01", &["CPU Temp: 75.00°C", "RAM Uso: 85.00%"])]);
        let js = serde_json::to_string(&s).unwrap();
        assert_eq!(js, r#"{"lab-01":["CPU Temp: 75.00°C","RAM Uso: 85.00%"]}"#);
        let back: OccurrenceSet = serde_json::from_str(&js).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn diff_keeps_current_run_order() {
        let mut current = set(&[
            ("zeta", &["CPU Temp: 75.00°C"]),
            ("alpha", &["RAM Uso: 85.00%"]),
            ("mid", &["GPU Uso: 95.00%"]),
        ]);
        current.record("zeta", vec![Condition::from("CPU Temp: 77.00°C")]);
        let d = diff(&current, &OccurrenceSet::new(), &no_exceptions());
        let order: Vec<&str> = d.iter().map(|(m, _)| m).collect();
        assert_eq!(order, ["zeta", "alpha", "mid"]);
        assert!(serde_json::to_string(&d).unwrap().starts_with(r#"{"zeta":"#));
    }
}
