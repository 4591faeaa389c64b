//! Tests for the persisted state files (snapshot, diff file, exceptions, history).
use std::fs;

use chrono::{TimeZone, Utc};
use fleetwatch::condition::Condition;
use fleetwatch::diff::OccurrenceSet;
use fleetwatch::store::StateStore;
use fleetwatch::FleetError;

fn set(entries: &[(&str, &[&str])]) -> OccurrenceSet {
    entries
        .iter()
        .map(|(m, cs)| (*m, cs.iter().map(|c| Condition::from(*c)).collect()))
        .collect()
}

#[test]
fn fresh_state_dir_loads_empty() {
    let td = tempfile::tempdir().unwrap();
    let store = StateStore::new(td.path());
    assert!(store.load_last_known().unwrap().is_empty());
    assert!(store.load_exceptions().unwrap().is_empty());
    assert!(store.history().load().unwrap().is_empty());
}

#[test]
fn snapshot_is_replaced_not_merged() {
    let td = tempfile::tempdir().unwrap();
    let store = StateStore::new(td.path());

    store
        .store_last_known(&set(&[("A", &["CPU Temp: 75.00°C"]), ("B", &["RAM Uso: 90.00%"])]))
        .unwrap();
    store.store_last_known(&set(&[("B", &["RAM Uso: 91.00%"])])).unwrap();

    let back = store.load_last_known().unwrap();
    assert!(!back.contains("A"), "machine without conditions must drop out");
    assert_eq!(back, set(&[("B", &["RAM Uso: 91.00%"])]));

    let raw = fs::read_to_string(td.path().join("ocorrencias.json")).unwrap();
    assert!(raw.contains("\"RAM Uso: 91.00%\""), "{raw}");
}

#[test]
fn snapshot_written_by_older_deployments_loads() {
    let td = tempfile::tempdir().unwrap();
    fs::write(
        td.path().join("ocorrencias.json"),
        r#"{
  "AGILENT": ["Offline desde: 16/10/2026 06:10:00"],
  "lab-07": ["Disco Principal Uso: 97.30%", "GPU Temp: 84.00°C"]
}"#,
    )
    .unwrap();
    let snap = StateStore::new(td.path()).load_last_known().unwrap();
    let labels: Vec<&str> = snap.get("lab-07").unwrap().iter().map(|c| c.label()).collect();
    assert_eq!(labels, ["Disco Principal Uso", "GPU Temp"]);
    assert!(snap.get("AGILENT").unwrap()[0].is_offline());
}

#[test]
fn new_occurrences_file_written_then_cleared() {
    let td = tempfile::tempdir().unwrap();
    let store = StateStore::new(td.path());
    let path = store.new_occurrences_path();

    store
        .store_new_occurrences(&set(&[("A", &["GPU Uso: 95.00%"])]))
        .unwrap();
    assert!(path.exists());

    store.store_new_occurrences(&OccurrenceSet::new()).unwrap();
    assert!(!path.exists(), "empty diff must not leave a stale file behind");

    // clearing twice is fine
    store.store_new_occurrences(&OccurrenceSet::new()).unwrap();
}

#[test]
fn history_appends_under_reports_dir() {
    let td = tempfile::tempdir().unwrap();
    let store = StateStore::new(td.path());
    let history = store.history();
    let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();

    history
        .append("lab-01", &[Condition::from("CPU Temp: 75.00°C")], at)
        .unwrap();
    history
        .append(
            "lab-02",
            &[
                Condition::from("RAM Uso: 85.00%"),
                Condition::from("Offline desde: 16/10/2026 07:00:00"),
            ],
            at,
        )
        .unwrap();

    assert_eq!(
        history.path(),
        td.path().join("relatórios").join("historico-de-chamados.json")
    );
    let log = history.load().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].maquina, "lab-01");
    assert_eq!(log[1].ocorrencia.get("Offline desde"), Some("16/10/2026 07:00:00"));
    assert_eq!(log[1].horario, "2026-10-16T09:00:00.000Z");
}

#[test]
fn corrupt_snapshot_is_a_persistence_error() {
    let td = tempfile::tempdir().unwrap();
    fs::write(td.path().join("ocorrencias.json"), "{ not json").unwrap();
    let err = StateStore::new(td.path()).load_last_known().unwrap_err();
    assert!(matches!(err, FleetError::Persistence { .. }), "{err}");
}

#[test]
fn exception_file_accepts_both_shapes() {
    let td = tempfile::tempdir().unwrap();
    fs::write(
        td.path().join("ignorar_maquinas.json"),
        r#"{"AGILENT": "Offline desde", "LAB-02": ["CPU Temp", "GPU Uso"]}"#,
    )
    .unwrap();
    let ex = StateStore::new(td.path()).load_exceptions().unwrap();
    assert!(ex.is_excepted("AGILENT", &Condition::offline_since("16/10/2026 06:00:00")));
    assert!(ex.is_excepted("lab-02", &Condition::from("GPU Uso: 99.00%")));
    assert!(!ex.is_excepted("lab-02", &Condition::from("RAM Uso: 99.00%")));
}
