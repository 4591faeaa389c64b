//! Threshold evaluation: reduce a machine's newest record to critical conditions.

use chrono::{NaiveDateTime, TimeDelta};
use tracing::warn;

use crate::condition::{Condition, Unit};
use crate::error::{FleetError, Result};
use crate::types::{MetricRecord, Readings, TIMESTAMP_FORMAT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    CpuTemp,
    CpuUsage,
    RamUsage,
    DiskUsage,
    GpuUsage,
    GpuTemp,
}

impl Metric {
    /// Evaluation order, which is also the display order of conditions.
    pub const ALL: [Metric; 6] = [
        Metric::CpuTemp,
        Metric::CpuUsage,
        Metric::RamUsage,
        Metric::DiskUsage,
        Metric::GpuUsage,
        Metric::GpuTemp,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::CpuTemp => "CPU Temp",
            Metric::CpuUsage => "CPU Uso",
            Metric::RamUsage => "RAM Uso",
            Metric::DiskUsage => "Disco Principal Uso",
            Metric::GpuUsage => "GPU Uso",
            Metric::GpuTemp => "GPU Temp",
        }
    }

    /// Readings strictly above this value are critical.
    pub fn threshold(self) -> f64 {
        match self {
            Metric::CpuTemp => 70.0,
            Metric::CpuUsage => 80.0,
            Metric::RamUsage => 80.0,
            Metric::DiskUsage => 90.0,
            Metric::GpuUsage => 80.0,
            Metric::GpuTemp => 80.0,
        }
    }

    pub fn unit(self) -> Unit {
        match self {
            Metric::CpuTemp | Metric::GpuTemp => Unit::Celsius,
            _ => Unit::Percent,
        }
    }

    fn read(self, r: &Readings) -> Option<f64> {
        match self {
            Metric::CpuTemp => r.cpu.temperatura_package_celsius,
            Metric::CpuUsage => r.cpu.percentual_uso,
            Metric::RamUsage => r.memoria_ram.percentual_uso,
            Metric::DiskUsage => r.disco_principal.percentual_uso,
            Metric::GpuUsage => r.gpu.uso_percentual,
            Metric::GpuTemp => r.gpu.temperatura_core_celsius,
        }
    }
}

/// How old a machine's newest record may get before it counts as offline.
#[derive(Debug, Clone)]
pub struct StalenessPolicy {
    pub base_window: TimeDelta,
    /// Aliases (exact match) that get `extended_factor` times the base window.
    pub extended_aliases: Vec<String>,
    pub extended_factor: i32,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            base_window: TimeDelta::seconds(3600),
            extended_aliases: vec!["AGILENT".into()],
            extended_factor: 3,
        }
    }
}

impl StalenessPolicy {
    /// Saturates at `TimeDelta::MAX` instead of overflowing.
    pub fn budget_for(&self, alias: &str) -> TimeDelta {
        if self.extended_aliases.iter().any(|a| a == alias) {
            self.base_window
                .checked_mul(self.extended_factor)
                .unwrap_or(TimeDelta::MAX)
        } else {
            self.base_window
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub conditions: Vec<Condition>,
    pub offline: bool,
}

impl Evaluation {
    pub fn is_critical(&self) -> bool {
        !self.conditions.is_empty()
    }
}

pub fn parse_collected_at(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).map_err(|source| {
        FleetError::MalformedTimestamp {
            raw: raw.to_string(),
            source,
        }
    })
}

/// Evaluate the newest record (`records[0]`) of one machine.
///
/// `now` is local wall-clock time, matching the zone-less collection
/// timestamps. An unparseable timestamp is logged and the machine is not
/// flagged offline; its readings are still checked.
pub fn evaluate(
    records: &[MetricRecord],
    alias: &str,
    now: NaiveDateTime,
    staleness: &StalenessPolicy,
) -> Evaluation {
    let Some(newest) = records.first() else {
        return Evaluation::default();
    };

    let mut conditions: Vec<Condition> = Metric::ALL
        .iter()
        .filter_map(|&metric| {
            let value = metric.read(&newest.monitoramento)?;
            // A zero reading is indistinguishable from no reading.
            (value > metric.threshold() && value != 0.0)
                .then(|| Condition::measured(metric.label(), value, metric.unit()))
        })
        .collect();

    let offline = match parse_collected_at(&newest.timestamp_coleta) {
        Ok(collected_at) => now - collected_at > staleness.budget_for(alias),
        Err(e) => {
            warn!(alias, error = %e, "cannot judge staleness");
            false
        }
    };
    if offline {
        conditions.push(Condition::offline_since(&newest.timestamp_coleta));
    }

    Evaluation {
        conditions,
        offline,
    }
}
