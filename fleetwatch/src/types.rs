//! Types that mirror the inventory service's JSON schema.

use serde::{Deserialize, Serialize};

/// Collection timestamp format used by the inventory, local time without zone.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineAlias {
    pub name: String,
}

/// `GET /dados/maquinas`
#[derive(Debug, Clone, Deserialize)]
pub struct Roster {
    #[serde(rename = "machineAliases")]
    pub machine_aliases: Vec<MachineAlias>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuReading {
    #[serde(default)]
    pub temperatura_package_celsius: Option<f64>,
    #[serde(default)]
    pub percentual_uso: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageReading {
    #[serde(default)]
    pub percentual_uso: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpuReading {
    #[serde(default)]
    pub uso_percentual: Option<f64>,
    #[serde(default)]
    pub temperatura_core_celsius: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Readings {
    #[serde(default)]
    pub cpu: CpuReading,
    #[serde(default)]
    pub memoria_ram: UsageReading,
    #[serde(default)]
    pub disco_principal: UsageReading,
    #[serde(default)]
    pub gpu: GpuReading,
}

/// One timestamped sample. `GET /<alias>` returns these newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub timestamp_coleta: String,
    #[serde(default)]
    pub monitoramento: Readings,
}
