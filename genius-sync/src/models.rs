use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifiant opaque d'une machine, clé de tout l'état par machine.
pub type MachineId = String;

// Structures basées sur le contrat canonique machines.status@v0.1 / events@v0.2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStatus {
    pub machine_id: MachineId,
    #[serde(default = "default_controller_family")]
    pub controller_family: String,
    pub timestamp_utc: DateTime<Utc>,
    pub mode: String,               // AUTOMATIC, MANUAL, ...
    pub execution: String,          // EXECUTING, STOPPED, READY
    pub rpm: f64,
    pub feed_rate: Option<f64>,     // mm/min
    pub spindle_load_pct: Option<f64>,
    pub tool_id: Option<String>,
    pub alarm_code: Option<String>,
    pub alarm_message: Option<String>,
    pub part_count: Option<u64>,
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,    // cadence nominale annoncée par le serveur
    #[serde(default = "default_source")]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineEvent {
    pub timestamp_utc: DateTime<Utc>,
    pub execution: String,
    pub mode: Option<String>,
    pub rpm: f64,
    pub feed_rate: Option<f64>,
    pub spindle_load_pct: Option<f64>,
    pub tool_id: Option<String>,
    pub alarm_code: Option<String>,
    pub alarm_message: Option<String>,
    pub part_count: Option<u64>,
}

/// Résumé par machine pour la vue flotte, rapatrié avec le roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineGridItem {
    pub machine_id: MachineId,
    pub execution: String,
    pub mode: String,
    pub rpm: f64,
    pub timestamp_utc: DateTime<Utc>,
    #[serde(default = "default_source")]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OeeSummary {
    pub availability: f64,
    pub performance: f64,
    pub quality: f64,
    pub oee: f64,
    #[serde(default, alias = "lastUpdated")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl OeeSummary {
    /// Ramène chaque métrique dans 0..=100, le serveur ne le garantit pas.
    pub fn normalized(mut self) -> Self {
        self.availability = self.availability.clamp(0.0, 100.0);
        self.performance = self.performance.clamp(0.0, 100.0);
        self.quality = self.quality.clamp(0.0, 100.0);
        self.oee = self.oee.clamp(0.0, 100.0);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OeeTrendPoint {
    pub date: String,
    pub shift: Option<String>,
    pub availability: f64,
    pub performance: f64,
    pub quality: f64,
    pub oee: f64,
}

// Diagnostic du box télémétrie (GET /box/healthz)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxHealth {
    pub status: String,             // healthy, degraded
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub services: ServiceStatus,
    pub system: SystemMetrics,
    #[serde(default)]
    pub alerts: Vec<String>,
    pub uptime_formatted: String,
    #[serde(default)]
    pub machine_count_by_state: Option<MachineStateCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub database: String,           // running, error
    pub backend: String,
    pub adapter: String,
    pub sync: String,
    pub frontend: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_gb: f64,
    pub memory_total_gb: f64,
    pub disk_percent: f64,
    pub disk_used_gb: f64,
    pub disk_total_gb: f64,
    pub uptime_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStateCount {
    pub running: u32,
    pub idle: u32,
    pub offline: u32,
}

fn default_controller_family() -> String {
    "MITSUBISHI_M8X".to_string()
}

fn default_update_interval_ms() -> u64 {
    1000
}

fn default_source() -> String {
    "mtconnect:sim".to_string()
}
