//! Constructeurs de payloads conformes aux contrats machines.status@v0.1,
//! machines.events@v0.2 et box.healthz consommés par la couche de sync.

use crate::stub_box::StubMachine;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

pub fn status(id: &str, machine: &StubMachine) -> Value {
    let (alarm_code, alarm_message) = match &machine.alarm {
        Some((code, message)) => (json!(code), json!(message)),
        None => (Value::Null, Value::Null),
    };
    json!({
        "machine_id": id,
        "controller_family": "MITSUBISHI_M8X",
        "timestamp_utc": status_timestamp(machine),
        "mode": machine.mode,
        "execution": machine.execution,
        "rpm": machine.rpm,
        "feed_rate": machine.feed_rate,
        "spindle_load_pct": machine.spindle_load_pct,
        "tool_id": machine.tool_id,
        "alarm_code": alarm_code,
        "alarm_message": alarm_message,
        "part_count": machine.part_count,
        "update_interval_ms": machine.update_interval_ms,
        "source": "mtconnect:sim",
    })
}

pub fn grid_item(id: &str, machine: &StubMachine) -> Value {
    json!({
        "machine_id": id,
        "execution": machine.execution,
        "mode": machine.mode,
        "rpm": machine.rpm,
        "timestamp_utc": status_timestamp(machine),
        "source": "mtconnect:sim",
    })
}

pub fn event(execution: &str, rpm: f64, timestamp_utc: DateTime<Utc>) -> Value {
    json!({
        "timestamp_utc": timestamp_utc.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "execution": execution,
        "mode": "AUTOMATIC",
        "rpm": rpm,
        "feed_rate": null,
        "spindle_load_pct": null,
        "tool_id": null,
        "alarm_code": null,
        "alarm_message": null,
        "part_count": null,
    })
}

pub fn oee(machine: &StubMachine) -> Value {
    let (availability, performance, quality, oee) = machine.oee;
    json!({
        "availability": availability,
        "performance": performance,
        "quality": quality,
        "oee": oee,
        "last_updated": now_rfc3339(),
    })
}

pub fn oee_trend_point(date: &str, machine: &StubMachine) -> Value {
    let (availability, performance, quality, oee) = machine.oee;
    json!({
        "date": date,
        "shift": null,
        "availability": availability,
        "performance": performance,
        "quality": quality,
        "oee": oee,
    })
}

pub fn box_health(running: u32, idle: u32, offline: u32) -> Value {
    json!({
        "status": "healthy",
        "version": "0.2.0",
        "timestamp": now_rfc3339(),
        "services": {
            "database": "running",
            "backend": "running",
            "adapter": "running",
            "sync": "running",
            "frontend": "running",
        },
        "system": {
            "cpu_percent": 12.5,
            "memory_percent": 38.0,
            "memory_used_gb": 3.1,
            "memory_total_gb": 8.0,
            "disk_percent": 54.0,
            "disk_used_gb": 27.0,
            "disk_total_gb": 50.0,
            "uptime_seconds": 3600.0,
        },
        "alerts": [],
        "uptime_formatted": "1h 0m",
        "machine_count_by_state": {
            "running": running,
            "idle": idle,
            "offline": offline,
        },
    })
}

fn status_timestamp(machine: &StubMachine) -> String {
    let ts = Utc::now() - Duration::milliseconds(machine.status_age_ms);
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
