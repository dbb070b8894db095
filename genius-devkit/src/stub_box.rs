/**
 * STUB TELEMETRY BOX - Box télémétrie en mémoire pour tests et dev
 *
 * RÔLE : servir la surface HTTP consommée par la couche de sync
 * (/v1/machines, status, events, oee, /box/healthz) sur un port éphémère,
 * avec machines scriptées, latence par machine, pannes par endpoint et
 * compteurs de requêtes pour les assertions de tests.
 */

use crate::payloads;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

type SharedStub = Arc<Mutex<StubState>>;

/// Machine scriptée. Les champs se manipulent via les setters de `StubBox`.
#[derive(Debug, Clone)]
pub struct StubMachine {
    pub rpm: f64,
    pub execution: String,
    pub mode: String,
    pub feed_rate: Option<f64>,
    pub spindle_load_pct: Option<f64>,
    pub tool_id: Option<String>,
    pub alarm: Option<(String, String)>,
    pub part_count: Option<u64>,
    pub update_interval_ms: u64,
    /// Âge artificiel du timestamp renvoyé (simule un box qui rejoue un
    /// vieux snapshot).
    pub status_age_ms: i64,
    /// Latence artificielle des réponses status (simule un tick lent).
    pub status_delay_ms: u64,
    pub events: Vec<Value>,
    pub oee: (f64, f64, f64, f64),
    pub status_hits: u64,
    pub oee_hits: u64,
}

impl Default for StubMachine {
    fn default() -> Self {
        Self {
            rpm: 0.0,
            execution: "EXECUTING".to_string(),
            mode: "AUTOMATIC".to_string(),
            feed_rate: None,
            spindle_load_pct: None,
            tool_id: None,
            alarm: None,
            part_count: None,
            update_interval_ms: 1000,
            status_age_ms: 0,
            status_delay_ms: 0,
            events: Vec::new(),
            oee: (90.0, 85.0, 99.0, 75.7),
            status_hits: 0,
            oee_hits: 0,
        }
    }
}

#[derive(Debug, Default)]
struct StubState {
    // BTreeMap : roster trié, ordre stable comme le vrai backend
    machines: BTreeMap<String, StubMachine>,
    fail_machines: bool,
    fail_status: bool,
    fail_events: bool,
    fail_oee: bool,
    fail_box_health: bool,
}

pub struct StubBox {
    addr: SocketAddr,
    state: SharedStub,
    task: JoinHandle<()>,
}

impl StubBox {
    /// Démarre le box stub sur 127.0.0.1, port éphémère.
    pub async fn start() -> anyhow::Result<Self> {
        env_logger::try_init().ok();

        let state: SharedStub = Arc::new(Mutex::new(StubState::default()));
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[STUB] serve error: {e}");
            }
        });

        log::info!("📡 [STUB] telemetry box listening on {addr}");
        Ok(Self { addr, state, task })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn add_machine(&self, id: &str) {
        self.state
            .lock()
            .machines
            .insert(id.to_string(), StubMachine::default());
    }

    /// Mutation libre d'une machine scriptée.
    pub fn machine(&self, id: &str, mutate: impl FnOnce(&mut StubMachine)) {
        if let Some(machine) = self.state.lock().machines.get_mut(id) {
            mutate(machine);
        }
    }

    pub fn set_rpm(&self, id: &str, rpm: f64) {
        self.machine(id, |m| m.rpm = rpm);
    }

    pub fn set_execution(&self, id: &str, execution: &str) {
        let execution = execution.to_string();
        self.machine(id, move |m| m.execution = execution);
    }

    pub fn set_alarm(&self, id: &str, code: &str, message: &str) {
        let alarm = (code.to_string(), message.to_string());
        self.machine(id, move |m| m.alarm = Some(alarm));
    }

    pub fn set_update_interval_ms(&self, id: &str, interval_ms: u64) {
        self.machine(id, move |m| m.update_interval_ms = interval_ms);
    }

    pub fn set_status_age_ms(&self, id: &str, age_ms: i64) {
        self.machine(id, move |m| m.status_age_ms = age_ms);
    }

    pub fn set_status_delay_ms(&self, id: &str, delay_ms: u64) {
        self.machine(id, move |m| m.status_delay_ms = delay_ms);
    }

    pub fn set_oee(&self, id: &str, availability: f64, performance: f64, quality: f64, oee: f64) {
        self.machine(id, move |m| m.oee = (availability, performance, quality, oee));
    }

    /// Ajoute un événement d'historique (le plus récent en dernier, le
    /// endpoint répond du plus récent au plus ancien).
    pub fn push_event(&self, id: &str, execution: &str, rpm: f64) {
        let event = payloads::event(execution, rpm, Utc::now());
        self.machine(id, move |m| m.events.push(event));
    }

    pub fn fail_machines(&self, on: bool) {
        self.state.lock().fail_machines = on;
    }

    pub fn fail_status(&self, on: bool) {
        self.state.lock().fail_status = on;
    }

    pub fn fail_events(&self, on: bool) {
        self.state.lock().fail_events = on;
    }

    pub fn fail_oee(&self, on: bool) {
        self.state.lock().fail_oee = on;
    }

    pub fn fail_box_health(&self, on: bool) {
        self.state.lock().fail_box_health = on;
    }

    pub fn status_hits(&self, id: &str) -> u64 {
        self.state
            .lock()
            .machines
            .get(id)
            .map(|m| m.status_hits)
            .unwrap_or(0)
    }

    pub fn oee_hits(&self, id: &str) -> u64 {
        self.state
            .lock()
            .machines
            .get(id)
            .map(|m| m.oee_hits)
            .unwrap_or(0)
    }

    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for StubBox {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn router(state: SharedStub) -> Router {
    Router::new()
        .route("/v1/machines", get(list_machines))
        .route("/v1/machines/status", get(machines_grid))
        .route("/v1/machines/{id}/status", get(machine_status))
        .route("/v1/machines/{id}/events", get(machine_events))
        .route("/v1/machines/{id}/oee", get(machine_oee))
        .route("/v1/machines/{id}/oee/trend", get(oee_trend))
        .route("/box/healthz", get(box_health))
        .with_state(state)
}

async fn list_machines(State(state): State<SharedStub>) -> Result<Json<Value>, StatusCode> {
    let st = state.lock();
    if st.fail_machines {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let ids: Vec<&String> = st.machines.keys().collect();
    Ok(Json(serde_json::json!(ids)))
}

async fn machines_grid(State(state): State<SharedStub>) -> Result<Json<Value>, StatusCode> {
    let st = state.lock();
    if st.fail_machines {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let items: Vec<Value> = st
        .machines
        .iter()
        .map(|(id, machine)| payloads::grid_item(id, machine))
        .collect();
    Ok(Json(serde_json::json!(items)))
}

async fn machine_status(
    State(state): State<SharedStub>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let (delay_ms, payload) = {
        let mut st = state.lock();
        if st.fail_status {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        let Some(machine) = st.machines.get_mut(&id) else {
            return Err(StatusCode::NOT_FOUND);
        };
        machine.status_hits += 1;
        (machine.status_delay_ms, payloads::status(&id, machine))
    };

    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    Ok(Json(payload))
}

async fn machine_events(
    State(state): State<SharedStub>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    let st = state.lock();
    if st.fail_events {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let Some(machine) = st.machines.get(&id) else {
        return Err(StatusCode::NOT_FOUND);
    };

    let limit = params
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(50)
        .min(200);

    // plus récent d'abord
    let events: Vec<Value> = machine.events.iter().rev().take(limit).cloned().collect();
    Ok(Json(serde_json::json!(events)))
}

async fn machine_oee(
    State(state): State<SharedStub>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let mut st = state.lock();
    if st.fail_oee {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let Some(machine) = st.machines.get_mut(&id) else {
        return Err(StatusCode::NOT_FOUND);
    };
    machine.oee_hits += 1;
    Ok(Json(payloads::oee(machine)))
}

async fn oee_trend(
    State(state): State<SharedStub>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    let st = state.lock();
    if st.fail_oee {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let Some(machine) = st.machines.get(&id) else {
        return Err(StatusCode::NOT_FOUND);
    };

    let from_date = params.get("from_date").map(String::as_str).unwrap_or("");
    let to_date = params.get("to_date").map(String::as_str).unwrap_or("");
    let points = vec![
        payloads::oee_trend_point(from_date, machine),
        payloads::oee_trend_point(to_date, machine),
    ];
    Ok(Json(serde_json::json!(points)))
}

async fn box_health(State(state): State<SharedStub>) -> Result<Json<Value>, StatusCode> {
    let st = state.lock();
    if st.fail_box_health {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let mut running = 0;
    let mut idle = 0;
    let mut offline = 0;
    for machine in st.machines.values() {
        match machine.execution.as_str() {
            "EXECUTING" => running += 1,
            "READY" => idle += 1,
            _ => offline += 1,
        }
    }
    Ok(Json(payloads::box_health(running, idle, offline)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roster_is_sorted_and_scriptable() {
        let stub = StubBox::start().await.unwrap();
        stub.add_machine("CNC-02");
        stub.add_machine("CNC-01");
        stub.set_rpm("CNC-01", 1200.0);

        let st = stub.state.lock();
        let ids: Vec<&String> = st.machines.keys().collect();
        assert_eq!(ids, ["CNC-01", "CNC-02"]);
        assert_eq!(st.machines["CNC-01"].rpm, 1200.0);
    }

    #[tokio::test]
    async fn test_status_payload_matches_contract() {
        let stub = StubBox::start().await.unwrap();
        stub.add_machine("CNC-01");
        stub.set_alarm("CNC-01", "AL-100", "spindle overload");

        let st = stub.state.lock();
        let payload = payloads::status("CNC-01", &st.machines["CNC-01"]);
        assert_eq!(payload["machine_id"], "CNC-01");
        assert_eq!(payload["update_interval_ms"], 1000);
        assert_eq!(payload["alarm_code"], "AL-100");
        assert!(payload["timestamp_utc"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_event_order_and_limit() {
        let stub = StubBox::start().await.unwrap();
        stub.add_machine("CNC-01");
        stub.push_event("CNC-01", "READY", 0.0);
        stub.push_event("CNC-01", "EXECUTING", 900.0);

        let st = stub.state.lock();
        let newest_first: Vec<&Value> = st.machines["CNC-01"].events.iter().rev().collect();
        assert_eq!(newest_first[0]["execution"], "EXECUTING");
        assert_eq!(newest_first[1]["execution"], "READY");
    }
}
