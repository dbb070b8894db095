//! CNC-Genius Dash - Consommateur terminal de la couche de synchronisation
//!
//! Lit le snapshot du store une fois par seconde et rend une ligne de
//! status par machine sélectionnée, plus la classification de connexion.
//! Toute la logique de fetch/cache/staleness vit dans genius-sync ; ici on
//! ne fait que lire l'état.

use anyhow::{Context, Result};
use genius_sync::api::ApiClient;
use genius_sync::staleness::Connection;
use genius_sync::store::MachineStore;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let cfg = genius_sync::config::load_config().await;
    info!("🛰️ CNC-Genius dash starting (box: {})", cfg.api.base_url);

    let api = ApiClient::new(&cfg.api).context("failed to build API client")?;
    let store = MachineStore::new(api);
    store.start();

    // Sélection manuelle optionnelle : premier argument = machine id.
    // Sinon le store auto-sélectionne la première entrée du roster.
    if let Some(id) = std::env::args().nth(1) {
        store.select(&id);
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => render(&store),
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                store.shutdown();
                break;
            }
        }
    }

    Ok(())
}

fn render(store: &MachineStore) {
    let snap = store.snapshot();

    if let Some(err) = &snap.machines_error {
        println!("[dash] roster: {err} (données précédentes conservées)");
    }

    let Some(id) = &snap.selected_machine_id else {
        if snap.machines_loading {
            println!("[dash] waiting for roster...");
        } else {
            println!("[dash] {} machine(s), none selected", snap.machines.len());
        }
        return;
    };

    let classification = store.classification();
    match (&snap.selected_machine_status, &snap.selected_machine_error) {
        (Some(status), _) => {
            let alarm = status
                .alarm_code
                .as_deref()
                .map(|code| format!(" | ⚠ {code}"))
                .unwrap_or_default();
            println!(
                "[dash] {id} | {}/{} | {:.0} rpm | feed {} | {classification}{alarm}",
                status.mode,
                status.execution,
                status.rpm,
                status
                    .feed_rate
                    .map(|f| format!("{f:.0}"))
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        (None, Some(err)) => println!("[dash] {id} | status unknown: {err} | {classification}"),
        (None, None) => println!("[dash] {id} | loading... | {classification}"),
    }

    if classification == Connection::Unstable {
        println!("[dash] ⚠ {id}: status en retard sur sa cadence nominale");
    }

    if let Some(health) = &snap.box_health {
        if health.status != "healthy" {
            println!("[dash] box {}: {:?}", health.status, health.alerts);
        }
    }
}
