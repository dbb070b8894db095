/**
 * MACHINE STORE - Agrégat stateful de synchronisation ("MachinesContext")
 *
 * RÔLE : composer fetchers, boucles de polling, cache TTL et classificateur
 * en un état unique lisible par la présentation. Tient le roster, la
 * sélection courante, son status vivant, son historique d'événements, les
 * métriques OEE et la santé du box.
 *
 * FONCTIONNEMENT :
 * - roster + grid : toutes les 2 s, en parallèle, erreur commune
 * - status sélection : toutes les 1 s
 * - événements sélection : toutes les 10 s
 * - OEE sélection : toutes les 30 s, servi à travers le cache TTL (30 s)
 * - santé box : toutes les 30 s, indépendante de la sélection
 * Les intervalles sont des constantes de politique, boucles indépendantes,
 * jamais fusionnées : la réactivité perçue du RPM vit sur la boucle 1 s.
 *
 * SÉMANTIQUE D'ÉCHEC :
 * - roster en erreur → roster et sélection précédents conservés (données
 *   périmées préférées à un écran vide)
 * - status sélection en erreur → snapshot EFFACÉ ("unknown") : un snapshot
 *   périmé tromperait l'opérateur sur l'état physique réel
 * - événements / OEE / santé box en erreur → données précédentes conservées
 * Chaque flux isole son erreur ; rien n'est fatal, les boucles continuent.
 */

use crate::api::ApiClient;
use crate::cache::TtlCache;
use crate::error::{ErrorInfo, FetchError};
use crate::models::{BoxHealth, MachineEvent, MachineGridItem, MachineId, MachineStatus, OeeSummary};
use crate::poll::{start_polling, Liveness, PollHandle};
use crate::staleness::{classify, Connection};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub type Shared<T> = Arc<Mutex<T>>;

// Cadences de polling (ms), fixes, non configurables par l'utilisateur.
pub const MACHINES_POLL_MS: u64 = 2_000;
pub const STATUS_POLL_MS: u64 = 1_000;
pub const EVENTS_POLL_MS: u64 = 10_000;
pub const OEE_POLL_MS: u64 = 30_000;
pub const BOX_HEALTH_POLL_MS: u64 = 30_000;

/// Fenêtre de péremption acceptable pour les métriques dérivées.
pub const OEE_TTL_MS: u64 = 30_000;
pub const EVENTS_LIMIT: usize = 50;

/// État lisible par la présentation. Un slot d'erreur et un flag de
/// chargement par flux ; aucun flux ne bloque ni ne corrompt un autre.
#[derive(Debug, Clone)]
pub struct SyncState {
    pub machines: Vec<MachineId>,
    pub machines_grid: Vec<MachineGridItem>,
    pub machines_loading: bool,
    pub machines_error: Option<ErrorInfo>,

    pub selected_machine_id: Option<MachineId>,
    pub selected_machine_status: Option<MachineStatus>,
    pub selected_machine_loading: bool,
    pub selected_machine_error: Option<ErrorInfo>,

    pub events: Vec<MachineEvent>,
    pub events_loading: bool,
    pub events_error: Option<ErrorInfo>,

    pub oee: Option<OeeSummary>,
    pub oee_error: Option<ErrorInfo>,

    pub box_health: Option<BoxHealth>,
    pub box_health_error: Option<ErrorInfo>,

    // Bootstrap one-shot : l'auto-sélection ne se réapplique pas après
    // une désélection de l'utilisateur.
    auto_selected: bool,
}

impl SyncState {
    fn new() -> Self {
        Self {
            machines: Vec::new(),
            machines_grid: Vec::new(),
            machines_loading: true,
            machines_error: None,
            selected_machine_id: None,
            selected_machine_status: None,
            selected_machine_loading: false,
            selected_machine_error: None,
            events: Vec::new(),
            events_loading: false,
            events_error: None,
            oee: None,
            oee_error: None,
            box_health: None,
            box_health_error: None,
            auto_selected: false,
        }
    }

    /// Classification pure de la sélection courante à l'instant `now`.
    /// À réévaluer à au moins 1 Hz côté consommateur : elle dégrade par
    /// simple avancement de l'horloge, sans nouveau status.
    pub fn classification_at(&self, now: DateTime<Utc>) -> Connection {
        match &self.selected_machine_status {
            Some(status) => classify(now, Some(status.timestamp_utc), status.update_interval_ms),
            None => classify(now, None, STATUS_POLL_MS),
        }
    }
}

#[derive(Default)]
struct Loops {
    machines: Option<PollHandle>,
    box_health: Option<PollHandle>,
    status: Option<PollHandle>,
    events: Option<PollHandle>,
    oee: Option<PollHandle>,
}

/// Store de synchronisation. Clonable à la manière d'un handle : tous les
/// champs sont partagés, les boucles appartiennent à l'ensemble des clones.
#[derive(Clone)]
pub struct MachineStore {
    api: Arc<ApiClient>,
    state: Shared<SyncState>,
    oee_cache: Shared<TtlCache<MachineId, OeeSummary>>,
    loops: Shared<Loops>,
}

impl MachineStore {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api: Arc::new(api),
            state: Arc::new(Mutex::new(SyncState::new())),
            oee_cache: Arc::new(Mutex::new(TtlCache::new())),
            loops: Arc::new(Mutex::new(Loops::default())),
        }
    }

    /// Démarre les boucles indépendantes de la sélection (roster + santé
    /// box). Idempotent.
    pub fn start(&self) {
        let mut loops = self.loops.lock();
        if loops.machines.is_some() {
            return;
        }
        loops.machines = Some(self.spawn_machines_loop());
        loops.box_health = Some(self.spawn_box_health_loop());
    }

    /// Snapshot cohérent de l'état courant.
    pub fn snapshot(&self) -> SyncState {
        self.state.lock().clone()
    }

    /// Classification de la sélection courante, horloge murale.
    pub fn classification(&self) -> Connection {
        self.state.lock().classification_at(Utc::now())
    }

    /// Change la sélection. No-op si `id` est déjà sélectionné. Sinon :
    /// révocation des boucles de l'ancienne sélection sous le verrou
    /// d'état (leurs ticks en vol s'écartent d'eux-mêmes), remise à
    /// Loading du sous-état sélection, démarrage des boucles dédiées
    /// ancrées sur le nouvel id.
    pub fn select(&self, id: &str) {
        let mut loops = self.loops.lock();
        {
            let mut st = self.state.lock();
            if st.selected_machine_id.as_deref() == Some(id) {
                return;
            }
            for handle in [loops.status.take(), loops.events.take(), loops.oee.take()]
                .into_iter()
                .flatten()
            {
                handle.cancel();
            }
            st.selected_machine_id = Some(id.to_string());
            st.selected_machine_status = None;
            st.selected_machine_error = None;
            st.selected_machine_loading = true;
            st.events = Vec::new();
            st.events_error = None;
            st.events_loading = true;
            st.oee = None;
            st.oee_error = None;
        }
        debug!(machine = id, "selection changed");
        loops.status = Some(self.spawn_status_loop(id.to_string()));
        loops.events = Some(self.spawn_events_loop(id.to_string()));
        loops.oee = Some(self.spawn_oee_loop(id.to_string()));
    }

    /// Efface la sélection et arrête ses boucles. L'auto-sélection du
    /// roster ne se redéclenche pas ensuite.
    pub fn deselect(&self) {
        let mut loops = self.loops.lock();
        let mut st = self.state.lock();
        for handle in [loops.status.take(), loops.events.take(), loops.oee.take()]
            .into_iter()
            .flatten()
        {
            handle.cancel();
        }
        st.selected_machine_id = None;
        st.selected_machine_status = None;
        st.selected_machine_error = None;
        st.selected_machine_loading = false;
        st.events = Vec::new();
        st.events_error = None;
        st.events_loading = false;
        st.oee = None;
        st.oee_error = None;
    }

    /// Fetch hors-bande du status de la sélection courante, sans toucher
    /// à la cadence de la boucle d'intervalle.
    pub fn refresh_selected(&self) {
        let Some((id, live)) = ({
            let loops = self.loops.lock();
            let st = self.state.lock();
            match (st.selected_machine_id.clone(), loops.status.as_ref()) {
                (Some(id), Some(handle)) => Some((id, handle.liveness())),
                _ => None,
            }
        }) else {
            return;
        };

        self.apply_for(&live, &id, |st| st.selected_machine_loading = true);
        let store = self.clone();
        tokio::spawn(async move {
            let result = store.api.machine_status(&id).await;
            store.apply_status_result(&live, &id, result);
        });
    }

    /// Fetch hors-bande du roster + grid.
    pub fn refresh_machines(&self) {
        let Some(live) = ({
            let loops = self.loops.lock();
            loops.machines.as_ref().map(|handle| handle.liveness())
        }) else {
            return;
        };

        self.state.lock().machines_loading = true;
        let store = self.clone();
        tokio::spawn(async move {
            store.poll_machines(&live).await;
        });
    }

    /// Teardown total : révocation de tous les jetons sous le verrou
    /// d'état, plus aucune mutation d'aucune boucle ensuite.
    pub fn shutdown(&self) {
        let mut loops = self.loops.lock();
        let _st = self.state.lock();
        for handle in [
            loops.machines.take(),
            loops.box_health.take(),
            loops.status.take(),
            loops.events.take(),
            loops.oee.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.cancel();
        }
    }

    // ----- boucles -----

    fn spawn_machines_loop(&self) -> PollHandle {
        let store = self.clone();
        start_polling(Duration::from_millis(MACHINES_POLL_MS), move |live| {
            let store = store.clone();
            async move {
                store.poll_machines(&live).await;
            }
        })
    }

    fn spawn_box_health_loop(&self) -> PollHandle {
        let store = self.clone();
        start_polling(Duration::from_millis(BOX_HEALTH_POLL_MS), move |live| {
            let store = store.clone();
            async move {
                let result = store.api.box_health().await;
                store.apply(&live, |st| match result {
                    Ok(health) => {
                        st.box_health = Some(health);
                        st.box_health_error = None;
                    }
                    Err(ref e) => st.box_health_error = Some(ErrorInfo::from(e)),
                });
            }
        })
    }

    fn spawn_status_loop(&self, id: MachineId) -> PollHandle {
        let store = self.clone();
        start_polling(Duration::from_millis(STATUS_POLL_MS), move |live| {
            let store = store.clone();
            let id = id.clone();
            async move {
                let result = store.api.machine_status(&id).await;
                store.apply_status_result(&live, &id, result);
            }
        })
    }

    fn spawn_events_loop(&self, id: MachineId) -> PollHandle {
        let store = self.clone();
        start_polling(Duration::from_millis(EVENTS_POLL_MS), move |live| {
            let store = store.clone();
            let id = id.clone();
            async move {
                let result = store.api.machine_events(&id, EVENTS_LIMIT).await;
                store.apply_for(&live, &id, |st| match result {
                    Ok(events) => {
                        st.events = events;
                        st.events_error = None;
                        st.events_loading = false;
                    }
                    Err(ref e) => {
                        // historique : le périmé reste affichable
                        st.events_error = Some(ErrorInfo::from(e));
                        st.events_loading = false;
                    }
                });
            }
        })
    }

    fn spawn_oee_loop(&self, id: MachineId) -> PollHandle {
        let store = self.clone();
        start_polling(Duration::from_millis(OEE_POLL_MS), move |live| {
            let store = store.clone();
            let id = id.clone();
            async move {
                store.poll_oee(&live, &id).await;
            }
        })
    }

    // ----- ticks -----

    async fn poll_machines(&self, live: &Liveness) {
        let result = tokio::try_join!(self.api.list_machines(), self.api.machines_grid());

        let bootstrap = {
            let mut st = self.state.lock();
            if !live.is_live() {
                return;
            }
            match result {
                Ok((list, grid)) => {
                    let mut roster: Vec<MachineId> = Vec::with_capacity(list.len());
                    for id in list {
                        if !roster.contains(&id) {
                            roster.push(id);
                        }
                    }
                    st.machines = roster;
                    st.machines_grid = grid;
                    st.machines_error = None;
                    st.machines_loading = false;

                    if !st.auto_selected && st.selected_machine_id.is_none() {
                        let first = st.machines.first().cloned();
                        if first.is_some() {
                            st.auto_selected = true;
                        }
                        first
                    } else {
                        None
                    }
                }
                Err(ref e) => {
                    // roster et sélection précédents conservés
                    st.machines_error = Some(ErrorInfo::from(e));
                    st.machines_loading = false;
                    None
                }
            }
        };

        if let Some(id) = bootstrap {
            debug!(machine = %id, "auto-selecting first roster entry");
            self.select(&id);
        }
    }

    async fn poll_oee(&self, live: &Liveness, id: &MachineId) {
        if let Some(cached) = self.oee_cache.lock().get(id) {
            self.apply_for(live, id, |st| {
                st.oee = Some(cached);
                st.oee_error = None;
            });
            return;
        }

        match self.api.machine_oee(id, None, None).await {
            Ok(summary) => {
                self.oee_cache.lock().put(
                    id.clone(),
                    summary.clone(),
                    Duration::from_millis(OEE_TTL_MS),
                );
                self.apply_for(live, id, |st| {
                    st.oee = Some(summary);
                    st.oee_error = None;
                });
            }
            Err(ref e) => {
                self.apply_for(live, id, |st| st.oee_error = Some(ErrorInfo::from(e)));
            }
        }
    }

    fn apply_status_result(
        &self,
        live: &Liveness,
        id: &MachineId,
        result: Result<MachineStatus, FetchError>,
    ) {
        self.apply_for(live, id, |st| match result {
            Ok(status) => {
                st.selected_machine_status = Some(status);
                st.selected_machine_error = None;
                st.selected_machine_loading = false;
            }
            Err(ref e) => {
                // "unknown" plutôt que dernier-connu : fail loud
                st.selected_machine_status = None;
                st.selected_machine_error = Some(ErrorInfo::from(e));
                st.selected_machine_loading = false;
            }
        });
    }

    // ----- garde de vivacité -----

    /// Mutation d'un flux indépendant de la sélection : appliquée ssi le
    /// jeton du tick est encore vivant, vérifié sous le verrou d'état.
    fn apply(&self, live: &Liveness, mutate: impl FnOnce(&mut SyncState)) -> bool {
        let mut st = self.state.lock();
        if !live.is_live() {
            return false;
        }
        mutate(&mut st);
        true
    }

    /// Mutation d'un flux ancré sur une machine : exige en plus que la clé
    /// de dépendance capturée au tick soit toujours la sélection courante.
    fn apply_for(
        &self,
        live: &Liveness,
        id: &MachineId,
        mutate: impl FnOnce(&mut SyncState),
    ) -> bool {
        let mut st = self.state.lock();
        if !live.is_live() || st.selected_machine_id.as_ref() != Some(id) {
            return false;
        }
        mutate(&mut st);
        true
    }
}
