/**
 * RESOURCE FETCHERS - Client HTTP typé du box télémétrie
 *
 * RÔLE : une invocation = exactement un aller-retour réseau, réponse décodée
 * ou erreur typée. Pas de retry ici (la cadence de retry appartient aux
 * boucles de polling), pas de cache ici (voir cache.rs).
 *
 * Surface consommée (GET JSON, non authentifié, base URL fournie par la
 * config) : /v1/machines, /v1/machines/status, /v1/machines/{id}/status,
 * /v1/machines/{id}/events, /v1/machines/{id}/oee[/trend], /box/healthz.
 */

use crate::config::ApiConf;
use crate::error::FetchError;
use crate::models::{
    BoxHealth, MachineEvent, MachineGridItem, MachineId, MachineStatus, OeeSummary, OeeTrendPoint,
};
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(conf: &ApiConf) -> reqwest::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = conf.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            base: conf.base_url.trim_end_matches('/').to_string(),
            http: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// GET /v1/machines - roster ordonné d'identifiants.
    pub async fn list_machines(&self) -> Result<Vec<MachineId>, FetchError> {
        self.get_json("/v1/machines", &[]).await
    }

    /// GET /v1/machines/status - résumé de toute la flotte.
    pub async fn machines_grid(&self) -> Result<Vec<MachineGridItem>, FetchError> {
        self.get_json("/v1/machines/status", &[]).await
    }

    /// GET /v1/machines/{id}/status - dernier snapshot valide.
    pub async fn machine_status(&self, id: &str) -> Result<MachineStatus, FetchError> {
        self.get_json(&format!("/v1/machines/{id}/status"), &[]).await
    }

    /// GET /v1/machines/{id}/events?limit=N - historique, plus récent d'abord.
    pub async fn machine_events(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Vec<MachineEvent>, FetchError> {
        self.get_json(
            &format!("/v1/machines/{id}/events"),
            &[("limit", limit.to_string())],
        )
        .await
    }

    /// GET /v1/machines/{id}/oee?date&shift - métriques dérivées, valeurs
    /// ramenées dans 0..=100 au décodage.
    pub async fn machine_oee(
        &self,
        id: &str,
        date: Option<&str>,
        shift: Option<&str>,
    ) -> Result<OeeSummary, FetchError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(date) = date {
            query.push(("date", date.to_string()));
        }
        if let Some(shift) = shift {
            query.push(("shift", shift.to_string()));
        }
        let summary: OeeSummary = self
            .get_json(&format!("/v1/machines/{id}/oee"), &query)
            .await?;
        Ok(summary.normalized())
    }

    /// GET /v1/machines/{id}/oee/trend?from_date&to_date&shift
    pub async fn oee_trend(
        &self,
        id: &str,
        from_date: &str,
        to_date: &str,
        shift: Option<&str>,
    ) -> Result<Vec<OeeTrendPoint>, FetchError> {
        let mut query: Vec<(&str, String)> = vec![
            ("from_date", from_date.to_string()),
            ("to_date", to_date.to_string()),
        ];
        if let Some(shift) = shift {
            query.push(("shift", shift.to_string()));
        }
        self.get_json(&format!("/v1/machines/{id}/oee/trend"), &query)
            .await
    }

    /// GET /box/healthz - santé du box, indépendante de toute sélection.
    pub async fn box_health(&self) -> Result<BoxHealth, FetchError> {
        self.get_json("/box/healthz", &[]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base, path);
        let response = self
            .http
            .get(&url)
            .query(query)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genius_devkit::StubBox;

    fn conf(base_url: String) -> ApiConf {
        ApiConf {
            base_url,
            request_timeout_secs: Some(5),
        }
    }

    #[tokio::test]
    async fn test_status_fetch_decodes_contract() {
        let stub = StubBox::start().await.unwrap();
        stub.add_machine("CNC-01");
        stub.set_rpm("CNC-01", 1200.0);

        let api = ApiClient::new(&conf(stub.base_url())).unwrap();
        let status = api.machine_status("CNC-01").await.unwrap();
        assert_eq!(status.machine_id, "CNC-01");
        assert_eq!(status.rpm, 1200.0);
        assert_eq!(status.update_interval_ms, 1000);
    }

    #[tokio::test]
    async fn test_unknown_machine_maps_to_api_error() {
        let stub = StubBox::start().await.unwrap();

        let api = ApiClient::new(&conf(stub.base_url())).unwrap();
        let err = api.machine_status("NOPE").await.unwrap_err();
        assert!(err.is_http());
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_server_failure_maps_to_api_error() {
        let stub = StubBox::start().await.unwrap();
        stub.add_machine("CNC-01");
        stub.fail_status(true);

        let api = ApiClient::new(&conf(stub.base_url())).unwrap();
        let err = api.machine_status("CNC-01").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_unreachable_box_maps_to_transport_error() {
        // Port réservé, rien n'écoute.
        let api = ApiClient::new(&conf("http://127.0.0.1:9".to_string())).unwrap();
        let err = api.list_machines().await.unwrap_err();
        assert!(!err.is_http());
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_events_respect_limit_and_order() {
        let stub = StubBox::start().await.unwrap();
        stub.add_machine("CNC-01");
        stub.push_event("CNC-01", "READY", 0.0);
        stub.push_event("CNC-01", "EXECUTING", 900.0);
        stub.push_event("CNC-01", "STOPPED", 0.0);

        let api = ApiClient::new(&conf(stub.base_url())).unwrap();
        let events = api.machine_events("CNC-01", 2).await.unwrap();
        assert_eq!(events.len(), 2);
        // Plus récent d'abord
        assert_eq!(events[0].execution, "STOPPED");
        assert_eq!(events[1].execution, "EXECUTING");
    }

    #[tokio::test]
    async fn test_oee_fetch_is_normalized() {
        let stub = StubBox::start().await.unwrap();
        stub.add_machine("CNC-01");
        stub.set_oee("CNC-01", 120.0, 85.0, 99.0, 70.0);

        let api = ApiClient::new(&conf(stub.base_url())).unwrap();
        let oee = api.machine_oee("CNC-01", None, None).await.unwrap();
        assert_eq!(oee.availability, 100.0);
        assert_eq!(oee.performance, 85.0);
    }

    #[tokio::test]
    async fn test_box_health_fetch() {
        let stub = StubBox::start().await.unwrap();
        stub.add_machine("CNC-01");

        let api = ApiClient::new(&conf(stub.base_url())).unwrap();
        let health = api.box_health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.services.backend, "running");
    }
}
