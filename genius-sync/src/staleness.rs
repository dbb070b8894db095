//! Classification de santé de connexion, fonction pure de l'horloge.
//!
//! À réévaluer en continu côté consommateur (au moins à la cadence du
//! polling status, 1 s) : un panneau monté doit dégrader de connected vers
//! unstable par simple avancement de l'horloge, même sans nouveau status.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Au-delà de N intervalles nominaux sans status, la connexion est instable.
/// Constante de politique héritée du comportement observé, pas dérivée.
pub const STALE_INTERVAL_FACTOR: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    Disconnected,
    Unstable,
    Connected,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connection::Disconnected => write!(f, "disconnected"),
            Connection::Unstable => write!(f, "unstable"),
            Connection::Connected => write!(f, "connected"),
        }
    }
}

/// `last_update` est le `timestamp_utc` du dernier status reçu pour la
/// sélection courante, `None` si aucun n'a jamais été reçu.
/// `update_interval_ms` vient du serveur, jamais supposé côté client.
/// La frontière `age == 3 * interval` est classée connected.
pub fn classify(
    now: DateTime<Utc>,
    last_update: Option<DateTime<Utc>>,
    update_interval_ms: u64,
) -> Connection {
    let Some(last_update) = last_update else {
        return Connection::Disconnected;
    };
    let age_ms = (now - last_update).num_milliseconds();
    if age_ms > STALE_INTERVAL_FACTOR * update_interval_ms as i64 {
        Connection::Unstable
    } else {
        Connection::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const INTERVAL_MS: u64 = 1000;

    #[test]
    fn test_no_status_is_disconnected() {
        assert_eq!(
            classify(Utc::now(), None, INTERVAL_MS),
            Connection::Disconnected
        );
    }

    #[test]
    fn test_fresh_status_is_connected() {
        let now = Utc::now();
        assert_eq!(classify(now, Some(now), INTERVAL_MS), Connection::Connected);
    }

    #[test]
    fn test_boundary_is_connected() {
        let now = Utc::now();
        let last = now - Duration::milliseconds(3 * INTERVAL_MS as i64);
        assert_eq!(classify(now, Some(last), INTERVAL_MS), Connection::Connected);
    }

    #[test]
    fn test_one_ms_past_boundary_is_unstable() {
        let now = Utc::now();
        let last = now - Duration::milliseconds(3 * INTERVAL_MS as i64 + 1);
        assert_eq!(classify(now, Some(last), INTERVAL_MS), Connection::Unstable);
    }

    #[test]
    fn test_one_ms_before_boundary_is_connected() {
        let now = Utc::now();
        let last = now - Duration::milliseconds(3 * INTERVAL_MS as i64 - 1);
        assert_eq!(classify(now, Some(last), INTERVAL_MS), Connection::Connected);
    }

    #[test]
    fn test_respects_server_declared_interval() {
        let now = Utc::now();
        let last = now - Duration::milliseconds(4_000);
        // 4s d'âge: instable à 1s d'intervalle, connecté à 10s
        assert_eq!(classify(now, Some(last), 1_000), Connection::Unstable);
        assert_eq!(classify(now, Some(last), 10_000), Connection::Connected);
    }
}
