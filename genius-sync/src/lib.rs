/*!
GENIUS SYNC - Couche de synchronisation côté client pour le box télémétrie

Décide QUAND fetcher, sur QUELS endpoints, comment réconcilier les réponses
périmées, comment cacher les métriques dérivées et comment classifier la
santé de connexion à partir des timestamps.

La présentation (dashboard terminal, export, chrome) consomme uniquement les
snapshots du store - elle n'appelle jamais les fetchers directement.
*/

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod poll;
pub mod staleness;
pub mod store;

pub use api::ApiClient;
pub use cache::TtlCache;
pub use config::{load_config, ApiConf, DashConfig};
pub use error::{ErrorInfo, FetchError};
pub use staleness::{classify, Connection};
pub use store::{MachineStore, SyncState};
