/*!
# Genius DevKit - Stubs pour développement sans box télémétrie

Bibliothèque facilitant le développement de la couche de synchronisation
avec:
- Box télémétrie stub en mémoire (axum, port éphémère)
- Machines scriptées : rpm, âge de timestamp, latence, alarmes, événements
- Injection de pannes par endpoint et compteurs de requêtes pour assertions
*/

pub mod payloads;
pub mod stub_box;

pub use stub_box::{StubBox, StubMachine};
