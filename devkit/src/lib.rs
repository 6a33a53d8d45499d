/*!
# Presence DevKit - Stubs et Utilitaires pour Développement

Bibliothèque facilitant le test du presence-reporter avec:
- Publisher enregistreur pour tests sans broker ni serveur REST
- Probes scriptées et scanner ARP simulé
- Tables de routage synthétiques
- Harness pour construire des capteurs et attendre leurs publications
*/

pub mod mock_publisher;
pub mod fixtures;
pub mod test_utils;

pub use mock_publisher::{MockPublisher, PublishedMessage};
pub use fixtures::{FakeArpScanner, ScriptedProbe, StaticRoutes};
pub use test_utils::TestHarness;
