/*!
Mock Publisher pour développement sans broker

Remplace les transports MQTT/REST dans les tests. Enregistre toutes les
publications et permet de simuler des pannes de transport.
*/

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use presence_reporter::{Publisher, PublishError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub value: String,
    pub destination: String,
    pub published_at: DateTime<Utc>,
}

/// Publisher qui enregistre au lieu d'envoyer
#[derive(Clone, Default)]
pub struct MockPublisher {
    published_messages: Arc<Mutex<Vec<PublishedMessage>>>,
    failing: Arc<AtomicBool>,
    disconnected: Arc<AtomicBool>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Les publications suivantes échouent tant que `failing` est vrai
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Récupère tous les messages publiés (pour assertions de tests)
    pub fn get_published_messages(&self) -> Vec<PublishedMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    /// Trouve les messages publiés vers une destination donnée
    pub fn find_messages_by_destination(&self, destination: &str) -> Vec<PublishedMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.destination == destination)
            .cloned()
            .collect()
    }

    /// Valeurs publiées vers une destination, dans l'ordre
    pub fn values_for(&self, destination: &str) -> Vec<String> {
        self.find_messages_by_destination(destination)
            .into_iter()
            .map(|msg| msg.value)
            .collect()
    }

    pub fn count_for(&self, destination: &str) -> usize {
        self.find_messages_by_destination(destination).len()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Reset tous les messages enregistrés
    pub fn clear(&self) {
        self.published_messages.lock().unwrap().clear();
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, value: &str, destination: &str) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) || self.is_disconnected() {
            log::info!("📤 [MOCK] Refused {} -> {}", value, destination);
            return Err(PublishError::Disconnected);
        }

        self.published_messages.lock().unwrap().push(PublishedMessage {
            value: value.to_string(),
            destination: destination.to_string(),
            published_at: Utc::now(),
        });
        log::info!("📤 [MOCK] Published {} to {}", value, destination);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PublishError> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
