use std::sync::Arc;

use crate::error::DomainError;
use crate::models::{Message, MessageId};
use crate::store::MessageStore;

/// Member-to-member mail with receiver-scoped soft deletion.
///
/// Sending is not restricted to connections.
#[derive(Clone)]
pub struct Mailbox {
    store: Arc<dyn MessageStore>,
}

impl Mailbox {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    pub async fn send(
        &self,
        sender: &str,
        receiver: &str,
        body: &str,
    ) -> Result<MessageId, DomainError> {
        if body.trim().is_empty() {
            return Err(DomainError::EmptyBody);
        }

        let message = Message::new(sender, receiver, body);
        self.store.insert(&message).await?;
        tracing::info!(sender, receiver, message_id = %message.id, "Message sent");
        Ok(message.id)
    }

    pub async fn list_inbox(
        &self,
        receiver: &str,
        include_deleted: bool,
    ) -> Result<Vec<Message>, DomainError> {
        self.store.list_for_receiver(receiver, include_deleted).await
    }

    /// Hide a message from its receiver's default inbox. Idempotent.
    pub async fn soft_delete(&self, message_id: MessageId, actor: &str) -> Result<(), DomainError> {
        let message = self
            .store
            .get(message_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("message {}", message_id)))?;

        if message.receiver != actor {
            return Err(DomainError::Unauthorized(format!(
                "only {} may delete message {}",
                message.receiver, message_id
            )));
        }
        if message.deleted {
            return Ok(());
        }

        self.store.mark_deleted(message_id).await?;
        tracing::info!(message_id = %message_id, receiver = actor, "Message deleted");
        Ok(())
    }
}
