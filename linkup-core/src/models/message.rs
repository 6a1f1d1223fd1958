use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MessageId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: MessageId,
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub deleted: bool,
}

impl Message {
    pub fn new(sender: &str, receiver: &str, body: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
            deleted: false,
        }
    }
}
