use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, LinkupError};
use crate::models::Decision;

pub const PROTOCOL_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LinkupRequest {
    Ping,
    Health,
    RequestConnection {
        requester: String,
        target: String,
    },
    RespondConnection {
        edge_id: Uuid,
        actor: String,
        decision: Decision,
    },
    GetConnection {
        edge_id: Uuid,
    },
    ListConnections {
        member_id: String,
    },
    ListPendingIncoming {
        member_id: String,
    },
    CheckEligibility {
        requester: String,
        target: String,
    },
    SendMessage {
        sender: String,
        receiver: String,
        body: String,
    },
    ListInbox {
        receiver: String,
        #[serde(default)]
        include_deleted: bool,
    },
    DeleteMessage {
        message_id: Uuid,
        actor: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LinkupResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Stable error kind (`DomainError::code`) when `status == "error"`.
    #[serde(default)]
    pub code: Option<String>,
    pub version: String,
}

impl LinkupResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            code: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            code: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn domain_err(e: &DomainError) -> Self {
        Self {
            code: Some(e.code().to_string()),
            ..Self::err(e.to_string())
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// MessagePack encoding used inside each length-delimited frame.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LinkupError> {
    rmp_serde::to_vec_named(value).map_err(|e| LinkupError::Ipc(e.to_string()))
}

pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, LinkupError> {
    rmp_serde::from_slice(bytes).map_err(|e| LinkupError::Ipc(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_tagged_by_action() {
        let req = LinkupRequest::RespondConnection {
            edge_id: Uuid::nil(),
            actor: "bob".to_string(),
            decision: Decision::Accept,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["action"], "respond_connection");
        assert_eq!(json["decision"], "accept");
    }

    #[test]
    fn test_include_deleted_defaults_to_false() {
        let req: LinkupRequest =
            serde_json::from_value(serde_json::json!({"action": "list_inbox", "receiver": "bob"}))
                .unwrap();
        assert!(matches!(
            req,
            LinkupRequest::ListInbox {
                include_deleted: false,
                ..
            }
        ));
    }

    #[test]
    fn test_msgpack_frame_decodes() {
        let bytes = encode(&LinkupRequest::SendMessage {
            sender: "alice".into(),
            receiver: "bob".into(),
            body: "hi".into(),
        })
        .unwrap();
        let back: LinkupRequest = decode(&bytes).unwrap();
        assert!(matches!(back, LinkupRequest::SendMessage { body, .. } if body == "hi"));
    }

    #[test]
    fn test_domain_error_carries_code() {
        let resp = LinkupResponse::domain_err(&DomainError::EmptyBody);
        assert!(!resp.is_ok());
        assert_eq!(resp.code.as_deref(), Some("empty_body"));
        assert!(resp.error.unwrap().contains("empty"));
    }
}
