use linkup_core::ipc::{LinkupRequest, LinkupResponse};
use linkup_core::{ConnectionEdge, DomainError, Network};
use serde::Serialize;

/// Turn a domain result into a wire response, logging store faults.
fn respond<T: Serialize>(result: Result<T, DomainError>) -> LinkupResponse {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(data) => LinkupResponse::ok(data),
            Err(e) => LinkupResponse::err(format!("Serialization error: {}", e)),
        },
        Err(e) => {
            if let DomainError::StoreUnavailable(_) = e {
                tracing::error!(error = %e, "Store fault while handling request");
            }
            LinkupResponse::domain_err(&e)
        }
    }
}

fn pending_summary(edges: Vec<ConnectionEdge>) -> serde_json::Value {
    let items: Vec<serde_json::Value> = edges
        .into_iter()
        .map(|e| {
            serde_json::json!({
                "edge_id": e.id,
                "requester": e.requester,
                "created_at": e.created_at,
            })
        })
        .collect();
    serde_json::json!({ "count": items.len(), "pending": items })
}

pub async fn handle_request(request: LinkupRequest, network: &Network) -> LinkupResponse {
    match request {
        LinkupRequest::Ping => LinkupResponse::pong(),
        LinkupRequest::Health => {
            let mut body = serde_json::json!({
                "status": "healthy",
                "backend": network.backend_name(),
            });
            if let Some(pool) = network.pool() {
                match linkup_core::db::health_check(pool).await {
                    Ok(v) => body["postgresql"] = serde_json::json!(v),
                    Err(e) => return LinkupResponse::err(format!("DB Health Check failed: {}", e)),
                }
            }
            LinkupResponse::ok(body)
        }
        LinkupRequest::RequestConnection { requester, target } => respond(
            network
                .request_connection(&requester, &target)
                .await
                .map(|edge_id| serde_json::json!({ "edge_id": edge_id })),
        ),
        LinkupRequest::RespondConnection {
            edge_id,
            actor,
            decision,
        } => respond(network.respond_connection(edge_id, &actor, decision).await),
        LinkupRequest::GetConnection { edge_id } => {
            respond(network.get_connection(edge_id).await)
        }
        LinkupRequest::ListConnections { member_id } => respond(
            network
                .list_connections(&member_id)
                .await
                .map(|friends| serde_json::json!({ "count": friends.len(), "connections": friends })),
        ),
        LinkupRequest::ListPendingIncoming { member_id } => respond(
            network
                .list_pending_incoming(&member_id)
                .await
                .map(pending_summary),
        ),
        LinkupRequest::CheckEligibility { requester, target } => respond(
            network
                .check_eligibility(&requester, &target)
                .await
                .map(|eligible| serde_json::json!({ "eligible": eligible })),
        ),
        LinkupRequest::SendMessage {
            sender,
            receiver,
            body,
        } => respond(
            network
                .send_message(&sender, &receiver, &body)
                .await
                .map(|message_id| serde_json::json!({ "message_id": message_id })),
        ),
        LinkupRequest::ListInbox {
            receiver,
            include_deleted,
        } => respond(
            network
                .list_inbox(&receiver, include_deleted)
                .await
                .map(|messages| serde_json::json!({ "count": messages.len(), "messages": messages })),
        ),
        LinkupRequest::DeleteMessage { message_id, actor } => respond(
            network
                .delete_message(message_id, &actor)
                .await
                .map(|()| serde_json::json!({ "deleted": true, "message_id": message_id })),
        ),
    }
}
