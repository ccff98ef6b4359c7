use crate::server::domain::{NewUser, UserChanges, UserRegistry};
use std::sync::Arc;
use tonic::Status;
use usergate_core::{
    Error, Result,
    call::{CallObserver, CallSender},
    proto::{SyncUsersRequest, SyncUsersResponse},
    types::{SyncAction, SyncStatus, epoch_millis},
};

/// Server side of `SyncUsers`.
///
/// Every inbound request gets exactly one response, in request order. A failed
/// action answers `ERROR` for that request and the call carries on.
pub struct SyncCall {
    registry: Arc<dyn UserRegistry>,
    responder: CallSender<SyncUsersResponse>,
    processed: usize,
}

impl SyncCall {
    pub fn new(registry: Arc<dyn UserRegistry>, responder: CallSender<SyncUsersResponse>) -> Self {
        Self {
            registry,
            responder,
            processed: 0,
        }
    }

    fn apply(&self, action: &SyncAction, request: SyncUsersRequest) -> Result<String> {
        match action {
            SyncAction::Create => {
                let user = self.registry.create(NewUser::new(
                    request.email,
                    request.name,
                    request.phone_number,
                ))?;
                Ok(format!("User created: id={}", user.id))
            }
            SyncAction::Update => {
                let user = self.registry.update(
                    request.user_id,
                    UserChanges::new(request.name, request.phone_number),
                )?;
                Ok(format!("User updated: id={}", user.id))
            }
            SyncAction::Delete => {
                self.registry.delete(request.user_id)?;
                Ok(format!("User deleted: id={}", request.user_id))
            }
            SyncAction::Unrecognized(action) => Err(Error::InvalidRequest {
                reason: format!("Unknown action: {action}"),
            }),
        }
    }

    /// Fails the outbound direction with `error`, e.g. on server shutdown.
    pub async fn abort(&mut self, error: Error) {
        if let Err(e) = self.responder.fail(error.into()).await {
            tracing::debug!(error = %e, "Sync response stream already ended");
        }
    }

    /// Number of requests answered so far.
    pub const fn processed(&self) -> usize {
        self.processed
    }
}

#[tonic::async_trait]
impl CallObserver<SyncUsersRequest> for SyncCall {
    async fn on_message(&mut self, request: SyncUsersRequest) {
        let action = SyncAction::parse(&request.action);
        let (status, message) = match self.apply(&action, request) {
            Ok(message) => (SyncStatus::Success, message),
            Err(Error::InvalidRequest { reason }) => (SyncStatus::Error, reason),
            Err(e) => (SyncStatus::Error, e.to_string()),
        };
        self.processed += 1;
        tracing::debug!(action = action.as_str(), %status, processed = self.processed, "Sync request applied");

        let response = SyncUsersResponse {
            status: status.to_string(),
            message,
            timestamp: epoch_millis(),
        };

        if let Err(e) = self.responder.send(response).await {
            tracing::debug!(error = %e, processed = self.processed, "Dropping sync response");
        }
    }

    async fn on_error(&mut self, status: Status) {
        tracing::warn!(code = ?status.code(), processed = self.processed, "Sync aborted by client");
        if let Err(e) = self.responder.fail(status).await {
            tracing::debug!(error = %e, "Sync response stream already ended");
        }
    }

    async fn on_completed(&mut self) {
        tracing::debug!(processed = self.processed, "Sync completed");
        self.responder.half_close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::domain::memory::InMemoryUserRegistry;
    use futures::{StreamExt, stream};
    use tonic::Code;
    use usergate_core::call::{call_channel, drive};

    fn sync(action: &str, user_id: u64, email: &str, name: &str) -> SyncUsersRequest {
        SyncUsersRequest {
            action: action.to_string(),
            user_id,
            email: email.to_string(),
            name: name.to_string(),
            phone_number: String::new(),
        }
    }

    #[tokio::test]
    async fn answers_each_request_in_order() {
        let registry = Arc::new(InMemoryUserRegistry::default());
        let (tx, rx) = call_channel(16);
        let mut call = SyncCall::new(registry.clone(), tx);

        let inbound = stream::iter(vec![
            Ok(sync("create", 0, "a@example.com", "A")),
            Ok(sync("UPDATE", 1, "", "A2")),
            Ok(sync("Delete", 1, "", "")),
            Ok(sync("MERGE", 1, "", "")),
            Ok(sync("DELETE", 1, "", "")),
        ]);

        assert!(drive(inbound, &mut call).await.is_completed());
        assert_eq!(call.processed(), 5);
        drop(call);

        let responses: Vec<SyncUsersResponse> = rx.map(|r| r.unwrap()).collect().await;
        let summary: Vec<(&str, &str)> = responses
            .iter()
            .map(|r| (r.status.as_str(), r.message.as_str()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("SUCCESS", "User created: id=1"),
                ("SUCCESS", "User updated: id=1"),
                ("SUCCESS", "User deleted: id=1"),
                ("ERROR", "Unknown action: MERGE"),
                ("ERROR", "User not found: id=1"),
            ]
        );
        assert!(responses.iter().all(|r| r.timestamp > 0));
        assert!(registry.get_by_id(1).is_err());
    }

    #[tokio::test]
    async fn inbound_error_fails_outbound_direction() {
        let registry = Arc::new(InMemoryUserRegistry::default());
        let (tx, rx) = call_channel(4);
        let mut call = SyncCall::new(registry, tx);

        let inbound = stream::iter(vec![
            Ok(sync("CREATE", 0, "a@example.com", "A")),
            Err(Status::aborted("client reset")),
        ]);

        drive(inbound, &mut call).await;
        drop(call);

        let items: Vec<_> = rx.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        let code = items[1].as_ref().err().map(|s| s.code());
        assert_eq!(code, Some(Code::Aborted));
    }

    #[tokio::test]
    async fn abort_ends_with_unavailable() {
        let registry = Arc::new(InMemoryUserRegistry::default());
        let (tx, mut rx) = call_channel(1);
        let mut call = SyncCall::new(registry, tx);

        call.abort(Error::ServiceShutdown).await;

        let code = rx.next().await.and_then(|r| r.err()).map(|s| s.code());
        assert_eq!(code, Some(Code::Unavailable));
    }
}
