use crate::server::{
    domain::{NewUser, UserRegistry},
    telemetry::increment_batch_item_failures,
};
use std::sync::Arc;
use tonic::Status;
use usergate_core::{
    call::CallObserver,
    proto::{BatchCreateUsersResponse, CreateUserRequest},
    types::UserId,
};

/// Per-call tally of a batch create.
#[derive(Debug, Default)]
struct Accumulator {
    created_ids: Vec<UserId>,
    failed: u32,
}

impl Accumulator {
    fn summarize(self) -> BatchCreateUsersResponse {
        BatchCreateUsersResponse {
            created_count: self.created_ids.len() as u32,
            user_ids: self.created_ids,
            failed_count: self.failed,
        }
    }
}

/// Server side of `BatchCreateUsers`.
///
/// Each inbound request is created independently and failures never end the
/// call. The summary exists only once the client half-closes; an inbound
/// error throws the tally away.
pub struct BatchCreateCall {
    registry: Arc<dyn UserRegistry>,
    accumulator: Option<Accumulator>,
    summary: Option<BatchCreateUsersResponse>,
}

impl BatchCreateCall {
    pub fn new(registry: Arc<dyn UserRegistry>) -> Self {
        Self {
            registry,
            accumulator: Some(Accumulator::default()),
            summary: None,
        }
    }

    /// The summary, if the inbound direction completed.
    pub fn into_summary(self) -> Option<BatchCreateUsersResponse> {
        self.summary
    }
}

#[tonic::async_trait]
impl CallObserver<CreateUserRequest> for BatchCreateCall {
    async fn on_message(&mut self, request: CreateUserRequest) {
        let Some(acc) = self.accumulator.as_mut() else {
            return;
        };

        match self.registry.create(NewUser::from(request)) {
            Ok(user) => acc.created_ids.push(user.id),
            Err(e) => {
                tracing::warn!(error = %e, "Batch item rejected");
                increment_batch_item_failures();
                acc.failed += 1;
            }
        }
    }

    async fn on_error(&mut self, status: Status) {
        if let Some(acc) = self.accumulator.take() {
            tracing::warn!(
                code = ?status.code(),
                created = acc.created_ids.len(),
                "Batch aborted by client, discarding summary"
            );
        }
    }

    async fn on_completed(&mut self) {
        if let Some(acc) = self.accumulator.take() {
            self.summary = Some(acc.summarize());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::domain::memory::InMemoryUserRegistry;
    use futures::stream;
    use usergate_core::call::drive;

    fn request(email: &str, name: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            name: name.to_string(),
            phone_number: String::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_in_the_middle_is_counted_not_fatal() {
        let registry = Arc::new(InMemoryUserRegistry::default());
        let existing = registry.create(NewUser::new("a@example.com", "A", "")).unwrap();

        let mut call = BatchCreateCall::new(registry.clone());
        let inbound = stream::iter(vec![
            Ok(request("b@example.com", "B")),
            Ok(request("a@example.com", "A again")),
            Ok(request("c@example.com", "C")),
        ]);

        assert!(drive(inbound, &mut call).await.is_completed());

        let summary = call.into_summary().unwrap();
        assert_eq!(summary.created_count, 2);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.user_ids.len(), 2);
        assert!(!summary.user_ids.contains(&existing.id));

        let b = registry.get_by_id(summary.user_ids[0]).unwrap();
        let c = registry.get_by_id(summary.user_ids[1]).unwrap();
        assert_eq!(b.email, "b@example.com");
        assert_eq!(c.email, "c@example.com");
    }

    #[tokio::test]
    async fn empty_batch_summarizes_to_zero() {
        let registry = Arc::new(InMemoryUserRegistry::default());
        let mut call = BatchCreateCall::new(registry);

        let inbound = stream::iter(Vec::<core::result::Result<CreateUserRequest, Status>>::new());
        drive(inbound, &mut call).await;

        let summary = call.into_summary().unwrap();
        assert_eq!(summary.created_count, 0);
        assert!(summary.user_ids.is_empty());
        assert_eq!(summary.failed_count, 0);
    }

    #[tokio::test]
    async fn inbound_error_discards_summary() {
        let registry = Arc::new(InMemoryUserRegistry::default());
        let mut call = BatchCreateCall::new(registry.clone());
        let inbound = stream::iter(vec![
            Ok(request("x@example.com", "X")),
            Err(Status::cancelled("client went away")),
        ]);

        assert!(!drive(inbound, &mut call).await.is_completed());
        assert!(call.into_summary().is_none());
        // Items processed before the error stay created.
        assert_eq!(registry.list_all().len(), 1);
    }
}
