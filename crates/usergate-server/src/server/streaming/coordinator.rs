use crate::server::{config::ServerConfig, domain::UserRegistry};
use core::{ops::Range, time::Duration};
use tokio_util::sync::CancellationToken;
use usergate_core::{Error, Result, call::CallSender, proto::UserResponse};

/// A validated `GetUsers` page window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    /// Resolves the requested page against the configured limits. A `size` of
    /// zero selects the default page size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `size` exceeds the maximum page
    /// size.
    pub fn resolve(page: u32, size: u32, config: &ServerConfig) -> Result<Self> {
        let size = if size == 0 {
            config.default_page_size
        } else {
            size
        };

        if size > config.max_page_size {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "Page size {} exceeds maximum allowed ({})",
                    size, config.max_page_size
                ),
            });
        }

        Ok(Self { page, size })
    }

    /// Index range of this page within a listing of `total` records. Empty
    /// once the page starts at or past the end.
    pub fn window(&self, total: usize) -> Range<usize> {
        let size = self.size as usize;
        let start = (self.page as usize).saturating_mul(size);
        if start >= total {
            return total..total;
        }
        start..start.saturating_add(size).min(total)
    }
}

enum Pause {
    Elapsed,
    PeerGone,
    Shutdown,
}

async fn pause(
    pacing: Duration,
    responder: &CallSender<UserResponse>,
    shutdown: &CancellationToken,
) -> Pause {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => Pause::Shutdown,
        () = responder.cancelled() => Pause::PeerGone,
        () = tokio::time::sleep(pacing) => Pause::Elapsed,
    }
}

/// Streams one page of users to the caller.
///
/// Records are listed once up front, so the page reflects the registry at
/// call start. One message is sent per record in the window, in registry
/// order, with `pacing` slept between consecutive sends. The direction is
/// half-closed after the last record.
///
/// A consumer that goes away ends the feed quietly within one emission step.
/// Shutdown fails the call with [`Error::ServiceShutdown`].
///
/// Returns the number of records sent.
pub async fn feed_users(
    registry: &dyn UserRegistry,
    page: PageRequest,
    mut responder: CallSender<UserResponse>,
    pacing: Duration,
    shutdown: CancellationToken,
) -> Result<usize> {
    let users = registry.list_all();
    let window = page.window(users.len());
    tracing::debug!(
        page = page.page,
        size = page.size,
        total = users.len(),
        ?window,
        "Serving user page"
    );

    for (i, user) in users[window].iter().enumerate() {
        if i > 0 && !pacing.is_zero() {
            match pause(pacing, &responder, &shutdown).await {
                Pause::Elapsed => {}
                Pause::PeerGone => {
                    tracing::debug!(sent = responder.sent(), "Consumer went away mid-page");
                    return Ok(responder.sent());
                }
                Pause::Shutdown => {
                    let _ = responder.fail(Error::ServiceShutdown.into()).await;
                    return Err(Error::ServiceShutdown);
                }
            }
        }

        if shutdown.is_cancelled() {
            let _ = responder.fail(Error::ServiceShutdown.into()).await;
            return Err(Error::ServiceShutdown);
        }

        if responder.is_closed() {
            tracing::debug!(sent = responder.sent(), "Consumer went away mid-page");
            return Ok(responder.sent());
        }

        match responder.send(UserResponse::from(user)).await {
            Ok(()) => {}
            Err(Error::RequestCancelled) => {
                tracing::debug!(sent = responder.sent(), "Consumer went away mid-page");
                return Ok(responder.sent());
            }
            Err(e) => return Err(e),
        }
    }

    responder.half_close();
    Ok(responder.sent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::domain::{NewUser, memory::InMemoryUserRegistry};
    use futures::StreamExt;
    use tonic::Code;
    use usergate_core::call::call_channel;

    fn registry_with(n: usize) -> InMemoryUserRegistry {
        let registry = InMemoryUserRegistry::default();
        for i in 0..n {
            registry
                .create(NewUser::new(format!("u{i}@example.com"), format!("User {i}"), ""))
                .unwrap();
        }
        registry
    }

    #[test]
    fn zero_size_selects_default() {
        let config = ServerConfig::default();
        let page = PageRequest::resolve(2, 0, &config).unwrap();
        assert_eq!(page, PageRequest { page: 2, size: 10 });
    }

    #[test]
    fn oversized_page_is_invalid() {
        let config = ServerConfig::default();
        let err = PageRequest::resolve(0, 1_001, &config).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }

    #[test]
    fn window_clamps_to_total() {
        let page = PageRequest { page: 1, size: 10 };
        assert_eq!(page.window(25), 10..20);
        assert_eq!(PageRequest { page: 2, size: 10 }.window(25), 20..25);
        assert!(PageRequest { page: 3, size: 10 }.window(25).is_empty());
        assert!(PageRequest { page: 0, size: 10 }.window(0).is_empty());
        assert!(
            PageRequest {
                page: u32::MAX,
                size: u32::MAX
            }
            .window(5)
            .is_empty()
        );
    }

    #[tokio::test]
    async fn feeds_page_in_registry_order_then_completes() {
        let registry = registry_with(5);
        let (tx, rx) = call_channel(2);
        let page = PageRequest { page: 1, size: 2 };

        let feed = tokio::spawn(async move {
            feed_users(&registry, page, tx, Duration::ZERO, CancellationToken::new()).await
        });

        let ids: Vec<u64> = rx.map(|item| item.unwrap().id).collect().await;
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(feed.await.unwrap(), Ok(2));
    }

    #[tokio::test]
    async fn page_past_end_completes_with_no_messages() {
        let registry = registry_with(3);
        let (tx, rx) = call_channel(2);
        let page = PageRequest { page: 5, size: 10 };

        let sent = feed_users(&registry, page, tx, Duration::ZERO, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sent, 0);
        assert_eq!(rx.count().await, 0);
    }

    #[tokio::test]
    async fn consumer_drop_stops_quietly() {
        let registry = registry_with(10);
        let (tx, mut rx) = call_channel(1);
        let page = PageRequest { page: 0, size: 10 };

        let feed = tokio::spawn(async move {
            feed_users(
                &registry,
                page,
                tx,
                Duration::from_millis(20),
                CancellationToken::new(),
            )
            .await
        });

        assert_eq!(rx.next().await.map(|r| r.unwrap().id), Some(1));
        drop(rx);

        let sent = tokio::time::timeout(Duration::from_secs(2), feed)
            .await
            .expect("feed did not stop")
            .unwrap()
            .unwrap();
        assert!(sent < 10);
    }

    #[tokio::test]
    async fn shutdown_fails_the_stream() {
        let registry = registry_with(10);
        let (tx, rx) = call_channel(16);
        let page = PageRequest { page: 0, size: 10 };
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let feed = tokio::spawn(async move {
            feed_users(&registry, page, tx, Duration::from_millis(50), token).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.cancel();

        assert_eq!(feed.await.unwrap(), Err(Error::ServiceShutdown));
        let items: Vec<_> = rx.collect().await;
        let last = items.last().and_then(|r| r.as_ref().err()).map(|s| s.code());
        assert_eq!(last, Some(Code::Unavailable));
    }
}
