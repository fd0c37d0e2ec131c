use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use shortbin_core::{ShortId, StorageError, UrlRecord};
use tokio::sync::OnceCell;
use tracing::trace;

type Lookup = std::result::Result<Option<UrlRecord>, StorageError>;

/// Coalesces concurrent storage lookups for the same short id.
///
/// The first caller runs the lookup; callers arriving while it is in flight
/// wait for and share its result, errors included. The slot is dropped once
/// the lookup completes, so nothing is cached here. If the leading caller is
/// cancelled, a waiter takes over the lookup; if every caller is cancelled,
/// the last one out removes the slot.
#[derive(Debug, Default)]
pub(crate) struct InflightLookups {
    slots: DashMap<ShortId, Arc<OnceCell<Lookup>>>,
}

impl InflightLookups {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn run<F, Fut>(&self, id: &ShortId, lookup: F) -> Lookup
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Lookup>,
    {
        let slot = self
            .slots
            .entry(id.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let mut guard = SlotGuard {
            slots: &self.slots,
            id,
            slot,
            completed: false,
        };

        let result = guard
            .slot
            .get_or_init(|| async move {
                trace!(short_id = %id, "Leading storage lookup");
                lookup().await
            })
            .await
            .clone();

        guard.completed = true;
        result
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Releases a caller's hold on a slot, whether it finished or was dropped.
struct SlotGuard<'a> {
    slots: &'a DashMap<ShortId, Arc<OnceCell<Lookup>>>,
    id: &'a ShortId,
    slot: Arc<OnceCell<Lookup>>,
    completed: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        // remove_if holds the shard lock, so no caller can pick up the slot
        // while its reference count is read.
        let completed = self.completed;
        self.slots.remove_if(self.id, |_, current| {
            Arc::ptr_eq(current, &self.slot) && (completed || Arc::strong_count(current) <= 2)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_lookup() {
        let inflight = Arc::new(InflightLookups::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let id = ShortId::new_unchecked("abc123");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let inflight = Arc::clone(&inflight);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                inflight
                    .run(&id, || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(None)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(inflight.len(), 0);
    }

    #[tokio::test]
    async fn sequential_callers_each_look_up() {
        let inflight = InflightLookups::new();
        let calls = AtomicUsize::new(0);
        let id = ShortId::new_unchecked("abc123");

        for _ in 0..3 {
            inflight
                .run(&id, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancelled_callers_leave_no_slots() {
        let inflight = InflightLookups::new();

        for n in 0..100 {
            let id = ShortId::new_unchecked(format!("id{n:04}"));
            let outcome = tokio::time::timeout(
                Duration::from_millis(1),
                inflight.run(&id, || async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(None)
                }),
            )
            .await;
            assert!(outcome.is_err());
        }

        assert_eq!(inflight.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn waiter_finishes_lookup_after_leader_is_cancelled() {
        let inflight = Arc::new(InflightLookups::new());
        let id = ShortId::new_unchecked("abc123");

        let leader = {
            let inflight = Arc::clone(&inflight);
            let id = id.clone();
            tokio::spawn(async move {
                inflight
                    .run(&id, || async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(None)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let waiter = {
            let inflight = Arc::clone(&inflight);
            let id = id.clone();
            tokio::spawn(async move {
                inflight
                    .run(&id, || async {
                        Err(StorageError::Unavailable("waiter ran".to_string()))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(inflight.len(), 1);

        leader.abort();
        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert_eq!(inflight.len(), 0);
    }

    #[tokio::test]
    async fn errors_are_not_retained() {
        let inflight = InflightLookups::new();
        let id = ShortId::new_unchecked("abc123");

        let err = inflight
            .run(&id, || async {
                Err(StorageError::Unavailable("down".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));

        let ok = inflight.run(&id, || async { Ok(None) }).await;
        assert!(ok.is_ok());
    }
}
