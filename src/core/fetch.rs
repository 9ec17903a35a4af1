use crate::core::context::Context;
use crate::domain::model::ListItem;
use crate::utils::error::{Result, StorageError};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Maximum number of object bodies fetched at once.
pub const MAX_IN_FLIGHT_FETCHES: usize = 50;

pub fn fetch_semaphore() -> Arc<Semaphore> {
    Arc::new(Semaphore::new(MAX_IN_FLIGHT_FETCHES))
}

#[derive(Debug)]
pub struct FetchOutcome<T> {
    /// Slot `i` belongs to input key `i`. `None` only for keys never
    /// dispatched because the context ended first.
    pub slots: Vec<Option<ListItem<T>>>,
    pub cancelled: Option<StorageError>,
}

impl<T> FetchOutcome<T> {
    pub fn failed_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Some(item) if item.is_failed()))
            .count()
    }

    pub fn into_result(self) -> Result<Vec<ListItem<T>>> {
        if let Some(err) = self.cancelled {
            return Err(err);
        }
        Ok(self.slots.into_iter().flatten().collect())
    }
}

/// Fetches every key concurrently, one spawned task per key, with at most
/// `semaphore`'s permits in flight. Individual failures land in their slot as
/// [`ListItem::Failed`]; only the context ending aborts the fan-out.
pub async fn fetch_bounded<T, F, Fut>(
    ctx: &Context,
    semaphore: Arc<Semaphore>,
    keys: Vec<String>,
    fetch: F,
) -> FetchOutcome<T>
where
    T: Send + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let mut slots: Vec<Option<ListItem<T>>> = Vec::with_capacity(keys.len());
    slots.resize_with(keys.len(), || None);

    let mut tasks = JoinSet::new();
    let mut cancelled = None;

    for (idx, key) in keys.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            err = ctx.done() => {
                cancelled = Some(err);
                break;
            }
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    cancelled = Some(StorageError::internal("fetch semaphore closed"));
                    break;
                }
            },
        };

        let fut = fetch(key.clone());
        tasks.spawn(async move {
            let result = fut.await;
            drop(permit);
            (idx, key, result)
        });
    }

    if cancelled.is_none() {
        loop {
            let joined = tokio::select! {
                biased;
                err = ctx.done() => {
                    cancelled = Some(err);
                    break;
                }
                joined = tasks.join_next() => match joined {
                    Some(joined) => joined,
                    None => break,
                },
            };
            match joined {
                Ok((idx, key, result)) => slots[idx] = Some(into_item(key, result)),
                Err(err) => tracing::warn!("fetch task failed to complete: {}", err),
            }
        }
    }

    if cancelled.is_some() {
        // 收集已完成的結果，其餘任務隨 JoinSet 一同中止
        while let Some(joined) = tasks.try_join_next() {
            if let Ok((idx, key, result)) = joined {
                slots[idx] = Some(into_item(key, result));
            }
        }
        tasks.abort_all();
    }

    FetchOutcome { slots, cancelled }
}

fn into_item<T>(key: String, result: Result<T>) -> ListItem<T> {
    match result {
        Ok(obj) => ListItem::Object(obj),
        Err(error) => {
            tracing::debug!("fetch of {} failed: {}", key, error);
            ListItem::Failed { key, error }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_order_is_preserved() {
        let keys: Vec<String> = (0..20).map(|i| format!("k{}", i)).collect();
        let outcome = fetch_bounded(&Context::new(), fetch_semaphore(), keys, |key| async move {
            let n: u64 = key[1..].parse().unwrap_or(0);
            // later keys finish first
            tokio::time::sleep(Duration::from_millis(40 - 2 * n)).await;
            Ok(key)
        })
        .await;

        let items = outcome.into_result().unwrap();
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.object().map(String::as_str), Some(format!("k{}", i).as_str()));
        }
    }

    #[tokio::test]
    async fn test_in_flight_ceiling() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let keys: Vec<String> = (0..200).map(|i| i.to_string()).collect();

        let outcome = fetch_bounded(&Context::new(), fetch_semaphore(), keys, |key| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(key)
            }
        })
        .await;

        assert_eq!(outcome.into_result().unwrap().len(), 200);
        assert!(peak.load(Ordering::SeqCst) <= MAX_IN_FLIGHT_FETCHES);
        assert!(peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_failures_stay_in_their_slot() {
        let keys: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        let outcome = fetch_bounded(&Context::new(), fetch_semaphore(), keys, |key| async move {
            if key == "3" || key == "7" {
                Err(StorageError::not_found(key, 0))
            } else {
                Ok(key)
            }
        })
        .await;

        assert_eq!(outcome.failed_count(), 2);
        let items = outcome.into_result().unwrap();
        assert_eq!(items.len(), 10);
        assert!(items[3].is_failed());
        assert_eq!(items[7].key(), Some("7"));
        assert_eq!(items[4].object().map(String::as_str), Some("4"));
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_permit() {
        let ctx = Context::new();
        let semaphore = Arc::new(Semaphore::new(2));
        let keys: Vec<String> = (0..10).map(|i| i.to_string()).collect();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome = fetch_bounded(&ctx, semaphore, keys, |key| async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(key)
        })
        .await;

        assert!(outcome.cancelled.as_ref().is_some_and(|e| e.is_cancelled()));
        assert_eq!(outcome.slots.len(), 10);
        assert!(outcome.slots[5].is_none());
        assert!(outcome.into_result().unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_after_every_fetch_is_dispatched() {
        let ctx = Context::new();
        let keys: Vec<String> = ["fast", "slow-1", "slow-2"].map(String::from).to_vec();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let outcome = fetch_bounded(&ctx, fetch_semaphore(), keys, |key| async move {
            if key != "fast" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(key)
        })
        .await;

        assert!(outcome.cancelled.as_ref().is_some_and(|e| e.is_cancelled()));
        assert_eq!(
            outcome.slots[0].as_ref().and_then(ListItem::object).map(String::as_str),
            Some("fast")
        );
        assert!(outcome.slots[1].is_none());
        assert!(outcome.into_result().unwrap_err().is_cancelled());
    }
}
