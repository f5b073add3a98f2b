//! Bounded concurrency pool.

use super::ExecutionUnit;
use crate::{Error, Result};
use std::collections::HashMap;
use tokio::task::JoinSet;

/// Run `units` with at most `concurrency` in flight at once.
///
/// Units are started in order. A failing unit does not cancel the others;
/// every result is returned, in completion order, tagged with its unit key.
pub async fn run_bounded<T>(
    units: Vec<ExecutionUnit<T>>,
    concurrency: usize,
) -> Vec<(String, Result<T>)>
where
    T: Send + 'static,
{
    let limit = concurrency.max(1);
    let mut pending = units.into_iter();
    let mut join_set = JoinSet::new();
    let mut keys = HashMap::new();
    let mut results = Vec::new();

    loop {
        while join_set.len() < limit {
            let Some(unit) = pending.next() else { break };
            let ExecutionUnit { key, action } = unit;
            let handle = join_set.spawn(action);
            keys.insert(handle.id(), key);
        }

        let Some(joined) = join_set.join_next_with_id().await else {
            break;
        };

        match joined {
            Ok((id, result)) => {
                let key = keys.remove(&id).unwrap_or_default();
                results.push((key, result));
            }
            Err(e) => {
                let key = keys.remove(&e.id()).unwrap_or_default();
                let message = if e.is_panic() {
                    "panicked".to_string()
                } else {
                    e.to_string()
                };
                tracing::error!(unit = %key, error = %message, "Execution unit did not complete");
                results.push((
                    key.clone(),
                    Err(Error::Join {
                        unit: key,
                        message,
                    }),
                ));
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn tracked_unit(
        key: usize,
        running: &Arc<AtomicUsize>,
        peak: &Arc<AtomicUsize>,
    ) -> ExecutionUnit<usize> {
        let running = Arc::clone(running);
        let peak = Arc::clone(peak);
        ExecutionUnit::new(key.to_string(), async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(key)
        })
    }

    #[tokio::test]
    async fn test_never_exceeds_bound() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let units = (0..10).map(|i| tracked_unit(i, &running, &peak)).collect();

        let results = run_bounded(units, 3).await;

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_small_batch_runs_fully_concurrently() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let units = (0..2).map(|i| tracked_unit(i, &running, &peak)).collect();

        run_bounded(units, 8).await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let units = vec![
            ExecutionUnit::new("fails", async { Err(Error::configuration("boom")) }),
            ExecutionUnit::new("slow", async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(2)
            }),
        ];

        let results = run_bounded(units, 2).await;
        let slow = results.iter().find(|(key, _)| key == "slow").unwrap();
        assert!(matches!(slow.1, Ok(2)));
    }

    #[tokio::test]
    async fn test_panicking_unit_is_reported() {
        let units: Vec<ExecutionUnit<()>> = vec![ExecutionUnit::new("bad", async {
            panic!("unit exploded");
        })];

        let results = run_bounded(units, 1).await;
        assert!(matches!(&results[0], (key, Err(Error::Join { .. })) if key == "bad"));
    }
}
