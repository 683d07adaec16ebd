use crate::error::HarnessError;
use crate::probe::{ProbeResult, Prober};
use std::collections::BTreeMap;
use tracing::debug;

/// One dispatch unit: logical key → how many concurrent probes to fire at it.
#[derive(Debug, Clone, Default)]
pub struct Batch(BTreeMap<String, u32>);

impl Batch {
    pub fn of(entries: &[(&str, u32)]) -> Self {
        Self(
            entries
                .iter()
                .map(|(key, count)| (key.to_string(), *count))
                .collect(),
        )
    }

    pub fn single(key: &str, count: u32) -> Self {
        Self::of(&[(key, count)])
    }

    /// Total number of probes this batch will fire.
    pub fn total(&self) -> usize {
        self.0.values().map(|count| *count as usize).sum()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(key, count)| (key.as_str(), *count))
    }
}

/// Fires every probe in `batch` concurrently and waits for all of them.
///
/// Each probe runs as its own task with no concurrency cap; completions are
/// collected over a channel in whatever order they arrive. The call returns
/// once exactly `batch.total()` probes have reported.
///
/// The first transport error aborts the whole dispatch: a broken target
/// invalidates the scenario and must not be folded into rejection counts.
/// Probes still in flight are left to finish into a dropped channel.
///
/// There is no timeout here — a hung probe blocks the dispatch until the
/// enclosing caller's deadline fires.
pub async fn dispatch(prober: &Prober, batch: &Batch) -> Result<Vec<ProbeResult>, HarnessError> {
    let total = batch.total();
    let (reply_tx, reply_rx) = flume::unbounded();
    for (key, count) in batch.entries() {
        for _ in 0..count {
            let prober = prober.clone();
            let key = key.to_string();
            let reply_tx = reply_tx.clone();
            tokio::spawn(async move {
                let outcome = prober.get(&key).await;
                let _ = reply_tx.send(outcome);
            });
        }
    }
    drop(reply_tx);

    let mut results = Vec::with_capacity(total);
    for _ in 0..total {
        let outcome = reply_rx
            .recv_async()
            .await
            .map_err(|_| HarnessError::LostProbe)?;
        results.push(outcome?);
    }
    debug!("dispatch complete: {} probes", total);
    Ok(results)
}
