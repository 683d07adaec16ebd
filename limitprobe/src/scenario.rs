use crate::dispatch::{dispatch, Batch};
use crate::error::HarnessError;
use crate::probe::{ProbeResult, Prober};
use futures::future::join_all;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// One scenario step: wait, then fire a batch.
#[derive(Debug, Clone)]
pub struct Step {
    pub wait_before: Duration,
    pub batch: Batch,
}

/// A strictly ordered sequence of dispatch steps.
///
/// A scenario runs to completion or aborts on the first dispatcher error;
/// there is no partial-result recovery. The pauses between steps are the
/// only ordering mechanism across batches — deliberately timing-based, with
/// the classifier's coarse rounding absorbing the slack.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    steps: Vec<Step>,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(self, batch: Batch) -> Self {
        self.step_after(Duration::ZERO, batch)
    }

    pub fn step_after(mut self, wait_before: Duration, batch: Batch) -> Self {
        self.steps.push(Step { wait_before, batch });
        self
    }

    /// The same batch fired `rounds` times, `gap` apart, to observe refill
    /// behavior at multiple points in time.
    pub fn steady(keys: &[&str], per_key: u32, rounds: u32, gap: Duration) -> Self {
        let entries: Vec<(&str, u32)> = keys.iter().map(|key| (*key, per_key)).collect();
        let batch = Batch::of(&entries);
        let mut scenario = Self::new();
        for round in 0..rounds {
            let wait = if round == 0 { Duration::ZERO } else { gap };
            scenario = scenario.step_after(wait, batch.clone());
        }
        scenario
    }

    /// One oversized batch, to observe how far past the steady rate the
    /// limiter tolerates requests before rejecting.
    pub fn burst(keys: &[&str], per_key: u32) -> Self {
        let entries: Vec<(&str, u32)> = keys.iter().map(|key| (*key, per_key)).collect();
        Self::new().step(Batch::of(&entries))
    }

    /// An oversized batch followed, after `gap`, by a small repeat round.
    /// Exercises the immediate-admission burst variant: the follow-up shows
    /// whether burst slots were spent or refilled.
    pub fn burst_then_repeat(keys: &[&str], per_key: u32, gap: Duration, repeat: u32) -> Self {
        let burst: Vec<(&str, u32)> = keys.iter().map(|key| (*key, per_key)).collect();
        let followup: Vec<(&str, u32)> = keys.iter().map(|key| (*key, repeat)).collect();
        Self::new()
            .step(Batch::of(&burst))
            .step_after(gap, Batch::of(&followup))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Runs every step in order, concatenating the results.
    pub async fn run(&self, prober: &Prober) -> Result<Vec<ProbeResult>, HarnessError> {
        let mut results = Vec::new();
        for step in &self.steps {
            if !step.wait_before.is_zero() {
                sleep(step.wait_before).await;
            }
            info!("dispatching batch of {} probes", step.batch.total());
            results.extend(dispatch(prober, &step.batch).await?);
        }
        Ok(results)
    }
}

/// Launches each stage's dispatch as its own task, `stagger` apart, so the
/// stages overlap in flight; joins them all and combines their results into
/// one collection for classification.
///
/// This is the cross-key interference shape: requests to one key interleaved
/// with pressure from many other keys, with overlap achieved by staggered
/// start times rather than synchronization. A transport error in any stage
/// fails the combined run.
pub async fn run_overlapping(
    prober: &Prober,
    stages: Vec<Batch>,
    stagger: Duration,
) -> Result<Vec<ProbeResult>, HarnessError> {
    let mut handles = Vec::with_capacity(stages.len());
    for (index, batch) in stages.into_iter().enumerate() {
        if index > 0 {
            sleep(stagger).await;
        }
        let prober = prober.clone();
        handles.push(tokio::spawn(
            async move { dispatch(&prober, &batch).await },
        ));
    }

    let mut results = Vec::new();
    for joined in join_all(handles).await {
        results.extend(joined??);
    }
    Ok(results)
}

/// Probes each key once, strictly one at a time. Used to pile distinct-key
/// cardinality onto a bounded tracking zone without self-interference.
pub async fn probe_serially(
    prober: &Prober,
    keys: &[&str],
) -> Result<Vec<ProbeResult>, HarnessError> {
    let mut results = Vec::with_capacity(keys.len());
    for key in keys {
        results.push(prober.get(key).await?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_builds_one_step_per_round() {
        let scenario = Scenario::steady(&["/0", "/1"], 2, 3, Duration::from_secs(1));
        assert_eq!(scenario.steps().len(), 3);
        assert_eq!(scenario.steps()[0].wait_before, Duration::ZERO);
        assert_eq!(scenario.steps()[1].wait_before, Duration::from_secs(1));
        assert!(scenario.steps().iter().all(|step| step.batch.total() == 4));
    }

    #[test]
    fn burst_then_repeat_shapes_both_batches() {
        let scenario =
            Scenario::burst_then_repeat(&["/0", "/1"], 5, Duration::from_secs(1), 2);
        assert_eq!(scenario.steps().len(), 2);
        assert_eq!(scenario.steps()[0].batch.total(), 10);
        assert_eq!(scenario.steps()[1].batch.total(), 4);
        assert_eq!(scenario.steps()[1].wait_before, Duration::from_secs(1));
    }
}
