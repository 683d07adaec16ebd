use clap::Parser;
use limitprobe::dispatch::Batch;
use limitprobe::scenario::Scenario;
use limitprobe::trace::TimingPolicy;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fires concurrent probe batches at a rate-limited HTTP endpoint and prints a deterministic trace", long_about = None)]
pub struct Args {
    /// Base URL of the policy-enforcing endpoint
    #[arg(long)]
    pub target: String,

    /// Probe specification as key=count; repeatable, one per logical key
    #[arg(long = "probe", value_parser = parse_probe, required = true)]
    pub probes: Vec<ProbeSpec>,

    /// Number of rounds to fire
    #[arg(long, default_value_t = 1)]
    pub rounds: u32,

    /// Pause between rounds
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub gap: Duration,

    /// Overall run deadline; the dispatcher itself never times out
    #[arg(long, default_value = "60s", value_parser = humantime::parse_duration)]
    pub deadline: Duration,

    /// Start-time bucket used when ordering the trace
    #[arg(long, default_value = "10ms", value_parser = humantime::parse_duration)]
    pub start_bucket: Duration,

    /// Duration bucket used when ordering the trace
    #[arg(long, default_value = "1ms", value_parser = humantime::parse_duration)]
    pub duration_bucket: Duration,

    /// Durations at or above this count as queued by the limiter
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub delay_threshold: Duration,
}

#[derive(Debug, Clone)]
pub struct ProbeSpec {
    pub key: String,
    pub count: u32,
}

impl Args {
    pub fn scenario(&self) -> Scenario {
        let entries: Vec<(&str, u32)> = self
            .probes
            .iter()
            .map(|probe| (probe.key.as_str(), probe.count))
            .collect();
        let batch = Batch::of(&entries);
        let mut scenario = Scenario::new();
        for round in 0..self.rounds {
            let wait = if round == 0 { Duration::ZERO } else { self.gap };
            scenario = scenario.step_after(wait, batch.clone());
        }
        scenario
    }

    pub fn timing_policy(&self) -> TimingPolicy {
        TimingPolicy {
            start_bucket: self.start_bucket,
            duration_bucket: self.duration_bucket,
            delay_threshold: self.delay_threshold,
        }
    }
}

fn parse_probe(spec: &str) -> Result<ProbeSpec, String> {
    let (key, count) = spec
        .split_once('=')
        .ok_or_else(|| format!("'{spec}' is not a key=count pair"))?;
    let count: u32 = count
        .parse()
        .map_err(|_| format!("'{count}' is not a valid probe count"))?;
    if key.is_empty() || count == 0 {
        return Err(format!("'{spec}' must name a key and a non-zero count"));
    }
    Ok(ProbeSpec {
        key: key.to_string(),
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_probe_specs() {
        let spec = parse_probe("/0=5").unwrap();
        assert_eq!(spec.key, "/0");
        assert_eq!(spec.count, 5);

        assert!(parse_probe("/0").is_err());
        assert!(parse_probe("/0=zero").is_err());
        assert!(parse_probe("=3").is_err());
        assert!(parse_probe("/0=0").is_err());
    }

    #[test]
    fn rounds_expand_into_waited_steps() {
        let args = Args::parse_from([
            "limitprobe",
            "--target",
            "http://127.0.0.1:8080",
            "--probe",
            "/0=2",
            "--probe",
            "/1=2",
            "--rounds",
            "3",
            "--gap",
            "1s",
        ]);
        let scenario = args.scenario();
        assert_eq!(scenario.steps().len(), 3);
        assert_eq!(scenario.steps()[0].wait_before, Duration::ZERO);
        assert_eq!(scenario.steps()[2].wait_before, Duration::from_secs(1));
        assert!(scenario.steps().iter().all(|step| step.batch.total() == 4));
    }
}
