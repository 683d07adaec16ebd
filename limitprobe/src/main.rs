mod args;

use crate::args::Args;
use clap::Parser;
use limitprobe::error::HarnessError;
use limitprobe::probe::Prober;
use limitprobe::trace;
use tokio::time::timeout;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), HarnessError> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    let prober = Prober::new(&args.target)?;
    let scenario = args.scenario();
    let policy = args.timing_policy();

    info!("probing {} for {} round(s)...", args.target, args.rounds);
    let results = timeout(args.deadline, scenario.run(&prober))
        .await
        .map_err(|_| HarnessError::Deadline(args.deadline))??;

    println!("{}", trace::header());
    print!("{}", trace::render(&results, &policy));
    Ok(())
}
