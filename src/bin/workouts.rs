// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Dumps the authenticated user's recent workouts as JSON.
//!
//! Credentials come from the `PELOTON_USER` / `PELOTON_PASSWORD`
//! environment variables (a local `.env` file works too).

use clap::Parser;
use peloton_client::{Config, Entity, PelotonClient};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// How many workouts to dump.
    #[arg(short, long, default_value = "10")]
    limit: usize,

    /// Also fetch each workout's full detail record before dumping.
    #[arg(long)]
    full: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    peloton_client::logging::init();

    let args = Args::parse();
    let client = PelotonClient::new(Config::from_env()?)?;

    let mut pages = client.workouts();
    let workouts = pages.take(args.limit).await?;

    for workout in &workouts {
        if args.full {
            workout.resolve(&client).await?;
        }
        println!("{}", serde_json::to_string_pretty(&workout.serialize())?);
    }

    info!(
        dumped = workouts.len(),
        requests = client.requests_issued(),
        "done"
    );
    Ok(())
}
