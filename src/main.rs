use std::process;

use ens_compute_gateway::run::run;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{e}");
        process::exit(1)
    }
}
