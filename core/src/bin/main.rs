/// Cadence CLI
///
/// Runs the scheduler demos: the three-step registration form and the
/// nested program walkthrough.
use cadence_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
