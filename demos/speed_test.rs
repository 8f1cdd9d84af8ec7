//! Mirror speed test
//!
//! Calibrates every category against a set of mirrors and prints the
//! winners along with per-mirror statistics.
//!
//! Usage: cargo run --example speed_test -- https://mirror-a.example.com https://mirror-b.example.com

use mirror_race::{Category, ClientConfig, ClientEvent, MirrorClient};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mirrors: Vec<String> = env::args().skip(1).collect();
    if mirrors.is_empty() {
        eprintln!("usage: speed_test <mirror-url>...");
        std::process::exit(2);
    }

    let config = ClientConfig::new()
        .endpoints(mirrors)
        .probe_timeout(Duration::from_secs(5));
    let client = MirrorClient::new(config).await?;

    // Print events as they arrive
    let mut events = client.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let ClientEvent::CalibrationFinished { category, endpoint } = event {
                match endpoint {
                    Some(endpoint) => println!("{category:>10}: {endpoint}"),
                    None => println!("{category:>10}: unreachable"),
                }
            }
        }
    });

    let results = client.refresh_all().await?;
    let stats = client.endpoint_stats();

    // Dropping the client closes the event channel
    drop(client);
    printer.await?;

    let reachable = results.values().filter(|e| e.is_some()).count();
    println!("\n{reachable}/{} categories reachable", Category::ALL.len());

    println!("\n{:<40} {:>8} {:>8} {:>10}", "mirror", "ok", "failed", "avg ms");
    for stats in stats {
        println!(
            "{:<40} {:>8} {:>8} {:>10.1}",
            stats.endpoint, stats.successes, stats.failures, stats.avg_latency_ms
        );
    }

    Ok(())
}
