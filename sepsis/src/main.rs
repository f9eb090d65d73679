//! Neutropenic sepsis simulation.
//!
//! Runs a line-oriented console by default:
//! ```bash
//! cargo run -p sepsis
//! ```
//!
//! Run with `--serve` to expose the turn endpoint over HTTP instead:
//! ```bash
//! cargo run -p sepsis -- --serve 0.0.0.0:3000
//! ```

mod console;
mod server;

use sepsis_core::SimConfig;
use std::net::SocketAddr;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = SimConfig::from_env();

    if let Some(pos) = args.iter().position(|a| a == "--serve") {
        let addr: SocketAddr = args
            .get(pos + 1)
            .filter(|a| !a.starts_with("--"))
            .map(String::as_str)
            .unwrap_or(DEFAULT_ADDR)
            .parse()?;
        return server::serve(addr, &config).await.map_err(|e| e.into());
    }

    console::run_console(&config).await?;
    Ok(())
}

fn print_help() {
    println!("Neutropenic sepsis simulation");
    println!();
    println!("USAGE:");
    println!("  sepsis [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help          Show this help message");
    println!("  --serve [ADDR]      Serve POST /api/simulate (default: {DEFAULT_ADDR})");
    println!();
    println!("ENVIRONMENT:");
    println!("  SIM_SIGNATURE_SECRET  Secret for sealing state tokens");
    println!("  ANTHROPIC_API_KEY     Enables AI intent parsing and narration");
    println!("  SIM_MODEL             Claude model override");
    println!("  SIM_AI_TIMEOUT_MS     Timeout for each AI call (default: 8000)");
    println!("  ALLOWED_ORIGIN        CORS origin for --serve (default: *)");
    println!("  RUST_LOG              Log filter (default: info)");
    println!();
    println!("EXAMPLES:");
    println!("  sepsis                          # Console at the bedside");
    println!("  sepsis --serve                  # HTTP on {DEFAULT_ADDR}");
    println!("  sepsis --serve 0.0.0.0:8080");
}
