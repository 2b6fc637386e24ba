//! # Matric - Admissions Marketplace Server
//!
//! The main binary for the Matric marketplace backend.
//!
//! This application provides:
//! - HTTP REST API server (axum-based, cookie sessions)
//! - CLI interface for database management
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                  apps/matric (THE BINARY)                  │
//! │                                                            │
//! │     ┌─────────────┐            ┌─────────────┐            │
//! │     │   CLI       │            │   HTTP API  │            │
//! │     │  (clap)     │            │   (axum)    │            │
//! │     └──────┬──────┘            └──────┬──────┘            │
//! │            │                          │                    │
//! │            └────────────┬─────────────┘                    │
//! │                         ▼                                  │
//! │                 ┌───────────────┐                          │
//! │                 │  matric-core  │                          │
//! │                 │  (THE LOGIC)  │                          │
//! │                 └───────────────┘                          │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! matric server --host 0.0.0.0 --port 8080
//!
//! # Database management
//! matric init
//! matric status
//! ```

use clap::Parser;
use matric::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — MATRIC_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MATRIC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let cli = cli::Cli::parse();

    let default_filter = if cli.verbose {
        "matric=debug,tower_http=debug"
    } else {
        "matric=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Matric startup banner.
fn print_banner() {
    println!(
        r#"
  ███╗   ███╗ █████╗ ████████╗██████╗ ██╗ ██████╗
  ████╗ ████║██╔══██╗╚══██╔══╝██╔══██╗██║██╔════╝
  ██╔████╔██║███████║   ██║   ██████╔╝██║██║
  ██║╚██╔╝██║██╔══██║   ██║   ██╔══██╗██║██║
  ██║ ╚═╝ ██║██║  ██║   ██║   ██║  ██║██║╚██████╗
  ╚═╝     ╚═╝╚═╝  ╚═╝   ╚═╝   ╚═╝  ╚═╝╚═╝ ╚═════╝

  Admissions Marketplace Server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
