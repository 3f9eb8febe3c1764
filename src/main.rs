use std::path::Path;
use std::process;

use clap::Parser;
use serde::Serialize;

use nestegg::api::{Cli, Command, build_income, build_projection, run_http_server};
use nestegg::core::{TaxYearConfig, run_projection, summarize_income};

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_tax_config(path: Option<&Path>) -> TaxYearConfig {
    let loaded = match path {
        Some(path) => TaxYearConfig::from_path(path),
        None => TaxYearConfig::builtin(),
    };
    loaded.unwrap_or_else(|e| fail(&e.to_string()))
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => fail(&format!("failed to encode output: {e}")),
    }
}

fn fail(msg: &str) -> ! {
    eprintln!("Error: {msg}");
    process::exit(1);
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            let config = load_tax_config(args.tax_config.as_deref());
            if let Err(e) = run_http_server(args.port, config).await {
                eprintln!("Server error: {e}");
                process::exit(1);
            }
        }
        Command::Project(args) => {
            let config = load_tax_config(args.tax_config.as_deref());
            let projection = build_projection(&args, &config).unwrap_or_else(|msg| fail(&msg));
            let result = run_projection(&projection).unwrap_or_else(|e| fail(&e.to_string()));
            print_json(&result);
        }
        Command::Tax(args) => {
            let config = load_tax_config(args.tax_config.as_deref());
            let input = build_income(&args).unwrap_or_else(|msg| fail(&msg));
            let summary =
                summarize_income(&input, &config).unwrap_or_else(|e| fail(&e.to_string()));
            print_json(&summary);
        }
    }
}
