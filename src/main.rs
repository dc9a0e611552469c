use clap::{Parser, Subcommand};
use sitescout::config::AppConfig;
use sitescout::places::{GoogleMapsClient, SearchBounds, SitesService};
use std::sync::Arc;

/// sitescout — tourist attractions around any city
///
/// Geocodes a city through Google Maps and returns nearby attractions,
/// ranked by popularity. Requires GOOGLE_MAPS_API_KEY (env or .env file).
///
/// Examples:
///   sitescout serve --port 8080
///   sitescout geocode "Jaipur"
///   sitescout sites "Agra" --radius 10000 --limit 20
#[derive(Parser)]
#[command(name = "sitescout", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Bind address. Overrides SITESCOUT_HOST.
        #[arg(long)]
        host: Option<String>,

        /// Port. Overrides SITESCOUT_PORT / PORT.
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },

    /// Print the coordinates of a city as JSON.
    Geocode {
        city: String,
    },

    /// Print a city's coordinates and ranked attractions as JSON.
    Sites {
        city: String,

        /// Search radius in meters (100-50000).
        #[arg(long)]
        radius: Option<u32>,

        /// Maximum number of places (10-60).
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    sitescout::logging::init();
    let cli = Cli::parse();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let service = SitesService::new(Arc::new(GoogleMapsClient::new(&config.provider)));

    let command = cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    });

    match command {
        Command::Serve { host, port } => {
            let mut server = config.server.clone();
            if let Some(host) = host {
                server.host = host;
            }
            if let Some(port) = port {
                server.port = port;
            }
            if let Err(e) = sitescout::server::start(&server, service).await {
                eprintln!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Command::Geocode { city } => {
            let coord = service.geocode(&city).await.unwrap_or_else(|e| fail(e));
            print_json(&serde_json::json!({ "lat": coord.lat(), "lng": coord.lon() }));
        }
        Command::Sites { city, radius, limit } => {
            let bounds = SearchBounds::from_optional(radius, limit).unwrap_or_else(|e| fail(e));
            let sites = service.sites(&city, bounds).await.unwrap_or_else(|e| fail(e));
            print_json(&sites);
        }
    }
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", err);
    std::process::exit(1);
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(e),
    }
}
