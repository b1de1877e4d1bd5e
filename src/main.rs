use std::path::PathBuf;
use std::process::ExitCode;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use crate::collector::logic::start_collection;
use crate::context::domain::AppContext;
use crate::http_service::logic::start_http;
use crate::system::domain::{init_tracing, System};

mod collector;
mod config;
mod context;
mod database;
mod http_service;
mod message;
mod network;
mod station;
mod system;
mod uplink;


#[derive(Parser)]
#[command(name = "rsu_telemetry", version, about = "Telemetría V2I de vehículos eléctricos vía RSUs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}


#[derive(Subcommand)]
enum Command {
    /// Levanta el servicio HTTP de ingesta.
    Serve,
    /// Reproduce una traza de simulación y envía los datos al servicio.
    Collect {
        #[arg(short = 't', long)]
        trace: PathBuf,
    },
}


#[tokio::main]
async fn main() -> ExitCode {

    let cli = Cli::parse();

    let system = match System::new() {
        Ok(system) => system,
        Err(e) => {
            eprintln!("Error: configuración inválida. {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&system);

    let result = match cli.command {
        Command::Serve => {
            let app_context = AppContext::new(system).await;
            start_http(app_context).await
        }
        Command::Collect { trace } => {
            start_collection(&system, &trace).await.map(|summary| {
                info!("Info: {} puntos de datos recolectados de {} vehículos",
                      summary.data_points, summary.vehicles_seen);
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
