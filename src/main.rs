use actix_web::{web, App, HttpServer};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use medbuddy_scheduler::jobs::handlers::{list_jobs, trigger_job};
use medbuddy_scheduler::{health_check, run_job, scheduler, AppError, AppState, JobKind, Settings};
use std::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "medbuddy-scheduler", version, about = "Medicine reset and dose reminder jobs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the job loops and the admin HTTP server (default)
    Serve,
    /// Run one job once and exit
    Run {
        /// Job name: daily-reset or medication-notifier
        job: JobKind,
    },
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

async fn serve(state: AppState) -> medbuddy_scheduler::Result<()> {
    let config = state.config.clone();
    let handles = scheduler::spawn_enabled_jobs(&state)?;
    info!("{} job loops running", handles.len());

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Admin API listening on http://{}:{}", config.server.host, config.server.port);

    let data = web::Data::new(state.clone());
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/health", web::get().to(health_check))
            .route("/jobs", web::get().to(list_jobs))
            .route("/jobs/{name}/run", web::post().to(trigger_job))
    })
    .listen(listener)?
    .workers(config.server.workers.max(1) as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    for handle in handles {
        handle.abort();
    }
    state.shutdown().await
}

async fn run_once(state: AppState, job: JobKind) -> anyhow::Result<()> {
    let result = run_job(&state, job).await;
    state.shutdown().await?;

    let report = result?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let config = Settings::new()?;
    init_tracing(&config.logging.level);
    info!("Configuration loaded ({} environment)", config.environment);

    let state = AppState::new(config).await.map_err(|e| {
        error!("Failed to initialise: {}", e);
        e
    })?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await?,
        Command::Run { job } => run_once(state, job).await?,
    }

    Ok(())
}
