use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use salesbot::config::Config;
use salesbot::db::{AppState, SqliteStore, create_pool};
use salesbot::faq::FaqIndex;
use salesbot::handlers;
use salesbot::models::NotificationJob;
use salesbot::push::{VapidKey, transport_from_config};

#[derive(Parser, Debug)]
#[command(name = "salesbot")]
#[command(about = "Purchase webhook ingestion and Web Push notifications")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Send a notification to every subscriber and print the report
    Push {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
        /// Page opened on click (defaults to BASE_URL)
        #[arg(long)]
        url: Option<String>,
    },
    /// Print a fresh VAPID key pair for VAPID_PRIVATE_KEY
    GenVapidKeys,
    /// Print the most recent completed purchases as JSON
    RecentPurchases {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

fn build_state(config: &Config) -> AppState {
    let pool = create_pool(&config.database_path).expect("Failed to create database pool");
    let store = SqliteStore::new(pool);
    store.init().expect("Failed to initialize database");

    let (transport, vapid_public_key) =
        transport_from_config(&config.push).expect("Invalid push configuration");

    let faq = match &config.faq_path {
        Some(path) => FaqIndex::load(path, config.faq_threshold).expect("Failed to load FAQ"),
        None => FaqIndex::empty(),
    };

    if faq.is_empty() {
        tracing::info!("No FAQ entries loaded: /qa will never match");
    }

    AppState::new(config, store, transport, vapid_public_key, faq)
}

/// One-shot dispatch for cron and manual use. Ctrl+C stops starting new
/// deliveries; the ones in flight finish.
async fn run_push(config: &Config, title: String, body: String, url: Option<String>) {
    let state = build_state(config);
    let job = NotificationJob::new(title, body, url.unwrap_or_else(|| config.base_url.clone()));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted: finishing in-flight deliveries");
            on_signal.cancel();
        }
    });

    match state.dispatcher.dispatch_with_cancel(&job, &cancel).await {
        Ok(report) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).expect("report serializes")
            );
        }
        Err(e) => {
            eprintln!("Dispatch failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_recent_purchases(config: &Config, limit: i64) {
    let state = build_state(config);
    match state.events.recent_completed_purchases(limit.max(1)) {
        Ok(purchases) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&purchases).expect("purchases serialize")
            );
        }
        Err(e) => {
            eprintln!("Failed to read purchases: {}", e);
            std::process::exit(1);
        }
    }
}

async fn serve(config: Config) {
    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let state = build_state(&config);

    let mut app = handlers::router(&state, config.public_rate_limit_rpm);

    // Static landing page, service worker and PWA assets
    if let Some(site_dir) = &config.site_dir {
        tracing::info!("Serving static site from {}", site_dir);
        app = app.fallback_service(ServeDir::new(site_dir));
    }

    let app = app.layer(TraceLayer::new_for_http()).with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Salesbot listening on {}", addr);

    // Peer addresses are needed by the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salesbot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::GenVapidKeys => {
            let (private_key, public_key) = VapidKey::generate();
            println!("VAPID_PRIVATE_KEY={}", private_key);
            println!("# public key (served at /api/vapid-public-key)");
            println!("# {}", public_key);
        }
        Command::Serve => serve(Config::from_env()).await,
        Command::Push { title, body, url } => {
            run_push(&Config::from_env(), title, body, url).await
        }
        Command::RecentPurchases { limit } => print_recent_purchases(&Config::from_env(), limit),
    }
}
