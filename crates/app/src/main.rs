use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use liwa_bookings::{BookingService, PaymentOutcome};
use liwa_config::Config;
use liwa_db::Store;
use liwa_models::{BookingForm, BookingStatus};
use liwa_payments::{ClientOptions, ZiinaClient};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::OffsetTime;

mod auth;
mod routes;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_HASH: &str = env!("LIWA_GIT_HASH");

fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH})")
}

// --- CLI definition ---

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

fn parse_status(s: &str) -> Result<BookingStatus, String> {
    s.parse()
}

#[derive(Parser)]
#[command(name = "liwa")]
#[command(about = "Snow Liwa ticket booking and payment reconciliation")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("LIWA_GIT_HASH"), ")"))]
struct Cli {
    /// Log level (default: from config, else info)
    #[arg(short, long, global = true)]
    log_level: Option<LogLevel>,

    /// Display log timestamps in UTC (default: local time)
    #[arg(long, global = true)]
    utc: bool,

    /// Booking store: `csv:<path>`, `sqlite:<path>` or a bare CSV path
    #[arg(long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create a booking from the command line
    Book {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long, default_value_t = 1)]
        tickets: u32,
        #[arg(long)]
        notes: Option<String>,
        /// Also request a Ziina payment link
        #[arg(long)]
        pay: bool,
    },
    /// List bookings, newest first
    ListBookings {
        /// Only show bookings with this status (pending, paid, cancelled)
        #[arg(long, value_parser = parse_status)]
        status: Option<BookingStatus>,
    },
    /// Refresh payment status of every booking from Ziina
    SyncPayments,
    /// Show booking and revenue totals
    Summary,
}

// --- Logging ---

fn init_logging(level: &str, utc: bool) {
    let filter = EnvFilter::new(level);

    if utc {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(OffsetTime::new(
                time::UtcOffset::UTC,
                time::macros::format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
                ),
            ))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_timer(LocalTimer)
            .init();
    }
}

struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

// --- Wiring ---

async fn build_service(config: &Config) -> anyhow::Result<BookingService> {
    let store = Store::open(&config.store_url).await?;
    let gateway = ZiinaClient::new(ClientOptions {
        api_base: config.ziina_api_base.clone(),
        access_token: config.ziina_access_token.clone(),
        return_base_url: config.ziina_app_base_url.clone(),
        test_mode: config.ziina_test_mode,
        ..ClientOptions::default()
    })?;
    if gateway.is_configured() {
        info!("Ziina configured (test mode: {})", gateway.test_mode());
    } else {
        info!("Ziina not configured; bookings will stay pending");
    }
    Ok(BookingService::new(store, gateway, config.ticket_price))
}

async fn run_server(config: &Config, service: BookingService) -> anyhow::Result<()> {
    info!("Liwa v{}", version_string());
    info!("Ticket price: {} AED", service.ticket_price());

    let state = routes::AppState {
        service: Arc::new(service),
        admin_pin: Arc::from(config.admin_pin.as_str()),
        settings_path: config.settings_path.clone(),
    };
    let app = routes::router(state, config.assets_dir.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Main ---

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // CLI args layer on top of defaults → config file → env
    let mut config = Config::load();
    if let Some(level) = &cli.log_level { config.log_level = level.to_string(); }
    if cli.utc { config.utc = true; }
    if let Some(store) = &cli.store { config.store_url = store.clone(); }
    if let Commands::Serve { port: Some(port) } = &cli.command { config.port = *port; }

    init_logging(&config.log_level, config.utc);

    let service = build_service(&config).await?;

    match cli.command {
        Commands::Serve { .. } => {
            run_server(&config, service).await?;
        }
        Commands::Book { name, phone, tickets, notes, pay } => {
            let form = BookingForm {
                name,
                phone,
                tickets: Some(tickets),
                notes: notes.unwrap_or_default(),
            };
            let booking = service.create_booking(&form).await?;
            println!(
                "Booking {} created: {} ticket(s) x {} = {} AED",
                booking.booking_id, booking.tickets, booking.ticket_price, booking.total_amount
            );
            if pay {
                let start = service.start_payment(booking).await?;
                match start.outcome {
                    PaymentOutcome::Redirect(url) => println!("Payment link: {url}"),
                    PaymentOutcome::MissingRedirect => {
                        println!("Payment intent created but no payment link was returned.")
                    }
                    PaymentOutcome::NotConfigured => {
                        println!("Ziina is not configured; booking left pending.")
                    }
                    PaymentOutcome::GatewayFailed => {
                        println!("Could not reach Ziina; booking left pending.")
                    }
                }
            }
        }
        Commands::ListBookings { status } => {
            let bookings: Vec<_> = service
                .list()
                .await?
                .into_iter()
                .filter(|b| status.is_none_or(|s| b.status == s))
                .collect();
            if bookings.is_empty() {
                println!("No bookings found.");
            } else {
                println!(
                    "{:<17} {:<20} {:<20} {:<14} {:>7} {:>10} {:<10} {}",
                    "Booking", "Created", "Name", "Phone", "Tickets", "Total", "Status", "Payment"
                );
                println!("{}", "-".repeat(120));
                for b in &bookings {
                    println!(
                        "{:<17} {:<20} {:<20} {:<14} {:>7} {:>10} {:<10} {}",
                        b.booking_id,
                        b.created_at.format("%Y-%m-%d %H:%M:%S"),
                        b.name,
                        b.phone,
                        b.tickets,
                        b.total_amount,
                        b.status,
                        b.payment_status.as_deref().unwrap_or(""),
                    );
                }
                println!("\n{} booking(s) total", bookings.len());
            }
        }
        Commands::SyncPayments => {
            if !service.gateway().is_configured() {
                println!("Ziina is not configured; nothing to sync.");
            } else {
                let report = service.sync_all().await?;
                println!(
                    "{} booking(s) with a payment intent, {} refreshed, {} updated",
                    report.checked, report.refreshed, report.updated
                );
            }
        }
        Commands::Summary => {
            let s = service.summary().await?;
            println!("Bookings:        {}", s.total_bookings);
            println!("Tickets:         {}", s.total_tickets);
            println!("Total amount:    {} AED", s.total_amount);
            println!("Paid:            {} AED", s.total_paid);
            println!("Pending:         {} AED", s.total_pending);
        }
    }

    Ok(())
}
