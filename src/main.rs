use std::path::PathBuf;
use std::process::ExitCode;

mod controller;
mod coordinator;
mod dataset;
mod domain;
mod inputter;
mod loader;
mod model;
mod search;
mod ui;

use clap::Parser;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use controller::Controller;
use domain::{RVConfig, RVError};
use model::{Model, Status};

#[derive(Parser)]
#[command(
    name = "rv",
    version,
    about = "A tui based record viewer for CSV and XLSX files."
)]
struct Cli {
    /// The .csv or .xlsx file to open
    path: String,

    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Maximum rendered column width at 100% zoom
    #[arg(long, default_value_t = 40)]
    max_column_width: usize,

    /// Write logs to this file; verbosity is controlled via RUST_LOG
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn run() -> Result<(), RVError> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_ref())?;

    let path = shellexpand::full(&cli.path)
        .map_err(|e| RVError::LoadingFailed(e.to_string()))?
        .into_owned();

    let config = RVConfig::default()
        .event_poll_time(cli.poll_ms)
        .max_column_width(cli.max_column_width);

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(&config, size.width as usize, size.height as usize);
    if let Err(e) = model.load_data_file(PathBuf::from(path)) {
        // Not fatal; the failure lands on the status line and whatever
        // was loaded before stays in place.
        model.set_load_error(&e);
    }

    let controller = Controller::new(&config);

    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|f| ui::draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}

// A TUI owns the terminal, so logs only go to a file when one is given.
fn init_tracing(log_file: Option<&PathBuf>) -> Result<(), RVError> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = std::fs::File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();
    Ok(())
}
