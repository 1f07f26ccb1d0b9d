use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{DisableFocusChange, EnableFocusChange};
use ratatui::crossterm::execute;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cell_edit;
mod controller;
mod domain;
mod ids;
mod inputter;
mod loader;
mod model;
mod notifier;
mod pagination;
mod schema;
mod table;
mod ui;

use controller::Controller;
use domain::{TabConfig, TabError};
use model::{Model, Status};
use pagination::PageSize;
use ui::TableUI;

/// Edit tabular data files in the terminal.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Data file to edit (csv, parquet, arrow)
    file: String,

    /// Write the edited table as csv to this file when quitting
    #[arg(short, long)]
    output: Option<String>,

    /// Rows per page, one of 10, 20, 30, 40, 50
    #[arg(short, long, default_value_t = 10)]
    page_size: usize,

    /// Maximal width of a rendered column
    #[arg(long, default_value_t = 30)]
    max_column_width: usize,

    /// Number new rows r1, r2, ... instead of using random uuids
    #[arg(long)]
    sequential_ids: bool,

    /// Log file, filtered with RUST_LOG
    #[arg(long, default_value = "tabedit.log")]
    log_file: String,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand_path(path: &str) -> Result<PathBuf, TabError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TabError::LoadingFailed(e.to_string()))
}

fn init_tracing(log_file: &Path) -> Result<(), TabError> {
    let file = File::create(log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal belongs to the UI, so everything goes to the log file
    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run() -> Result<(), TabError> {
    let args = Args::parse();
    init_tracing(&expand_path(&args.log_file)?)?;

    let mut cfg = TabConfig::default()
        .with_page_size(PageSize::try_from(args.page_size)?)
        .with_max_column_width(args.max_column_width)
        .with_sequential_ids(args.sequential_ids);
    if let Some(output) = args.output.as_deref() {
        cfg = cfg.with_output(expand_path(output)?);
    }
    info!("Starting tabedit with {cfg:?}");

    let mut model = Model::init(&cfg);
    model.load_data_file(&expand_path(&args.file)?)?;

    let ui = TableUI::new(&cfg);
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    // Focus events commit an open edit when the terminal loses focus
    let result = execute!(io::stdout(), EnableFocusChange)
        .map_err(TabError::from)
        .and_then(|_| event_loop(&mut terminal, &mut model, &ui, &controller));
    let _ = execute!(io::stdout(), DisableFocusChange);
    ratatui::restore();

    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    ui: &TableUI,
    controller: &Controller,
) -> Result<(), TabError> {
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model.get_uidata(), f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(model)?;
        model.update(message)?;
    }
    Ok(())
}
