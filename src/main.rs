use std::fs::File;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};

mod config;
mod controller;
mod domain;
mod exporter;
mod fetcher;
mod inputter;
mod model;
mod record;
mod source;
mod state;
mod ui;

use config::CTVConfig;
use controller::Controller;
use domain::CTVError;
use exporter::DirectorySink;
use model::{Model, Status};
use ui::TableUI;

fn main() -> ExitCode {
    let result = run();
    ratatui::restore();
    match result {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

// The terminal belongs to the table, so logs go to a file.
fn init_logging(config: &CTVConfig) -> Result<(), CTVError> {
    let file = File::create(config.log_path()?)?;
    let directive = "ctv=info"
        .parse::<Directive>()
        .map_err(|e| CTVError::InvalidConfig(e.to_string()))?;
    let filter = EnvFilter::builder()
        .with_default_directive(directive)
        .with_env_var("CTV_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(filter),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| CTVError::InvalidConfig(e.to_string()))
}

fn run() -> Result<(), CTVError> {
    let config = CTVConfig::parse();
    config.validate()?;
    init_logging(&config)?;
    info!("Starting ctv: {config:?}");

    let runtime = tokio::runtime::Runtime::new()?;
    let source = config.open_source()?;
    let sink = Arc::new(DirectorySink::new(config.export_path()?));
    let mut model = Model::init(&config, source, sink, runtime.handle().clone())?;
    let controller = Controller::new(&config);
    let mut ui = TableUI::new();

    let mut terminal = ratatui::init();
    model.start();

    while model.status != Status::QUITTING {
        // Apply fetch results that arrived since the last frame
        model.drain_events();

        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    info!("Quitting ctv");
    runtime.shutdown_background();
    Ok(())
}
