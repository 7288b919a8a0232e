//! deskpilot CLI
//!
//! Usage from workspace root:
//!   cargo run --bin deskpilot -- apps                          # List configured applications
//!   cargo run --bin deskpilot -- run qianniu open              # Run an open flow
//!   cargo run --bin deskpilot -- status qianniu                # Is a flow configured
//!   cargo run --bin deskpilot -- resources qianniu list        # Show the resource library
//!   cargo run --bin deskpilot -- locate qianniu image <id>     # Find and highlight a resource
//!   cargo run --bin deskpilot -- capture-control -t 60         # Pick a control (Ctrl+Shift+C)
//!   cargo run --bin deskpilot -- capture-region                # Save a region (Ctrl+Shift+R)
//!   cargo run --bin deskpilot -- capture-window -d 5           # Save the focused window
//!   cargo run --bin deskpilot -- pick-control                  # Describe the control under the pointer
//!   cargo run --bin deskpilot -- import-template ./send.png    # Copy an image into templates/

use crate::cli::{Cli, Commands};
use crate::command::{
    handle_capture_control, handle_capture_region, handle_capture_window, handle_import_template,
    handle_locate, handle_pick_control, handle_resources, handle_run, print_json,
};
use anyhow::Result;
use clap::Parser;
use deskpilot::{AgentService, Settings};
use std::process::ExitCode;

mod cli;
mod command;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(dir) = cli.platforms_dir.clone() {
        settings = settings.with_platforms_dir(dir);
    }
    deskpilot::logging::init(&settings.log_level);

    match run(cli, settings).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, settings: Settings) -> Result<bool> {
    let service = AgentService::new(settings);

    match cli.command {
        Commands::Run(args) => return handle_run(&service, &args.app, args.action).await,
        Commands::Status { app } => print_json(&service.status(&app))?,
        Commands::Apps => print_json(&service.list_applications()?)?,
        Commands::Locate(args) => handle_locate(&service, &args.app, args.kind, &args.id).await?,
        Commands::CaptureControl(args) => handle_capture_control(&service, &args).await?,
        Commands::CaptureRegion(args) => handle_capture_region(&service, &args).await?,
        Commands::CaptureWindow(args) => handle_capture_window(&service, &args).await?,
        Commands::PickControl(args) => handle_pick_control(&service, &args).await?,
        Commands::ImportTemplate(args) => handle_import_template(&service, &args)?,
        Commands::Resources(args) => handle_resources(&service, args)?,
    }
    Ok(true)
}
