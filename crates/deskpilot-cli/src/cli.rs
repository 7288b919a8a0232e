use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deskpilot")]
#[command(about = "Replay UI flows against desktop client applications")]
#[command(
    long_about = "deskpilot runs the open/close flows stored under the platforms directory, manages per-application resource libraries and hosts the interactive control and region capture tools."
)]
pub struct Cli {
    /// Directory holding <app>.json flows and <app>.resources.json libraries
    #[clap(long, global = true, env = "DESKPILOT_PLATFORMS_DIR")]
    pub platforms_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
#[clap(rename_all = "lower")]
pub enum ActionArg {
    Open,
    Close,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
#[clap(rename_all = "lower")]
pub enum KindArg {
    Control,
    Image,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Application id (flow file stem)
    pub app: String,
    /// Which flow to run
    #[clap(value_enum)]
    pub action: ActionArg,
}

#[derive(Parser, Debug)]
pub struct LocateArgs {
    pub app: String,
    #[clap(value_enum)]
    pub kind: KindArg,
    /// Resource id from the library
    pub id: String,
}

#[derive(Parser, Debug)]
pub struct CaptureArgs {
    /// Seconds to wait before giving up (defaults to DESKPILOT_CAPTURE_TIMEOUT_SECS)
    #[clap(long, short = 't')]
    pub timeout: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct DelayArgs {
    /// Seconds to wait first, to switch to the target window or move the pointer
    #[clap(long, short = 'd', default_value_t = 3)]
    pub delay: u64,
}

#[derive(Parser, Debug)]
pub struct ImportTemplateArgs {
    /// Image file to copy into the templates directory
    pub file: PathBuf,
    /// File name inside the templates directory (defaults to the source name)
    #[clap(long)]
    pub name: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ResourcesArgs {
    pub app: String,
    #[command(subcommand)]
    pub command: ResourceCommand,
}

#[derive(Subcommand, Debug)]
pub enum ResourceCommand {
    /// Print the whole library
    List,
    /// Save a control descriptor given as JSON
    AddControl {
        name: String,
        /// e.g. '{"window_title":"Chat","automation_id":"btnSend"}'
        descriptor: String,
    },
    /// Save an image template
    AddImage {
        name: String,
        /// Path relative to the templates directory, or absolute
        image: String,
        #[clap(long)]
        threshold: Option<f32>,
    },
    Rename {
        #[clap(value_enum)]
        kind: KindArg,
        id: String,
        name: String,
    },
    Delete {
        #[clap(value_enum)]
        kind: KindArg,
        id: String,
    },
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an application's open or close flow
    Run(RunArgs),
    /// Show whether an application is configured
    Status {
        app: String,
    },
    /// List configured applications
    Apps,
    /// Find a saved resource on screen and highlight it
    Locate(LocateArgs),
    /// Point at a control and press Ctrl+Shift+C to capture it
    CaptureControl(CaptureArgs),
    /// Press Ctrl+Shift+R, then Ctrl+drag to save a screen region
    CaptureRegion(CaptureArgs),
    /// Save the focused window as an image template after a delay
    CaptureWindow(DelayArgs),
    /// Describe the control under the pointer after a delay
    PickControl(DelayArgs),
    /// Copy an image file into the templates directory
    ImportTemplate(ImportTemplateArgs),
    /// Manage an application's resource library
    Resources(ResourcesArgs),
}
