use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "omniping")]
#[command(version = concat!("Ver:", env!("CARGO_PKG_VERSION")))]
#[command(about = "Operator console for the OmniPing network probe monitor")]
pub struct Cli {
    /// Write a default config to ~/.omniping/console.toml
    #[arg(long = "init")]
    pub init: bool,

    /// Print the effective configuration
    #[arg(long = "print")]
    pub print: bool,

    /// Validate the configuration file
    #[arg(long = "check")]
    pub check: bool,

    /// Engine server root, overrides the config file
    #[arg(short = 's', long = "server", value_name = "URL")]
    pub server: Option<String>,

    /// Keep refreshing the report until interrupted
    #[arg(short = 'w', long = "watch")]
    pub watch: bool,

    /// Stop watching after this many refresh intervals
    #[arg(long = "ticks", value_name = "N", requires = "watch")]
    pub ticks: Option<u32>,

    /// Start engine polling
    #[arg(long = "start", conflicts_with = "stop")]
    pub start: bool,

    /// Stop engine polling
    #[arg(long = "stop")]
    pub stop: bool,

    /// Clear the engine's result counters
    #[arg(long = "clear")]
    pub clear: bool,

    /// Stop polling and reset results
    #[arg(long = "reset")]
    pub reset: bool,

    /// Restart the engine's web process
    #[arg(long = "restart")]
    pub restart: bool,

    /// Print the test list in the editable line format
    #[arg(long = "export-tests")]
    pub export_tests: bool,

    /// Replace the test list from a file in the line format
    #[arg(long = "import-tests", value_name = "FILE")]
    pub import_tests: Option<PathBuf>,

    /// Print the stored engine setup as JSON
    #[arg(long = "show-config")]
    pub show_config: bool,

    /// Disable ANSI colours
    #[arg(long = "no-color")]
    pub no_color: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
