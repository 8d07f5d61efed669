pub mod cli;
pub mod compare;
pub mod data;
pub mod dataset;
pub mod demo;
pub mod error;
pub mod harmonize;
pub mod import;
pub mod io_utils;
pub mod join;
pub mod merge;
pub mod preview;
pub mod schema;
pub mod table;
pub mod warehouse;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("schema_merge", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("Parsed command: {:?}", cli.command);
    match cli.command {
        Commands::Compare(args) => compare::execute(&args),
        Commands::Harmonize(args) => harmonize::execute(&args),
        Commands::Merge(args) => merge::execute(&args),
        Commands::Import(args) => import::execute(&args),
        Commands::Export(args) => import::export(&args),
        Commands::Show(args) => preview::execute(&args),
        Commands::Tables(args) => preview::tables(&args),
        Commands::Demo(args) => demo::execute(&args),
    }
}
