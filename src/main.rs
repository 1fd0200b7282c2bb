#![warn(clippy::pedantic)]
#![allow(
    clippy::style,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc
)]

mod baseline;
pub mod cli;
mod cmd;
pub mod config;
mod crumb;
pub mod errors;
mod http_engine;
mod pool;
pub mod progress;
mod proute;
pub mod result;
pub(crate) mod route;
mod routeio;
mod scheduler;
mod schema;
mod targetio;
mod validator;

use crate::cli::{Kitecrawl, KitecrawlCmd};
use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Kitecrawl::parse();
    match args.kitecrawl {
        KitecrawlCmd::GenCompletions { shell, out_dir } => {
            cmd::gen_completions::generate_completions(shell, out_dir)?;
        }
        KitecrawlCmd::Scan(args) => {
            cmd::run::run(&args).await?;
        }
    }

    Ok(())
}
