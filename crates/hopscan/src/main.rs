#![warn(clippy::all, clippy::pedantic, clippy::nursery, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::option_if_let_else,
    clippy::missing_const_for_fn,
    clippy::cast_precision_loss,
    clippy::redundant_pub_crate
)]
#![forbid(unsafe_code)]

use crate::config::{Action, Args};
use crate::privilege::Privilege;
use clap::Parser;

mod app;
mod config;
mod describe;
mod privilege;
mod report;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let action = Action::try_from(args)?;
    app::configure_logging(action.verbosity());
    let privilege = Privilege::acquire_privileges()?;
    app::run_hopscan(&action, &privilege)
}
