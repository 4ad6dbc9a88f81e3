use clap::Parser;

mod args;
mod decrypt;
mod dump;
mod info;
mod memory_budget;

use args::{Args, Command};

pub use crate::{args::DecryptArgs, args::DumpArgs, args::InfoArgs};

use decrypt::decrypt;
use dump::dump;
use info::info;

const MB: usize = 1024 * 1024;
const GB: usize = 1024 * MB;

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match args.command {
        Command::Decrypt(decrypt_args) => decrypt(decrypt_args),
        Command::Dump(dump_args) => dump(dump_args),
        Command::Info(info_args) => info(info_args),
    }
}
