use clap::{Parser, Subcommand};

mod decrypt_args;
mod dump_args;
mod info_args;

pub use self::{decrypt_args::DecryptArgs, dump_args::DumpArgs, info_args::InfoArgs};

#[derive(Parser, Debug)]
#[command(author, version, about = "Shuffled asset bundle toolbox", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decrypt a single shuffled bundle
    Decrypt(DecryptArgs),

    /// Batch-decrypt every keyed bundle under a folder
    Dump(DumpArgs),

    /// Print the shuffle layout of a bundle without decrypting it
    Info(InfoArgs),
}
