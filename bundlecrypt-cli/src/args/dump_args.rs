use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
pub struct DumpArgs {
    /// Folder containing the encrypted bundles
    #[arg(short, long, value_name = "IN")]
    pub input_folder: String,

    /// Key list file, one "<identifier> <base64 key>" pair per line.
    /// Lines starting with '#' are ignored
    #[arg(short, long, value_name = "KEYS")]
    pub keys_file: String,

    /// Folder the decrypted bundles are written to
    #[arg(short, long, value_name = "OUT", default_value = "decrypted")]
    pub output_folder: PathBuf,

    /// Optional: file of regexes; only identifiers matching one of
    /// them are decrypted
    #[arg(short, long, value_name = "RULES", default_value = "")]
    pub rules_file: String,

    /// Worker threads (0 = all cores)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Memory allowed for in-RAM decryption, in GiB (0 = all available)
    #[arg(short, long, default_value_t = 0.0)]
    pub memory: f64,
}
