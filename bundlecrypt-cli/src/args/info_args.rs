use clap::Parser;

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to the encrypted bundle
    #[arg(short, long, value_name = "INPUT")]
    pub input_file: String,

    /// Base64 key fragment for this bundle
    #[arg(short, long, value_name = "KEY")]
    pub key: String,

    /// Optional: the asset identifier; derived from the file stem
    /// when omitted
    #[arg(long, value_name = "ID", default_value = "")]
    pub identifier: String,
}
