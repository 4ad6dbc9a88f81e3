use clap::Parser;

#[derive(Parser, Debug)]
pub struct DecryptArgs {
    /// Path to the encrypted bundle
    #[arg(short, long, value_name = "INPUT")]
    pub input_file: String,

    /// Base64 key fragment for this bundle
    #[arg(short, long, value_name = "KEY")]
    pub key: String,

    /// Optional: the asset identifier. By default it is derived
    /// from the file stem, since bundles are stored under their id
    #[arg(long, value_name = "ID", default_value = "")]
    pub identifier: String,

    /// Optional: the output path of the decrypted file.
    /// By default the file will be written in the "decrypted"
    /// folder with the same name
    #[arg(short, long, value_name = "OUT", default_value = "")]
    pub output_file: String,
}
