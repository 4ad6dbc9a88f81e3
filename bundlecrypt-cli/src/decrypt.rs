use std::{fs, io, path::PathBuf};

use bundlecrypt_core::KeyFragment;

use crate::DecryptArgs;

const DECRYPTED_PATH: &str = "decrypted";

pub fn decrypt(args: DecryptArgs) -> std::io::Result<()> {
    let file_path_str = args.input_file.trim_matches('"').trim_end_matches('\\');

    let file_path = PathBuf::from(file_path_str);

    let file_name = file_path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "input path has no file name"))?;

    let identifier = if args.identifier.is_empty() {
        file_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_owned()
    } else {
        args.identifier
    };

    let output_path = if args.output_file.is_empty() {
        PathBuf::from(DECRYPTED_PATH).join(file_name)
    } else {
        PathBuf::from(args.output_file.trim_matches('"').trim_end_matches('\\'))
    };

    if let Some(folder) = output_path.parent() {
        fs::create_dir_all(folder)?;
    }

    let key = KeyFragment::from_base64(&args.key).map_err(io::Error::from)?;

    let written = bundlecrypt_core::decrypt_to_file(&file_path, &output_path, &identifier, key)
        .map_err(io::Error::from)?;

    println!(
        "Decrypted {} ({} bytes) -> {}",
        identifier,
        written,
        output_path.display()
    );

    Ok(())
}
