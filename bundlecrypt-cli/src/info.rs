use std::{fs, io, path::PathBuf};

use bundlecrypt_core::{KeyFragment, Schedule};

use crate::InfoArgs;

pub fn info(args: InfoArgs) -> std::io::Result<()> {
    let file_path = PathBuf::from(args.input_file.trim_matches('"').trim_end_matches('\\'));

    let identifier = if args.identifier.is_empty() {
        file_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_owned()
    } else {
        args.identifier
    };

    let physical_len = fs::metadata(&file_path)?.len();
    let key = KeyFragment::from_base64(&args.key).map_err(io::Error::from)?;

    let schedule = Schedule::build(identifier.as_bytes(), physical_len, key.as_bytes())
        .map_err(io::Error::from)?;

    let key_events = schedule
        .events
        .iter()
        .filter(|event| event.source_is_key)
        .count();
    let min_fragment = schedule.events.iter().map(|e| e.length).min().unwrap_or(0);
    let max_fragment = schedule.events.iter().map(|e| e.length).max().unwrap_or(0);

    println!("Bundle:           {}", file_path.display());
    println!("Identifier:       {identifier}");
    println!("Encrypted length: {physical_len}");
    println!("Decrypted length: {}", schedule.logical_len);
    println!(
        "Copy events:      {} ({} key-sourced)",
        schedule.events.len(),
        key_events
    );
    println!("Fragment lengths: {min_fragment}..{max_fragment}");

    Ok(())
}
