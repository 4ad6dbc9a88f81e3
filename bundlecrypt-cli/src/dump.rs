use crossbeam::channel;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use walkdir::WalkDir;

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufRead, BufReader},
    path::PathBuf,
    process::exit,
    thread,
    time::Instant,
};

use bundlecrypt_core::{CryptError, KeyFragment};

use crate::{DumpArgs, GB, MB, memory_budget::MemoryBudget};

pub fn dump(args: DumpArgs) -> std::io::Result<()> {
    let folder_path = args.input_folder.trim_matches('"').trim_end_matches('\\');

    let bundle_folder = PathBuf::from(folder_path);

    if !bundle_folder.exists() {
        eprintln!("Error: The path {} does not exist.", bundle_folder.display());
        exit(1);
    }

    println!("Scanning bundle folder: {}", bundle_folder.display());

    let keys = load_key_list(&args.keys_file)?;
    let rules = load_rules(&args.rules_file);

    // A bundle is selected when its file stem has an entry in the key list
    // and, if a rules file was given, some rule matches the identifier
    let mut files_to_process: Vec<(PathBuf, String, KeyFragment)> = Vec::new();
    for entry in WalkDir::new(&bundle_folder)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
    {
        let Some(identifier) = entry.path().file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let Some(key) = keys.get(identifier) else {
            continue;
        };
        if !rules.is_empty() && !rules.iter().any(|rule| rule.is_match(identifier)) {
            continue;
        }
        files_to_process.push((entry.path().to_path_buf(), identifier.to_owned(), key.clone()));
    }

    if files_to_process.is_empty() {
        println!("No bundles matched the key list.");
        return Ok(());
    }

    // We sort the work by biggest files first
    files_to_process.sort_by_key(|(path, _, _)| fs::metadata(path).map(|m| m.len()).unwrap_or(0));
    files_to_process.reverse();

    let total_files = files_to_process.len() as u64;
    let total_file_size: u64 = files_to_process
        .iter()
        .map(|(path, _, _)| fs::metadata(path).map(|m| m.len()).unwrap_or(0))
        .sum();

    println!(
        "Found {} bundles ({:.2} GiB) to decrypt. Starting decryption...\n",
        total_files,
        total_file_size as f64 / GB as f64
    );

    // We compute the number of threads allocated to the program

    let max_threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(8);

    let threads_in_use = if args.threads < 1 || args.threads > max_threads {
        max_threads
    } else {
        args.threads
    };

    // We compute the memory limits based on the memory allocated to the program

    let system = System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
    );

    let available_memory = system.available_memory() as usize;

    let memory = if args.memory == 0.0 || args.memory * GB as f64 > available_memory as f64 {
        available_memory
    } else {
        (args.memory * GB as f64) as usize
    };

    // Below the threshold a bundle is decrypted in RAM and written in one
    // pass; above it the decryption is streamed straight to the output file
    let size_threshold = memory / threads_in_use / 2;
    let memory_budget = MemoryBudget::new(memory);

    println!(
        "Memory allocated: {:.2} GiB - In-RAM decryption threshold: {} MiB",
        memory as f64 / GB as f64,
        size_threshold / MB,
    );
    println!("Decryption threads: {}\n", threads_in_use);

    fs::create_dir_all(&args.output_folder)?;

    let start_time = Instant::now();

    let pb = ProgressBar::new(total_file_size);
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.green} Decrypting bundles [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    )
    .unwrap()
    .progress_chars("#>-"));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let (res_tx, res_rx) = channel::unbounded::<(String, Result<u64, CryptError>)>();

    let mut handles = Vec::with_capacity(threads_in_use);

    for i in 0..threads_in_use {
        let tx = res_tx.clone();
        let files = files_to_process.clone();
        let output_folder = args.output_folder.clone();
        let pb = pb.clone();
        let memory_budget = memory_budget.clone();

        handles.push(thread::spawn(move || {
            for (path, identifier, key) in files.iter().skip(i).step_by(threads_in_use) {
                let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0) as usize;
                let output_path = output_folder.join(path.file_name().unwrap());

                let result = if file_size < size_threshold {
                    memory_budget.acquire(file_size);
                    let result = bundlecrypt_core::decrypt_ram(path, identifier, key.clone())
                        .and_then(|data| {
                            fs::write(&output_path, &data)?;
                            Ok(data.len() as u64)
                        });
                    memory_budget.release(file_size);
                    result
                } else {
                    bundlecrypt_core::decrypt_to_file(path, &output_path, identifier, key.clone())
                };

                pb.inc(file_size as u64);

                if tx.send((identifier.clone(), result)).is_err() {
                    break;
                }
            }
        }));
    }

    drop(res_tx);

    let mut decrypted_files = 0u64;
    let mut decrypted_bytes = 0u64;
    let mut failures = Vec::new();

    for (identifier, result) in res_rx.iter() {
        match result {
            Ok(written) => {
                decrypted_files += 1;
                decrypted_bytes += written;
            }
            Err(err) => failures.push((identifier, err)),
        }
    }

    for handle in handles {
        handle.join().unwrap();
    }

    pb.finish();

    let duration = start_time.elapsed();

    println!("\n--- Decryption Summary ---");
    println!("Total time: {:.2?}", duration);
    println!(
        "Decrypted {} / {} bundles ({:.2} GiB written)",
        decrypted_files,
        total_files,
        decrypted_bytes as f64 / GB as f64
    );

    for (identifier, err) in &failures {
        eprintln!("Failed to decrypt {identifier}: {err}");
    }

    Ok(())
}

fn load_key_list(path: &str) -> std::io::Result<HashMap<String, KeyFragment>> {
    let path = PathBuf::from(path.trim_matches('"').trim_end_matches('\\'));
    let file = File::open(&path)?;

    let mut keys = HashMap::new();
    for line in BufReader::new(file).lines().map_while(Result::ok) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(identifier), Some(key_text)) = (parts.next(), parts.next()) else {
            eprintln!("Malformed key list line, ignoring: {line}");
            continue;
        };

        match KeyFragment::from_base64(key_text) {
            Ok(key) => {
                keys.insert(identifier.to_owned(), key);
            }
            Err(err) => eprintln!("Invalid key for {identifier}, ignoring it: {err}"),
        }
    }

    Ok(keys)
}

fn load_rules(path: &str) -> Vec<Regex> {
    if path.is_empty() {
        return Vec::new();
    }

    let Ok(file) = File::open(path.trim_matches('"').trim_end_matches('\\')) else {
        eprintln!("Unable to open rules file {path}, ignoring it...");
        return Vec::new();
    };

    BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match Regex::new(line.trim()) {
            Ok(rule) => Some(rule),
            Err(_) => {
                eprintln!("Invalid regex {line}, ignoring it...");
                None
            }
        })
        .collect()
}
