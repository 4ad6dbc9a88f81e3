//! Decryption of shuffled asset bundles: a keyed byte-reordering scheme in
//! which the payload plus a secret key fragment was fragmented and permuted
//! into a shuffled physical layout. This crate re-derives the fragment
//! schedule from the asset identifier, the encrypted length and the key
//! fragment, and exposes the decrypted bytes as a seekable read-only stream.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

pub mod crc32;
mod decrypt_stream;
mod error;
mod key_fragment;
mod schedule;

pub use crate::{
    decrypt_stream::DecryptStream,
    error::{CryptError, Result},
    key_fragment::KeyFragment,
    schedule::{CopyEvent, IDENTIFIER_LEN, MAX_STEPS, Schedule},
};

const BUFFER_SIZE: usize = 8 * 1024 * 1024; // 8 MB

pub type DecryptedBundle = Arc<BundleData>;

/// A fully decrypted bundle, memory-mapped in the large case.
#[derive(Debug)]
pub enum BundleData {
    Big(Mmap),
    Small(Vec<u8>),
}

impl Deref for BundleData {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        match self {
            BundleData::Big(mmap) => mmap,
            BundleData::Small(vec) => vec,
        }
    }
}

/// Opens a bundle file as a decrypt stream, deriving the identifier from the
/// file stem (bundles are stored under their asset id).
pub fn open_bundle(path: &Path, key: KeyFragment) -> Result<DecryptStream<BufReader<File>>> {
    let identifier = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or(CryptError::EmptyIdentifier)?
        .to_owned();
    let file = File::open(path)?;
    let physical_len = file.metadata()?.len();
    let reader = BufReader::with_capacity(BUFFER_SIZE, file);
    DecryptStream::new(reader, &identifier, key, physical_len)
}

/// Streams the decrypted bundle into `output` without materializing it.
/// Returns the number of bytes written.
pub fn decrypt_to_file(
    input: &Path,
    output: &Path,
    identifier: &str,
    key: KeyFragment,
) -> Result<u64> {
    let file = File::open(input)?;
    let physical_len = file.metadata()?.len();
    let reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut stream = DecryptStream::new(reader, identifier, key, physical_len)?;

    let output_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(output)?;
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, output_file);

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut written: u64 = 0;
    loop {
        let read = stream.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read])?;
        written += read as u64;
    }
    writer.flush()?;

    Ok(written)
}

/// Decrypts the whole bundle into memory.
pub fn decrypt_ram(input: &Path, identifier: &str, key: KeyFragment) -> Result<Vec<u8>> {
    let file = File::open(input)?;
    let physical_len = file.metadata()?.len();
    let reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut stream = DecryptStream::new(reader, identifier, key, physical_len)?;
    Ok(stream.read_all()?)
}

/// Decrypts a bundle the way batch consumers want it: small bundles land in
/// RAM, large ones go through a file in `tmp_folder` that is then
/// memory-mapped.
pub fn decrypt_bundle(
    input: &Path,
    tmp_folder: &Path,
    identifier: &str,
    key: KeyFragment,
    size_threshold: usize,
) -> Result<DecryptedBundle> {
    let physical_len = fs::metadata(input)?.len();

    if physical_len as usize >= size_threshold {
        let file_name = input.file_name().ok_or_else(|| {
            CryptError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "bundle path has no file name",
            ))
        })?;
        let tmp_path = tmp_folder.join(file_name);

        decrypt_to_file(input, &tmp_path, identifier, key)?;

        let file = File::open(&tmp_path)?;
        Ok(Arc::new(BundleData::Big(unsafe { Mmap::map(&file)? })))
    } else {
        Ok(Arc::new(BundleData::Small(decrypt_ram(
            input, identifier, key,
        )?)))
    }
}
