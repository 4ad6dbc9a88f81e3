use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{CryptError, Result};
use crate::key_fragment::KeyFragment;
use crate::schedule::Schedule;

/// Read-only, seekable view of a shuffled bundle.
///
/// Wraps the physical source and answers reads in decrypted byte order by
/// resolving each request through the copy-event schedule: runs that live in
/// the physical source are fetched with a seek + read, runs that live in the
/// key fragment are copied straight out of memory. The schedule is derived
/// once at construction; reads and seeks never touch the generator again.
///
/// One consumer at a time: the cursor here and the cursor of the underlying
/// source are shared, unsynchronized state. A stream abandoned mid-read
/// (e.g. after a caller-side timeout) must not be resumed.
#[derive(Debug)]
pub struct DecryptStream<R> {
    source: R,
    key: KeyFragment,
    schedule: Schedule,
    position: i64,
    length: i64,
}

impl<R: Read + Seek> DecryptStream<R> {
    /// Derives the schedule for `identifier` and wraps `source`.
    ///
    /// `physical_len` is the exact byte length of the encrypted source,
    /// excluding the key fragment.
    pub fn new(source: R, identifier: &str, key: KeyFragment, physical_len: u64) -> Result<Self> {
        let schedule = Schedule::build(identifier.as_bytes(), physical_len, key.as_bytes())?;
        let length = schedule.logical_len;
        Ok(DecryptStream {
            source,
            key,
            schedule,
            position: 0,
            length,
        })
    }

    /// Fixed decrypted length: physical length plus key fragment length.
    pub fn len(&self) -> i64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current read cursor. Any value may be set; reads outside `[0, len)`
    /// return no bytes rather than erroring.
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Single-byte read; `None` at end of stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Decrypts the whole stream in one allocation.
    ///
    /// Meant for small payloads; large bundles should be read incrementally
    /// or through `decrypt_to_file`.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        self.position = 0;
        let mut data = vec![0u8; self.length as usize];
        let mut filled = 0;
        while filled < data.len() {
            let read = self.read(&mut data[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        data.truncate(filled);
        Ok(data)
    }
}

impl<R: Read + Seek> Read for DecryptStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position < 0 || self.position >= self.length {
            return Ok(0);
        }
        let available = (self.length - self.position).min(buf.len() as i64) as usize;
        let mut filled = 0;

        while filled < available {
            let index = match self.schedule.locate(self.position) {
                Some(index) => index,
                None => break,
            };
            let event = self.schedule.events[index];
            let within = (self.position - event.dest_offset as i64) as u32;
            let block = ((event.length - within) as usize).min(available - filled);
            let source_offset = (event.source_offset + within) as u64;
            let chunk = &mut buf[filled..filled + block];

            if event.source_is_key {
                copy_from_key(self.key.as_bytes(), source_offset as usize, chunk);
            } else {
                self.source
                    .seek(SeekFrom::Start(source_offset))
                    .and_then(|_| self.source.read_exact(chunk))
                    .map_err(source_read_error)?;
            }

            filled += block;
            self.position += block as i64;
        }

        Ok(filled)
    }
}

impl<R: Read + Seek> Seek for DecryptStream<R> {
    /// Cursor arithmetic only; no I/O happens until the next read.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).ok(),
            SeekFrom::Current(delta) => self.position.checked_add(delta),
            SeekFrom::End(delta) => self.length.checked_add(delta),
        };
        match target {
            Some(target) if target >= 0 => {
                self.position = target;
                Ok(target as u64)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative position",
            )),
        }
    }
}

/// Key-relative offsets can point past the fragment's end when a run falls in
/// the encoder's sizing margin; those bytes read as zero.
fn copy_from_key(key: &[u8], offset: usize, out: &mut [u8]) {
    let available = key.len().saturating_sub(offset);
    let n = out.len().min(available);
    out[..n].copy_from_slice(&key[offset..offset + n]);
    out[n..].fill(0);
}

fn source_read_error(err: io::Error) -> io::Error {
    let kind = err.kind();
    io::Error::new(kind, CryptError::SourceRead(err))
}
