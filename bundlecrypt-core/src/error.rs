use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptError>;

/// Errors raised while building a shuffle schedule or decrypting a bundle.
///
/// Construction-time variants each name the argument that violated the
/// contract; they are raised before any I/O happens. `SourceRead` wraps
/// failures of the underlying physical source and is never retried here.
#[derive(Debug, Error)]
pub enum CryptError {
    #[error("asset identifier must not be empty")]
    EmptyIdentifier,

    #[error("key fragment must not be empty")]
    EmptyKeyFragment,

    #[error("key fragment is not valid base64: {0}")]
    KeyFragmentEncoding(#[from] base64::DecodeError),

    #[error(
        "bundle too large for the shuffle layout: {physical_len} bytes plus a \
         {key_len} byte key fragment exceeds the 32-bit offset space"
    )]
    BundleTooLarge { physical_len: u64, key_len: usize },

    #[error("fragment schedule overflow: more than {max} steps for a {padded_len} byte layout")]
    ScheduleOverflow { max: usize, padded_len: i64 },

    #[error("bundle source read failed: {0}")]
    SourceRead(#[source] io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<CryptError> for io::Error {
    fn from(err: CryptError) -> io::Error {
        match err {
            CryptError::Io(inner) => inner,
            other => {
                let kind = match &other {
                    CryptError::SourceRead(inner) => inner.kind(),
                    _ => io::ErrorKind::InvalidInput,
                };
                io::Error::new(kind, other)
            }
        }
    }
}
