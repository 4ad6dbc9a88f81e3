use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::{CryptError, Result};

/// The secret byte run stripped from the tail of a bundle's shuffled layout
/// at encode time. Small enough to keep in memory; reads that resolve past
/// the end of the physical source are served from it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFragment(Vec<u8>);

impl KeyFragment {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CryptError::EmptyKeyFragment);
        }
        Ok(KeyFragment(bytes))
    }

    /// Keys travel as base64 text; decoding is a transport adapter, the
    /// schedule itself only ever sees the raw bytes.
    pub fn from_base64(text: &str) -> Result<Self> {
        Self::from_bytes(STANDARD.decode(text.trim())?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
