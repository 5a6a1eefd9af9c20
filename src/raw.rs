//! Raw value buffers.
//!
//! A [`RawValue`] is the immutable byte buffer a decoder works on. It is
//! either copied out of a registry value or memory-mapped from a value
//! dump on disk (for example a `.bin` export of an `AppCompatCache`
//! value).

use crate::error::Result;
use memmap2::Mmap;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use tracing::{debug, instrument};

/// Immutable value data handed to a decoder.
pub struct RawValue {
    data: RawData,
}

enum RawData {
    /// Memory-mapped value dump.
    Mapped(Mmap),
    /// Owned bytes.
    Owned(Vec<u8>),
}

impl RawValue {
    /// Memory-maps a value dump file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or mapped.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len();

        // Zero-length files cannot be mapped on every platform
        if len == 0 {
            debug!("Value dump is empty");
            return Ok(Self::from_vec(Vec::new()));
        }

        // SAFETY: This is safe because:
        // 1. The file is opened read-only and the map is never written
        // 2. The map lives exactly as long as this RawValue
        // 3. All reads go through bounds-checked helpers in `utils`
        let mmap = unsafe { Mmap::map(&file)? };
        debug!(size = mmap.len(), "Memory mapped value dump");

        Ok(RawValue {
            data: RawData::Mapped(mmap),
        })
    }

    /// Wraps owned value data.
    pub fn from_vec(data: Vec<u8>) -> Self {
        RawValue {
            data: RawData::Owned(data),
        }
    }

    /// Returns the value data.
    pub fn as_slice(&self) -> &[u8] {
        match &self.data {
            RawData::Mapped(mmap) => mmap,
            RawData::Owned(data) => data,
        }
    }

    /// Returns the length of the value data.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns true if the value holds no data.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Deref for RawValue {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl std::fmt::Debug for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.data {
            RawData::Mapped(_) => "mapped",
            RawData::Owned(_) => "owned",
        };
        f.debug_struct("RawValue")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}
