//! Parameter file cache.
//!
//! The parameter files are the same for every client, so they are read,
//! checksummed and chunked once at startup and shared read-only afterwards.

use anyhow::{Context, Result};
use std::path::Path;

use super::CharacterError;
use crate::protocol::records::ParameterEntry;
use crate::protocol::{chunk_at, chunk_count, compute_crc32, copy_ascii};

pub struct ParameterCache {
    entries: Vec<ParameterEntry>,
    /// Directory entries as sent in the header packet.
    header: Vec<u8>,
    /// All files concatenated in directory order.
    data: Vec<u8>,
}

impl ParameterCache {
    /// Reads each of `files` from `dir`, in order.
    pub fn load<P: AsRef<Path>>(dir: P, files: &[String]) -> Result<Self> {
        let dir = dir.as_ref();
        let mut loaded = Vec::with_capacity(files.len());
        for name in files {
            let path = dir.join(name);
            let data = std::fs::read(&path)
                .with_context(|| format!("Failed to read parameter file: {}", path.display()))?;
            loaded.push((name.clone(), data));
        }
        let cache = Self::from_files(&loaded);
        tracing::info!(
            "[char] [params] loaded files={} bytes={} chunks={}",
            cache.file_count(),
            cache.data.len(),
            cache.chunk_count()
        );
        Ok(cache)
    }

    /// Builds the cache from already loaded `(name, contents)` pairs.
    pub fn from_files(files: &[(String, Vec<u8>)]) -> Self {
        let mut entries = Vec::with_capacity(files.len());
        let mut data = Vec::new();
        for (name, contents) in files {
            let mut entry = ParameterEntry {
                size: contents.len() as u32,
                checksum: compute_crc32(contents),
                offset: data.len() as u32,
                filename: [0; 0x40],
            };
            copy_ascii(&mut entry.filename, name);
            entries.push(entry);
            data.extend_from_slice(contents);
        }
        let header = bytemuck::cast_slice(&entries).to_vec();
        Self { entries, header, data }
    }

    pub fn file_count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn entries(&self) -> &[ParameterEntry] {
        &self.entries
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn chunk_count(&self) -> usize {
        chunk_count(self.data.len())
    }

    pub fn chunk(&self, index: u32) -> Result<&[u8], CharacterError> {
        chunk_at(&self.data, index).ok_or(CharacterError::ChunkOutOfRange {
            index,
            count: self.chunk_count(),
        })
    }
}
