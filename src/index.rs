//! Flat nearest-neighbor similarity index.
//!
//! An append-only list of fixed-dimension vectors searched by brute-force
//! squared L2 distance. The index is never deduplicated or evicted; it grows
//! for the life of the process and is overwritten wholesale on save.
//!
//! # File format
//!
//! A single flat file:
//!
//! ```text
//! magic   4 bytes   b"CSIX"
//! version u32 LE    1
//! dims    u32 LE
//! count   u32 LE
//! data    count × dims × 4 bytes of packed little-endian f32
//! ```

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::embedding::{blob_to_vec, l2_distance, vec_to_blob};

const MAGIC: &[u8; 4] = b"CSIX";
const VERSION: u32 = 1;

/// A nearest-neighbor hit: index position and squared L2 distance.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub position: usize,
    pub distance: f32,
}

#[derive(Debug)]
pub struct FlatIndex {
    dims: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            vectors: Vec::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append vectors to the index. Returns the position of the first
    /// appended vector, so callers can pair positions with stored text.
    pub fn add(&mut self, vectors: Vec<Vec<f32>>) -> Result<usize> {
        for vec in &vectors {
            if vec.len() != self.dims {
                bail!(
                    "Cannot add vector of dimension {} to index of dimension {}",
                    vec.len(),
                    self.dims
                );
            }
        }
        let first = self.vectors.len();
        self.vectors.extend(vectors);
        Ok(first)
    }

    /// Brute-force k-nearest-neighbor search by ascending squared L2
    /// distance. Ties keep insertion order. Mismatched-dimension entries
    /// rank at infinite distance and are dropped.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Hit> {
        let mut hits: Vec<Hit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, v)| Hit {
                position,
                distance: l2_distance(query, v),
            })
            .filter(|hit| hit.distance.is_finite())
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.position.cmp(&b.position))
        });
        hits.truncate(k);
        hits
    }

    /// Write the whole index to `path`, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut bytes = Vec::with_capacity(16 + self.vectors.len() * self.dims * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dims as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.vectors.len() as u32).to_le_bytes());
        for vec in &self.vectors {
            bytes.extend_from_slice(&vec_to_blob(vec));
        }

        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write index file: {}", path.display()))?;
        Ok(())
    }

    /// Read an index back from a file written by [`FlatIndex::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read index file: {}", path.display()))?;

        if bytes.len() < 16 || &bytes[0..4] != MAGIC {
            bail!("Not an index file: {}", path.display());
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != VERSION {
            bail!("Unsupported index file version: {}", version);
        }

        let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let count = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;

        if dims == 0 {
            bail!("Index file declares zero dimensions: {}", path.display());
        }

        let expected = 16 + count * dims * 4;
        if bytes.len() != expected {
            bail!(
                "Index file is truncated: expected {} bytes, found {}",
                expected,
                bytes.len()
            );
        }

        let vectors = bytes[16..]
            .chunks_exact(dims * 4)
            .map(blob_to_vec)
            .collect();

        Ok(Self { dims, vectors })
    }

    /// Load the index at `path` if it exists, else an empty index of the
    /// given dimensionality.
    pub fn load_or_empty(path: &Path, dims: usize) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new(dims))
        }
    }
}

pub fn run_info(config: &Config) -> Result<()> {
    let path = &config.index.path;
    if !path.exists() {
        println!("index {}", path.display());
        println!("  not found (nothing ingested yet)");
        return Ok(());
    }

    let index = FlatIndex::load(path)?;
    println!("index {}", path.display());
    println!("  dims: {}", index.dims());
    println!("  vectors: {}", index.len());
    Ok(())
}
