//! Core data models used throughout cinescout.
//!
//! These types represent the movie records, text chunks, and upload receipts
//! that flow through the scraping, indexing, and publishing pipeline.

use serde::Serialize;

/// A movie record returned by the catalog search.
///
/// Sourced externally and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct MovieRecord {
    pub id: String,
    pub title: String,
    pub year: Option<String>,
    pub country: Option<String>,
}

/// A chunk of review text produced by the chunker.
#[derive(Debug, Clone)]
pub struct ChunkText {
    pub index: usize,
    pub text: String,
    pub hash: String,
}

/// Text stored alongside an index position, used to rebuild answer context.
///
/// Held in memory only; vectors loaded from a persisted index file have no
/// stored chunk and are skipped during context assembly.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub source_url: String,
    pub text: String,
}

/// Successful outcome of a content-addressed upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    /// Root content identifier of the uploaded payload.
    pub cid: String,
    /// Gateway URL where the content resolves.
    pub url: String,
    /// Name the payload was packaged under.
    pub filename: String,
}
