//! # cinescout
//!
//! A movie-review agent: search a movie catalog, scrape professional review
//! text, summarize it with a locally hosted LLM, index it for semantic
//! question answering, and publish artifacts to content-addressed storage.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌───────────┐   ┌────────────┐
//! │ Catalog  │──▶│ Scraper │──▶│ Summarize │──▶│  Storage    │
//! │ search   │   │         │   │ (Ollama)  │   │  bridge     │
//! └──────────┘   └────┬────┘   └───────────┘   └────────────┘
//!                     │
//!                     ▼
//!               ┌───────────┐   ┌───────────┐
//!               │ Chunk +   │──▶│ Flat idx  │──▶ ask (Q&A)
//!               │ embed     │   │ (L2 NN)   │
//!               └───────────┘   └───────────┘
//! ```
//!
//! Every flow is a linear chain triggered by one user action, driven either
//! by the `cine` CLI or the JSON HTTP server.
//!
//! ## Quick Start
//!
//! ```bash
//! cine search "blade runner"            # find candidate movies
//! cine summarize 123456                 # scrape + summarize reviews
//! cine summarize 123456 --upload --index
//! cine ask "what do critics praise?"    # Q&A over indexed reviews
//! cine index push                       # publish the index file
//! cine serve                            # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`search`] | Movie catalog search client |
//! | [`scrape`] | Review-page scraper |
//! | [`llm`] | Local LLM client (summaries, answers) |
//! | [`chunk`] | Overlapping character chunker |
//! | [`embedding`] | Embedding client and vector helpers |
//! | [`index`] | Flat nearest-neighbor index with file persistence |
//! | [`session`] | Explicit session state (clients + index + chunk store) |
//! | [`storage`] | Content-addressed upload client |
//! | [`pipeline`] | CLI flow orchestration |
//! | [`server`] | JSON HTTP API |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod scrape;
pub mod search;
pub mod server;
pub mod session;
pub mod storage;
