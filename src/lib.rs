//! # Legal RAG
//!
//! Retrieval-augmented question answering over a folder of legal documents.
//!
//! Documents are extracted, split into overlapping word windows, embedded
//! through a remote embedding model and stored in an exact nearest-neighbour
//! index. At query time the closest chunks become the context of a
//! chat-completion call that answers with citations.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌─────────────┐
//! │ PDFs/TXT  │──▶│ Extract+Chunk │──▶│ Embed+Index │──▶ vectors.bin
//! │ documents │   │              │   │             │    chunks.json
//! └───────────┘   └──────────────┘   └─────────────┘
//!                                            │
//!                        ┌───────────────────┤
//!                        ▼                   ▼
//!                   ┌──────────┐       ┌──────────┐
//!                   │   CLI    │       │   HTTP   │
//!                   │  (lrag)  │       │  /ask    │
//!                   └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lrag build                        # extract, chunk, embed, save index
//! lrag search "data subject rights"
//! lrag ask "When is consent required?" --k 5
//! lrag serve                        # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF / text extraction and whitespace normalization |
//! | [`corpus`] | Document discovery |
//! | [`chunk`] | Fixed-window word chunking |
//! | [`embedding`] | Embedding client and batching |
//! | [`index`] | Exact squared-L2 vector index |
//! | [`store`] | Snapshot save / load |
//! | [`generation`] | Chat-completion client |
//! | [`retriever`] | Search, context assembly, answer generation |
//! | [`cost`] | Token cost estimates |
//! | [`ingest`] | Build pipeline |
//! | [`progress`] | Build progress reporting |
//! | [`server`] | HTTP server |

pub mod ask_cmd;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod cost;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod retriever;
pub mod server;
pub mod stats;
pub mod store;
