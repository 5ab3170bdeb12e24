//! # medrag — Evidence-based medical QA assistant
//!
//! Retrieval-augmented question answering over a local library of medical
//! textbooks. Markdown books are chunked with their heading context,
//! embedded and stored in SQLite; questions are answered by a bounded
//! reasoning loop that searches the library through multi-query recall and
//! cross-encoder reranking.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, defaults and validation
//! - **[`db`]** — SQLite + sqlite-vec knowledge store (chunks, vectors, ingest state)
//! - **[`ollama`]** — Blocking HTTP client for the Ollama model service
//! - **[`embedder`]** — Text embedding (Ollama `/api/embeddings`)
//! - **[`llm`]** — Chat completion (Ollama `/api/chat`)
//! - **[`rerank`]** — ONNX cross-encoder reranker with HuggingFace download
//! - **[`indexer`]** — Markdown cleanup, heading-aware chunking, ingestion
//! - **[`search`]** — Query expansion, multi-recall, rerank and thresholding
//! - **[`agent`]** — Reasoning loop, reply decoder and session history
//! - **[`app`]** — Component wiring
//! - **[`mcp`]** — MCP server with 6 tool handlers (stdio transport via rmcp)

pub mod agent;
pub mod app;
pub mod config;
pub mod db;
pub mod embedder;
pub mod indexer;
pub mod llm;
pub mod mcp;
pub mod ollama;
pub mod rerank;
pub mod search;
