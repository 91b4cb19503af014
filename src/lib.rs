//! # Docs MCP Server
//!
//! A Model Context Protocol server that indexes one documentation site (Composio, Reflex or
//! any configured profile) and serves semantic search and request-aware context to an LLM.
//!
//! ## Features
//!
//! - Crawl a documentation site or a local folder into overlapping token chunks
//! - Persist embedded chunks in a directory-backed vector store
//! - Classify requests by domain and inject matching documentation as prompt context
//! - Check generated code for APIs the documentation does not mention
//!
//! ## Modules
//!
//! - `server`: MCP server implementation and tools
//! - `builder`: corpus building from pages or local files
//! - `storage`: corpus persistence and nearest-neighbour lookup
//! - `retriever`, `intent`, `coordinator`: search and request routing

/// Server implementation and MCP tools
pub mod server;
/// Corpus persistence and vector search
pub mod storage;
/// Page extraction and local file scanning
pub mod document;
/// Crawl, chunk and embed pipeline
pub mod builder;
pub mod chunker;
pub mod config;
pub mod coordinator;
pub mod embedding;
pub mod error;
pub mod fetch;
/// Editor host config emission
pub mod hostconfig;
pub mod intent;
pub mod retriever;
