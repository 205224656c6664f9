//! Idempotent, chunked ingestion of pipe-delimited transaction files into a transaction store,
//! plus paged read and description update over the stored records.

pub mod config;
pub mod engine;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod storage;
pub mod types;
