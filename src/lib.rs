//! Fetch web pages, classify and extract structured records, normalise them
//! through a non-fatal transform pipeline, and export or persist the result.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod pagination;
pub mod parser;
pub mod records;
pub mod renderer;
pub mod robots;
pub mod tasks;
pub mod transform;
