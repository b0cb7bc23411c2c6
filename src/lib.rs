//! Google News thumbnails
//!
//! This crate fetches a Google News category feed and enriches each entry with
//! a thumbnail found by opening the article in a headless browser.
//! Results are served over a small JSON API or written to disk from the CLI.

pub mod browser;
pub mod cli;
pub mod config;
pub mod evaluator;
pub mod feed;
pub mod navigator;
pub mod orchestrator;
pub mod pipeline;
pub mod routes;
pub mod session;
pub mod static_page;

#[cfg(test)]
mod scripted;
