#![forbid(unsafe_code)]

pub mod assemble;
pub mod chapter;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod directory;
pub mod download;
pub mod epub;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod logging;
pub mod manifest;
pub mod output;
pub mod page_range;
pub mod pdf;

pub use error::{Error, Result};
