use std::path::PathBuf;

use clap::Parser;

/// Download every chapter of a book by DOI and merge them into one PDF.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Book DOI, e.g. `10.1017/9781108123456`. Prompted for when omitted.
    pub doi: Option<String>,

    /// Directory the book directory is created under.
    #[arg(long, default_value = "output")]
    pub out: PathBuf,

    /// Also build an EPUB from the chapters' HTML reader pages.
    #[arg(short, long)]
    pub epub: bool,
}
