use std::path::PathBuf;

use thiserror::Error;

use crate::page_range::MalformedPageRange;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the download pipeline.
///
/// None of these are recovered locally; they propagate to the run boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("GET {url} returned HTTP {status}")]
    Network { url: String, status: u16 },

    #[error("GET {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("required book metadata is missing: {what}")]
    MetadataMissing { what: &'static str },

    #[error("cannot infer page numbering for chapter {title:?}")]
    Pagination {
        title: String,
        #[source]
        source: MalformedPageRange,
    },

    #[error("chapter {title:?} has a page range without a usable numbering scheme")]
    UnsupportedNumberingScheme { title: String },

    #[error("chapter {title:?} has no fetched artifact")]
    ArtifactMissing { title: String },

    #[error("chapter {title:?} is not a readable PDF")]
    MalformedArtifact {
        title: String,
        #[source]
        source: lopdf::Error,
    },

    #[error("chapter {title:?} was planned with {expected} pages but has {actual}")]
    PageCountMismatch {
        title: String,
        expected: usize,
        actual: usize,
    },

    #[error("build merged PDF")]
    Merge(#[source] lopdf::Error),

    #[error("output path already exists: {}", path.display())]
    OutputExists { path: PathBuf },

    #[error("filesystem error at {}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }
}
