use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use crate::chapter::ChapterRecord;
use crate::error::{Error, Result};
use crate::formats::ChapterManifestRecord;

pub fn manifest_record(
    record: &ChapterRecord,
    artifact_path: Option<String>,
) -> ChapterManifestRecord {
    ChapterManifestRecord {
        sequence_index: record.sequence_index(),
        title: record.title.clone(),
        content_link: record.content_link.clone(),
        alternate_content_link: record.alternate_content_link.clone(),
        page_range_raw: record.page_range_raw.clone(),
        first_page: record.page_range.map(|range| range.first),
        last_page: record.page_range.map(|range| range.last),
        numbering_scheme: record.numbering_scheme(),
        nominal_page_count: record.nominal_page_count(),
        artifact_page_count: record.artifact.as_ref().map(|artifact| artifact.page_count),
        nesting_depth: record.nesting_depth,
        artifact_path,
    }
}

/// Writes one JSON object per line. The file must not exist yet.
pub fn write(path: &Path, records: &[ChapterManifestRecord]) -> Result<()> {
    let mut out = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::AlreadyExists => Error::OutputExists {
                path: path.to_path_buf(),
            },
            _ => Error::fs(path, err),
        })?;
    for record in records {
        serde_json::to_writer(&mut out, record).map_err(|err| Error::fs(path, err.into()))?;
        out.write_all(b"\n").map_err(|err| Error::fs(path, err))?;
    }
    out.flush().map_err(|err| Error::fs(path, err))?;

    tracing::info!(path = %path.display(), chapters = records.len(), "wrote chapter manifest");
    Ok(())
}
