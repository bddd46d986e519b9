//! Places every chapter in the merged document and derives its page labels and bookmarks.

use crate::chapter::{ChapterRecord, ChapterStore};
use crate::error::{Error, Result};
use crate::page_range::NumberingScheme;
use crate::pdf::{self, ChapterPages};

/// Page counts differing by more than this from the printed range are reported.
pub const PAGE_MISMATCH_WARN_THRESHOLD: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Decimal,
    LowercaseRoman,
}

impl TryFrom<NumberingScheme> for LabelStyle {
    type Error = NumberingScheme;

    fn try_from(scheme: NumberingScheme) -> Result<Self, Self::Error> {
        match scheme {
            NumberingScheme::Arabic => Ok(Self::Decimal),
            NumberingScheme::Roman => Ok(Self::LowercaseRoman),
            NumberingScheme::None => Err(scheme),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLabelEntry {
    pub start_page_index: usize,
    pub style: LabelStyle,
    pub start_value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    pub page_index: usize,
}

/// Where one chapter landed in the merged document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPlacement {
    pub sequence_index: usize,
    pub first_page_index: usize,
    pub page_count: usize,
    pub label: Option<PageLabelEntry>,
    pub bookmark: Option<OutlineEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub placements: Vec<ChapterPlacement>,
    pub page_labels: Vec<PageLabelEntry>,
    pub outline: Vec<OutlineEntry>,
    pub total_pages: usize,
}

#[derive(Debug, Clone)]
pub struct AssembledDocument {
    pub pdf: Vec<u8>,
    pub layout: Layout,
}

/// How far a chapter PDF's length strays from its printed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthMismatch {
    /// Within [`PAGE_MISMATCH_WARN_THRESHOLD`] pages, e.g. inserted blank pages.
    Minor { difference: usize },
    Wide { difference: usize },
}

/// Records that take part in the merge. Reader-only chapters have no PDF.
pub fn merge_candidates(store: &ChapterStore) -> impl Iterator<Item = &ChapterRecord> {
    store.iter().filter(|record| record.content_link.is_some())
}

/// Folds over the store in order. Offsets use each artifact's real page count.
pub fn plan_layout(store: &ChapterStore) -> Result<Layout> {
    let mut layout = Layout::default();
    let mut page_index = 0_usize;

    for record in store {
        if record.content_link.is_none() {
            tracing::info!(
                title = %record.title,
                "chapter has no PDF; left out of the merged document"
            );
            continue;
        }
        let artifact = record.artifact.as_ref().ok_or_else(|| Error::ArtifactMissing {
            title: record.title.clone(),
        })?;
        report_length_mismatch(record, artifact.page_count);

        let bookmark = (!artifact.has_outline).then(|| OutlineEntry {
            title: record.title.clone(),
            page_index,
        });

        let label = match record.page_range {
            Some(range) => {
                let style = LabelStyle::try_from(range.scheme).map_err(|_| {
                    Error::UnsupportedNumberingScheme {
                        title: record.title.clone(),
                    }
                })?;
                Some(PageLabelEntry {
                    start_page_index: page_index,
                    style,
                    start_value: range.first,
                })
            }
            None => None,
        };

        // Empty artifacts occupy no pages, so they cannot start a label range.
        let label = label.filter(|_| artifact.page_count > 0);

        if let Some(label) = label {
            layout.page_labels.push(label);
        }
        if let Some(bookmark) = &bookmark {
            layout.outline.push(bookmark.clone());
        }
        layout.placements.push(ChapterPlacement {
            sequence_index: record.sequence_index(),
            first_page_index: page_index,
            page_count: artifact.page_count,
            label,
            bookmark,
        });

        page_index += artifact.page_count;
    }

    layout.total_pages = page_index;
    Ok(layout)
}

/// Merges every chapter PDF into one document following [`plan_layout`].
pub fn assemble(store: &ChapterStore) -> Result<AssembledDocument> {
    let layout = plan_layout(store)?;
    tracing::info!(
        chapters = layout.placements.len(),
        pages = layout.total_pages,
        labels = layout.page_labels.len(),
        bookmarks = layout.outline.len(),
        "merge chapter PDFs"
    );

    let chapters = merge_candidates(store)
        .zip(&layout.placements)
        .map(|(record, placement)| {
            let artifact = record.artifact.as_ref().ok_or_else(|| Error::ArtifactMissing {
                title: record.title.clone(),
            })?;
            Ok(ChapterPages {
                title: &record.title,
                bytes: &artifact.bytes,
                placement,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let pdf = pdf::merge(&chapters)?;
    Ok(AssembledDocument { pdf, layout })
}

/// `None` when the lengths agree or the chapter has no numbered range.
pub fn classify_length_mismatch(
    record: &ChapterRecord,
    artifact_pages: usize,
) -> Option<LengthMismatch> {
    let nominal = record.nominal_page_count()? as usize;
    let difference = nominal.abs_diff(artifact_pages);
    match difference {
        0 => None,
        d if d > PAGE_MISMATCH_WARN_THRESHOLD => Some(LengthMismatch::Wide { difference }),
        _ => Some(LengthMismatch::Minor { difference }),
    }
}

fn report_length_mismatch(record: &ChapterRecord, artifact_pages: usize) {
    let printed = record.nominal_page_count();
    match classify_length_mismatch(record, artifact_pages) {
        None => {}
        Some(LengthMismatch::Wide { difference }) => tracing::warn!(
            title = %record.title,
            ?printed,
            actual = artifact_pages,
            difference,
            "chapter PDF length differs widely from its printed range"
        ),
        Some(LengthMismatch::Minor { difference }) => tracing::debug!(
            title = %record.title,
            ?printed,
            actual = artifact_pages,
            difference,
            "chapter PDF has unlabelled extra pages"
        ),
    }
}
