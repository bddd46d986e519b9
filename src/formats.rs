use serde::{Deserialize, Serialize};

use crate::page_range::NumberingScheme;

/// One line of `chapters.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterManifestRecord {
    pub sequence_index: usize,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_content_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_page: Option<u32>,
    pub numbering_scheme: NumberingScheme,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominal_page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_page_count: Option<usize>,
    pub nesting_depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
}
