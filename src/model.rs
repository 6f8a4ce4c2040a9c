use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A discovered media file and its position in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub ordinal: usize,
    pub path: PathBuf,
}

impl MediaItem {
    pub fn new(ordinal: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            ordinal,
            path: path.into(),
        }
    }

    /// Builds items from an ordered path list, numbering them 0..N.
    pub fn from_paths<I, P>(paths: I) -> Vec<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .enumerate()
            .map(|(ordinal, path)| Self::new(ordinal, path))
            .collect()
    }
}

/// Tags extracted from one probe. Every field is independently optional;
/// an absent field is omitted from the playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    pub duration_millis: Option<u64>,
}

impl TagRecord {
    pub const fn empty() -> Self {
        Self {
            title: None,
            artist: None,
            album: None,
            track_number: None,
            duration_millis: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::empty()
    }
}

static EMPTY_TAGS: TagRecord = TagRecord::empty();

/// Why an item carries no metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    /// Harvesting ran with metadata disabled
    Disabled,
    /// The probe exited with a non-zero status
    ProbeFailed,
    /// The probe did not finish within its deadline and was killed
    TimedOut,
    /// The probe's output could not be parsed
    Malformed,
}

/// Outcome of harvesting one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HarvestOutcome {
    Tagged(TagRecord),
    NoMetadata { reason: MissReason },
}

impl HarvestOutcome {
    pub fn missing(reason: MissReason) -> Self {
        Self::NoMetadata { reason }
    }

    /// Tags to emit for this outcome; empty for the no-metadata marker.
    pub fn tags(&self) -> &TagRecord {
        match self {
            Self::Tagged(tags) => tags,
            Self::NoMetadata { .. } => &EMPTY_TAGS,
        }
    }

    pub fn miss_reason(&self) -> Option<MissReason> {
        match self {
            Self::Tagged(_) => None,
            Self::NoMetadata { reason } => Some(*reason),
        }
    }
}

/// One result per input [`MediaItem`], keyed by its ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestResult {
    pub ordinal: usize,
    pub outcome: HarvestOutcome,
}
