//! Sidecar `metadata.json` records kept next to season and show folders.
use serde::Deserialize;


/// A previous/next pair of curated links.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkPair {
    /// At least one side is set.
    Present {
        previous: Option<String>,
        next: Option<String>,
    },
    #[default]
    Absent,
}

impl LinkPair {
    fn new(previous: Option<String>, next: Option<String>) -> Self {
        if previous.is_none() && next.is_none() {
            LinkPair::Absent
        } else {
            LinkPair::Present { previous, next }
        }
    }
}


#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FolderFields {
    previous_season: Option<String>,
    next_season: Option<String>,
    previous_cour: Option<String>,
    next_cour: Option<String>,
    previous_split_cour: Option<String>,
    next_split_cour: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    #[serde(default)]
    folder_metadata: FolderFields,
    #[serde(default)]
    add_songs: Vec<String>,
}


/// Manually curated navigation for a folder.
///
/// Link values and `add_songs` entries are paths relative to the index root.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "RawMetadata")]
pub struct SidecarMetadata {
    pub season: LinkPair,
    pub cour: LinkPair,
    pub split_cour: LinkPair,
    pub add_songs: Vec<String>,
}

impl From<RawMetadata> for SidecarMetadata {
    fn from(raw: RawMetadata) -> Self {
        let folder = raw.folder_metadata;
        Self {
            season: LinkPair::new(folder.previous_season, folder.next_season),
            cour: LinkPair::new(folder.previous_cour, folder.next_cour),
            split_cour: LinkPair::new(folder.previous_split_cour, folder.next_split_cour),
            add_songs: raw.add_songs,
        }
    }
}

impl SidecarMetadata {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// `{index}/{season}[/{show}]/metadata.json`
pub fn metadata_key(index: &str, season: &str, show: Option<&str>) -> String {
    match show {
        Some(show) => format!("{}/{}/{}/metadata.json", index, season, show),
        None => format!("{}/{}/metadata.json", index, season),
    }
}
