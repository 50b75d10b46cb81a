//! Assembles everything a folder listing shows for one request.
use std::sync::LazyLock;

use regex::Regex;

use crate::{
    bucket::{Bucket, BucketError, Listing},
    builder::PlayerConfig,
    folder::{display_entry, group_index, order_entries, DisplayEntry, IndexView},
    metadata::{metadata_key, SidecarMetadata},
    navigation::{overlay_metadata_links, AdjacencyRow, NavigationLinks},
    season::{adjacent_seasons, SeasonId, SeasonWindow},
};


static FOLDER_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w_-]+(?:/(\d{2}-[1-4]))?(?:/([^/]+))?").expect("folder path pattern is valid")
});


/// Season and show segments of a folder path (`root[/YY-Q][/show]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPath {
    pub season: Option<String>,
    pub show: Option<String>,
}

impl FolderPath {
    /// `None` when the path does not start with a plain folder name.
    pub fn parse(path: &str) -> Option<Self> {
        let captures = FOLDER_PATH_RE.captures(path)?;
        Some(Self {
            season: captures.get(1).map(|m| m.as_str().to_string()),
            show: captures.get(2).map(|m| m.as_str().to_string()),
        })
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderBody {
    /// The root index, grouped by year.
    Index(IndexView),
    Entries(Vec<DisplayEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderView {
    /// Path shown above the listing, relative to the index.
    pub name: String,
    pub navigation: NavigationLinks,
    pub body: FolderBody,
}


/// Build the view of folder `path` from its `listing`.
///
/// Storage failures while probing neighbouring seasons or reading sidecar
/// metadata only cost the affected links. Returns `None` when the path does
/// not look like a folder of the player at all.
pub async fn build_folder_view<B: Bucket>(
    config: &PlayerConfig,
    bucket: &B,
    path: &str,
    listing: &Listing,
    window: SeasonWindow,
) -> Option<FolderView> {
    let folder = FolderPath::parse(path)?;
    let index = config.index.as_str();

    let (previous, next) = match folder.season.as_deref().filter(|_| folder.show.is_none()) {
        Some(season) => match SeasonId::parse(season) {
            Some(current) => adjacent_seasons(current, window, |candidate| {
                let prefix = format!("{}/{}", index, candidate);
                async move { season_exists(bucket, &prefix).await }
            }).await,
            None => (None, None),
        },
        None => (None, None),
    };
    let base = NavigationLinks::new(AdjacencyRow::new(index, path, previous, next));

    let mut keys = listing.keys();
    let metadata = match folder.season.as_deref() {
        Some(season) => {
            let key = metadata_key(index, season, folder.show.as_deref());
            read_metadata(bucket, &key).await
        }
        None => None,
    };
    let navigation = overlay_metadata_links(base, metadata.as_ref(), index);
    if let Some(metadata) = metadata {
        keys.extend(metadata.add_songs.iter().map(|song| format!("{}/{}", index, song)));
    }

    let is_root_index = path == index;
    let ordered = order_entries(keys, path, is_root_index, config.media_extensions.as_slice());
    let body = if is_root_index {
        FolderBody::Index(group_index(&ordered))
    } else {
        FolderBody::Entries(ordered.iter().map(|key| display_entry(key)).collect())
    };

    Some(FolderView {
        name: folder_name(index, path),
        navigation,
        body,
    })
}

/// `index/24-1/Show` → `24-1/Show`
pub fn folder_name(index: &str, path: &str) -> String {
    let path = format!("{}/", path.trim_end_matches('/'));
    path.replace(&format!("{}/", index), "")
        .trim_end_matches('/')
        .to_string()
}

async fn season_exists<B: Bucket>(bucket: &B, prefix: &str) -> bool {
    match bucket.list_folder(prefix).await {
        Ok(listing) => listing.is_some(),
        Err(error) => {
            warn!("season probe for {} failed: {}", prefix, error);
            false
        }
    }
}

async fn read_metadata<B: Bucket>(bucket: &B, key: &str) -> Option<SidecarMetadata> {
    let bytes = match bucket.fetch(key).await {
        Ok(bytes) => bytes,
        Err(BucketError::NotFound) => return None,
        Err(error) => {
            warn!("failed to fetch {}: {}", key, error);
            return None;
        }
    };

    match SidecarMetadata::from_slice(&bytes) {
        Ok(metadata) => Some(metadata),
        Err(error) => {
            warn!("ignoring malformed {}: {}", key, error);
            None
        }
    }
}
