//! Navigation rows shown above a folder listing.
use crate::{
    metadata::{LinkPair, SidecarMetadata},
    season::SeasonId,
};


/// A link in a navigation slot. An empty slot is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationLink {
    pub target: String,
    pub caption: String,
}

impl NavigationLink {
    /// Link to `{index}/{fragment}/`.
    fn under_index(index: &str, fragment: &str) -> Self {
        Self {
            target: format!("{}/{}/", index, fragment),
            caption: fragment.to_string(),
        }
    }
}

/// Previous season, parent folder, next season.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyRow {
    pub previous: Option<NavigationLink>,
    pub parent: Option<NavigationLink>,
    pub next: Option<NavigationLink>,
}

impl AdjacencyRow {
    pub fn new(index: &str, path: &str, previous: Option<SeasonId>, next: Option<SeasonId>) -> Self {
        let parent = parent_folder(path)
            .filter(|_| path != index)
            .map(|target| NavigationLink { caption: String::new(), target });

        Self {
            previous: previous.map(|s| NavigationLink::under_index(index, &s.to_string())),
            parent,
            next: next.map(|s| NavigationLink::under_index(index, &s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Season,
    Cour,
    SplitCour,
}

impl Relation {
    pub fn title(&self) -> &'static str {
        match self {
            Relation::Season => "Season",
            Relation::Cour => "Cour",
            Relation::SplitCour => "Split Cour",
        }
    }
}

/// A curated previous/next row. At least one side is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRow {
    pub relation: Relation,
    pub previous: Option<NavigationLink>,
    pub next: Option<NavigationLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationLinks {
    pub adjacency: AdjacencyRow,
    pub metadata: Vec<MetadataRow>,
}

impl NavigationLinks {
    pub fn new(adjacency: AdjacencyRow) -> Self {
        Self { adjacency, metadata: Vec::new() }
    }
}


/// `dirname(path) + "/"`, or `None` at the top level.
pub fn parent_folder(path: &str) -> Option<String> {
    let (parent, _) = path.rsplit_once('/')?;
    Some(format!("{}/", parent))
}

/// Append the rows described by sidecar metadata after the adjacency row.
pub fn overlay_metadata_links(
    mut base: NavigationLinks,
    metadata: Option<&SidecarMetadata>,
    index: &str,
) -> NavigationLinks {
    let Some(metadata) = metadata else {
        return base;
    };

    let pairs = [
        (Relation::Season, &metadata.season),
        (Relation::Cour, &metadata.cour),
        (Relation::SplitCour, &metadata.split_cour),
    ];
    for (relation, pair) in pairs {
        if let LinkPair::Present { previous, next } = pair {
            base.metadata.push(MetadataRow {
                relation,
                previous: previous.as_deref().map(|p| NavigationLink::under_index(index, p)),
                next: next.as_deref().map(|n| NavigationLink::under_index(index, n)),
            });
        }
    }
    base
}
