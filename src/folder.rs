//! Ordering, filtering and labelling of folder entries.
//!
//! Everything in here works on keys that a listing already returned; nothing
//! talks to the bucket.
use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;

use crate::season::SeasonId;


/// Extensions listed as playable when no others are configured.
pub const DEFAULT_MEDIA_EXTENSIONS: [&str; 2] = [".mp3", ".m4a"];

static THEME_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(OP|ED)(\s\d+)?\sFULL\s").expect("theme marker pattern is valid")
});


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File,
}

/// Visible label of an entry, with an optional OP/ED badge in front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub badge: Option<String>,
    pub text: String,
}

impl Label {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { badge: None, text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEntry {
    /// Key the entry links to, without the trailing `/` of folders.
    pub target: String,
    pub label: Label,
    pub kind: EntryKind,
}

impl DisplayEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}


/// Last path segment of a key, ignoring a trailing `/`.
pub fn file_name(key: &str) -> &str {
    let key = key.trim_end_matches('/');
    key.rsplit('/').next().unwrap_or(key)
}

/// Split `name` into stem and extension (with the dot). Leading dots belong
/// to the stem, so `.hidden` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name[leading_dots..].rfind('.') {
        Some(dot) => name.split_at(leading_dots + dot),
        None => (name, ""),
    }
}

fn tier(key: &str) -> u8 {
    let name = file_name(key);
    if name.contains("OP ") {
        1
    } else if name.contains("ED ") {
        2
    } else {
        3
    }
}

fn is_listable<S: AsRef<str>>(key: &str, media_extensions: &[S]) -> bool {
    if key.ends_with('/') {
        return true;
    }
    let (_, extension) = split_extension(file_name(key));
    extension.is_empty() || media_extensions.iter().any(|allowed| allowed.as_ref() == extension)
}

/// Order the keys of a listing for display.
///
/// Opening themes come first, ending themes second, everything else last,
/// each group sorted by full key. For the root index the whole order is
/// reversed, groups included. The folder's own key is removed and files whose
/// extension is not playable are dropped. Duplicates are kept.
pub fn order_entries<S: AsRef<str>>(
    mut keys: Vec<String>,
    query_path: &str,
    is_root_index: bool,
    media_extensions: &[S],
) -> Vec<String> {
    keys.sort_by(|a, b| (tier(a), a).cmp(&(tier(b), b)));
    if is_root_index {
        keys.reverse();
    }

    let own_key = format!("{}/", query_path);
    if let Some(position) = keys.iter().position(|key| *key == own_key) {
        keys.remove(position);
    }

    keys.retain(|key| is_listable(key, media_extensions));
    keys
}

/// Display label for a file stem or folder name.
///
/// A leading `OP FULL `, `ED 2 FULL ` (and so on) marker turns into a badge.
pub fn derive_label(name: &str) -> Label {
    match THEME_MARKER_RE.captures(name) {
        Some(captures) => {
            let marker = captures.get(0).map_or(0, |m| m.end());
            let number = captures.get(2).map_or("", |m| m.as_str());
            Label {
                badge: Some(format!("{}{}", &captures[1], number)),
                text: name[marker..].to_string(),
            }
        }
        None => Label::plain(name),
    }
}

/// Title shown in the player for a track stem.
pub fn track_title(stem: &str) -> String {
    stem.replace("OP ", "").replace("ED ", "").replace("FULL ", "")
}

/// Track key without its extension or any `{index}/` segment, as the player
/// scripts know it: `index/24-1/Show/OP 1.mp3` → `24-1/Show/OP 1`.
pub fn track_path(index: &str, key: &str) -> String {
    let (_, extension) = split_extension(file_name(key));
    key[..key.len() - extension.len()].replace(&format!("{}/", index), "")
}

/// Turn an ordered key into an entry with its label derived from the name.
pub fn display_entry(key: &str) -> DisplayEntry {
    let kind = if key.ends_with('/') { EntryKind::Folder } else { EntryKind::File };
    let (stem, _) = split_extension(file_name(key));
    let label = match kind {
        EntryKind::File => derive_label(stem),
        EntryKind::Folder => derive_label(file_name(key)),
    };

    DisplayEntry {
        target: key.trim_end_matches('/').to_string(),
        label,
        kind,
    }
}


/// One row of the root index: a year and its four season slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearRow {
    pub year: u8,
    pub slots: [Option<DisplayEntry>; 4],
}

impl YearRow {
    pub fn full_year(&self) -> u32 {
        2000 + self.year as u32
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexView {
    /// Newest year first.
    pub years: Vec<YearRow>,
    /// Entries without a season, in their original order.
    pub other: Vec<DisplayEntry>,
}

/// Pivot the root listing into years of four seasons each.
pub fn group_index(keys: &[String]) -> IndexView {
    let mut years: BTreeMap<u8, [Option<DisplayEntry>; 4]> = BTreeMap::new();
    let mut other = Vec::new();

    for key in keys {
        let mut entry = display_entry(key);
        match SeasonId::find(key) {
            Some(season) => {
                entry.label = Label::plain(season.name());
                years.entry(season.year).or_default()[season.slot()] = Some(entry);
            }
            None => {
                entry.label = Label::plain(split_extension(file_name(key)).0);
                other.push(entry);
            }
        }
    }

    IndexView {
        years: years.into_iter()
            .rev()
            .map(|(year, slots)| YearRow { year, slots })
            .collect(),
        other,
    }
}
