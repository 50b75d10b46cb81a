//! HTML for htmx fragments and full pages.
//!
//! The page is built from the static files in `templates/`, filled in with
//! plain `{{ name }}` substitution.
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{
    builder::PlayerConfig,
    folder::{track_path, DisplayEntry, IndexView, Label},
    navigation::{MetadataRow, NavigationLink, NavigationLinks, Relation},
    view::{FolderBody, FolderView},
};


const INDEX_HTML: &str = include_str!("../templates/index.html");
const INDEX_CSS: &str = include_str!("../templates/index.css");
const PASSWORD_HTML: &str = include_str!("../templates/password.html");
const PLAYER_HTML: &str = include_str!("../templates/player.html");
const PLAYLIST_HTML: &str = include_str!("../templates/playlist.html");
const LOAD_MUSIC_JS: &str = include_str!("../templates/load_music.js");
const LOAD_PLAYER_JS: &str = include_str!("../templates/load_player.js");
const LOAD_PLAYLIST_JS: &str = include_str!("../templates/load_playlist.js");

/// Characters kept as-is in a path component; everything else is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const ARROW_CLASSES: &str = "material-symbols-outlined flex justify-center items-center";
const EMPTY_SLOT: &str = r#"<li class="flex-1 p-2"></li>"#;
const EMPTY_SEASON: &str = r#"<li class="flex-1 p-2 bg-slate-700 rounded-md"></li>"#;


pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Escape text for a single-quoted JavaScript string.
pub fn escape_js(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Percent-encode each component of `path`, keeping a trailing `/`.
pub fn encode_path(path: &str) -> String {
    let encoded = path.trim_end_matches('/')
        .split('/')
        .filter(|component| !component.is_empty())
        .map(|component| utf8_percent_encode(component, COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join("/");

    if path.ends_with('/') {
        format!("{}/", encoded)
    } else {
        encoded
    }
}

/// Remove the indentation of every line.
pub fn strip_indentation(body: &str) -> String {
    body.lines()
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n")
}


fn badge(text: &str) -> String {
    format!(
        r#"<span class="inline-block p-1 rounded-sm bg-slate-700 leading-none">{}</span>"#,
        escape_html(text)
    )
}

fn label_html(label: &Label) -> String {
    match &label.badge {
        Some(marker) => format!("{}{}", badge(marker), escape_html(&label.text)),
        None => escape_html(&label.text),
    }
}

/// One clickable entry. `inner` is already HTML.
fn entry_element(config: &PlayerConfig, path: &str, inner: &str, is_file: bool, li_class: &str) -> String {
    let href = escape_html(&format!("{}/{}", config.url, encode_path(path)));
    let li_class = if li_class.is_empty() { String::new() } else { format!(" {}", li_class) };

    let push_url = if is_file { String::new() } else { format!(r#"hx-push-url="{}""#, href) };
    let track = if is_file {
        let name = track_path(&config.index, path);
        format!(
            r#"hx-on::before-request="trackClicked('{}', this.href)""#,
            escape_html(&escape_js(&name))
        )
    } else {
        String::new()
    };
    let playlist_button = if is_file {
        r#"<button
            class="flex justify-center items-center
            bg-slate-600 rounded-md active:bg-slate-500 transition-all"
            style="padding:0.125rem;min-width:2.5rem;min-height:2.5rem"
        >
            <span
                data-display="flex"
                class="material-symbols-outlined flex justify-center items-center"
                style="display:none;min-height:2rem"
            >playlist_add</span>
        </button>"#
    } else {
        ""
    };

    format!(
        r#"<li class="flex gap-2 bg-slate-700 p-2 rounded-md{li_class}">
        <a
            href="{href}"
            {push_url}
            hx-swap="none"
            {track}
            class="flex-1 flex gap-2 justify-center items-center bg-slate-600 rounded-md p-1 px-2 hover:bg-slate-500 focus:bg-slate-500
            cursor-pointer"
        >{inner}</a>
        {playlist_button}
    </li>"#
    )
}

fn link_slot(config: &PlayerConfig, link: Option<&NavigationLink>, inner: impl Fn(&str) -> String) -> String {
    match link {
        Some(link) => entry_element(config, &link.target, &inner(&escape_html(&link.caption)), false, "flex-1"),
        None => EMPTY_SLOT.to_string(),
    }
}

fn adjacency_row(config: &PlayerConfig, navigation: &NavigationLinks) -> String {
    let row = &navigation.adjacency;
    let previous = link_slot(config, row.previous.as_ref(), |caption| format!(
        r#"<strong class="{ARROW_CLASSES}" style="transform:translate(3px, -4px) rotate(-90deg)">shift</strong>
        <div class="flex-1 flex flex-col text-left">
            <span class="text-xs">{caption}</span>
            <span class="text-sm">Previous Season</span>
        </div>"#
    ));
    let parent = match &row.parent {
        Some(link) => entry_element(
            config,
            &link.target,
            &format!(r#"<strong class="flex-1 {ARROW_CLASSES}" style="transform:scaleX(1.05) translate(4px, 4px)">shift</strong>"#),
            false,
            "",
        ),
        None => EMPTY_SLOT.to_string(),
    };
    let next = link_slot(config, row.next.as_ref(), |caption| format!(
        r#"<div class="flex-1 flex flex-col text-left">
            <span class="text-xs">{caption}</span>
            <span class="text-sm">Next Season</span>
        </div>
        <strong class="{ARROW_CLASSES}" style="transform:translate(-3px, 4px) rotate(90deg)">shift</strong>"#
    ));

    format!(r#"<li><ul class="flex gap-2">{previous}{parent}{next}</ul></li>"#)
}

fn metadata_row(config: &PlayerConfig, row: &MetadataRow) -> String {
    let (back_icon, back_style, forward_icon, forward_style) = match row.relation {
        Relation::Season => ("skip_previous", "translate(-1px, 1px)", "skip_next", "translate(9px, 1px)"),
        Relation::Cour => ("arrow_back_2", "translateY(1px)", "play_arrow", "translate(8px, 1px)"),
        Relation::SplitCour => ("fast_rewind", "translate(1px, 1px)", "fast_forward", "translate(9px, 1px)"),
    };
    let title = row.relation.title();

    let previous = link_slot(config, row.previous.as_ref(), |caption| format!(
        r#"<strong class="{ARROW_CLASSES}" style="transform:{back_style}">{back_icon}</strong>
        <div class="flex-1 flex flex-col text-left">
            <span class="text-xs">Previous {title}</span>
            <span class="text-sm">{caption}</span>
        </div>"#
    ));
    let next = link_slot(config, row.next.as_ref(), |caption| format!(
        r#"<div class="flex-1 flex flex-col text-left">
            <span class="text-xs">Next {title}</span>
            <span class="text-sm">{caption}</span>
        </div>
        <strong class="{ARROW_CLASSES}" style="transform:{forward_style}">{forward_icon}</strong>"#
    ));

    format!(r#"<li><ul class="flex gap-2">{previous}{next}</ul></li>"#)
}

fn entry(config: &PlayerConfig, entry: &DisplayEntry, li_class: &str) -> String {
    entry_element(config, &entry.target, &label_html(&entry.label), entry.is_file(), li_class)
}

fn index_rows(config: &PlayerConfig, index: &IndexView) -> Vec<String> {
    let mut rows: Vec<String> = index.years.iter().map(|row| {
        let seasons: Vec<String> = row.slots.iter().map(|slot| match slot {
            Some(season) => entry(config, season, "flex-1"),
            None => EMPTY_SEASON.to_string(),
        }).collect();

        format!(
            r#"<li class="flex gap-2 items-center w-full">
                <div>{}</div>
                <ul class="flex-1 flex gap-2 w-full">{}</ul>
            </li>"#,
            row.full_year(),
            seasons.join("\n"),
        )
    }).collect();

    rows.extend(index.other.iter().map(|other| entry(config, other, "")));
    rows
}

/// The folder name and listing, both swapped in out of band.
pub fn folder_fragment(config: &PlayerConfig, view: &FolderView) -> String {
    let mut items = vec![adjacency_row(config, &view.navigation)];
    items.extend(view.navigation.metadata.iter().map(|row| metadata_row(config, row)));

    match &view.body {
        FolderBody::Index(index) => items.extend(index_rows(config, index)),
        FolderBody::Entries(entries) => items.extend(entries.iter().map(|e| entry(config, e, ""))),
    }

    format!(
        r#"<p id="folder-name" hx-swap-oob="true">{}</p>
    <ul
        id="folder" hx-swap-oob="true" hx-boost="true"
        class="flex flex-col gap-2 p-2 w-screen md:max-w-md"
    >{}</ul>"#,
        escape_html(&view.name),
        items.join("\n"),
    )
}

pub fn title_element(title: &str) -> String {
    format!(r#"<title id="title" hx-swap-oob="true">{}</title>"#, escape_html(title))
}

/// The audio player with extra `content` below it.
pub fn player_block(content: &str) -> String {
    format!(
        r#"<div
        id="audio" hx-swap-oob="true"
        class="max-w-md flex flex-col items-center gap-2"
        style="min-width:50%"
    >
        <p id="name"></p>

        {PLAYER_HTML}
        {content}

        <script id="load-player" hx-preserve type="text/javascript">
        {LOAD_PLAYER_JS}
        </script>
    </div>"#
    )
}

pub fn load_button() -> &'static str {
    r#"<button
        id="load-button" onclick="loadPlayer()"
        class="bg-red-600 p-2 rounded-md"
    >Click to start loading</button>"#
}

pub fn empty_load_music() -> &'static str {
    r#"<script id="load-music" type="text/javascript"></script>"#
}

/// Script that hands a track to the player.
pub fn load_music_script(signed_url: &str, path: &str, name: &str, start_loading: bool) -> String {
    let script = LOAD_MUSIC_JS
        .replace("{{ url }}", &escape_js(signed_url))
        .replace("{{ path }}", &escape_js(path))
        .replace("{{ name }}", &escape_js(name))
        .replace("{{ loadPlayer }}", if start_loading { "loadPlayer()" } else { "" });

    format!(
        r#"<script id="load-music" hx-swap-oob="true" type="text/javascript">
        {}
    </script>"#,
        script.replace("</", "<\\/")
    )
}

pub fn reveal_icons_script() -> &'static str {
    r#"<script id="reveal-icons" hx-swap-oob="true" type="text/javascript">
    document.fonts.onloadingdone = revealIcons
    </script>"#
}

pub fn error_block(message: &str) -> String {
    format!(r#"<p id="error" class="text-red-600">{}</p>"#, escape_html(message))
}


/// Head values of a full page.
#[derive(Debug, Clone)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub logo: String,
    pub url: String,
}

/// The full page around `content`, followed by the playlist and `error`.
/// Signed-out visitors get the password form instead, without the stylesheet.
pub fn full_page(config: &PlayerConfig, meta: &PageMeta, signed_in: bool, content: &str, error: &str) -> String {
    let page = INDEX_HTML
        .replace("{{ title }}", &escape_html(&meta.title))
        .replace("{{ logo }}", &escape_html(&meta.logo))
        .replace("{{ description }}", &escape_html(&meta.description))
        .replace("{{ url }}", &escape_html(&meta.url))
        .replace("{{ css }}", if signed_in { INDEX_CSS } else { "" });

    let content = if signed_in {
        format!(
            r#"{}{}<script id="load-playlist-tabs">{}</script>{}"#,
            content,
            PLAYLIST_HTML,
            LOAD_PLAYLIST_JS,
            error_block(error),
        )
    } else {
        PASSWORD_HTML.replace("{{ url }}", &escape_html(&config.url))
    };

    page.replace("{{ content }}", &content)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::{display_entry, group_index, EntryKind, YearRow};
    use crate::navigation::AdjacencyRow;

    fn config() -> PlayerConfig {
        PlayerConfig::for_tests("index")
    }

    #[test]
    fn encodes_each_component() {
        assert_eq!(encode_path("index/24-1/My Show/OP 1.mp3"), "index/24-1/My%20Show/OP%201.mp3");
        assert_eq!(encode_path("index/24-1/"), "index/24-1/");
        assert_eq!(encode_path("index//a~b_c"), "index/a~b_c");
        assert_eq!(encode_path("a/Ünïcode?#"), "a/%C3%9Cn%C3%AFcode%3F%23");
    }

    #[test]
    fn escapes() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
        assert_eq!(escape_js(r"it's a \ test"), r"it\'s a \\ test");
    }

    #[test]
    fn strips_indentation() {
        assert_eq!(strip_indentation("  <a>\n\t\t<b>\n</a>  "), "<a>\n<b>\n</a>  ");
    }

    #[test]
    fn file_entries_track_clicks_and_folders_push_urls() {
        let file = entry(&config(), &display_entry("index/24-1/Show/OP FULL It's.mp3"), "");
        assert!(file.contains(r#"href="https://example.test/player/index/24-1/Show/OP%20FULL%20It%27s.mp3""#));
        assert!(file.contains(r#"trackClicked('24-1/Show/OP FULL It\&#39;s', this.href)"#));
        assert!(file.contains("playlist_add"));
        assert!(!file.contains("hx-push-url"));
        assert!(file.contains(&badge("OP")));

        let nested = entry(&config(), &display_entry("index/24-1/index/OP 1.mp3"), "");
        assert!(nested.contains("trackClicked('24-1/OP 1', this.href)"));

        let folder = entry(&config(), &display_entry("index/24-1/Show/"), "");
        assert!(folder.contains(r#"hx-push-url="https://example.test/player/index/24-1/Show""#));
        assert!(!folder.contains("trackClicked"));
        assert!(!folder.contains("playlist_add"));
    }

    #[test]
    fn folder_fragment_has_rows_in_order() {
        let view = FolderView {
            name: "24-1".into(),
            navigation: NavigationLinks {
                adjacency: AdjacencyRow::new("index", "index/24-1", None, crate::season::SeasonId::parse("24-2")),
                metadata: vec![MetadataRow {
                    relation: Relation::Cour,
                    previous: None,
                    next: Some(NavigationLink { target: "index/24-2/B/".into(), caption: "24-2/B".into() }),
                }],
            },
            body: FolderBody::Entries(vec![display_entry("index/24-1/A/")]),
        };
        let html = folder_fragment(&config(), &view);

        assert!(html.contains(r#"<p id="folder-name" hx-swap-oob="true">24-1</p>"#));
        let next_season = html.find("Next Season").unwrap();
        let next_cour = html.find("Next Cour").unwrap();
        let entry = html.find("index/24-1/A").unwrap();
        assert!(next_season < next_cour && next_cour < entry);
        assert!(html.contains(r#"href="https://example.test/player/index/24-2/""#));
        assert!(html.contains(r#"href="https://example.test/player/index/""#));
        assert!(!html.contains("Previous Season"));
        assert!(!html.contains("Previous Cour"));
        // two empty slots: previous season and previous cour
        assert_eq!(html.matches(EMPTY_SLOT).count(), 2);
    }

    #[test]
    fn index_rows_fill_missing_seasons() {
        let index = group_index(&["index/24-1/".to_string(), "index/Extras/".to_string()]);
        assert_eq!(index.years.len(), 1);
        assert!(matches!(index.years[0], YearRow { year: 24, .. }));

        let rows = index_rows(&config(), &index);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains("<div>2024</div>"));
        assert!(rows[0].contains(">Winter</a>"));
        assert_eq!(rows[0].matches(EMPTY_SEASON).count(), 3);
        assert!(rows[1].contains(">Extras</a>"));
        assert_eq!(index.other[0].kind, EntryKind::Folder);
    }

    #[test]
    fn load_music_escapes_values() {
        let script = load_music_script("https://s3/x?a='b'", "24-1/Show/It's", "It's", true);
        assert!(script.contains(r"https://s3/x?a=\'b\'"));
        assert!(script.contains(r"24-1/Show/It\'s"));
        assert!(script.contains("loadPlayer()"));
        assert!(!script.contains("{{"));

        let script = load_music_script("u", "p", "n", false);
        assert!(!script.contains("loadPlayer()"));
    }

    #[test]
    fn signed_out_pages_show_the_password_form() {
        let meta = PageMeta {
            title: "Seasons Music".into(),
            description: "A personal music player.".into(),
            logo: "https://example.test/images/logo-small-a.png".into(),
            url: "https://example.test/player/index".into(),
        };
        let page = full_page(&config(), &meta, false, "<p>secret</p>", "");
        assert!(page.contains(r#"<title id="title">Seasons Music</title>"#));
        assert!(page.contains(r#"hx-get="https://example.test/player/password""#));
        assert!(!page.contains("secret"));
        assert!(!page.contains("{{"));

        let page = full_page(&config(), &meta, true, "<p>secret</p>", "Failed to list parent folder.");
        assert!(page.contains("<p>secret</p>"));
        assert!(page.contains(r#"<p id="error" class="text-red-600">Failed to list parent folder.</p>"#));
        assert!(page.contains(r#"id="load-playlist-tabs""#));
        assert!(!page.contains("password"));
    }

    #[test]
    fn player_block_records_the_track_url() {
        let html = player_block(load_button());
        assert!(html.contains(r#"id="load-button""#));
        assert!(html.contains(r#"id="loop" disabled onclick="toggleLoop()""#));
        assert!(html.contains("function trackClicked(path, url)"));
        // recent tracks link to the page that played them, never a rebuilt path
        assert!(html.contains("rememberRecent(app.trackUrl || location.href)"));
        assert!(!html.contains("location.pathname"));
    }
}
