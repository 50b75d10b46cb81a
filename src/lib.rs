//! A personal music player served straight from an AWS S3 bucket using Axum.
//!
//! Folders in the bucket are seasons and shows, files are tracks. A request
//! path either names a track, which gets a presigned URL and the player, or a
//! folder, which gets an ordered listing with season navigation. Responses are
//! htmx fragments for htmx requests and full pages otherwise.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use seasons_player::{router, PlayerOriginBuilder};
//!
//!
//! #[tokio::main]
//! async fn main() {
//!     let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
//!
//!     // Build the player origin
//!     let origin = PlayerOriginBuilder::new()
//!         .bucket("player-files")
//!         .url("https://example.com/player")
//!         .index("index")
//!         .images("https://example.com/images")
//!         .password("correct horse battery staple")
//!         .config(aws_config)
//!         .build()
//!         .expect("Failed to build player origin");
//!
//!     // Start the server
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
//!         .await
//!         .unwrap();
//!     axum::serve(listener, router(origin)).await.unwrap();
//! }
//! ```
//!
//! # Features
//!
//! - `trace`: Enable tracing of requests and S3 calls.
//! - `aws-parameterstore`: Load the password from AWS Systems Manager.
//!
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use std::{
    convert::Infallible,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use subtle::ConstantTimeEq;
use tower_http::compression::CompressionLayer;
use tower_service::Service;


#[cfg(feature = "trace")]
#[allow(unused_imports)]
use tracing::Instrument;

#[cfg(feature = "trace")]
macro_rules! info {
    ($($arg:tt)*) => {
        tracing::info!($($arg)*)
    };
}
#[cfg(feature = "trace")]
macro_rules! warn {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

#[allow(unused_macros)]
#[cfg(not(feature = "trace"))]
// Convert to a no-op macro
macro_rules! info {
    ($($arg:tt)*) => {
        if false { let _ = format_args!($($arg)*); }
    };
}
#[allow(unused_macros)]
#[cfg(not(feature = "trace"))]
macro_rules! warn {
    ($($arg:tt)*) => {
        if false { let _ = format_args!($($arg)*); }
    };
}

pub mod bucket;
pub mod folder;
pub mod metadata;
pub mod navigation;
pub mod season;
pub mod view;

mod render;

mod builder;
pub use builder::{PlayerConfig, PlayerOriginBuilder, DEFAULT_PRESIGN_EXPIRY};

pub use bucket::{Bucket, BucketError, Listing, S3Bucket};

use folder::{file_name, split_extension, track_path, track_title};
use render::PageMeta;
use season::{SeasonId, SeasonWindow};
use view::build_folder_view;


const SITE_NAME: &str = "Seasons Music";
const SIGNED_IN_COOKIE: &str = "Signed-In";
const SIGN_IN_PATH: &str = "password";

pub(crate) struct PlayerOriginInner<B> {
    config: PlayerConfig,
    bucket: B,
}

pub struct PlayerOrigin<B = S3Bucket> {
    inner: Arc<PlayerOriginInner<B>>,
}

impl<B> Clone for PlayerOrigin<B> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<B: Bucket> PlayerOrigin<B> {
    pub(crate) fn new(config: PlayerConfig, bucket: B) -> Self {
        Self {
            inner: Arc::new(PlayerOriginInner { config, bucket }),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }
}


/// Router serving the player on every path, gzip-compressed when the client accepts it.
pub fn router<B: Bucket>(origin: PlayerOrigin<B>) -> Router {
    Router::new()
        .fallback_service(origin)
        .layer(CompressionLayer::new())
}


/// Takes a request URI and turns it into a bucket path without surrounding slashes
fn request_to_path(uri: &Uri) -> String {
    percent_decode_str(uri.path())
        .decode_utf8_lossy()
        .trim_matches('/')
        .to_string()
}


impl<B: Bucket> Service<axum::extract::Request> for PlayerOrigin<B> {
    type Error = Infallible;
    type Response = Response<Body>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static >>;

    /// Always ready to serve; no backpressure.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    /// Serve the request.
    fn call(&mut self, req: axum::extract::Request) -> Self::Future {
        // Only GET requests are supported
        if req.method() != Method::GET {
            info!("PlayerOrigin: {} method not allowed", req.method());

            return Box::pin(async move {
                Ok(PlayerError::MethodNotAllowed.into_response())
            });
        }

        let this = self.inner.clone();
        let path = request_to_path(req.uri());
        info!("PlayerOrigin: serving {}", path);

        let serve_fut = async move {
            let rv = serve(&this, &path, req.uri(), req.headers())
                .await
                .unwrap_or_else(|e| e.into_response());

            Ok(rv)
        };

        #[cfg(feature = "trace")]
        let serve_fut = serve_fut.instrument(tracing::info_span!("player_request"));

        Box::pin(serve_fut)
    }
}


enum Item {
    File,
    Folder(Listing),
}

async fn classify<B: Bucket>(bucket: &B, path: &str) -> Result<Item, PlayerError> {
    match bucket.file_exists(path).await {
        Ok(true) => return Ok(Item::File),
        Ok(false) => {}
        Err(error) => warn!("PlayerOrigin: probing {} failed: {}", path, error),
    }

    match bucket.list_folder(path).await {
        Ok(Some(listing)) => Ok(Item::Folder(listing)),
        Ok(None) => Err(PlayerError::NotFound),
        Err(error) => {
            warn!("PlayerOrigin: listing {} failed: {}", path, error);
            Err(PlayerError::NotFound)
        }
    }
}

fn header_is(headers: &HeaderMap, name: &str, value: &str) -> bool {
    headers.get(name).and_then(|v| v.to_str().ok()) == Some(value)
}

fn is_signed_in(headers: &HeaderMap) -> bool {
    CookieJar::from_headers(headers)
        .get(SIGNED_IN_COOKIE)
        .is_some_and(|cookie| !cookie.value().is_empty())
}


#[derive(Deserialize)]
struct SignIn {
    password: Option<String>,
}

fn sign_in(config: &PlayerConfig, uri: &Uri) -> Result<Response, PlayerError> {
    let query = axum::extract::Query::<SignIn>::try_from_uri(uri)
        .map_err(|_| PlayerError::IncorrectPassword)?;
    let password = query.0.password.unwrap_or_default();

    if !bool::from(password.as_bytes().ct_eq(config.password.as_bytes())) {
        return Err(PlayerError::IncorrectPassword);
    }

    let cookie = Cookie::build((SIGNED_IN_COOKIE, "true"))
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::days(30))
        .build();

    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie.to_string()).map_err(|_| PlayerError::InternalServerError)?,
    );
    headers.insert("hx-refresh", HeaderValue::from_static("true"));
    Ok(response)
}


async fn serve<B: Bucket>(
    this: &PlayerOriginInner<B>,
    path: &str,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<Response, PlayerError> {
    let config = &this.config;
    if path == SIGN_IN_PATH {
        return sign_in(config, uri);
    }

    let hx_request = header_is(headers, "hx-request", "true")
        && !header_is(headers, "hx-history-restore-request", "true");
    let signed_in = is_signed_in(headers);

    let item = classify(&this.bucket, path).await?;
    let window = SeasonWindow::current();

    let mut meta = PageMeta {
        title: SITE_NAME.to_string(),
        description: "A personal music player.".to_string(),
        logo: format!("{}/logo-small-a.png", config.images),
        url: format!("{}/{}", config.url, path),
    };
    if let Some(season) = SeasonId::find(path) {
        let season = format!("{} {}", season.full_year(), season.name());
        meta.title = format!("{} | {}", season, SITE_NAME);
        meta.description = format!("Some anime music from the {} season", season);
    }

    let mut parent_content = String::new();
    let mut error = "";
    let (mut fragment, audio) = match item {
        Item::Folder(listing) => {
            let basename = file_name(path);
            if basename != config.index {
                meta.title = format!("{} | {}", basename, SITE_NAME);
            }

            let folder = build_folder_view(config, &this.bucket, path, &listing, window)
                .await
                .map(|view| render::folder_fragment(config, &view))
                .unwrap_or_default();

            let fragment = format!("{}\n{}", render::title_element(&meta.title), folder);
            let audio = format!("{}{}", render::player_block(""), render::empty_load_music());
            (fragment, audio)
        }
        Item::File => {
            let signed_url = this.bucket
                .presign_get(path, config.presign_expiry)
                .await
                .map_err(PlayerError::Presign)?;

            let parent = path.rsplit_once('/').map_or("", |(parent, _)| parent);
            match this.bucket.list_folder(parent).await {
                Ok(Some(listing)) => {
                    if let Some(view) = build_folder_view(config, &this.bucket, parent, &listing, window).await {
                        parent_content = render::folder_fragment(config, &view);
                    }
                }
                Ok(None) => error = "Failed to list parent folder.",
                Err(e) => {
                    warn!("PlayerOrigin: listing parent {} failed: {}", parent, e);
                    error = "Failed to list parent folder.";
                }
            }

            let (_, extension) = split_extension(file_name(path));
            let stem = &path[..path.len() - extension.len()];
            let name = track_title(file_name(stem));
            meta.title = format!("{} | {}", name, SITE_NAME);

            let player_path = track_path(&config.index, path);
            let fragment = format!(
                "{}\n{}",
                render::title_element(&meta.title),
                render::load_music_script(&signed_url, &player_path, &name, hx_request),
            );
            (fragment, render::player_block(render::load_button()))
        }
    };

    if signed_in {
        fragment.push_str(render::reveal_icons_script());
    }

    let (status, body) = if hx_request {
        if signed_in {
            (StatusCode::OK, fragment)
        } else {
            (StatusCode::FORBIDDEN, String::new())
        }
    } else {
        let content = format!("{}{}{}", audio, fragment, parent_content);
        (StatusCode::OK, render::full_page(config, &meta, signed_in, &content, error))
    };

    Ok(html_response(status, render::strip_indentation(&body)))
}

fn html_response(status: StatusCode, body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
    headers.insert(header::VARY, HeaderValue::from_static("Hx-Request"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}


impl axum::response::IntoResponse for PlayerError {
    fn into_response(self) -> axum::response::Response {
        match self {
            PlayerError::NotFound => (StatusCode::NOT_FOUND, "Failed to find file.").into_response(),
            PlayerError::IncorrectPassword => (StatusCode::UNAUTHORIZED, "Incorrect password.").into_response(),
            PlayerError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response(),
            PlayerError::Presign(error) => {
                warn!("PlayerOrigin: presigning failed: {}", error);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign the track URL.").into_response()
            }
            PlayerError::InternalServerError => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response(),
        }
    }
}


pub (crate) enum PlayerError {
    NotFound,
    IncorrectPassword,
    MethodNotAllowed,
    Presign(BucketError),
    InternalServerError,
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::memory::{MemoryBucket, Operation};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[allow(dead_code)]
    fn assert_clone<T: Clone>(_: &T) { }
    #[allow(dead_code)]
    fn assert_send<T: Send>(_: &T) { }
    #[allow(dead_code)]
    fn assert_sync<T: Sync>(_: &T) { }

    fn origin() -> PlayerOrigin<MemoryBucket> {
        origin_with(library())
    }

    fn library() -> MemoryBucket {
        MemoryBucket::with_keys([
            "index/23-4/Old Show/OP 1.mp3",
            "index/24-1/Show/OP 1.mp3",
            "index/24-1/Show/ED 1.mp3",
            "index/24-1/Show/Insert Song.m4a",
            "index/24-1/Show/cover.jpg",
            "index/24-1/My Show/track.mp3",
        ])
    }

    fn origin_with(bucket: MemoryBucket) -> PlayerOrigin<MemoryBucket> {
        PlayerOriginBuilder::new()
            .url("https://example.test/player")
            .index("index")
            .images("https://example.test/images")
            .password("hunter2")
            .build_with(bucket)
            .unwrap()
    }

    fn get(uri: &str) -> axum::http::request::Builder {
        axum::extract::Request::builder().method(Method::GET).uri(uri)
    }

    async fn send(request: axum::http::request::Builder) -> (StatusCode, HeaderMap, String) {
        send_to(origin(), request).await
    }

    async fn send_to(
        origin: PlayerOrigin<MemoryBucket>,
        request: axum::http::request::Builder,
    ) -> (StatusCode, HeaderMap, String) {
        let response = origin
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn origin_is_clone_send_sync() {
        let origin = origin();
        assert_clone(&origin);
        assert_send(&origin);
        assert_sync(&origin);
    }

    #[test]
    fn can_route_to_player_origin() {
        let _app: Router = router(origin());
        let _nested = Router::<()>::new().nest_service("/player", origin());
    }

    #[test]
    fn request_paths_are_decoded_and_trimmed() {
        assert_eq!(request_to_path(&"/index/24-1/My%20Show/".parse().unwrap()), "index/24-1/My Show");
        assert_eq!(request_to_path(&"/".parse().unwrap()), "");
    }

    #[tokio::test]
    async fn only_get_is_served() {
        let (status, _, _) = send(get("/index").method(Method::POST)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let (status, _, body) = send(get("/index/99-1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Failed to find file.");
    }

    #[tokio::test]
    async fn sign_in_checks_the_password() {
        let (status, headers, body) = send(get("/password?password=wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Incorrect password.");
        assert!(headers.get(header::SET_COOKIE).is_none());

        let (status, _, _) = send(get("/password")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, headers, _) = send(get("/password?password=hunter2")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("Signed-In=true"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=2592000"));
        assert_eq!(headers.get("hx-refresh").unwrap(), "true");
    }

    #[tokio::test]
    async fn htmx_requests_need_the_cookie() {
        let (status, headers, body) = send(get("/index/24-1").header("hx-request", "true")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.is_empty());
        assert_eq!(headers.get(header::VARY).unwrap(), "Hx-Request");
    }

    #[tokio::test]
    async fn folder_fragment_for_signed_in_htmx() {
        let (status, headers, body) = send(
            get("/index/24-1/Show")
                .header("hx-request", "true")
                .header(header::COOKIE, "Signed-In=true")
        ).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/html");
        assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(headers.get(header::PRAGMA).unwrap(), "no-cache");

        assert!(body.starts_with(r#"<title id="title" hx-swap-oob="true">Show | Seasons Music</title>"#));
        assert!(body.contains(r#"id="reveal-icons""#));
        assert!(!body.contains("<html"));
        assert!(!body.contains("cover.jpg"));

        let op = body.find("OP%201.mp3").unwrap();
        let ed = body.find("ED%201.mp3").unwrap();
        let insert = body.find("Insert%20Song.m4a").unwrap();
        assert!(op < ed && ed < insert);

        // no line keeps its indentation
        assert!(body.lines().all(|line| !line.starts_with(' ')));
    }

    #[tokio::test]
    async fn history_restore_gets_the_full_page() {
        let (status, _, body) = send(
            get("/index/24-1")
                .header("hx-request", "true")
                .header("hx-history-restore-request", "true")
                .header(header::COOKIE, "Signed-In=true")
        ).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<html"));
        assert!(body.contains(r#"<title id="title">24-1 | Seasons Music</title>"#));
        assert!(body.contains("Some anime music from the 2024 Winter season"));
        assert!(body.contains("Previous Season"));
        assert!(body.contains(r#"href="https://example.test/player/index/23-4/""#));
        assert!(body.contains(r#"id="load-music""#));
    }

    #[tokio::test]
    async fn signed_out_pages_ask_for_the_password() {
        let (status, _, body) = send(get("/index/24-1/Show")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"hx-get="https://example.test/player/password""#));
        assert!(!body.contains("OP%201.mp3"));
    }

    #[tokio::test]
    async fn track_fragment_loads_the_music() {
        let (status, _, body) = send(
            get("/index/24-1/Show/OP%201.mp3")
                .header("hx-request", "true")
                .header(header::COOKIE, "Signed-In=true")
        ).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<title id="title" hx-swap-oob="true">1 | Seasons Music</title>"#));
        assert!(body.contains("https://bucket.test/index/24-1/Show/OP 1.mp3?expires=1800"));
        assert!(body.contains("const path = '24-1/Show/OP 1'"));
        assert!(body.contains("loadPlayer()"));
        // htmx track requests only swap the player script
        assert!(!body.contains(r#"id="folder""#));
    }

    #[tokio::test]
    async fn track_page_lists_the_parent_folder() {
        let (status, _, body) = send(
            get("/index/24-1/My%20Show/track.mp3").header(header::COOKIE, "Signed-In=true")
        ).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Click to start loading"));
        assert!(body.contains(r#"<p id="folder-name" hx-swap-oob="true">24-1/My Show</p>"#));
        assert!(body.contains(r#"href="https://example.test/player/index/24-1/My%20Show/track.mp3""#));
        assert!(body.contains(r#"<p id="error" class="text-red-600"></p>"#));
        assert!(!body.contains("{{"));
    }

    #[tokio::test]
    async fn track_page_reports_a_failing_parent_listing() {
        let bucket = library();
        bucket.fail(Operation::List);

        let (status, _, body) = send_to(
            origin_with(bucket),
            get("/index/24-1/My%20Show/track.mp3").header(header::COOKIE, "Signed-In=true"),
        ).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<p id="error" class="text-red-600">Failed to list parent folder.</p>"#));
        assert!(body.contains("https://bucket.test/index/24-1/My Show/track.mp3"));
        assert!(!body.contains(r#"id="folder-name""#));
    }

    #[tokio::test]
    async fn failing_presign_is_a_server_error() {
        let bucket = library();
        bucket.fail(Operation::Presign);

        let (status, _, body) = send_to(
            origin_with(bucket),
            get("/index/24-1/Show/OP%201.mp3")
                .header("hx-request", "true")
                .header(header::COOKIE, "Signed-In=true"),
        ).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failed to sign the track URL.");
    }

    #[tokio::test]
    async fn failing_metadata_fetch_still_lists_the_folder() {
        let mut bucket = library();
        bucket.put(
            "index/24-1/Show/metadata.json",
            br#"{ "folderMetadata": { "previousCour": "23-4/Old Show" } }"#.to_vec(),
        );
        bucket.fail(Operation::Fetch);

        let (status, _, body) = send_to(
            origin_with(bucket),
            get("/index/24-1/Show")
                .header("hx-request", "true")
                .header(header::COOKIE, "Signed-In=true"),
        ).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("OP%201.mp3"));
        assert!(!body.contains("Previous Cour"));
    }

    #[tokio::test]
    async fn router_gzips_when_accepted() {
        let request = get("/index/24-1/Show")
            .header(header::COOKIE, "Signed-In=true")
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap();
        let response = router(origin()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::CONTENT_ENCODING).unwrap(), "gzip");

        let request = get("/index/24-1/Show")
            .header(header::COOKIE, "Signed-In=true")
            .body(Body::empty())
            .unwrap();
        let response = router(origin()).oneshot(request).await.unwrap();
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    }
}
