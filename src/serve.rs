//! Local preview server.
//!
//! A lightweight HTTP server built on `tiny_http` that answers requests the
//! way the hosting platform would: through the handler table of the
//! generated `app.yaml`.
//!
//! - handlers are tried in order; `url` must match the whole path
//! - `static_files` handlers expand `\1`..`\9` from the `url` captures
//! - `static_dir` handlers map the rest of the path into a directory
//! - `script` handlers answer `501 Not Implemented`
//! - anything else answers `404 Not Found`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (optional)      │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!    Router::resolve          rebuild output
//!          │                       │
//!          └──────────┬────────────┘
//!                     ▼
//!             config.build.output
//! ```

use crate::{
    config::{Handler, SiteConfig},
    generator::app::AppYaml,
    log,
    watch::watch_for_changes_blocking,
};
use anyhow::{Context, Result, anyhow};
use regex::{Captures, Regex};
use std::{
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Routing
// ============================================================================

/// What a request path resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    File {
        path: PathBuf,
        mime_type: Option<String>,
    },
    Script(String),
    NotFound,
}

struct Route {
    pattern: Regex,
    handler: Handler,
}

/// Compiled handler table.
pub struct Router {
    output: PathBuf,
    routes: Vec<Route>,
}

impl Router {
    pub fn new(output: &Path, handlers: &[Handler]) -> Result<Self> {
        let routes = handlers
            .iter()
            .map(|handler| {
                // static_dir urls are prefixes; everything below them is served
                let source = if handler.static_dir.is_some() {
                    format!("^(?:{})(?P<rest>/.*)?$", handler.url)
                } else {
                    format!("^(?:{})$", handler.url)
                };
                let pattern = Regex::new(&source)
                    .with_context(|| format!("Invalid handler url `{}`", handler.url))?;
                Ok(Route {
                    pattern,
                    handler: handler.clone(),
                })
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            output: output.to_path_buf(),
            routes,
        })
    }

    /// Load the handler table written by the `app` build step.
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        let app = AppYaml::load(&config.app_file())?;
        Self::new(&config.build.output, &app.handlers)
    }

    /// Resolve a decoded request path (no query string).
    pub fn resolve(&self, request_path: &str) -> Resolved {
        let Some((route, caps)) = self
            .routes
            .iter()
            .find_map(|route| route.pattern.captures(request_path).map(|caps| (route, caps)))
        else {
            return Resolved::NotFound;
        };

        let handler = &route.handler;
        let rel = if let Some(script) = &handler.script {
            return Resolved::Script(script.clone());
        } else if let Some(files) = &handler.static_files {
            expand_captures(files, &caps)
        } else if let Some(dir) = &handler.static_dir {
            let rest = caps.name("rest").map_or("", |m| m.as_str());
            format!("{}/{}", dir.trim_end_matches('/'), rest.trim_start_matches('/'))
        } else {
            return Resolved::NotFound;
        };

        match self.local_path(&rel) {
            Some(path) if path.is_file() => Resolved::File {
                path,
                mime_type: handler.mime_type.clone(),
            },
            _ => Resolved::NotFound,
        }
    }

    /// Map a handler target into the output directory, refusing to leave it.
    fn local_path(&self, rel: &str) -> Option<PathBuf> {
        let rel = Path::new(rel.trim_start_matches('/'));
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.output.join(rel))
    }
}

/// Replace `\N` with the N-th capture (empty when the group did not match).
fn expand_captures(template: &str, caps: &Captures) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(digit) = chars.peek().and_then(|d| d.to_digit(10))
        {
            chars.next();
            out.push_str(caps.get(digit as usize).map_or("", |m| m.as_str()));
        } else {
            out.push(c);
        }
    }

    out
}

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve the built output until Ctrl+C.
///
/// With `[serve] watch`, a watcher thread calls `rebuild` after source
/// changes; it is stopped together with the server.
pub fn serve_site<F>(config: &SiteConfig, rebuild: F) -> Result<()>
where
    F: FnMut() -> Result<()> + Send,
{
    let router = Router::from_config(config)?;

    let interface: IpAddr = config
        .serve
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", config.serve.interface))?;
    let (server, addr) = try_bind_port(interface, config.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);
    let stop = Arc::new(AtomicBool::new(false));

    // Set up Ctrl+C handler for graceful shutdown
    let server_for_signal = Arc::clone(&server);
    let stop_for_signal = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        stop_for_signal.store(true, Ordering::Relaxed);
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    std::thread::scope(|scope| {
        if config.serve.watch {
            let stop = &stop;
            scope.spawn(move || {
                if let Err(err) = watch_for_changes_blocking(config, stop, rebuild) {
                    log!("watch"; "{err:#}");
                }
            });
        }

        // Handle requests in main thread (blocks until Ctrl+C)
        for request in server.incoming_requests() {
            if let Err(e) = handle_request(request, &router) {
                log!("serve"; "request error: {e}");
            }
        }
        stop.store(true, Ordering::Relaxed);
    });

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// Request target to filesystem-ready path: the query string is dropped
/// first so an encoded `%3F` stays part of the path.
///
/// `None` when the path does not decode to UTF-8.
fn decode_path(url: &str) -> Option<String> {
    let raw = url.split_once('?').map_or(url, |(path, _query)| path);
    urlencoding::decode(raw).ok().map(std::borrow::Cow::into_owned)
}

fn handle_request(request: Request, router: &Router) -> Result<()> {
    let Some(request_path) = decode_path(request.url()) else {
        return serve_status(request, 400, "400 Bad Request");
    };
    let request_path = request_path.as_str();

    match router.resolve(request_path) {
        Resolved::File { path, mime_type } => {
            let content_type = mime_type.unwrap_or_else(|| guess_content_type(&path).to_owned());
            serve_file(request, &path, &content_type)
        }
        Resolved::Script(script) => {
            log!("serve"; "{request_path}: script `{script}` is not run locally");
            serve_status(request, 501, "501 Not Implemented")
        }
        Resolved::NotFound => serve_status(request, 404, "404 Not Found"),
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow!("Invalid header {name}: {value}"))
}

/// Serve a file with the given content type.
fn serve_file(request: Request, path: &Path, content_type: &str) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response = Response::from_data(content).with_header(header("Content-Type", content_type)?);

    request.respond(response)?;
    Ok(())
}

fn serve_status(request: Request, code: u16, body: &'static str) -> Result<()> {
    let response = Response::new(
        StatusCode(code),
        vec![header("Content-Type", "text/plain")?],
        Cursor::new(body),
        Some(body.len()),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("yaml" | "yml") => "application/yaml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",

        // Audio
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        Some("wav") => "audio/wav",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path();
        for file in [
            "index.html",
            "robots.txt",
            "usage.html",
            "usage/editor.html",
            "api/voices.json",
            "api/en/words.json",
        ] {
            let path = out.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, file).unwrap();
        }

        let handlers = vec![
            Handler::static_file("/robots\\.txt", "robots.txt", "robots\\.txt")
                .with_mime_type("text/plain"),
            Handler {
                url: "/api".into(),
                static_dir: Some("api".into()),
                ..Handler::default()
            },
            Handler::static_file("/", "index.html", "index\\.html").with_mime_type("text/html"),
            Handler::static_file("/(install|usage)", "\\1.html", "(install|usage)\\.html")
                .with_mime_type("text/html"),
            Handler::static_file("/usage/(editor)", "usage/\\1.html", "usage/(editor)\\.html")
                .with_mime_type("text/html"),
            Handler {
                url: "/relay/.*".into(),
                script: Some("relays.app".into()),
                ..Handler::default()
            },
        ];

        let router = Router::new(out, &handlers).unwrap();
        (dir, router)
    }

    fn file(router: &Router, path: &str) -> Option<(PathBuf, Option<String>)> {
        match router.resolve(path) {
            Resolved::File { path, mime_type } => Some((path, mime_type)),
            _ => None,
        }
    }

    #[test]
    fn test_index_and_pages() {
        let (dir, router) = site();

        let (path, mime) = file(&router, "/").unwrap();
        assert_eq!(path, dir.path().join("index.html"));
        assert_eq!(mime.as_deref(), Some("text/html"));

        let (path, _) = file(&router, "/usage").unwrap();
        assert_eq!(path, dir.path().join("usage.html"));

        let (path, _) = file(&router, "/usage/editor").unwrap();
        assert_eq!(path, dir.path().join("usage/editor.html"));
    }

    #[test]
    fn test_handlers_match_whole_path() {
        let (_dir, router) = site();

        assert_eq!(router.resolve("/usage/editor/extra"), Resolved::NotFound);
        assert_eq!(router.resolve("/xusage"), Resolved::NotFound);
        assert_eq!(router.resolve("/index.html"), Resolved::NotFound);
    }

    #[test]
    fn test_rule_without_file_is_not_found() {
        let (_dir, router) = site();
        // matched by the route rule, but install.html was never built
        assert_eq!(router.resolve("/install"), Resolved::NotFound);
    }

    #[test]
    fn test_static_dir() {
        let (dir, router) = site();

        let (path, mime) = file(&router, "/api/en/words.json").unwrap();
        assert_eq!(path, dir.path().join("api/en/words.json"));
        assert_eq!(mime, None);

        assert_eq!(router.resolve("/api/missing.json"), Resolved::NotFound);
        assert_eq!(router.resolve("/api/../index.html"), Resolved::NotFound);
    }

    #[test]
    fn test_script_handler() {
        let (_dir, router) = site();
        assert_eq!(
            router.resolve("/relay/voicetext"),
            Resolved::Script("relays.app".into())
        );
    }

    #[test]
    fn test_first_matching_handler_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.html"), "a").unwrap();
        fs::write(dir.path().join("b.html"), "b").unwrap();

        let router = Router::new(
            dir.path(),
            &[
                Handler::static_file("/page", "a.html", "a\\.html"),
                Handler::static_file("/(page)", "b.html", "b\\.html"),
            ],
        )
        .unwrap();

        assert_eq!(file(&router, "/page").unwrap().0, dir.path().join("a.html"));
    }

    #[test]
    fn test_expand_captures() {
        let re = Regex::new("^/(a)/(b)$").unwrap();
        let caps = re.captures("/a/b").unwrap();

        assert_eq!(expand_captures("x/\\1-\\2.html", &caps), "x/a-b.html");
        assert_eq!(expand_captures("\\3.html", &caps), ".html");
        assert_eq!(expand_captures("plain\\x", &caps), "plain\\x");
    }

    #[test]
    fn test_router_from_generated_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::from_str(
            "[sitemap]\ntitle = \"Docs\"\n[sitemap.children.usage]\ntitle = \"Usage\"",
        )
        .unwrap();
        config.update_path_with_root(dir.path());
        crate::generator::app::write_app_config(&config).unwrap();
        fs::write(config.build.output.join("usage.html"), "usage").unwrap();

        let router = Router::from_config(&config).unwrap();
        assert_eq!(
            file(&router, "/usage").unwrap().0,
            config.build.output.join("usage.html")
        );
    }

    #[test]
    fn test_decode_path_drops_query_before_decoding() {
        assert_eq!(decode_path("/usage?t=123").as_deref(), Some("/usage"));
        assert_eq!(decode_path("/a%20b%3Fc.html?x=%3F").as_deref(), Some("/a b?c.html"));
        assert_eq!(decode_path("/%FF").as_deref(), None);
    }

    #[test]
    fn test_encoded_question_mark_reaches_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("api")).unwrap();
        fs::write(dir.path().join("api/what?.json"), "{}").unwrap();
        let api = Handler {
            url: "/api".into(),
            static_dir: Some("api".into()),
            ..Handler::default()
        };
        let router = Router::new(dir.path(), &[api]).unwrap();

        let path = decode_path("/api/what%3F.json?v=2").unwrap();
        assert_eq!(file(&router, &path).unwrap().0, dir.path().join("api/what?.json"));
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.json")), "application/json; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.unknown")), "application/octet-stream");
    }
}
