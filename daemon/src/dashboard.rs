//! Local web dashboard listing this session's uploads.
//!
//! Routes: `GET /` renders the feed, `GET /clear` empties it and redirects
//! back. Anything else is a 404. Bound to localhost only, no authentication.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use std::fmt::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::DashboardError;
use crate::feed::{EventFeed, UploadRecord};
use crate::status::{Status, StatusModel};

const APP_NAME: &str = "Arcdps Log Uploader";

#[derive(Clone)]
pub struct DashboardState {
    pub feed: Arc<EventFeed>,
    pub folder: PathBuf,
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/clear", get(clear_handler))
        .with_state(state)
}

async fn index_handler(State(state): State<DashboardState>) -> Html<String> {
    tracing::info!("GET /");
    Html(render_page(&state.folder, &state.feed.snapshot()))
}

async fn clear_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    tracing::info!("GET /clear");
    state.feed.clear();
    (StatusCode::FOUND, [(header::LOCATION, "/")])
}

/// Binds `127.0.0.1:port` and serves until the process exits.
pub async fn serve(port: u16, state: DashboardState) -> Result<(), DashboardError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| DashboardError::Bind { port, source })?;

    tracing::info!("web server started at http://localhost:{port}");
    axum::serve(listener, router(state))
        .await
        .map_err(DashboardError::Serve)
}

/// Runs the dashboard. A failure only marks the status; ingestion continues.
pub async fn run(port: u16, state: DashboardState, status: Arc<StatusModel>) {
    if let Err(e) = serve(port, state).await {
        tracing::error!("could not start web server: {e}");
        status.set(Status::Disconnected, format!("Web server failed: {e}"));
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn render_rows(records: &[UploadRecord]) -> String {
    if records.is_empty() {
        return r#"<tr><td colspan="4" class="empty">Awaiting new logs...</td></tr>"#.to_string();
    }

    let mut rows = String::new();
    for record in records {
        let (class, result) = if record.success {
            ("status-success", "Success")
        } else {
            ("status-fail", "Fail")
        };
        let link = escape_html(&record.permalink);
        let _ = write!(
            rows,
            r#"<tr><td>{boss}</td><td class="{class}">{result}</td><td>{time}</td><td><a href="{link}" target="_blank">{link}</a></td></tr>"#,
            boss = escape_html(&record.boss),
            time = record.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    rows
}

pub fn render_page(folder: &std::path::Path, records: &[UploadRecord]) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{APP_NAME}</title>
<style>
body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #1a1a1a; color: #e0e0e0; margin: 0; padding: 2rem; }}
.container {{ max-width: 1000px; margin: 0 auto; }}
h1 {{ color: #eee; border-bottom: 2px solid #444; padding-bottom: 10px; }}
table {{ width: 100%; border-collapse: collapse; margin-top: 20px; }}
th, td {{ padding: 12px 15px; text-align: left; border-bottom: 1px solid #333; }}
th {{ background-color: #2c2c2c; }}
tr:nth-child(even) {{ background-color: #252525; }}
a {{ color: #3498db; text-decoration: none; }}
a:hover {{ text-decoration: underline; }}
.empty {{ text-align: center; padding: 20px; }}
.status-success {{ color: #2ecc71; font-weight: bold; }}
.status-fail {{ color: #e74c3c; font-weight: bold; }}
.button {{ background-color: #3498db; color: white; padding: 10px 15px; border-radius: 5px; text-decoration: none; display: inline-block; margin-top: 1rem; }}
.button:hover {{ background-color: #2980b9; }}
</style>
</head>
<body>
<div class="container">
<h1>{APP_NAME}</h1>
<p>Watching folder: <code>{folder}</code></p>
<a href="/clear" class="button">Clear Session View</a>
<table>
<thead><tr><th>Boss</th><th>Result</th><th>Upload Time</th><th>dps.report Link</th></tr></thead>
<tbody>{rows}</tbody>
</table>
</div>
</body>
</html>
"#,
        folder = escape_html(&folder.display().to_string()),
        rows = render_rows(records),
    )
}
