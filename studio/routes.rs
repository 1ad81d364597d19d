use std::io::{Cursor, Read};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::handlers;
use crate::state::SharedState;

pub type HttpResponse = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn with_body(status: u16, content_type: &str, body: Vec<u8>, extra: Vec<Header>) -> HttpResponse {
    let len = body.len();
    let mut headers: Vec<Header> = header("Content-Type", content_type).into_iter().collect();
    headers.extend(extra);
    Response::new(StatusCode(status), headers, Cursor::new(body), Some(len), None)
}

pub fn html_response(body: String) -> HttpResponse {
    with_body(200, "text/html; charset=utf-8", body.into_bytes(), Vec::new())
}

pub fn svg_response(body: String) -> HttpResponse {
    let headers = header("Cache-Control", "no-store").into_iter().collect();
    with_body(200, "image/svg+xml", body.into_bytes(), headers)
}

pub fn redirect(location: &str) -> HttpResponse {
    let headers = header("Location", location).into_iter().collect();
    with_body(303, "text/plain", Vec::new(), headers)
}

pub fn json_download_response(body: String, filename: &str) -> HttpResponse {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    let headers = header("Content-Disposition", &disposition).into_iter().collect();
    with_body(200, "application/json", body.into_bytes(), headers)
}

pub fn not_found() -> HttpResponse {
    with_body(404, "text/plain", b"404 Not Found".to_vec(), Vec::new())
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Dispatches incoming requests to the appropriate handler.
///
/// All handlers (except SSE) receive a `&mut Request` so that the dispatcher
/// retains ownership and can call `request.respond(response)` at the end.
/// The SSE handler takes ownership to perform long-lived streaming.
pub fn dispatch(mut request: Request, state: SharedState) {
    let method = request.method().clone();
    let url    = request.url().to_owned();
    let path   = url.split('?').next().unwrap_or("").to_owned();

    log::debug!("{} {}", method, url);

    if method == Method::Get && path == "/train/events" {
        handlers::train_sse::handle(request, state);
        return;
    }

    let response = match (method, path.as_str()) {
        // ── Root redirect ─────────────────────────────────────────────────
        (Method::Get, "/") => redirect("/data"),

        // ── Data ─────────────────────────────────────────────────────────
        (Method::Get,  "/data")           => handlers::data::handle_get(state),
        (Method::Post, "/data/upload")    => handlers::data::handle_upload(&mut request, state),
        (Method::Post, "/data/visualize") => handlers::data::handle_visualize(&mut request, state),
        (Method::Post, "/data/label")     => handlers::data::handle_label(&mut request, state),
        (Method::Post, "/data/drop")      => handlers::data::handle_drop(&mut request, state),
        (Method::Post, "/data/process")   => handlers::data::handle_process(&mut request, state),
        (Method::Post, "/data/split")     => handlers::data::handle_split(&mut request, state),

        // ── Model ────────────────────────────────────────────────────────
        (Method::Get,  "/model")                => handlers::builder::handle_get(state),
        (Method::Get,  "/model/diagram.svg")    => handlers::builder::handle_diagram(state),
        (Method::Get,  "/model/config.json")    => handlers::builder::handle_download(state),
        (Method::Post, "/model/layers/add")     => handlers::builder::handle_add(&mut request, state),
        (Method::Post, "/model/layers/update")  => handlers::builder::handle_update(&mut request, state),
        (Method::Post, "/model/layers/retype")  => handlers::builder::handle_retype(&mut request, state),
        (Method::Post, "/model/layers/remove")  => handlers::builder::handle_remove(&mut request, state),
        (Method::Post, "/model/reset")          => handlers::builder::handle_reset(state),
        (Method::Post, "/model/build")          => handlers::builder::handle_build(state),

        // ── Train ────────────────────────────────────────────────────────
        (Method::Get,  "/train")        => handlers::train::handle_get(state),
        (Method::Post, "/train/start")  => handlers::train::handle_start(&mut request, state),
        (Method::Post, "/train/detach") => handlers::train::handle_detach(state),

        // ── 404 ──────────────────────────────────────────────────────────
        _ => not_found(),
    };

    if let Err(e) = request.respond(response) {
        log::debug!("client went away before the response was sent: {e}");
    }
}

/// Reads a urlencoded request body into `(key, value)` pairs.
pub fn read_form(request: &mut Request) -> Vec<(String, String)> {
    let mut body = String::new();
    if let Err(e) = request.as_reader().read_to_string(&mut body) {
        log::warn!("failed to read form body: {e}");
    }
    crate::util::form::parse_form(&body)
}
