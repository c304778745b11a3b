//! Embedded documentation pages
//!
//! Mounted only with the `docs` profile, behind form login.

use axum::{
    Router,
    extract::Path,
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use rust_embed::Embed;

use crate::state::AppState;

const DOCS_INDEX: &str = "/docs/index.html";

/// Documentation bundled into the binary
#[derive(Embed)]
#[folder = "$CARGO_MANIFEST_DIR/docs"]
struct DocsAssets;

fn serve(path: &str) -> Response {
    match <DocsAssets as Embed>::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /docs/{*path}
async fn serve_doc(Path(path): Path<String>) -> Response {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return serve("index.html");
    }
    serve(path)
}

/// Create documentation routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to(DOCS_INDEX) }))
        .route("/docs", get(|| async { Redirect::to(DOCS_INDEX) }))
        .route("/docs/", get(|| async { serve("index.html") }))
        .route("/docs/{*path}", get(serve_doc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_pages() {
        assert!(<DocsAssets as Embed>::get("index.html").is_some());
        assert!(<DocsAssets as Embed>::get("security.html").is_some());
        assert_eq!(serve("missing.html").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_serve_sets_content_type() {
        let response = serve("index.html");
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/html"));
    }
}
