/// Static assets for the web page, served from disk

use tower_http::services::ServeDir;

use crate::utils::STATIC_DIR;

/// STATIC_DIR env var overrides the default `./static`
pub fn static_dir() -> String {
    std::env::var("STATIC_DIR")
        .ok()
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| STATIC_DIR.to_string())
}

pub fn static_service() -> ServeDir {
    ServeDir::new(static_dir())
}
