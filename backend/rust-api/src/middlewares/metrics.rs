use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency per normalized route
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Collapses ObjectId segments to `{id}` so route labels stay bounded
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_object_id(segment) { "{id}" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_object_id(s: &str) -> bool {
    s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_collapse_to_placeholder() {
        assert_eq!(
            normalize_path("/api/v1/homework/65a1f0c2e4b0a1b2c3d4e5f6/review"),
            "/api/v1/homework/{id}/review"
        );
        assert_eq!(normalize_path("/api/v1/leaderboard"), "/api/v1/leaderboard");
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn only_24_hex_characters_count_as_object_id() {
        assert!(is_object_id("65a1f0c2e4b0a1b2c3d4e5f6"));
        assert!(!is_object_id("65a1f0c2e4b0a1b2c3d4e5fz"));
        assert!(!is_object_id("65a1f0c2e4b0"));
        assert!(!is_object_id("complete-lesson"));
    }
}
