use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Rejects requests whose request line and headers exceed `limit` bytes
pub async fn enforce_header_limit(
    State(limit): State<usize>,
    request: Request,
    next: Next,
) -> Response {
    let size = header_block_size(&request);
    if size > limit {
        warn!(size, limit, uri = %request.uri(), "Rejecting oversized request headers");
        return (
            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            "Request Header Fields Too Large",
        )
            .into_response();
    }

    next.run(request).await
}

/// Approximate wire size: `METHOD SP target SP HTTP/x.y CRLF` plus `name: value CRLF` per header
fn header_block_size<B>(request: &axum::http::Request<B>) -> usize {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().len())
        .unwrap_or(1);
    let request_line = request.method().as_str().len() + target + 12;

    request
        .headers()
        .iter()
        .fold(request_line, |acc, (name, value)| {
            acc + name.as_str().len() + value.len() + 4
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_header_block_size() {
        let request = Request::builder()
            .method("GET")
            .uri("/gh/a/b/c/d")
            .header("x-test", "12345")
            .body(())
            .unwrap();

        // "GET" + "/gh/a/b/c/d" + 12, then "x-test" + "12345" + 4
        assert_eq!(header_block_size(&request), 3 + 11 + 12 + 6 + 5 + 4);
    }
}
