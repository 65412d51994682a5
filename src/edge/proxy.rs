//! Browser `/api/*` calls forwarded to the backend, cookies relayed both ways.

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Extension, Request},
    http::{
        header::{
            AUTHORIZATION, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST,
            PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, SET_COOKIE, TE, TRAILER, TRANSFER_ENCODING,
            UPGRADE,
        },
        HeaderMap, HeaderName, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, instrument, Instrument};

use super::state::EdgeState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Headers forwarded from the browser to the backend API.
const API_REQUEST_HEADERS: [HeaderName; 3] = [COOKIE, AUTHORIZATION, CONTENT_TYPE];
/// Headers relayed from the backend API to the browser.
const API_RESPONSE_HEADERS: [HeaderName; 2] = [SET_COOKIE, CONTENT_TYPE];

fn hop_by_hop(name: &HeaderName) -> bool {
    name == CONNECTION
        || name == TE
        || name == TRAILER
        || name == TRANSFER_ENCODING
        || name == UPGRADE
        || name == PROXY_AUTHENTICATE
        || name == PROXY_AUTHORIZATION
        || name == HOST
        || name == CONTENT_LENGTH
        || name.as_str() == "keep-alive"
}

/// Copy `source` into a new map, keeping every value of each accepted name.
pub(super) fn filter_headers(source: &HeaderMap, keep: impl Fn(&HeaderName) -> bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in source {
        if keep(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

pub(super) fn api_request_header(name: &HeaderName) -> bool {
    API_REQUEST_HEADERS.contains(name)
}

pub(super) fn api_response_header(name: &HeaderName) -> bool {
    API_RESPONSE_HEADERS.contains(name)
}

pub(super) fn passthrough_header(name: &HeaderName) -> bool {
    !hop_by_hop(name)
}

pub(super) fn bad_gateway() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({"success": false, "error": "Proxy request failed"})),
    )
        .into_response()
}

/// Send one request upstream and buffer the reply into an axum response.
pub(super) async fn forward(
    state: &EdgeState,
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Bytes,
    keep_response_header: impl Fn(&HeaderName) -> bool,
) -> Result<Response, reqwest::Error> {
    let span = tracing::info_span!("http.upstream", http.method = %method, url = %url);
    let upstream = state
        .client()
        .request(method, url)
        .headers(headers)
        .body(body)
        .send()
        .instrument(span)
        .await?;

    let status = upstream.status();
    let headers = filter_headers(upstream.headers(), keep_response_header);
    let body = upstream.bytes().await?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Read the full request body, or answer 400.
pub(super) async fn read_body(body: Body) -> Result<Bytes, Response> {
    to_bytes(body, MAX_BODY_BYTES).await.map_err(|err| {
        debug!("failed to read request body: {err}");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "Invalid request body"})),
        )
            .into_response()
    })
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn proxy(Extension(state): Extension<Arc<EdgeState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match read_body(body).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
    let url = state.backend(path_and_query);
    let headers = filter_headers(&parts.headers, api_request_header);

    match forward(&state, parts.method, url, headers, body, api_response_header).await {
        Ok(response) => response,
        Err(err) => {
            error!("Proxy request failed: {err}");
            bad_gateway()
        }
    }
}
