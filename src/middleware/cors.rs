use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::state::AppState;

/// Per-request CORS decision, computed before the authorizer runs.
#[derive(Debug, Clone)]
pub struct CorsContext {
    pub origin: Option<String>,
    pub is_allowed: bool,
    pub has_origin_header: bool,
}

/// Exact matching after normalization: trim, strip one trailing slash,
/// lowercase. No wildcard or subdomain matching.
pub fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_lowercase()
}

/// Builds the CORS decision for a request. Requests without an Origin
/// header (server-to-server, same-origin) bypass the check. An empty
/// allow-list allows any origin - the documented fail-open default for
/// same-origin and development deployments.
pub fn create_cors_context(headers: &HeaderMap, allowed_origins: &[String]) -> CorsContext {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(normalize_origin);

    let is_allowed = match &origin {
        None => true,
        Some(origin) => {
            allowed_origins.is_empty()
                || allowed_origins.iter().any(|a| normalize_origin(a) == *origin)
        }
    };

    CorsContext {
        has_origin_header: origin.is_some(),
        origin,
        is_allowed,
    }
}

/// Returns the rejection response for a disallowed cross-origin
/// request, or None when the request may proceed.
pub fn reject_if_disallowed(context: &CorsContext) -> Option<Response> {
    if context.is_allowed {
        None
    } else {
        Some(ApiError::forbidden("Origin is not allowed").into_response())
    }
}

/// Gate middleware: rejects disallowed origins before any downstream
/// layer (including the authorizer), answers preflight directly, and
/// echoes the validated Origin on allowed responses.
pub async fn cors_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let context = create_cors_context(request.headers(), &state.allowed_origins);

    if let Some(rejection) = reject_if_disallowed(&context) {
        return rejection;
    }

    if request.method() == Method::OPTIONS && context.has_origin_header {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(&mut response, &context);
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
        );
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("authorization, content-type"),
        );
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(&mut response, &context);
    response
}

fn apply_cors_headers(response: &mut Response, context: &CorsContext) {
    let Some(origin) = &context.origin else { return };
    if let Ok(value) = HeaderValue::from_str(origin) {
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        response
            .headers_mut()
            .insert(header::VARY, HeaderValue::from_static("Origin"));
    }
}
