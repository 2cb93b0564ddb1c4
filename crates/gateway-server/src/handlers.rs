//! Request pipeline.
//!
//! Every request goes through one handler:
//!
//! 1. `OPTIONS` is answered locally as a CORS preflight.
//! 2. The path is normalised; everything after this sees only the
//!    normalised path.
//! 3. Non-public paths must carry the client secret.
//! 4. The completion proxy route is served by [`OpenRouterClient`].
//! 5. Unmapped paths get 404.
//! 6. Backend credentials are injected for the path class.
//! 7. `GET` requests for cacheable path classes are answered from the cache
//!    when possible.
//! 8. Everything else is forwarded and streamed back.
//!
//! CORS headers go on every response for allow-listed origins, errors
//! included. Security headers go on everything except function responses.
//!
//! [`OpenRouterClient`]: crate::openrouter::OpenRouterClient

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use gateway_core::headers::X_FORWARDED_PROTO;
use gateway_core::{GatewayError, GatewayResult};
use gateway_resilience::cache_key;
use gateway_routing::{RoutedPath, SpecialRoute};
use gateway_security::{apply_security_headers, outbound_headers, OriginDecision};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::forward::{cached_response, read_body, relay, CacheWrite, OutboundBody};
use crate::state::AppState;

/// Entry point for all gateway traffic.
pub async fn gateway(State(state): State<AppState>, request: Request) -> Response {
    let method = request.method().clone();
    let origin = state.cors.decide(request.headers());

    if method == Method::OPTIONS {
        return preflight(&state, request.headers(), &origin);
    }

    let routed = state.routes.route(request.uri().path());
    let class = routed.class;

    let mut response = match dispatch(&state, routed, request).await {
        Ok(response) => response,
        Err(error) => ApiError::from(error).into_response(),
    };

    if !class.is_function() {
        apply_security_headers(&state.security_headers, response.headers_mut());
    }
    state.cors.apply(&method, &origin, response.headers_mut());
    response
}

/// Answer a CORS preflight.
pub fn preflight(state: &AppState, headers: &HeaderMap, origin: &OriginDecision) -> Response {
    if origin.is_denied() {
        let origin = headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        return ApiError::from(GatewayError::ForbiddenOrigin(origin)).into_response();
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    state.cors.apply(&Method::OPTIONS, origin, response.headers_mut());
    response
}

async fn dispatch(state: &AppState, routed: RoutedPath, request: Request) -> GatewayResult<Response> {
    let RoutedPath { path, class } = routed;

    if !class.is_public() {
        state.secret_gate.verify(request.headers())?;
    }

    if let Some(SpecialRoute::OpenRouter) = SpecialRoute::lookup(&path) {
        return openrouter(state, request).await;
    }

    if !class.is_forwardable() {
        return Err(GatewayError::RouteNotFound(path));
    }

    let (parts, body) = request.into_parts();

    let mut headers = outbound_headers(&parts.headers);
    let credential = state.credentials.inject(class, &mut headers)?;
    debug!(path = %path, class = %class, credential = %credential, "Routing request");

    let cache_target = match &state.cache {
        Some(store) if parts.method == Method::GET && state.config.cache.is_cacheable(class) => {
            let key = request_cache_key(state, &parts.headers, &parts.uri, &path);
            if let Some(hit) = store.get(&key).await {
                debug!(path = %path, "Cache hit");
                return Ok(cached_response(hit));
            }
            debug!(path = %path, "Cache miss");
            Some(CacheWrite {
                store: store.clone(),
                key,
                max_body_bytes: state.config.cache.max_body_bytes,
            })
        }
        _ => None,
    };

    let body = OutboundBody::new(&parts.headers, body, state.config.server.max_request_body_bytes)?;
    let upstream = state
        .forwarder
        .send(parts.method, &path, parts.uri.query(), headers, body)
        .await?;

    Ok(relay(upstream, cache_target))
}

async fn openrouter(state: &AppState, request: Request) -> GatewayResult<Response> {
    if *request.method() != Method::POST {
        return Err(GatewayError::method_not_allowed(
            request.method().as_str(),
            request.uri().path(),
        ));
    }

    let (parts, body) = request.into_parts();
    let body = read_body(&parts.headers, body, state.config.server.max_request_body_bytes).await?;
    state.openrouter.complete(body).await
}

fn request_cache_key(
    state: &AppState,
    headers: &HeaderMap,
    uri: &axum::http::Uri,
    path: &str,
) -> String {
    let scheme = headers
        .get(X_FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(&state.config.cache.default_scheme);

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(axum::http::uri::Authority::as_str))
        .unwrap_or_else(|| {
            warn!("Request without Host header, caching under empty host");
            ""
        });

    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_owned(),
    };

    cache_key(scheme, host, &path_and_query)
}
