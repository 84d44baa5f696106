// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! Authenticated media proxy: `GET /api/proxy?url=...`, restricted to the
//! permitted upstream domain suffixes (spec §4.10, §6).

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::constants;
use crate::gateway::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: String,
}

/// Accepts only hostnames ending in one of [`constants::PROXY_ALLOWED_SUFFIXES`].
pub fn is_allowed_host(host: &str) -> bool {
    constants::PROXY_ALLOWED_SUFFIXES
        .iter()
        .any(|suffix| host == *suffix || host.ends_with(&format!(".{suffix}")))
}

pub async fn proxy_handler(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Response {
    let Ok(parsed) = reqwest::Url::parse(&query.url) else {
        return (StatusCode::BAD_REQUEST, "invalid url").into_response();
    };
    let Some(host) = parsed.host_str() else {
        return (StatusCode::BAD_REQUEST, "url has no host").into_response();
    };
    if !is_allowed_host(host) {
        return (StatusCode::FORBIDDEN, "host not permitted").into_response();
    }

    let auth_state = match state.auth.authenticate(false).await {
        Ok(s) => s,
        Err(e) => return (StatusCode::UNAUTHORIZED, e.to_string()).into_response(),
    };

    let upstream = reqwest::Client::new()
        .get(parsed)
        .header(reqwest::header::COOKIE, auth_state.cookie_header())
        .send()
        .await;

    match upstream {
        Ok(resp) => {
            let status = resp.status();
            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .cloned();
            match resp.bytes().await {
                Ok(body) => {
                    let mut builder = Response::builder().status(status.as_u16());
                    if let Some(ct) = content_type {
                        builder = builder.header(reqwest::header::CONTENT_TYPE, ct);
                    }
                    builder.body(axum::body::Body::from(body)).unwrap()
                }
                Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
            }
        }
        Err(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    }
}
