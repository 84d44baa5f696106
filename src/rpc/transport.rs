// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! RPC Transport: the two request formats (JSON-protobuf and batchexecute)
//! and the shared 401/429/5xx retry policy (spec §4.4).

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::warn;

use crate::auth::manager::{AuthManager, AuthState, InvalidateScope};
use crate::config::Config;
use crate::constants;
use crate::error::{DynamiteError, Result};
use crate::wire::envelope::{parse_batch_endpoint, parse_json_endpoint, RpcEnvelopeEntry};
use crate::wire::sapisidhash;

const SERVER_ERROR_RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct RpcTransport {
    config: Config,
    auth: Arc<AuthManager>,
    http: reqwest::Client,
}

impl RpcTransport {
    pub fn new(config: Config, auth: Arc<AuthManager>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self { config, auth, http })
    }

    /// `POST /api/{method}?alt=protojson&key={apiKey}`.
    #[tracing::instrument(skip(self, body), fields(method))]
    pub async fn call_json(&self, method: &str, body: Value) -> Result<Vec<RpcEnvelopeEntry>> {
        self.dispatch(Endpoint::Json(method), body).await
    }

    /// `POST /_/DynamiteWebUi/data/batchexecute`.
    #[tracing::instrument(skip(self, body), fields(rpc_id))]
    pub async fn call_batch(&self, rpc_id: &str, body: Value) -> Result<Vec<RpcEnvelopeEntry>> {
        self.dispatch(Endpoint::Batch(rpc_id), body).await
    }

    async fn dispatch(&self, endpoint: Endpoint<'_>, body: Value) -> Result<Vec<RpcEnvelopeEntry>> {
        let mut retried_auth = false;
        let mut retried_server_error = false;

        loop {
            let auth_state = self.auth.authenticate(false).await?;
            let request = self.build_request(&endpoint, &body, &auth_state);
            let resp = request.send().await?;
            let status = resp.status();

            if status == StatusCode::UNAUTHORIZED {
                if retried_auth {
                    return Err(DynamiteError::Unauthorized);
                }
                retried_auth = true;
                self.auth.invalidate(InvalidateScope::Xsrf).await;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok());
                return Err(DynamiteError::RateLimited { retry_after_secs });
            }

            if status.is_server_error() {
                if retried_server_error {
                    return Err(DynamiteError::ServerError(status.to_string()));
                }
                retried_server_error = true;
                warn!(%status, "rpc transport retrying after server error");
                tokio::time::sleep(SERVER_ERROR_RETRY_DELAY).await;
                continue;
            }

            if !status.is_success() {
                return Err(DynamiteError::ServerError(format!(
                    "unexpected status {status}"
                )));
            }

            let text = resp.text().await?;
            return match endpoint {
                Endpoint::Json(_) => parse_json_endpoint(&text),
                Endpoint::Batch(_) => parse_batch_endpoint(&text),
            };
        }
    }

    fn build_request(
        &self,
        endpoint: &Endpoint<'_>,
        body: &Value,
        auth_state: &AuthState,
    ) -> reqwest::RequestBuilder {
        let url = match endpoint {
            Endpoint::Json(method) => format!(
                "{origin}{prefix}/{method}?alt=protojson&key={key}",
                origin = constants::SERVICE_ORIGIN,
                prefix = constants::JSON_RPC_PATH_PREFIX,
                key = constants::API_KEY,
            ),
            Endpoint::Batch(_) => format!(
                "{origin}{path}",
                origin = constants::SERVICE_ORIGIN,
                path = constants::BATCH_EXECUTE_PATH,
            ),
        };

        let builder = self.http.post(url).header(
            reqwest::header::COOKIE,
            auth_state.cookie_header(),
        );

        let builder = builder
            .header("x-framework-xsrf-token", &auth_state.xsrf_token)
            .header("X-Goog-Authuser", "0")
            .header(reqwest::header::ORIGIN, constants::SERVICE_ORIGIN)
            .header(reqwest::header::REFERER, constants::SERVICE_ORIGIN);

        let builder = if let Some(sapisid) = auth_state.sapisid() {
            builder.header(
                reqwest::header::AUTHORIZATION,
                sapisidhash::header_value(sapisid, constants::SERVICE_ORIGIN),
            )
        } else {
            builder
        };

        match endpoint {
            Endpoint::Json(_) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/json+protobuf")
                .body(body.to_string()),
            Endpoint::Batch(_) => {
                let form = [("f.req", body.to_string()), ("at", auth_state.xsrf_token.clone())];
                builder
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        "application/x-www-form-urlencoded",
                    )
                    .form(&form)
            }
        }
    }
}

enum Endpoint<'a> {
    Json(&'a str),
    Batch(&'a str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_endpoint_url_includes_api_key() {
        let url = format!(
            "{origin}{prefix}/{method}?alt=protojson&key={key}",
            origin = constants::SERVICE_ORIGIN,
            prefix = constants::JSON_RPC_PATH_PREFIX,
            method = "list_topics",
            key = constants::API_KEY,
        );
        assert!(url.contains(constants::API_KEY));
        assert!(url.starts_with(constants::SERVICE_ORIGIN));
    }
}
