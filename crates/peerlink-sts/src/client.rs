//! HTTP client for the security token service.

use crate::error::AuthError;
use crate::transport::{endpoint, exchange, parse_base, Exchange};
use peerlink_types::{
    basic_authorization, bearer_authorization, BearerToken, ClientInformation,
    ClientRegistrationRequest, ClientUpdateRequest, OAuthErrorResponse, TokenIntrospectionRequest,
    TokenRequest, TokenResponse, TokenRevocationRequest, TokenStatus,
};
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Default TCP connect timeout for token service calls.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default overall deadline for one token service exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`StsClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StsConfig {
    /// Base URL of the token service, e.g. `https://authority.example/sts/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl StsConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Client for token exchange, introspection, revocation and client registration.
#[derive(Debug, Clone)]
pub struct StsClient {
    http: reqwest::Client,
    base: Url,
    request_timeout: Duration,
}

impl StsClient {
    /// Builds a client for the token service at `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidEndpoint`] if the base URL is unusable.
    pub fn new(config: StsConfig) -> Result<Self, AuthError> {
        let base = parse_base(&config.base_url)?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("sts http client build error, using defaults: {}", e);
                reqwest::Client::new()
            });

        tracing::info!(base_url = %base, "sts client configured");

        Ok(Self {
            http,
            base,
            request_timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Performs a client-credentials exchange at `POST /token/oauth2`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Unauthorized`] on bad credentials, [`AuthError::Unreachable`]
    /// on network failure or timeout, [`AuthError::Rejected`] for any other
    /// OAuth error payload.
    pub async fn exchange_token(
        &self,
        client_id: &str,
        client_secret: &str,
        request: &TokenRequest,
    ) -> Result<BearerToken, AuthError> {
        let url = endpoint(&self.base, &["token", "oauth2"])?;
        let call = self
            .http
            .post(url)
            .header(AUTHORIZATION, basic_authorization(client_id, client_secret))
            .form(request);

        let issued: TokenResponse = self.call(call).await?;
        tracing::debug!(
            client_id,
            token_type = %issued.token_type,
            expires_in = ?issued.expires_in,
            "access token issued"
        );

        BearerToken::new(issued.access_token, client_id)
            .map_err(|e| AuthError::InvalidResponse(format!("issued token is unusable: {}", e)))
    }

    /// Introspects `token` at `POST /introspect`.
    ///
    /// The response is parsed generically first; an `error` member is reported
    /// as [`AuthError::Rejected`] without attempting the success shape.
    pub async fn introspect(
        &self,
        token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenStatus, AuthError> {
        let url = endpoint(&self.base, &["introspect"])?;
        let form = TokenIntrospectionRequest {
            token: token.to_string(),
            token_type_hint: Some("access_token".to_string()),
        };
        let call = self
            .http
            .post(url)
            .header(AUTHORIZATION, basic_authorization(client_id, client_secret))
            .form(&form);

        self.call(call).await
    }

    /// Revokes `token` at `POST /revoke`.
    ///
    /// Returns whether the authority acknowledged with HTTP 200.
    ///
    /// # Errors
    ///
    /// Transport failures are reported as [`AuthError::Unreachable`], never as `false`.
    pub async fn revoke(
        &self,
        token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<bool, AuthError> {
        let url = endpoint(&self.base, &["revoke"])?;
        let form = TokenRevocationRequest {
            token: token.to_string(),
            token_type_hint: Some("access_token".to_string()),
        };
        let call = self
            .http
            .post(url)
            .header(AUTHORIZATION, basic_authorization(client_id, client_secret))
            .form(&form);

        let reply = exchange(call, self.request_timeout).await?;
        let acknowledged = reply.status == StatusCode::OK;
        if !acknowledged {
            tracing::info!(client_id, status = reply.status.as_u16(), "token revocation not acknowledged");
        }
        Ok(acknowledged)
    }

    /// Registers a new client at `POST /register` (RFC 7591).
    pub async fn register_client(
        &self,
        initial_access_token: &str,
        request: &ClientRegistrationRequest,
    ) -> Result<ClientInformation, AuthError> {
        let url = endpoint(&self.base, &["register"])?;
        let call = self
            .http
            .post(url)
            .header(AUTHORIZATION, bearer_authorization(initial_access_token)?)
            .json(request);

        let info: ClientInformation = self.call(call).await?;
        tracing::info!(client_id = %info.client_id, "client registered");
        Ok(info)
    }

    /// Reads a client's registration at `GET /register/{client_id}` (RFC 7592).
    pub async fn read_client(
        &self,
        client_id: &str,
        registration_access_token: &str,
    ) -> Result<ClientInformation, AuthError> {
        let url = endpoint(&self.base, &["register", client_id])?;
        let call = self
            .http
            .get(url)
            .header(AUTHORIZATION, bearer_authorization(registration_access_token)?);

        self.call(call).await
    }

    /// Replaces a client's metadata at `PUT /register/{client_id}` (RFC 7592).
    pub async fn update_client(
        &self,
        client_id: &str,
        registration_access_token: &str,
        request: &ClientUpdateRequest,
    ) -> Result<ClientInformation, AuthError> {
        let url = endpoint(&self.base, &["register", client_id])?;
        let call = self
            .http
            .put(url)
            .header(AUTHORIZATION, bearer_authorization(registration_access_token)?)
            .json(request);

        self.call(call).await
    }

    /// Deprovisions a client at `DELETE /register/{client_id}` (RFC 7592).
    ///
    /// Returns `true` only for HTTP 204.
    pub async fn delete_client(
        &self,
        client_id: &str,
        registration_access_token: &str,
    ) -> Result<bool, AuthError> {
        let url = endpoint(&self.base, &["register", client_id])?;
        let call = self
            .http
            .delete(url)
            .header(AUTHORIZATION, bearer_authorization(registration_access_token)?);

        let reply = exchange(call, self.request_timeout).await?;
        if reply.status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized);
        }
        Ok(reply.status == StatusCode::NO_CONTENT)
    }

    async fn call<T: DeserializeOwned>(&self, call: RequestBuilder) -> Result<T, AuthError> {
        let reply = exchange(call, self.request_timeout).await?;
        if reply.status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized);
        }
        decode_payload(&reply)
    }
}

/// Decodes a token service response that may be either `T` or an OAuth error.
///
/// The body is parsed into a generic JSON value first. Only when no `error`
/// member is present and the status is 2xx is the success shape attempted.
pub(crate) fn decode_payload<T: DeserializeOwned>(reply: &Exchange) -> Result<T, AuthError> {
    let status = reply.status.as_u16();
    let value: Value = serde_json::from_slice(&reply.body).map_err(|e| {
        AuthError::InvalidResponse(format!("HTTP {}: body is not JSON: {}", status, e))
    })?;

    if let Some(error) = value.get("error") {
        let payload = OAuthErrorResponse {
            error: error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
            error_description: value
                .get("error_description")
                .and_then(Value::as_str)
                .map(str::to_string),
        };
        tracing::debug!(status, error = %payload.error, "authority returned an error payload");
        return Err(rejection(payload));
    }

    if !reply.status.is_success() {
        return Err(AuthError::InvalidResponse(format!("HTTP {}", status)));
    }

    serde_json::from_value(value)
        .map_err(|e| AuthError::InvalidResponse(format!("HTTP {}: {}", status, e)))
}

fn rejection(payload: OAuthErrorResponse) -> AuthError {
    if payload.error == "invalid_client" {
        return AuthError::Unauthorized;
    }
    AuthError::Rejected(payload.error_description.unwrap_or(payload.error))
}
