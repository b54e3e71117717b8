//! forge::http
//!
//! JSON-over-HTTP plumbing shared by the network backends.
//!
//! # Design
//!
//! [`ApiClient`] owns the `reqwest` client, the API base URL and the token
//! for one handle. Cloning an `ApiClient` snapshots the token into a fresh
//! cell, which is how a forge hands a private credential to each repository
//! it creates. The underlying connection pool is shared.
//!
//! Error statuses are mapped onto [`ForgeError`] in one place; operations
//! that need a different mapping for a specific status (merge conflicts,
//! existing forks) inspect the returned `ApiError` themselves.

use std::sync::{PoisonError, RwLock};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::ForgeError;

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "polyforge";

/// How the token is presented to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `PRIVATE-TOKEN: <token>`
    PrivateToken,
    /// `Authorization: token <token>`
    Token,
}

pub(crate) struct ApiClient {
    client: Client,
    api_base: String,
    scheme: AuthScheme,
    token: RwLock<String>,
    accept: &'static str,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_base", &self.api_base)
            .field("scheme", &self.scheme)
            .field("has_token", &!self.token().is_empty())
            .finish()
    }
}

impl Clone for ApiClient {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_base: self.api_base.clone(),
            scheme: self.scheme,
            token: RwLock::new(self.token()),
            accept: self.accept,
        }
    }
}

/// Generic error body; GitHub and Pagure use `message`/`error`, GitLab uses
/// `message` or `error`.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl ErrorBody {
    fn text(self) -> Option<String> {
        let value = self.message.or(self.error)?;
        Some(match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
    }
}

impl ApiClient {
    pub(crate) fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        scheme: AuthScheme,
        accept: &'static str,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            scheme,
            token: RwLock::new(token.into()),
            accept,
        }
    }

    pub(crate) fn api_base(&self) -> &str {
        &self.api_base
    }

    pub(crate) fn token(&self) -> String {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_token(&self, token: &str) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token.to_string();
    }

    /// Absolute URL for an API path (leading slash optional).
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(self.accept));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let token = self.token();
        if !token.is_empty() {
            let (name, value) = match self.scheme {
                AuthScheme::Bearer => (AUTHORIZATION, format!("Bearer {}", token)),
                AuthScheme::PrivateToken => (HeaderName::from_static("private-token"), token),
                AuthScheme::Token => (AUTHORIZATION, format!("token {}", token)),
            };
            let value = HeaderValue::from_str(&value)
                .map_err(|_| ForgeError::AuthFailed("token contains invalid characters".into()))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ForgeError> {
        Ok(self
            .client
            .request(method, self.url(path))
            .headers(self.headers()?))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ForgeError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        debug!(url = %response.url(), status = response.status().as_u16(), "forge response");
        Ok(response)
    }

    /// GET and decode JSON.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ForgeError> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        handle_response(response).await
    }

    /// GET with query parameters and decode JSON.
    pub(crate) async fn get_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, ForgeError> {
        let response = self
            .send(self.request(Method::GET, path)?.query(query))
            .await?;
        handle_response(response).await
    }

    /// Send a JSON body and decode the JSON answer.
    pub(crate) async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ForgeError> {
        let response = self.send(self.request(method, path)?.json(body)).await?;
        handle_response(response).await
    }

    /// Send a form body and decode the JSON answer (Pagure style).
    pub(crate) async fn send_form<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &B,
    ) -> Result<T, ForgeError> {
        let response = self
            .send(self.request(Method::POST, path)?.form(form))
            .await?;
        handle_response(response).await
    }

    /// Send a JSON body and ignore the answer beyond its status.
    pub(crate) async fn send_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<(), ForgeError> {
        let response = self.send(self.request(method, path)?.json(body)).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(error_from_response(response, status).await)
        }
    }

    /// Fetch every page of a list endpoint that takes `page`/`per_page`.
    pub(crate) async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> Result<Vec<T>, ForgeError> {
        const PER_PAGE: usize = 100;

        let mut all = Vec::new();
        let mut page: u32 = 1;
        loop {
            let mut query: Vec<(&str, String)> = extra.to_vec();
            query.push(("per_page", PER_PAGE.to_string()));
            query.push(("page", page.to_string()));

            let items: Vec<T> = self.get_query(path, &query).await?;
            let count = items.len();
            all.extend(items);

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(all)
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ForgeError> {
    let status = response.status();
    if status.is_success() {
        response.json().await.map_err(|e| ForgeError::ApiError {
            status: status.as_u16(),
            message: format!("Failed to parse response: {}", e),
        })
    } else {
        Err(error_from_response(response, status).await)
    }
}

async fn error_from_response(response: Response, status: StatusCode) -> ForgeError {
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::text)
        .unwrap_or_else(|| "Unknown error".to_string());
    map_status(status, message)
}

/// Map an error status onto the error taxonomy.
pub(crate) fn map_status(status: StatusCode, message: String) -> ForgeError {
    match status {
        StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("Invalid or expired token".into()),
        StatusCode::FORBIDDEN => ForgeError::AuthFailed(format!("Permission denied: {}", message)),
        StatusCode::NOT_FOUND => ForgeError::NotFound(message),
        _ if status.is_server_error() => ForgeError::ApiError {
            status: status.as_u16(),
            message: format!("server error: {}", message),
        },
        _ => ForgeError::ApiError {
            status: status.as_u16(),
            message,
        },
    }
}

/// Turn a 405/409 from a state transition into `InvalidState`.
pub(crate) fn transition_error(err: ForgeError) -> ForgeError {
    match err {
        ForgeError::ApiError { status, message } if status == 405 || status == 409 => {
            ForgeError::InvalidState(message)
        }
        other => other,
    }
}
