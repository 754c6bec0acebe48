use super::types::{
    EntriesResponse, ErrorResponse, FetchContentResponse, MeResponse, UpdateStatusRequest,
};
use super::{ApiError, EntryContext, EntrySource, FetchParams};
use crate::auth::Credentials;
use crate::store::{EntryId, EntryPage, EntryStatus};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

enum ClientAuth {
    Token(SecretString),
    Basic {
        username: String,
        password: SecretString,
    },
}

/// HTTP client for the Miniflux v1 REST API.
pub struct MinifluxClient {
    http: reqwest::Client,
    base: Url,
    auth: ClientAuth,
}

impl MinifluxClient {
    pub fn new(creds: &Credentials) -> Result<Self, ApiError> {
        let base = parse_base_url(&creds.server)?;

        let auth = match (&creds.token, &creds.username, &creds.password) {
            (Some(token), _, _) if !token.expose_secret().is_empty() => {
                ClientAuth::Token(token.clone())
            }
            (_, Some(username), Some(password)) => ClientAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => {
                return Err(ApiError::Validation(
                    "No API token or username/password configured".to_string(),
                ))
            }
        };

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("reflux/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::from)?;

        Ok(Self { http, base, auth })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Validation(format!("Invalid request path '{}': {}", path, e)))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.authorize(self.http.request(method, self.url(path)?)))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            ClientAuth::Token(token) => builder.header("X-Auth-Token", token.expose_secret()),
            ClientAuth::Basic { username, password } => {
                builder.basic_auth(username, Some(password.expose_secret()))
            }
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Best effort: the body may be empty or not JSON at all.
        let message = read_limited_bytes(response, MAX_RESPONSE_SIZE)
            .await
            .ok()
            .and_then(|body| serde_json::from_slice::<ErrorResponse>(&body).ok())
            .map(|e| e.error_message);
        let err = ApiError::from_status(status.as_u16(), message);
        tracing::debug!(status = status.as_u16(), error = %err, "Request rejected by server");
        Err(err)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        let body = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::transport(format!("Malformed server response: {}", e)))
    }

    async fn me(&self) -> Result<MeResponse, ApiError> {
        self.get_json(self.request(Method::GET, "/v1/me")?).await
    }

    /// Check the credentials against the server and return the account name.
    pub async fn verify_login(&self) -> Result<String, ApiError> {
        let me = self.me().await?;
        tracing::debug!(user_id = me.id, "Login verified");
        Ok(me.username)
    }
}

#[async_trait]
impl EntrySource for MinifluxClient {
    async fn fetch_entries(&self, params: &FetchParams) -> Result<EntryPage, ApiError> {
        let mut url = self.url(&params.path())?;
        url.query_pairs_mut().extend_pairs(params.query_pairs());
        let builder = self.authorize(self.http.get(url));
        let response: EntriesResponse = self.get_json(builder).await?;
        tracing::debug!(
            context = ?params.context,
            offset = params.offset,
            returned = response.entries.len(),
            total = response.total,
            "Fetched entries"
        );
        Ok(response.into_page())
    }

    async fn update_entry_status(
        &self,
        ids: &[EntryId],
        status: EntryStatus,
    ) -> Result<(), ApiError> {
        if ids.is_empty() {
            return Ok(());
        }
        let body = serde_json::to_vec(&UpdateStatusRequest {
            entry_ids: ids,
            status,
        })
        .map_err(|e| ApiError::Validation(format!("Failed to encode request: {}", e)))?;
        let builder = self
            .request(Method::PUT, "/v1/entries")?
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.send(builder).await?;
        Ok(())
    }

    async fn update_entry_starred(&self, id: EntryId) -> Result<(), ApiError> {
        let path = format!("/v1/entries/{}/bookmark", id);
        self.send(self.request(Method::PUT, &path)?).await?;
        Ok(())
    }

    async fn mark_all_read(&self, context: &EntryContext) -> Result<(), ApiError> {
        let path = match context {
            EntryContext::Feed(id) => format!("/v1/feeds/{}/mark-all-as-read", id),
            EntryContext::Category(id) => format!("/v1/categories/{}/mark-all-as-read", id),
            EntryContext::All => {
                let user_id = self.me().await?.id;
                format!("/v1/users/{}/mark-all-as-read", user_id)
            }
            EntryContext::Starred | EntryContext::History => {
                return Err(ApiError::Validation(format!(
                    "Cannot mark all as read in {}",
                    context.label()
                )))
            }
        };
        self.send(self.request(Method::PUT, &path)?).await?;
        Ok(())
    }

    async fn fetch_original_content(&self, id: EntryId) -> Result<String, ApiError> {
        let path = format!("/v1/entries/{}/fetch-content", id);
        let response: FetchContentResponse =
            self.get_json(self.request(Method::GET, &path)?).await?;
        Ok(response.content)
    }
}

/// Parse the server URL, normalizing it to end with a slash so relative
/// joins keep any path prefix (e.g. `https://host/miniflux/`).
fn parse_base_url(server: &str) -> Result<Url, ApiError> {
    let trimmed = server.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| ApiError::Validation(format!("Invalid server URL '{}': {}", server, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ApiError::Validation(format!(
            "Unsupported server URL scheme '{}'",
            other
        ))),
    }
}

async fn read_limited_bytes(response: Response, limit: usize) -> Result<Vec<u8>, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::transport(format!(
                "Response too large (exceeds {} bytes)",
                limit
            )));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::transport(format!(
                "Response too large (exceeds {} bytes)",
                limit
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
