//! HTTP plumbing shared by the workspace and account clients.
//!
//! Requests are sent once; there is no retry loop. OAuth machine-to-machine
//! tokens are fetched lazily and cached until shortly before they expire.

use super::error::{ApiError, ApiResult};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// Refresh tokens this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// How requests are authenticated
#[derive(Clone)]
pub enum AuthConfig {
    /// OAuth client-credentials flow against a Databricks OIDC endpoint
    OAuth {
        client_id: String,
        client_secret: String,
        token_url: String,
    },
    /// Static bearer token (personal access token)
    Token(String),
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::OAuth {
                client_id,
                token_url,
                ..
            } => f
                .debug_struct("OAuth")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .field("token_url", token_url)
                .finish(),
            AuthConfig::Token(_) => f.debug_tuple("Token").field(&"[REDACTED]").finish(),
        }
    }
}

#[derive(Clone)]
struct OAuthToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Databricks error payload; REST endpoints use `message`, SCIM uses `detail`
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Authenticated JSON client bound to one Databricks host
pub struct HttpClient {
    client: Client,
    base_url: Url,
    auth: AuthConfig,
    oauth_token: RwLock<Option<OAuthToken>>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("auth", &self.auth)
            .finish()
    }
}

impl HttpClient {
    pub fn new(base_url: &str, auth: AuthConfig, timeout: Duration) -> ApiResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Config(format!("invalid host '{}': {}", base_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::Config(format!(
                "host must be an http(s) URL, got '{}'",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dbx-access-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            auth,
            oauth_token: RwLock::new(None),
        })
    }

    /// Builds a URL from a path.
    pub fn build_url(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Executes a GET request and returns the raw response.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> ApiResult<Response> {
        let request = self.client.get(self.build_url(path)).query(query);
        self.execute(request).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let response = self.get(path, query).await?;
        parse_json_response(response).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let request = self.client.post(self.build_url(path)).json(body);
        let response = self.execute(request).await?;
        parse_json_response(response).await
    }

    /// PATCH with a JSON body; the response body is discarded.
    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<()> {
        let request = self.client.patch(self.build_url(path)).json(body);
        self.execute(request).await?;
        Ok(())
    }

    /// PUT with a JSON body; the response body is discarded.
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<()> {
        let request = self.client.put(self.build_url(path)).json(body);
        self.execute(request).await?;
        Ok(())
    }

    /// Executes a request once with authentication and status mapping.
    async fn execute(&self, request: RequestBuilder) -> ApiResult<Response> {
        let request = self.add_auth(request).await?;
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), %status, "Databricks API response");

        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let detail = error_detail(&text);
        Err(match status {
            StatusCode::UNAUTHORIZED => ApiError::AuthenticationFailed(detail),
            StatusCode::FORBIDDEN => ApiError::AuthorizationDenied(detail),
            StatusCode::NOT_FOUND => ApiError::NotFound(detail),
            _ => ApiError::RequestFailed(format!("{}: {}", status, detail)),
        })
    }

    async fn add_auth(&self, request: RequestBuilder) -> ApiResult<RequestBuilder> {
        match &self.auth {
            AuthConfig::Token(token) => Ok(request.bearer_auth(token)),
            AuthConfig::OAuth {
                client_id,
                client_secret,
                token_url,
            } => {
                let token = self
                    .get_oauth_token(client_id, client_secret, token_url)
                    .await?;
                Ok(request.bearer_auth(token))
            }
        }
    }

    /// Gets or refreshes an OAuth token.
    async fn get_oauth_token(
        &self,
        client_id: &str,
        client_secret: &str,
        token_url: &str,
    ) -> ApiResult<String> {
        {
            let token = self.oauth_token.read().await;
            if let Some(t) = &*token {
                if t.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN {
                    return Ok(t.access_token.clone());
                }
            }
        }

        info!(token_url, "Fetching new OAuth token");

        let response = self
            .client
            .post(token_url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "all-apis")])
            .send()
            .await
            .map_err(|e| ApiError::AuthenticationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::AuthenticationFailed(format!(
                "token request failed with {}: {}",
                status,
                error_detail(&text)
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        let token = OAuthToken {
            access_token: token_response.access_token,
            expires_at: Instant::now() + Duration::from_secs(token_response.expires_in),
        };
        let access_token = token.access_token.clone();
        *self.oauth_token.write().await = Some(token);

        Ok(access_token)
    }
}

/// Parses a JSON response, treating an empty body as `{}`.
async fn parse_json_response<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    let text = response.text().await?;
    let body = if text.trim().is_empty() { "{}" } else { text.as_str() };

    serde_json::from_str(body).map_err(|e| {
        ApiError::InvalidResponse(format!(
            "failed to parse response (status {}): {} - body: {}",
            status,
            e,
            text.chars().take(500).collect::<String>()
        ))
    })
}

fn error_detail(text: &str) -> String {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let message = body.message.or(body.detail);
    match (body.error_code, message) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (None, Some(message)) => message,
        (Some(code), None) => code,
        (None, None) => text.chars().take(500).collect(),
    }
}
