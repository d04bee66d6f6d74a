//! GitHub App backed forge
//!
//! Repositories live under a single organization the app is installed on.
//! Credentials are installation access tokens minted from an app JWT, and
//! commits are authored as the app's bot user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::forge::authenticator_lifetime;
use crate::{Authenticator, Forge, ForgeError, ForgeKind, TransportCredential};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const JWT_LIFETIME_SECS: i64 = 600;

#[derive(Debug, Serialize, Deserialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Debug, Deserialize)]
struct Installation {
    id: u64,
    app_slug: String,
}

#[derive(Debug, Deserialize)]
struct InstallationToken {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    id: u64,
}

#[derive(Debug, Serialize)]
struct CreateRepository<'a> {
    name: &'a str,
    private: bool,
    has_issues: bool,
    has_projects: bool,
    has_wiki: bool,
}

pub struct GitHubForge {
    organization: String,
    app_id: String,
    key: EncodingKey,
    make_repos_public: bool,
    api_url: String,
    web_url: String,
    client: reqwest::Client,
}

impl GitHubForge {
    pub fn new(
        organization: &str,
        app_id: &str,
        private_key_pem: &str,
        make_repos_public: bool,
        api_url: &str,
        web_url: &str,
    ) -> Result<Self, ForgeError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).map_err(|e| {
            ForgeError::InvalidConfiguration(format!("Invalid private key: {}", e))
        })?;

        let client = reqwest::Client::builder()
            .user_agent("srcport/1.0")
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            organization: organization.to_string(),
            app_id: app_id.to_string(),
            key,
            make_repos_public,
            api_url: api_url.trim_end_matches('/').to_string(),
            web_url: web_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers
    }

    fn app_jwt(&self, now: DateTime<Utc>) -> Result<String, ForgeError> {
        let claims = AppClaims {
            iat: now.timestamp(),
            exp: now.timestamp() + JWT_LIFETIME_SECS,
            iss: self.app_id.clone(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| ForgeError::InvalidConfiguration(format!("Failed to sign JWT: {}", e)))
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<T, ForgeError> {
        let response = request.headers(self.get_headers()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ForgeError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ForgeError::InvalidResponse(format!("{}: {}", endpoint, e)))
    }
}

#[async_trait]
impl Forge for GitHubForge {
    fn kind(&self) -> ForgeKind {
        ForgeKind::GitHub
    }

    async fn get_authenticator(&self) -> Result<Authenticator, ForgeError> {
        let now = Utc::now();
        let jwt = self.app_jwt(now)?;

        let endpoint = format!("/orgs/{}/installation", self.organization);
        let installation: Installation = self
            .send_json(
                self.client
                    .get(format!("{}{}", self.api_url, endpoint))
                    .bearer_auth(&jwt),
                &endpoint,
            )
            .await?;

        let endpoint = format!("/app/installations/{}/access_tokens", installation.id);
        let token: InstallationToken = self
            .send_json(
                self.client
                    .post(format!("{}{}", self.api_url, endpoint))
                    .bearer_auth(&jwt),
                &endpoint,
            )
            .await?;

        let bot_login = format!("{}[bot]", installation.app_slug);
        let endpoint = format!("/users/{}", bot_login);
        let bot: BotUser = self
            .send_json(
                self.client
                    .get(format!("{}{}", self.api_url, endpoint))
                    .bearer_auth(&token.token),
                &endpoint,
            )
            .await?;

        let ceiling = now + authenticator_lifetime();
        let expires_at = match token.expires_at {
            Some(upstream) if upstream < ceiling => upstream,
            _ => ceiling,
        };

        debug!(
            "minted installation token for {} (installation {})",
            self.organization, installation.id
        );

        Ok(Authenticator {
            credential: TransportCredential::BasicAuth {
                username: self.app_id.clone(),
                password: token.token,
            },
            author_email: format!("{}+{}@users.noreply.github.com", bot.id, bot_login),
            author_name: bot_login,
            expires_at,
        })
    }

    fn get_remote(&self) -> String {
        format!("{}/{}", self.web_url, self.organization)
    }

    async fn ensure_repository_exists(
        &self,
        auth: &Authenticator,
        repo: &str,
    ) -> Result<(), ForgeError> {
        let token = auth.credential.bearer_token();

        let endpoint = format!("/repos/{}/{}", self.organization, repo);
        let lookup = self
            .client
            .get(format!("{}{}", self.api_url, endpoint))
            .headers(self.get_headers())
            .bearer_auth(token)
            .send()
            .await?;
        let status = lookup.status();
        if status.is_success() {
            debug!("repository {}/{} already exists", self.organization, repo);
            return Ok(());
        }
        if status != reqwest::StatusCode::NOT_FOUND {
            return Err(ForgeError::UnexpectedStatus {
                endpoint,
                status: status.as_u16(),
            });
        }

        let endpoint = format!("/orgs/{}/repos", self.organization);
        let response = self
            .client
            .post(format!("{}{}", self.api_url, endpoint))
            .headers(self.get_headers())
            .bearer_auth(token)
            .json(&CreateRepository {
                name: repo,
                private: !self.make_repos_public,
                has_issues: false,
                has_projects: false,
                has_wiki: false,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ForgeError::UnexpectedStatus {
                endpoint,
                status: status.as_u16(),
            });
        }

        info!("created repository {}/{}", self.organization, repo);
        Ok(())
    }
}
