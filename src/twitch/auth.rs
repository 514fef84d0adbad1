//! App access token validation and refresh.
//!
//! Twitch app access tokens come from the OAuth 2.0 client-credentials grant and
//! expire server-side after a while. Rather than tracking expiry locally, the
//! guard probes the validate endpoint once per cycle and only mints a new token
//! when Twitch actually rejects the current one.

use crate::twitch::client::SharedToken;
use eyre::Context;
use http::StatusCode;
use oauth2::basic::BasicClient;
use oauth2::{ClientId, ClientSecret, TokenResponse, TokenUrl, reqwest};
use std::future::Future;

/// Twitch OAuth2 endpoints for token validation and the client-credentials grant.
const VALIDATE_URL: &str = "https://id.twitch.tv/oauth2/validate";
const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Outcome of the validate probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Valid,
    Rejected,
}

/// Gates a reconciliation cycle on having a usable app access token.
///
/// Implemented by [`TokenGuard`] for production and by fakes in the scheduler's
/// tests.
pub trait TokenGate {
    /// Returns true when the cycle may proceed: the current token is accepted by
    /// Twitch, or a fresh one was just minted and swapped into the shared
    /// credential. False means skip this cycle entirely (fail-closed).
    fn ensure_valid_token(&self) -> impl Future<Output = bool> + Send;
}

/// Validates the shared bearer token and refreshes it via the client-credentials
/// grant when Twitch rejects it.
#[derive(Debug, Clone)]
pub struct TokenGuard {
    http: ::reqwest::Client,
    client_id: String,
    client_secret: String,
    token: SharedToken,
}

impl TokenGuard {
    pub fn new(
        http: ::reqwest::Client,
        client_id: String,
        client_secret: String,
        token: SharedToken,
    ) -> Self {
        Self {
            http,
            client_id,
            client_secret,
            token,
        }
    }

    /// Cheap authenticated probe against the validate endpoint.
    ///
    /// 2xx means the token is usable; a 401 is the distinguished "go mint a new
    /// token" signal; anything else is a transport-level error.
    async fn probe(&self) -> eyre::Result<Probe> {
        let bearer = self.token.bearer().await;
        let response = self
            .http
            .get(VALIDATE_URL)
            .header("Client-Id", &self.client_id)
            .bearer_auth(bearer)
            .send()
            .await
            .context("send token validate request")?;

        let status = response.status();
        if status.is_success() {
            Ok(Probe::Valid)
        } else if status == StatusCode::UNAUTHORIZED {
            Ok(Probe::Rejected)
        } else {
            Err(eyre::eyre!(
                "token validate request failed with status {status}"
            ))
        }
    }

    /// Exchanges client id + secret for a fresh app access token and swaps it
    /// into the shared credential.
    async fn exchange(&self) -> eyre::Result<()> {
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_token_uri(
                TokenUrl::new(TOKEN_URL.to_string()).expect("Invalid token endpoint URL"),
            );

        let http_client = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("building reqwest client should not fail");

        let token = client
            .exchange_client_credentials()
            .request_async(&http_client)
            .await
            .context("exchange client credentials for app access token")?;

        self.token
            .replace(token.access_token().secret().clone())
            .await;
        Ok(())
    }
}

impl TokenGate for TokenGuard {
    async fn ensure_valid_token(&self) -> bool {
        match self.probe().await {
            Ok(Probe::Valid) => {
                tracing::debug!("app access token still valid");
                true
            }
            Ok(Probe::Rejected) => {
                tracing::info!("app access token rejected, exchanging client credentials");
                match self.exchange().await {
                    Ok(()) => {
                        tracing::info!("got new app access token");
                        true
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "client credentials exchange failed");
                        false
                    }
                }
            }
            Err(e) => {
                // Fail closed: better to skip a cycle than to run every lookup
                // against an upstream we cannot reach or verify.
                tracing::error!(error = %e, "token validation failed");
                false
            }
        }
    }
}
