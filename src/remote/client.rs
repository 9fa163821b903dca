use std::{sync::Arc, time::Duration};

use reqwest::{blocking::RequestBuilder, StatusCode};

use crate::{
    session::token::TokenStore,
    store::record::{FeatureRecord, Identifier},
};

use super::{
    envelope::{
        feature_envelope, parse_create_response, parse_list_response, parse_login_response,
        parse_update_response, Credentials,
    },
    error::RemoteError,
};

/// Feature operations of the geodata API. One call is one request; batching and fan-out are up
/// to the caller, which is why implementations must be usable from several threads at once.
pub trait GeoDataApi: Sync {
    fn list(&self) -> Result<Vec<FeatureRecord>, RemoteError>;

    /// Store a new feature and return the id the server assigned to it.
    fn create(&self, feature: &geojson::Feature) -> Result<Identifier, RemoteError>;

    fn update(&self, id: &Identifier, feature: &geojson::Feature)
        -> Result<Identifier, RemoteError>;

    fn delete(&self, id: &Identifier) -> Result<(), RemoteError>;
}

/// Account and session operations of the API.
pub trait AuthApi {
    fn register(&self, credentials: &Credentials) -> Result<(), RemoteError>;

    /// Log in and return the bearer token.
    fn login(&self, credentials: &Credentials) -> Result<String, RemoteError>;

    fn logout(&self) -> Result<(), RemoteError>;

    /// Check that `token` still grants access.
    fn validate_token(&self, token: &str) -> Result<(), RemoteError>;
}

/// HTTP client for the geodata API. The bearer token is read from the token store on every
/// request, so a login or logout takes effect immediately for all clones.
#[derive(Clone)]
pub struct HttpApiClient {
    base_url: String,
    client: reqwest::blocking::Client,
    tokens: Arc<dyn TokenStore>,
}

impl HttpApiClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        tokens: Arc<dyn TokenStore>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("geodash")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn with_token(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.load() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send the request and return the response body of a successful response.
    fn send(&self, request: RequestBuilder) -> Result<String, RemoteError> {
        let response = request.send()?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::Unauthorized);
        }
        let body = response.text()?;
        if !status.is_success() {
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl GeoDataApi for HttpApiClient {
    fn list(&self) -> Result<Vec<FeatureRecord>, RemoteError> {
        let body = self.send(self.with_token(self.client.get(self.url("geodata"))))?;
        parse_list_response(&body)
    }

    fn create(&self, feature: &geojson::Feature) -> Result<Identifier, RemoteError> {
        let envelope = feature_envelope(feature)?;
        log::debug!("Sending data to backend (create): {}", envelope);
        let body = self.send(
            self.with_token(self.client.post(self.url("geodata")))
                .json(&envelope),
        )?;
        parse_create_response(&body)
    }

    fn update(
        &self,
        id: &Identifier,
        feature: &geojson::Feature,
    ) -> Result<Identifier, RemoteError> {
        let envelope = feature_envelope(feature)?;
        log::debug!("Sending data to backend (update {}): {}", id, envelope);
        let body = self.send(
            self.with_token(self.client.put(self.url(&format!("geodata/{}", id))))
                .json(&envelope),
        )?;
        parse_update_response(&body)
    }

    fn delete(&self, id: &Identifier) -> Result<(), RemoteError> {
        let body = self.send(
            self.with_token(self.client.delete(self.url(&format!("geodata/{}", id)))),
        )?;
        log::debug!("Delete response for {}: {}", id, body);
        Ok(())
    }
}

impl AuthApi for HttpApiClient {
    fn register(&self, credentials: &Credentials) -> Result<(), RemoteError> {
        self.send(self.client.post(self.url("register")).json(credentials))?;
        Ok(())
    }

    fn login(&self, credentials: &Credentials) -> Result<String, RemoteError> {
        let body = self.send(self.client.post(self.url("login")).json(credentials))?;
        parse_login_response(&body)
    }

    fn logout(&self) -> Result<(), RemoteError> {
        self.send(self.with_token(self.client.post(self.url("logout"))))?;
        Ok(())
    }

    fn validate_token(&self, token: &str) -> Result<(), RemoteError> {
        self.send(
            self.client
                .get(self.url("validate-token"))
                .bearer_auth(token),
        )?;
        Ok(())
    }
}
