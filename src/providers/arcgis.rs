//! ArcGIS REST plumbing shared by the geocoder and feature layer clients.
//!
//! ArcGIS answers most failures with HTTP 200 and an `error` object in the
//! body, so every response goes through `read_json` which turns that object
//! into an error.

pub mod feature_layer;
pub mod geocoder;
pub mod token;

use std::fmt;

use reqwest::header::REFERER;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub use feature_layer::FeatureLayer;
pub use geocoder::ArcgisGeocoder;
pub use token::Token;

/// `error` object of an ArcGIS REST response.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<String>,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = self.code {
            write!(f, " (code {code})")?;
        }
        if !self.details.is_empty() {
            write!(f, ": {}", self.details.join("; "))?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum RestError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{0}")]
    Service(ServiceError),

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Decode an ArcGIS JSON response, surfacing an embedded `error` object.
pub async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RestError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(RestError::Status { status, body });
    }

    let mut value: Value = serde_json::from_str(&body)?;

    if let Some(error) = value.get_mut("error").map(Value::take) {
        return Err(RestError::Service(serde_json::from_value(error)?));
    }

    Ok(serde_json::from_value(value)?)
}

/// Authenticated access to ArcGIS REST endpoints.
///
/// Tokens are issued for a referer, so every request carries it.
#[derive(Clone)]
pub struct Session {
    client: reqwest::Client,
    token: Token,
    referer: String,
}

impl Session {
    pub fn new(client: reqwest::Client, token: Token, referer: &Url) -> Self {
        Session {
            client,
            token,
            referer: referer.to_string(),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, RestError> {
        let response = self
            .client
            .get(url)
            .header(REFERER, &self.referer)
            .query(&[("f", "json"), ("token", self.token.as_str())])
            .query(params)
            .send()
            .await?;

        read_json(response).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, RestError> {
        let mut form = vec![("f", "json"), ("token", self.token.as_str())];
        form.extend_from_slice(params);

        let response = self
            .client
            .post(url)
            .header(REFERER, &self.referer)
            .form(&form)
            .send()
            .await?;

        read_json(response).await
    }
}

#[cfg(test)]
pub(crate) fn test_session() -> Session {
    Session::new(
        reqwest::Client::new(),
        Token::new("test-token".into(), None),
        &Url::parse("https://www.arcgis.com").unwrap(),
    )
}
