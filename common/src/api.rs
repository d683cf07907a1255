//! The REST contract of the paste service.
//!
//! ```text
//! GET  {base}/resolve/{code}          -> 200 { data } | 404 | 410
//! POST {base}/resolve/{code}/verify   -> 200 { success, data } | 401 | 403 | ...
//! POST {base}/visit/{code}            -> fire and forget
//! ```

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::paste::Paste;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Paste not found.")]
    NotFound,
    #[error("This paste has expired.")]
    Expired,
    #[error("Incorrect password.")]
    IncorrectPassword,
    #[error("The server rejected the request ({status}).")]
    Rejected {
        status: u16,
        message: Option<String>,
    },
    #[error("Network error: {0}")]
    Network(String),
    #[error("The server sent an unreadable response: {0}")]
    Malformed(String),
    #[error("{0} cannot be used as the API address")]
    InvalidBase(Url),
}

#[async_trait(?Send)]
pub trait PasteApi {
    /// Fetches a paste's metadata and gating state.
    async fn resolve(&self, code: &str) -> Result<Paste, ApiError>;

    /// Submits a password, returning the unlocked payload on success.
    async fn verify(&self, code: &str, password: &str) -> Result<Paste, ApiError>;

    /// Asks the server to count a view.
    async fn visit(&self, code: &str) -> Result<(), ApiError>;
}

#[derive(Deserialize)]
struct Envelope {
    data: Paste,
}

#[derive(Deserialize)]
struct VerifyEnvelope {
    #[serde(default)]
    success: bool,
    data: Option<Paste>,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    password: &'a str,
}

#[derive(Clone, Copy, Debug)]
enum Call {
    Resolve,
    Verify,
}

/// Maps a non-success status to the error the reader should see.
fn classify(call: Call, status: StatusCode, message: Option<String>) -> ApiError {
    match (call, status) {
        (_, StatusCode::NOT_FOUND) => ApiError::NotFound,
        (_, StatusCode::GONE) => ApiError::Expired,
        (Call::Verify, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
            ApiError::IncorrectPassword
        }
        (_, status) => ApiError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

fn network(e: &reqwest::Error) -> ApiError {
    ApiError::Network(e.to_string())
}

fn malformed(e: &reqwest::Error) -> ApiError {
    ApiError::Malformed(e.to_string())
}

async fn failure(call: Call, resp: Response) -> ApiError {
    let status = resp.status();
    let body = resp.json::<ErrorBody>().await.unwrap_or_default();
    classify(call, status, body.message)
}

fn with_code(mut paste: Paste, code: &str) -> Paste {
    if paste.code.is_empty() {
        paste.code = code.to_string();
    }
    paste
}

/// [`PasteApi`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self::with_client(Client::new(), base)
    }

    #[must_use]
    pub const fn with_client(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Appends path segments to the base URL, escaping each one.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot carry a path, such as
    /// `mailto:` or `data:` URLs.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBase(self.base.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait(?Send)]
impl PasteApi for HttpApi {
    #[instrument(skip(self), err)]
    async fn resolve(&self, code: &str) -> Result<Paste, ApiError> {
        let url = self.endpoint(&["resolve", code])?;
        let resp = self.client.get(url).send().await.map_err(|e| network(&e))?;

        if resp.status() != StatusCode::OK {
            return Err(failure(Call::Resolve, resp).await);
        }

        let envelope: Envelope = resp.json().await.map_err(|e| malformed(&e))?;
        debug!("Resolved paste");
        Ok(with_code(envelope.data, code))
    }

    #[instrument(skip(self, password), err)]
    async fn verify(&self, code: &str, password: &str) -> Result<Paste, ApiError> {
        let url = self.endpoint(&["resolve", code, "verify"])?;
        let resp = self
            .client
            .post(url)
            .json(&VerifyRequest { password })
            .send()
            .await
            .map_err(|e| network(&e))?;

        if resp.status() != StatusCode::OK {
            return Err(failure(Call::Verify, resp).await);
        }

        let envelope: VerifyEnvelope = resp.json().await.map_err(|e| malformed(&e))?;
        match envelope {
            VerifyEnvelope {
                success: true,
                data: Some(paste),
            } => Ok(with_code(paste, code)),
            VerifyEnvelope { success: true, .. } => {
                Err(ApiError::Malformed("verification succeeded without data".into()))
            }
            VerifyEnvelope { success: false, .. } => Err(ApiError::IncorrectPassword),
        }
    }

    #[instrument(skip(self))]
    async fn visit(&self, code: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["visit", code])?;
        let resp = self.client.post(url).send().await.map_err(|e| network(&e))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::Rejected {
                status: resp.status().as_u16(),
                message: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpApi {
        HttpApi::new(Url::parse(base).unwrap())
    }

    #[test]
    fn endpoints_extend_the_base_path() {
        let api = api("http://localhost/pastein/api/public/api");
        assert_eq!(
            api.endpoint(&["resolve", "abc123"]).unwrap().as_str(),
            "http://localhost/pastein/api/public/api/resolve/abc123"
        );

        let api = self::api("https://paste.example/api/");
        assert_eq!(
            api.endpoint(&["resolve", "abc123", "verify"]).unwrap().as_str(),
            "https://paste.example/api/resolve/abc123/verify"
        );
    }

    #[test]
    fn opaque_bases_are_a_configuration_error() {
        let api = api("mailto:pastes@example.com");
        assert_eq!(
            api.endpoint(&["resolve", "abc123"]),
            Err(ApiError::InvalidBase(
                Url::parse("mailto:pastes@example.com").unwrap()
            ))
        );
    }

    #[test]
    fn codes_are_escaped() {
        let api = api("https://paste.example/api");
        assert_eq!(
            api.endpoint(&["visit", "a/b c"]).unwrap().as_str(),
            "https://paste.example/api/visit/a%2Fb%20c"
        );
    }

    #[test]
    fn resolve_statuses() {
        assert_eq!(
            classify(Call::Resolve, StatusCode::NOT_FOUND, None),
            ApiError::NotFound
        );
        assert_eq!(
            classify(Call::Resolve, StatusCode::GONE, None),
            ApiError::Expired
        );
        assert_eq!(
            classify(Call::Resolve, StatusCode::UNAUTHORIZED, None),
            ApiError::Rejected {
                status: 401,
                message: None
            }
        );
    }

    #[test]
    fn verify_statuses() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            assert_eq!(
                classify(Call::Verify, status, None),
                ApiError::IncorrectPassword
            );
        }
        assert_eq!(
            classify(
                Call::Verify,
                StatusCode::TOO_MANY_REQUESTS,
                Some("Slow down".to_string())
            ),
            ApiError::Rejected {
                status: 429,
                message: Some("Slow down".to_string())
            }
        );
    }

    #[test]
    fn server_codes_are_kept() {
        let paste: Paste = serde_json::from_str(r#"{"code":"srv"}"#).unwrap();
        assert_eq!(with_code(paste, "abc123").code, "srv");

        let paste: Paste = serde_json::from_str("{}").unwrap();
        assert_eq!(with_code(paste, "abc123").code, "abc123");
    }
}
