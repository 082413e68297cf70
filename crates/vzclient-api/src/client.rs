// Middleware HTTP client
//
// Wraps `reqwest::Client` with Volkszaehler URL construction, per-request
// basic auth, a single connect retry, and exception-envelope decoding.
// Endpoint modules (entity, data, capabilities) are implemented as inherent
// methods in separate files to keep this module focused on transport mechanics.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// HTTP basic-auth credentials sent with every request to an [`Endpoint`].
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: SecretString,
}

/// Where (and as whom) a single request is sent.
///
/// Callers build one of these from their current settings right before each
/// request, so a changed server URL or password takes effect immediately
/// without rebuilding the client.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Middleware root, e.g. `http://demo.volkszaehler.org/middleware.php`.
    pub base_url: Url,
    pub auth: Option<BasicAuth>,
}

impl Endpoint {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            auth: None,
        }
    }

    pub fn parse(base_url: &str) -> Result<Self, Error> {
        Ok(Self::new(Url::parse(base_url.trim())?))
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.auth = Some(BasicAuth {
            username: username.into(),
            password,
        });
        self
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    ///
    /// The base path is treated as a directory whether or not it ends in `/`,
    /// so `.../middleware.php` and `.../middleware.php/` behave the same.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Exception body returned by the middleware on failure.
#[derive(Debug, Deserialize)]
struct ExceptionEnvelope {
    #[serde(default)]
    exception: Option<ApiException>,
}

#[derive(Debug, Deserialize)]
struct ApiException {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Raw HTTP client for the Volkszaehler middleware.
///
/// Stateless apart from the connection pool: the server URL and credentials
/// travel with each call as an [`Endpoint`].
#[derive(Debug, Clone)]
pub struct VzClient {
    http: reqwest::Client,
    retry_on_connect: bool,
}

impl VzClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            retry_on_connect: transport.retry_on_connect,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            retry_on_connect: true,
        }
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    ///
    /// A connection failure is retried exactly once when enabled; nothing
    /// else is retried.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        debug!("GET {}", url);

        let build = || {
            let req = self.http.get(url.clone()).query(query);
            match &endpoint.auth {
                Some(auth) => req.basic_auth(&auth.username, Some(auth.password.expose_secret())),
                None => req,
            }
        };

        let resp = match build().send().await {
            Ok(resp) => resp,
            Err(e) if self.retry_on_connect && e.is_connect() => {
                warn!(error = %e, "connection failed, retrying once");
                build().send().await?
            }
            Err(e) => return Err(Error::Transport(e)),
        };

        Self::parse_body(resp).await
    }

    /// Decode a response, turning non-2xx statuses and exception bodies into
    /// typed errors.
    async fn parse_body<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        // The middleware reports failures as an exception envelope, usually
        // with a 4xx/5xx status but occasionally with 200.
        if let Ok(ExceptionEnvelope {
            exception: Some(exception),
        }) = serde_json::from_str::<ExceptionEnvelope>(&body)
        {
            return Err(Error::Api {
                kind: exception.kind.unwrap_or_else(|| "Exception".into()),
                message: exception
                    .message
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .map_or_else(|| body.chars().take(200).collect(), str::to_owned),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn url_treats_base_path_as_directory() {
        let with_slash = Endpoint::parse("http://host/middleware.php/").unwrap();
        let without = Endpoint::parse("http://host/middleware.php").unwrap();

        let a = with_slash.url(&["entity.json"]).unwrap();
        let b = without.url(&["entity.json"]).unwrap();

        assert_eq!(a.as_str(), "http://host/middleware.php/entity.json");
        assert_eq!(a, b);
    }

    #[test]
    fn url_encodes_segments() {
        let ep = Endpoint::parse("http://host/vz").unwrap();
        let url = ep.url(&["entity", "a b?.json"]).unwrap();
        assert_eq!(url.as_str(), "http://host/vz/entity/a%20b%3F.json");
    }

    #[test]
    fn url_drops_query_of_base() {
        let ep = Endpoint::parse("http://host/vz?debug=1").unwrap();
        let url = ep.url(&["entity.json"]).unwrap();
        assert_eq!(url.as_str(), "http://host/vz/entity.json");
    }
}
