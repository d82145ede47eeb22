//! HTTP client for Nominatim-compatible geocoding services.
//!
//! Nominatim's usage policy requires an identifying `User-Agent`.

use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{Place, Resolver};
use crate::error::ResolveError;

/// Public OpenStreetMap Nominatim instance.
pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org/";

const DEFAULT_USER_AGENT: &str = concat!("bulkgeo/", env!("CARGO_PKG_VERSION"));

/// Connection settings for a Nominatim service
#[derive(Debug, Clone)]
pub struct NominatimConfig {
    /// Base URL; `search` and `reverse` are resolved against it
    pub endpoint: String,
    /// `User-Agent` header sent with every request
    pub user_agent: String,
    /// Contact address passed as the `email` parameter
    pub email: Option<String>,
    /// Preferred result language (`accept-language`)
    pub accept_language: Option<String>,
    /// Maximum number of forward results
    pub limit: Option<u32>,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            email: None,
            accept_language: None,
            limit: None,
        }
    }
}

impl NominatimConfig {
    /// Create a new configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service base URL
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the `User-Agent` header
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the contact email
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the preferred result language
    #[must_use]
    pub fn with_accept_language(mut self, language: impl Into<String>) -> Self {
        self.accept_language = Some(language.into());
        self
    }

    /// Set the maximum number of forward results
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Coordinates arrive as strings from Nominatim but as numbers from some proxies.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Degrees {
    Text(String),
    Number(f64),
}

impl Degrees {
    fn value(&self) -> Result<f64, ResolveError> {
        let value = match self {
            Self::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                ResolveError::MalformedResponse {
                    message: format!("invalid coordinate '{text}'"),
                }
            })?,
            Self::Number(value) => *value,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ResolveError::MalformedResponse {
                message: format!("invalid coordinate '{value}'"),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: Degrees,
    lon: Degrees,
    display_name: String,
}

impl NominatimPlace {
    fn into_place(self) -> Result<Place, ResolveError> {
        Ok(Place::new(self.display_name, self.lon.value()?, self.lat.value()?))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReverseReply {
    Failure { error: serde_json::Value },
    Found(NominatimPlace),
}

/// Decode the body of a `/search` reply.
///
/// # Errors
///
/// Returns [`ResolveError::MalformedResponse`] if the body is not an array of places.
pub fn parse_search_response(body: &str) -> Result<Vec<Place>, ResolveError> {
    let places: Vec<NominatimPlace> =
        serde_json::from_str(body).map_err(|e| ResolveError::MalformedResponse {
            message: e.to_string(),
        })?;
    places.into_iter().map(NominatimPlace::into_place).collect()
}

/// Decode the body of a `/reverse` reply.
///
/// # Errors
///
/// Returns [`ResolveError::NoMatch`] when the service reports an `error` member and
/// [`ResolveError::MalformedResponse`] for anything that is not a place.
pub fn parse_reverse_response(
    body: &str,
    lon: f64,
    lat: f64,
) -> Result<Vec<Place>, ResolveError> {
    let reply: ReverseReply =
        serde_json::from_str(body).map_err(|e| ResolveError::MalformedResponse {
            message: e.to_string(),
        })?;
    match reply {
        ReverseReply::Failure { error } => {
            debug!("Reverse lookup of ({lon}, {lat}) failed: {error}");
            Err(ResolveError::NoMatch {
                query: format!("({lon}, {lat})"),
            })
        },
        ReverseReply::Found(place) => Ok(vec![place.into_place()?]),
    }
}

/// Resolver backed by a Nominatim HTTP API.
pub struct NominatimResolver {
    http: Client,
    endpoint: Url,
    config: NominatimConfig,
}

impl NominatimResolver {
    /// Create a new resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a URL or the HTTP client cannot be built.
    pub fn new(config: NominatimConfig) -> anyhow::Result<Self> {
        let mut endpoint = Url::parse(&config.endpoint)
            .with_context(|| format!("Invalid Nominatim endpoint '{}'", config.endpoint))?;
        // `search` and `reverse` must resolve below the base path
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &NominatimConfig {
        &self.config
    }

    /// URL of the forward lookup for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ServiceUnavailable`] if the endpoint cannot be joined.
    pub fn search_url(&self, address: &str) -> Result<Url, ResolveError> {
        let mut url = self.endpoint("search")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("q", address).append_pair("format", "jsonv2");
            if let Some(limit) = self.config.limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        self.append_common(&mut url);
        Ok(url)
    }

    /// URL of the reverse lookup for a WGS84 location.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ServiceUnavailable`] if the endpoint cannot be joined.
    pub fn reverse_url(&self, lon: f64, lat: f64) -> Result<Url, ResolveError> {
        let mut url = self.endpoint("reverse")?;
        url.query_pairs_mut()
            .append_pair("lat", &lat.to_string())
            .append_pair("lon", &lon.to_string())
            .append_pair("format", "jsonv2");
        self.append_common(&mut url);
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ResolveError> {
        self.endpoint
            .join(path)
            .map_err(|e| ResolveError::ServiceUnavailable {
                message: format!("invalid endpoint '{}': {e}", self.endpoint),
            })
    }

    fn append_common(&self, url: &mut Url) {
        let mut query = url.query_pairs_mut();
        if let Some(email) = &self.config.email {
            query.append_pair("email", email);
        }
        if let Some(language) = &self.config.accept_language {
            query.append_pair("accept-language", language);
        }
    }

    async fn fetch(&self, url: Url) -> Result<String, ResolveError> {
        debug!("GET {url}");
        let response =
            self.http
                .get(url)
                .send()
                .await
                .map_err(|e| ResolveError::ServiceUnavailable {
                    message: e.to_string(),
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::ServiceUnavailable {
                message: format!("HTTP {status}"),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ResolveError::ServiceUnavailable {
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl Resolver for NominatimResolver {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn geocode(&self, address: &str) -> Result<Vec<Place>, ResolveError> {
        let body = self.fetch(self.search_url(address)?).await?;
        parse_search_response(&body)
    }

    async fn reverse(&self, lon: f64, lat: f64) -> Result<Vec<Place>, ResolveError> {
        let body = self.fetch(self.reverse_url(lon, lat)?).await?;
        parse_reverse_response(&body, lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Coord;

    const SEARCH_BODY: &str = r#"[
        {"place_id": 1, "lat": "41.8902102", "lon": "12.4922309",
         "display_name": "Colosseo, Piazza del Colosseo, Roma, Italia"},
        {"place_id": 2, "lat": 41.9, "lon": 12.5, "display_name": "Colosseo, Roma"}
    ]"#;

    fn resolver(config: NominatimConfig) -> NominatimResolver {
        NominatimResolver::new(config).unwrap()
    }

    #[test]
    fn test_parse_search_response() {
        let places = parse_search_response(SEARCH_BODY).unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name, "Colosseo, Piazza del Colosseo, Roma, Italia");
        assert_eq!(places[0].point, Coord { x: 12.4922309, y: 41.8902102 });
        assert_eq!(places[1].point, Coord { x: 12.5, y: 41.9 });
    }

    #[test]
    fn test_parse_empty_search_response() {
        assert!(parse_search_response("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_search_response() {
        assert!(matches!(
            parse_search_response("<html>busy</html>"),
            Err(ResolveError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_search_response(r#"[{"lat": "north", "lon": "1", "display_name": "x"}]"#),
            Err(ResolveError::MalformedResponse { message }) if message.contains("north")
        ));
    }

    #[test]
    fn test_parse_reverse_response() {
        let body = r#"{"lat": "45.4641", "lon": "9.1919", "display_name": "Duomo di Milano"}"#;
        let places = parse_reverse_response(body, 9.19, 45.46).unwrap();
        assert_eq!(places, vec![Place::new("Duomo di Milano", 9.1919, 45.4641)]);
    }

    #[test]
    fn test_parse_reverse_error_is_no_match() {
        let err = parse_reverse_response(r#"{"error": "Unable to geocode"}"#, 0.0, -60.0)
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::NoMatch {
                query: "(0, -60)".to_string()
            }
        );
    }

    #[test]
    fn test_search_url() {
        let config = NominatimConfig::new()
            .with_limit(3)
            .with_email("ops@example.com")
            .with_accept_language("it");
        let url = resolver(config).search_url("Via del Corso 1, Roma").unwrap();
        assert_eq!(url.host_str(), Some("nominatim.openstreetmap.org"));
        assert_eq!(url.path(), "/search");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), "Via del Corso 1, Roma".to_string()),
                ("format".to_string(), "jsonv2".to_string()),
                ("limit".to_string(), "3".to_string()),
                ("email".to_string(), "ops@example.com".to_string()),
                ("accept-language".to_string(), "it".to_string()),
            ]
        );
    }

    #[test]
    fn test_reverse_url_below_custom_endpoint() {
        let config = NominatimConfig::new().with_endpoint("http://localhost:8080/nominatim");
        let url = resolver(config)
            .reverse_url(9.19, 45.46)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/nominatim/reverse?lat=45.46&lon=9.19&format=jsonv2"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = NominatimResolver::new(NominatimConfig::new().with_endpoint("not a url"))
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("Invalid Nominatim endpoint 'not a url'"));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let nominatim = resolver(NominatimConfig::new().with_endpoint("http://127.0.0.1:9/"));
        assert!(matches!(
            nominatim.geocode("Roma").await,
            Err(ResolveError::ServiceUnavailable { .. })
        ));
    }
}
