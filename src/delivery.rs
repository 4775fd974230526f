//! Hands received messages over to the clinical data repository.
//!
//! The pipeline only knows about the [Deliver] trait. [HttpDelivery] is the real implementation,
//! posting each message as an `Hl7v2Message` resource.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde::Serialize;

use crate::error::{ConfigError, DeliveryError};

/// Default time allowed for one delivery request, including reading the response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can accept a (sanitized) HL7 message for safekeeping.
///
/// `Ok` means the message is durably the repository's problem and may be acknowledged.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError>;
}

/// An additional HTTP header given as `Name: value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraHeader {
    pub name: HeaderName,
    pub value: HeaderValue,
}

impl FromStr for ExtraHeader {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidHeader(s.to_owned());

        let (name, value) = s.split_once(':').ok_or_else(invalid)?;
        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value.trim_start()).map_err(|_| invalid())?;

        Ok(ExtraHeader { name, value })
    }
}

/// Where and how messages get posted.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Repository base URL, `/Hl7v2Message` is appended.
    pub base_url: Url,
    /// ID of the `Hl7v2Config` resource the repository should process messages with.
    pub config_id: String,
    pub headers: Vec<ExtraHeader>,
    pub timeout: Duration,
}

impl DeliveryConfig {
    pub fn new(base_url: &str, config_id: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url =
            Url::parse(base_url).map_err(|_| ConfigError::InvalidUrl(base_url.to_owned()))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(base_url.to_string()));
        }

        Ok(DeliveryConfig {
            base_url,
            config_id: config_id.into(),
            headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/Hl7v2Message",
            self.base_url.as_str().trim_end_matches('/')
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Hl7v2Message<'a> {
    resource_type: &'static str,
    status: &'static str,
    src: &'a str,
    config: Hl7v2Config<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Hl7v2Config<'a> {
    resource_type: &'static str,
    id: &'a str,
}

impl<'a> Hl7v2Message<'a> {
    fn received(src: &'a str, config_id: &'a str) -> Self {
        Hl7v2Message {
            resource_type: "Hl7v2Message",
            status: "received",
            src,
            config: Hl7v2Config {
                resource_type: "Hl7v2Config",
                id: config_id,
            },
        }
    }
}

/// Posts messages to the repository over HTTP.
///
/// Cheap to share, every connection task uses the same [Client] and its connection pool.
#[derive(Debug, Clone)]
pub struct HttpDelivery {
    client: Client,
    endpoint: String,
    config_id: String,
    headers: HeaderMap,
}

impl HttpDelivery {
    /// Builds a dedicated client using the configured request timeout.
    pub fn new(config: &DeliveryConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(HttpDelivery::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &DeliveryConfig) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for header in &config.headers {
            headers.append(header.name.clone(), header.value.clone());
        }

        HttpDelivery {
            client,
            endpoint: config.endpoint(),
            config_id: config.config_id.clone(),
            headers,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Deliver for HttpDelivery {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(&Hl7v2Message::received(message, &self.config_id))?;
        debug!("Posting {} bytes to {}", body.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|source| DeliveryError::Body { status, source })?;
            return Err(DeliveryError::Status { status, body });
        }

        let duration = response
            .headers()
            .get("x-duration")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        info!("Message delivered: {} ({}ms)", status, duration);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn config(url: &str) -> DeliveryConfig {
        DeliveryConfig::new(url, "my-config").unwrap()
    }

    #[test]
    fn parses_extra_header() {
        let header: ExtraHeader = "Authorization: Basic abc==".parse().unwrap();
        assert_eq!(header.name, "authorization");
        assert_eq!(header.value, "Basic abc==");
    }

    #[test]
    fn extra_header_without_space() {
        let header: ExtraHeader = "X-Tenant:acme:east".parse().unwrap();
        assert_eq!(header.name, "x-tenant");
        assert_eq!(header.value, "acme:east");
    }

    #[test]
    fn extra_header_without_colon_is_rejected() {
        let result = "Authorization".parse::<ExtraHeader>();
        assert_eq!(
            result,
            Err(ConfigError::InvalidHeader("Authorization".to_owned()))
        );
    }

    #[test]
    fn extra_header_with_bad_name_is_rejected() {
        assert!("Bad Name: value".parse::<ExtraHeader>().is_err());
        assert!(": value".parse::<ExtraHeader>().is_err());
    }

    #[test]
    fn endpoint_drops_trailing_slash() {
        assert_eq!(
            config("https://foo.example.app/").endpoint(),
            "https://foo.example.app/Hl7v2Message"
        );
        assert_eq!(
            config("https://foo.example.app/fhir").endpoint(),
            "https://foo.example.app/fhir/Hl7v2Message"
        );
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            DeliveryConfig::new("not a url", "x"),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            DeliveryConfig::new("mailto:someone@example.com", "x"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn body_matches_repository_resource() {
        let body =
            serde_json::to_string(&Hl7v2Message::received("MSH|^~\\&|A\r", "cfg-1")).unwrap();

        assert_eq!(
            body,
            r#"{"resourceType":"Hl7v2Message","status":"received","src":"MSH|^~\\&|A\r","config":{"resourceType":"Hl7v2Config","id":"cfg-1"}}"#
        );
    }

    #[tokio::test]
    async fn posts_message_with_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/Hl7v2Message")
            .match_header("content-type", "application/json")
            .match_header("x-api-key", "secret")
            .match_body(Matcher::Json(json!({
                "resourceType": "Hl7v2Message",
                "status": "received",
                "src": "MSH|^~\\&|A|B\r",
                "config": {"resourceType": "Hl7v2Config", "id": "my-config"}
            })))
            .with_status(201)
            .with_header("x-duration", "12")
            .create_async()
            .await;

        let mut config = config(&server.url());
        config.headers.push("X-Api-Key: secret".parse().unwrap());
        let delivery = HttpDelivery::new(&config).unwrap();

        delivery.deliver("MSH|^~\\&|A|B\r").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/Hl7v2Message")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let delivery = HttpDelivery::new(&config(&server.url())).unwrap();

        match delivery.deliver("MSH|").await {
            Err(DeliveryError::Status { status, body }) => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "boom");
            }
            other => panic!("Expected a status error, got {:?}", other),
        }
    }

    /// Accepts connections and never answers on them.
    async fn silent_repository() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                open.push(stream);
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn silent_repository_times_out() {
        let mut config = config(&silent_repository().await);
        config.timeout = Duration::from_millis(200);
        let delivery = HttpDelivery::new(&config).unwrap();

        let started = std::time::Instant::now();
        let result = delivery.deliver("MSH|").await;

        assert!(
            matches!(&result, Err(DeliveryError::Transport(e)) if e.is_timeout()),
            "Expected a timeout, got {:?}",
            result
        );
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unreachable_repository_is_an_error() {
        // port 1 on loopback is never listening in test environments
        let delivery = HttpDelivery::new(&config("http://127.0.0.1:1")).unwrap();

        assert!(matches!(
            delivery.deliver("MSH|").await,
            Err(DeliveryError::Transport(_))
        ));
    }
}
