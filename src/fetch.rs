use crate::error::RadioError;
use reqwest::blocking::Client;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("lofi-radio/", env!("CARGO_PKG_VERSION"));
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Document,
    Audio,
    Asset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub destination: Destination,
    pub bypass_cache: bool,
}

impl FetchRequest {
    pub fn document(url: Url) -> Self {
        Self {
            url,
            destination: Destination::Document,
            bypass_cache: true,
        }
    }

    pub fn asset(url: Url) -> Self {
        Self {
            url,
            destination: Destination::Asset,
            bypass_cache: false,
        }
    }

    pub fn audio(url: Url) -> Self {
        Self {
            url,
            destination: Destination::Audio,
            bypass_cache: false,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.destination == Destination::Audio || has_audio_extension(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: None,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can answer a GET. Transport failures are `NetworkFailure`;
/// HTTP error statuses come back as responses.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, RadioError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, RadioError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| RadioError::NetworkFailure(format!("http client: {err}")))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, RadioError> {
        let mut builder = self.client.get(request.url.clone());
        if request.bypass_cache {
            builder = builder
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }

        let response = builder
            .send()
            .map_err(|err| RadioError::NetworkFailure(format!("{}: {err}", request.url)))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let body = response
            .bytes()
            .map_err(|err| RadioError::NetworkFailure(format!("{}: {err}", request.url)))?
            .to_vec();

        Ok(FetchResponse {
            status,
            content_type,
            body,
        })
    }
}

pub fn has_audio_extension(url: &Url) -> bool {
    let path = url.path();
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_detection_uses_destination_or_extension() {
        let mp3 = Url::parse("https://radio.example/assets/music/a.MP3").expect("url");
        assert!(FetchRequest::asset(mp3).is_audio());

        let stream = Url::parse("https://radio.example/stream").expect("url");
        assert!(FetchRequest::audio(stream.clone()).is_audio());
        assert!(!FetchRequest::asset(stream).is_audio());
    }

    #[test]
    fn document_requests_bypass_cache() {
        let url = Url::parse("https://radio.example/playlist.json").expect("url");
        assert!(FetchRequest::document(url.clone()).bypass_cache);
        assert!(!FetchRequest::asset(url).bypass_cache);
    }
}
