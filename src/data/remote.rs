use std::io::{self, Read};
use std::time::Duration;

use crate::config::FetchConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("reading response from {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: io::Error,
    },
    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

// ---------------------------------------------------------------------------
// FetchImage – URL → encoded image bytes
// ---------------------------------------------------------------------------

pub trait FetchImage {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Plain HTTP GET with bounded timeouts and response size. No retries.
pub struct HttpFetcher {
    agent: ureq::Agent,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .build();
        Self {
            agent,
            max_bytes: config.max_image_bytes,
        }
    }
}

impl FetchImage for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.agent.get(url).call().map_err(|e| FetchError::Request {
            url: url.to_string(),
            source: Box::new(e),
        })?;

        if let Some(len) = response
            .header("Content-Length")
            .and_then(|v| v.parse::<usize>().ok())
        {
            if len > self.max_bytes {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_bytes,
                });
            }
        }

        read_limited(response.into_reader(), self.max_bytes).map_err(|e| match e {
            LimitError::Io(source) => FetchError::Body {
                url: url.to_string(),
                source,
            },
            LimitError::TooLarge => FetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_bytes,
            },
        })
    }
}

enum LimitError {
    Io(io::Error),
    TooLarge,
}

/// Read at most `max_bytes`; one byte more means the body is too large.
fn read_limited(reader: impl Read, max_bytes: usize) -> Result<Vec<u8>, LimitError> {
    let mut bytes = Vec::new();
    reader
        .take((max_bytes as u64).saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(LimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(LimitError::TooLarge);
    }
    Ok(bytes)
}
