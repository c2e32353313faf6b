// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use crate::error::FetchError;
use flate2::read::GzDecoder;
use reqwest::Client;
use std::future::Future;
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Boundary between the parsing core and the network. The parsers and the
/// Xtream normalizer only ever see already-retrieved text; retries, timeouts
/// and transport policy live behind this trait.
pub trait Fetcher {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Production fetcher backed by reqwest.
///
/// Some providers gzip response bodies without saying so in the headers, so
/// the body is sniffed for the gzip magic bytes and decompressed manually
/// when present.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(url, "fetching");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyResponse);
        }
        decode_body(&bytes)
    }
}

/// Decodes a response body to text, gunzipping when the gzip magic bytes are
/// present regardless of what the transport headers claimed.
fn decode_body(bytes: &[u8]) -> Result<String, FetchError> {
    if bytes.len() > 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
        let mut text = String::new();
        GzDecoder::new(bytes).read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}
