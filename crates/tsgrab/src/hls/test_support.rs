//! In-memory transport and AES fixtures for engine tests.

use std::collections::HashMap;

use aes::Aes128;
use async_trait::async_trait;
use bytes::Bytes;
use cipher::block_padding::Pkcs7;
use cipher::{BlockEncryptMut, KeyIvInit};
use parking_lot::Mutex;
use url::Url;

use crate::hls::HlsDownloaderError;
use crate::hls::fetcher::{ByteSpan, HttpFetch, ResourceKind};

/// Serves scripted bodies by URL. A URL can be told to fail a number of
/// times before it starts succeeding, or forever.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    bodies: HashMap<String, Bytes>,
    failures: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<(ResourceKind, String, Option<ByteSpan>)>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: impl Into<Bytes>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn failing(self, url: &str, times: usize) -> Self {
        self.failures.lock().insert(url.to_string(), times);
        self
    }

    pub fn failing_forever(self, url: &str) -> Self {
        self.failing(url, usize::MAX)
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|(_, requested, _)| requested == url)
            .count()
    }

    pub fn requests(&self) -> Vec<(ResourceKind, String, Option<ByteSpan>)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpFetch for FakeFetcher {
    async fn fetch(
        &self,
        kind: ResourceKind,
        url: &Url,
        range: Option<ByteSpan>,
    ) -> Result<Bytes, HlsDownloaderError> {
        self.requests
            .lock()
            .push((kind, url.to_string(), range));

        if let Some(remaining) = self.failures.lock().get_mut(url.as_str()) {
            if *remaining > 0 {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                return Err(kind.error(format!("HTTP 503 fetching {url}")));
            }
        }

        self.bodies
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| kind.error(format!("HTTP 404 fetching {url}")))
    }
}

/// AES-128-CBC with PKCS#7 padding, the way HLS servers encrypt segments.
pub(crate) fn encrypt(plain: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> Vec<u8> {
    let len = plain.len();
    let mut buffer = plain.to_vec();
    buffer.resize(len + 16 - len % 16, 0);
    cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
        .unwrap()
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, len)
        .unwrap()
        .to_vec()
}

/// A fake transport-stream payload: junk, then packets starting with 0x47.
pub(crate) fn ts_payload(seed: u8, packets: usize) -> Vec<u8> {
    let mut data = vec![0x00, 0x11, seed];
    for i in 0..packets {
        data.push(0x47);
        data.extend(std::iter::repeat_n(seed.wrapping_add(i as u8), 187));
    }
    data
}
