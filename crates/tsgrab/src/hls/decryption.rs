// HLS decryption: resolves key material once per playlist and decrypts
// AES-128-CBC segments.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use aes::Aes128;
use bytes::Bytes;
use cipher::block_padding::NoPadding;
use cipher::{BlockDecryptMut, KeyIvInit};
use hls::{Key, KeyMaterial, KeyMethod, MediaPlaylist};
use tracing::{debug, info};
use url::Url;

use crate::hls::HlsDownloaderError;
use crate::hls::config::IvDerivation;
use crate::hls::fetcher::{HttpFetch, ResourceKind};
use crate::hls::playlist::resolve_uri;

type Aes128CbcDec = cbc::Decryptor<Aes128>;

const AES_BLOCK_SIZE: usize = 16;

/// Loads the raw bytes behind key descriptors.
pub struct KeyResolver {
    fetcher: Arc<dyn HttpFetch>,
}

impl KeyResolver {
    pub fn new(fetcher: Arc<dyn HttpFetch>) -> Self {
        Self { fetcher }
    }

    /// Resolves a single key. `METHOD=NONE` yields [`KeyMaterial::Clear`]
    /// without touching the network.
    pub async fn resolve(
        &self,
        key: &Key,
        base_url: Option<&Url>,
    ) -> Result<KeyMaterial, HlsDownloaderError> {
        match key.method {
            KeyMethod::None => Ok(KeyMaterial::Clear),
            KeyMethod::Aes128 => {
                let uri = key.uri.as_deref().ok_or_else(|| {
                    HlsDownloaderError::DecryptionError("Key URI is missing".to_string())
                })?;
                let url = resolve_uri(base_url, uri)?;
                let bytes = self.fetcher.fetch(ResourceKind::Key, &url, None).await?;
                Self::check_key_length(&url, bytes).map(KeyMaterial::Aes128)
            }
            KeyMethod::SampleAes => Err(HlsDownloaderError::DecryptionError(format!(
                "Unsupported decryption method {}",
                key.method
            ))),
        }
    }

    /// Fills in [`Key::material`] for every key some segment refers to.
    ///
    /// Keys no segment uses keep `material: None`. Keys sharing a URI are
    /// fetched once. Runs before any segment is scheduled, so workers only
    /// ever read the resolved keys.
    pub async fn resolve_all(
        &self,
        playlist: &mut MediaPlaylist,
        base_url: Option<&Url>,
    ) -> Result<(), HlsDownloaderError> {
        let referenced: BTreeSet<usize> = playlist
            .segments
            .iter()
            .filter_map(|segment| segment.key_index)
            .collect();
        let mut fetched: HashMap<Url, Bytes> = HashMap::new();

        for (index, key) in playlist.keys.iter_mut().enumerate() {
            if key.material.is_some() {
                continue;
            }
            if !referenced.contains(&index) {
                debug!(index, uri = ?key.uri, "Skipping key no segment uses");
                continue;
            }
            let material = match (key.method, key.uri.as_deref()) {
                (KeyMethod::Aes128, Some(uri)) => {
                    let url = resolve_uri(base_url, uri)?;
                    if let Some(bytes) = fetched.get(&url) {
                        debug!(index, %url, "Reusing already fetched key");
                        KeyMaterial::Aes128(bytes.clone())
                    } else {
                        let bytes = self.fetcher.fetch(ResourceKind::Key, &url, None).await?;
                        let bytes = Self::check_key_length(&url, bytes)?;
                        fetched.insert(url, bytes.clone());
                        KeyMaterial::Aes128(bytes)
                    }
                }
                _ => self.resolve(key, base_url).await?,
            };
            key.material = Some(material);
        }

        if !fetched.is_empty() {
            info!(
                keys = playlist.keys.len(),
                fetched = fetched.len(),
                "Resolved decryption keys"
            );
        }
        Ok(())
    }

    fn check_key_length(url: &Url, bytes: Bytes) -> Result<Bytes, HlsDownloaderError> {
        if bytes.len() != AES_BLOCK_SIZE {
            return Err(HlsDownloaderError::DecryptionError(format!(
                "Decryption key from {url} has incorrect length: {} bytes (expected 16)",
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

/// Per-segment decryption input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDecryption {
    pub key: Bytes,
    pub iv: [u8; 16],
}

/// IV for the segment at `index` of a playlist starting at `media_sequence`.
///
/// An explicit `IV` attribute always wins.
pub fn segment_iv(
    key: &Key,
    media_sequence: u64,
    index: usize,
    derivation: IvDerivation,
) -> Result<[u8; 16], HlsDownloaderError> {
    if let Some(iv) = key.iv {
        return Ok(iv);
    }

    let mut iv = [0u8; 16];
    match derivation {
        IvDerivation::AsciiSequence => {
            let digits = format!("{media_sequence:016}");
            if digits.len() != iv.len() {
                return Err(HlsDownloaderError::DecryptionError(format!(
                    "Media sequence {media_sequence} does not fit a 16 digit IV"
                )));
            }
            iv.copy_from_slice(digits.as_bytes());
        }
        IvDerivation::BinarySequence => {
            let sequence = media_sequence.wrapping_add(index as u64);
            iv[8..].copy_from_slice(&sequence.to_be_bytes());
        }
    }
    Ok(iv)
}

/// Decrypts whole AES blocks; padding is left in place.
pub fn decrypt_aes128_cbc(
    data: &[u8],
    key: &[u8],
    iv: &[u8; 16],
) -> Result<Vec<u8>, HlsDownloaderError> {
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(HlsDownloaderError::DecryptionError(format!(
            "Ciphertext length {} is not a multiple of the AES block size",
            data.len()
        )));
    }

    let cipher = Aes128CbcDec::new_from_slices(key, iv).map_err(|e| {
        HlsDownloaderError::DecryptionError(format!("Failed to initialize AES decryptor: {e}"))
    })?;

    let mut buffer = data.to_vec();
    cipher
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|e| HlsDownloaderError::DecryptionError(format!("Decryption failed: {e}")))?;
    Ok(buffer)
}
