// HLS segment processor: decrypts a fetched segment and realigns it on the
// first transport stream packet.

use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsConfig;
use crate::hls::decryption::{SegmentDecryption, decrypt_aes128_cbc};

/// MPEG-TS packet sync byte.
pub const TS_SYNC_BYTE: u8 = 0x47;

/// Drops trailing padding, trusting the last byte as the pad length.
///
/// The padding bytes themselves are not checked. A pad length larger than
/// the buffer empties it.
pub fn strip_padding(mut data: Vec<u8>) -> Vec<u8> {
    if let Some(&pad) = data.last() {
        let keep = data.len().saturating_sub(pad as usize);
        data.truncate(keep);
    }
    data
}

/// Slice starting at the first sync byte; empty when there is none.
pub fn align_to_sync_byte(data: &[u8]) -> &[u8] {
    match memchr::memchr(TS_SYNC_BYTE, data) {
        Some(offset) => &data[offset..],
        None => &[],
    }
}

pub struct SegmentProcessor {
    config: Arc<HlsConfig>,
}

impl SegmentProcessor {
    pub fn new(config: Arc<HlsConfig>) -> Self {
        Self { config }
    }

    /// Decrypts (when `decryption` is set), strips padding and aligns the
    /// segment. A segment left empty is an error.
    pub async fn process(
        &self,
        raw: Bytes,
        decryption: Option<&SegmentDecryption>,
    ) -> Result<Bytes, HlsDownloaderError> {
        let plain = match decryption {
            None => raw,
            Some(decryption) if self.config.decryption_config.offload_decryption_to_cpu_pool => {
                let decryption = decryption.clone();
                tokio::task::spawn_blocking(move || Self::decrypt(&raw, &decryption))
                    .await
                    .map_err(|e| {
                        HlsDownloaderError::DecryptionError(format!(
                            "Decryption task failed: {e}"
                        ))
                    })??
            }
            Some(decryption) => Self::decrypt(&raw, decryption)?,
        };

        let aligned = align_to_sync_byte(&plain);
        if aligned.is_empty() {
            return Err(HlsDownloaderError::SegmentProcessError(format!(
                "No transport stream sync byte in {} byte segment",
                plain.len()
            )));
        }
        trace!(
            skipped = plain.len() - aligned.len(),
            "Aligned segment to sync byte"
        );
        Ok(plain.slice_ref(aligned))
    }

    fn decrypt(raw: &[u8], decryption: &SegmentDecryption) -> Result<Bytes, HlsDownloaderError> {
        let decrypted = decrypt_aes128_cbc(raw, &decryption.key, &decryption.iv)?;
        Ok(Bytes::from(strip_padding(decrypted)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::test_support::{encrypt, ts_payload};

    const KEY: [u8; 16] = [3; 16];
    const IV: [u8; 16] = *b"0000000000000005";

    fn processor(offload: bool) -> SegmentProcessor {
        let mut config = HlsConfig::default();
        config.decryption_config.offload_decryption_to_cpu_pool = offload;
        SegmentProcessor::new(Arc::new(config))
    }

    #[test]
    fn test_strip_padding() {
        assert_eq!(strip_padding(vec![1, 2, 3, 2, 2]), vec![1, 2, 3]);
        assert_eq!(strip_padding(vec![9, 9, 200]), Vec::<u8>::new());
        assert_eq!(strip_padding(Vec::new()), Vec::<u8>::new());
        // Pad bytes are not validated.
        assert_eq!(strip_padding(vec![5, 6, 7, 1]), vec![5, 6, 7]);
    }

    #[test]
    fn test_align_starts_with_sync_byte_or_is_empty() {
        let inputs: [&[u8]; 5] = [
            &[0x47, 1, 2],
            &[0, 0, 0x47, 0x47],
            &[1, 2, 3],
            &[],
            &[0xFF; 64],
        ];
        for input in inputs {
            let aligned = align_to_sync_byte(input);
            assert!(aligned.is_empty() || aligned[0] == TS_SYNC_BYTE);
            assert!(input.ends_with(aligned));
        }
        assert_eq!(align_to_sync_byte(&[0, 0, 0x47, 1]), &[0x47, 1]);
    }

    #[tokio::test]
    async fn test_process_clear_segment() {
        let payload = ts_payload(1, 3);
        let out = processor(false)
            .process(Bytes::from(payload.clone()), None)
            .await
            .unwrap();
        assert_eq!(out[0], TS_SYNC_BYTE);
        assert_eq!(&out[..], &payload[3..]);
    }

    #[tokio::test]
    async fn test_process_encrypted_segment_inline_and_offloaded() {
        let payload = ts_payload(2, 4);
        let cipher_text = Bytes::from(encrypt(&payload, &KEY, &IV));
        let decryption = SegmentDecryption {
            key: Bytes::from_static(&KEY),
            iv: IV,
        };

        for offload in [false, true] {
            let out = processor(offload)
                .process(cipher_text.clone(), Some(&decryption))
                .await
                .unwrap();
            assert_eq!(&out[..], &payload[3..]);
        }
    }

    #[tokio::test]
    async fn test_process_failures() {
        let decryption = SegmentDecryption {
            key: Bytes::from_static(&KEY),
            iv: IV,
        };
        let misaligned = processor(false)
            .process(Bytes::from_static(&[0u8; 20]), Some(&decryption))
            .await;
        assert!(matches!(
            misaligned,
            Err(HlsDownloaderError::DecryptionError(_))
        ));

        let no_sync = processor(false)
            .process(Bytes::from_static(&[1u8; 10]), None)
            .await;
        assert!(matches!(
            no_sync,
            Err(HlsDownloaderError::SegmentProcessError(_))
        ));
    }
}
