//! Bundle payload encoding.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use protocol::{EncodeError, PayloadEncoder};
use serde_json::Value;

/// Serializes a payload to JSON, base64-encodes the text and gzips the result.
///
/// This is the body format the bundle endpoints expect alongside
/// `content-encoding: gzip`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipPayloadEncoder {
    level: Compression,
}

impl GzipPayloadEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl PayloadEncoder for GzipPayloadEncoder {
    fn encode(&self, payload: &Value) -> Result<Vec<u8>, EncodeError> {
        let json = serde_json::to_vec(payload)?;
        let text = STANDARD.encode(json);

        let mut gzip = GzEncoder::new(Vec::with_capacity(text.len() / 2), self.level);
        gzip.write_all(text.as_bytes())?;
        Ok(gzip.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use protocol::{payloads, BundleFile, BundleFiles};
    use serde_json::json;

    use super::*;

    fn decode(bytes: &[u8]) -> Value {
        let mut text = String::new();
        GzDecoder::new(bytes).read_to_string(&mut text).unwrap();
        let json = STANDARD.decode(text).unwrap();
        serde_json::from_slice(&json).unwrap()
    }

    #[test]
    fn extend_payload_survives_decoding() {
        let mut files = BundleFiles::new();
        files.insert("src/a.js".into(), BundleFile::Hash("h-a".into()));
        files.insert(
            "src/b.js".into(),
            BundleFile::Content {
                hash: "h-b".into(),
                content: "let b = 1;\n".into(),
            },
        );
        let removed = vec!["src/old.js".to_string()];
        let payload = payloads::extend_bundle_body(&files, &removed).unwrap();

        let encoded = GzipPayloadEncoder::new().encode(&payload).unwrap();
        let decoded = decode(&encoded);

        assert_eq!(
            decoded,
            json!({
                "files": {
                    "src/a.js": "h-a",
                    "src/b.js": {"hash": "h-b", "content": "let b = 1;\n"}
                },
                "removedFiles": ["src/old.js"]
            })
        );
    }

    #[test]
    fn output_is_a_gzip_stream() {
        let encoded = GzipPayloadEncoder::with_level(9).encode(&json!({"a": 1})).unwrap();
        assert_eq!(&encoded[..2], &[0x1f, 0x8b]);
    }
}
