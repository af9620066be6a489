//! Chunk codecs.

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{Read, Write};

/// Per-array chunk compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Deflate,
}

impl Compression {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Compression::None),
            1 => Some(Compression::Deflate),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Deflate => 1,
        }
    }

    /// Decode a stored chunk into exactly `cells` values.
    pub fn decode(&self, stored: &[u8], cells: usize) -> Result<Vec<f32>, String> {
        let expected = cells
            .checked_mul(4)
            .ok_or_else(|| format!("chunk of {} cells overflows", cells))?;

        let bytes: Cow<'_, [u8]> = match self {
            Compression::None => Cow::Borrowed(stored),
            Compression::Deflate => {
                // One byte past `expected` is enough to detect an oversized chunk
                let mut out = Vec::with_capacity(expected);
                DeflateDecoder::new(stored)
                    .take(expected as u64 + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| format!("deflate: {}", e))?;
                if out.len() > expected {
                    return Err(format!(
                        "deflate output exceeds {} bytes for {} cells",
                        expected, cells
                    ));
                }
                Cow::Owned(out)
            }
        };

        if bytes.len() != expected {
            return Err(format!(
                "expected {} bytes for {} cells, got {}",
                expected,
                cells,
                bytes.len()
            ));
        }

        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Encode chunk values for storage.
    pub fn encode(&self, values: &[f32]) -> std::io::Result<Vec<u8>> {
        let mut raw = Vec::with_capacity(values.len() * 4);
        for v in values {
            raw.extend_from_slice(&v.to_le_bytes());
        }

        match self {
            Compression::None => Ok(raw),
            Compression::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&raw)?;
                encoder.finish()
            }
        }
    }
}
