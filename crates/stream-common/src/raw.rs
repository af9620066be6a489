//! Raw field files: little-endian f32 values with no header.

use std::io;
use std::path::Path;

pub fn encode_f32_le(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode little-endian f32 values; a trailing partial value is an error.
pub fn decode_f32_le(bytes: &[u8]) -> io::Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} bytes is not a whole number of f32 values", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

pub fn read_f32_file(path: impl AsRef<Path>) -> io::Result<Vec<f32>> {
    decode_f32_le(&std::fs::read(path)?)
}

pub fn write_f32_file(path: impl AsRef<Path>, values: &[f32]) -> io::Result<()> {
    std::fs::write(path, encode_f32_le(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_little_endian() {
        let bytes = encode_f32_le(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_f32_le(&bytes).unwrap(), vec![1.0, -2.5]);
    }

    #[test]
    fn test_partial_value_rejected() {
        let err = decode_f32_le(&[0, 0, 128]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
