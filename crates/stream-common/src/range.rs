//! Byte ranges for HTTP Range requests.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SourceError;

/// A byte interval within a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRange {
    pub offset: u64,
    pub size: u64,
}

impl ChunkRange {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Exclusive end offset, or `None` on overflow.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }

    /// Smallest range covering both `self` and `other`.
    pub fn union(&self, other: &ChunkRange) -> Option<ChunkRange> {
        let start = self.offset.min(other.offset);
        let end = self.end()?.max(other.end()?);
        Some(ChunkRange::new(start, end - start))
    }

    /// Whether `other` lies completely inside this range.
    pub fn contains(&self, other: &ChunkRange) -> bool {
        match (self.end(), other.end()) {
            (Some(end), Some(other_end)) => other.offset >= self.offset && other_end <= end,
            _ => false,
        }
    }
}

/// The range part of a request: either an explicit span or the last N bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteRange {
    Span(ChunkRange),
    /// Final `n` bytes of the file (`bytes=-n`), used for trailer reads
    /// without knowing the file size.
    Suffix(u64),
}

impl ByteRange {
    pub fn span(offset: u64, size: u64) -> Self {
        ByteRange::Span(ChunkRange::new(offset, size))
    }

    pub fn suffix(len: u64) -> Self {
        ByteRange::Suffix(len)
    }

    /// Number of bytes requested.
    pub fn len(&self) -> u64 {
        match self {
            ByteRange::Span(r) => r.size,
            ByteRange::Suffix(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value for the `Range` request header.
    ///
    /// Empty ranges cannot be expressed in HTTP and are rejected.
    pub fn header_value(&self) -> Result<String, SourceError> {
        match self {
            ByteRange::Span(r) => {
                let last = r
                    .end()
                    .and_then(|end| end.checked_sub(1))
                    .filter(|_| r.size > 0)
                    .ok_or_else(|| SourceError::InvalidRange(format!("{:?}", r)))?;
                Ok(format!("bytes={}-{}", r.offset, last))
            }
            ByteRange::Suffix(0) => Err(SourceError::InvalidRange("bytes=-0".to_string())),
            ByteRange::Suffix(n) => Ok(format!("bytes=-{}", n)),
        }
    }

    /// Parse a `Range` header value such as `bytes=0-1023` or `bytes=-24`.
    ///
    /// Whitespace is ignored, so equivalent spellings normalize to the same
    /// range. Open-ended ranges (`bytes=100-`) and multi-range requests are
    /// not supported.
    pub fn parse(value: &str) -> Result<Self, SourceError> {
        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        let invalid = || SourceError::InvalidRange(value.to_string());

        let ranges = compact
            .to_ascii_lowercase()
            .strip_prefix("bytes=")
            .map(str::to_string)
            .ok_or_else(invalid)?;

        if ranges.contains(',') {
            return Err(invalid());
        }

        let (start, end) = ranges.split_once('-').ok_or_else(invalid)?;
        if start.is_empty() {
            let len: u64 = end.parse().map_err(|_| invalid())?;
            if len == 0 {
                return Err(invalid());
            }
            return Ok(ByteRange::Suffix(len));
        }

        let start: u64 = start.parse().map_err(|_| invalid())?;
        let end: u64 = end.parse().map_err(|_| invalid())?;
        if end < start {
            return Err(invalid());
        }
        Ok(ByteRange::span(start, end - start + 1))
    }

    /// Resolve into an absolute span for a file of `file_len` bytes.
    pub fn resolve(&self, file_len: u64) -> Option<ChunkRange> {
        match self {
            ByteRange::Span(r) if r.end()? <= file_len => Some(*r),
            ByteRange::Span(_) => None,
            ByteRange::Suffix(n) => {
                let n = (*n).min(file_len);
                Some(ChunkRange::new(file_len - n, n))
            }
        }
    }
}

impl From<ChunkRange> for ByteRange {
    fn from(range: ChunkRange) -> Self {
        ByteRange::Span(range)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.header_value() {
            Ok(value) => f.write_str(&value),
            Err(_) => write!(f, "bytes=<empty>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_value() {
        assert_eq!(ByteRange::span(0, 1024).header_value().unwrap(), "bytes=0-1023");
        assert_eq!(ByteRange::suffix(24).header_value().unwrap(), "bytes=-24");
        assert!(ByteRange::span(10, 0).header_value().is_err());
    }

    #[test]
    fn test_parse_normalizes_whitespace_and_case() {
        let a = ByteRange::parse("bytes=100-199").unwrap();
        let b = ByteRange::parse(" Bytes = 100 - 199 ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, ByteRange::span(100, 100));
    }

    #[test]
    fn test_parse_suffix() {
        assert_eq!(ByteRange::parse("bytes=-24").unwrap(), ByteRange::Suffix(24));
    }

    #[test]
    fn test_parse_rejects_unsupported_forms() {
        assert!(ByteRange::parse("bytes=100-").is_err());
        assert!(ByteRange::parse("bytes=0-1,5-9").is_err());
        assert!(ByteRange::parse("items=0-1").is_err());
        assert!(ByteRange::parse("bytes=9-1").is_err());
    }

    #[test]
    fn test_resolve_suffix_clamps_to_file() {
        assert_eq!(ByteRange::suffix(24).resolve(100), Some(ChunkRange::new(76, 24)));
        assert_eq!(ByteRange::suffix(500).resolve(100), Some(ChunkRange::new(0, 100)));
        assert_eq!(ByteRange::span(90, 20).resolve(100), None);
    }

    #[test]
    fn test_union() {
        let a = ChunkRange::new(10, 10);
        let b = ChunkRange::new(40, 5);
        assert_eq!(a.union(&b), Some(ChunkRange::new(10, 35)));
        assert!(ChunkRange::new(0, 100).contains(&a));
        assert!(!a.contains(&b));
    }
}
