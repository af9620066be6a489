//! Range-addressed container reader.

use serde::Serialize;
use stream_common::{ByteRange, CacheLayer, ChunkRange, RangeSource};
use tracing::{debug, instrument};

use crate::error::{ContainerError, Result};
use crate::format::{Descriptor, NodeKind, Trailer, TRAILER_SIZE};
use crate::session::{DecodeSession, IoLimits, ReadWindow};
use crate::variable::ContainerVariable;

/// Dense result of a decode: `data` is row-major over `dims`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedArray {
    pub dims: Vec<u64>,
    pub data: Vec<f32>,
}

/// An opened container.
///
/// Opening performs three reads: the trailer (suffix range), the root
/// descriptor, and the union of all child descriptors. Those reads use the
/// `meta` cache layer; chunk index and data reads use the layer given at
/// open time.
pub struct ContainerDecoder<S> {
    source: S,
    url: String,
    layer: CacheLayer,
    limits: IoLimits,
    variables: Vec<ContainerVariable>,
}

impl<S: RangeSource> ContainerDecoder<S> {
    #[instrument(skip(source, url), fields(url = %url.as_ref()))]
    pub async fn open(source: S, url: impl AsRef<str>, layer: CacheLayer) -> Result<Self> {
        let url = url.as_ref().to_string();

        let tail = source
            .read(&url, ByteRange::suffix(TRAILER_SIZE), CacheLayer::Meta)
            .await?;
        let trailer = Trailer::parse(&tail)?;

        let root_bytes = source
            .read(&url, ByteRange::Span(trailer.root), CacheLayer::Meta)
            .await?;
        if root_bytes.len() as u64 != trailer.root.size {
            return Err(ContainerError::invalid_descriptor(
                trailer.root.offset,
                trailer.root.size,
                format!("root read returned {} bytes", root_bytes.len()),
            ));
        }
        let root = Descriptor::parse(&root_bytes, trailer.root.offset)?;
        if root.kind != NodeKind::Group {
            return Err(ContainerError::invalid_descriptor(
                trailer.root.offset,
                trailer.root.size,
                "root is not a group",
            ));
        }

        let variables = Self::read_children(&source, &url, &root.children).await?;
        debug!(variables = variables.len(), "Opened container");

        Ok(Self {
            source,
            url,
            layer,
            limits: IoLimits::default(),
            variables,
        })
    }

    /// Fetch every child descriptor with a single read of their union.
    async fn read_children(
        source: &S,
        url: &str,
        children: &[ChunkRange],
    ) -> Result<Vec<ContainerVariable>> {
        let Some(first) = children.first() else {
            return Ok(Vec::new());
        };
        let span = children
            .iter()
            .skip(1)
            .try_fold(*first, |acc, child| acc.union(child))
            .ok_or_else(|| {
                ContainerError::invalid_descriptor(first.offset, first.size, "child ranges overflow")
            })?;

        let bytes = source.read(url, ByteRange::Span(span), CacheLayer::Meta).await?;

        let mut variables = Vec::with_capacity(children.len());
        for child in children {
            let local = (child.offset - span.offset) as usize;
            let slice = usize::try_from(child.size)
                .ok()
                .and_then(|size| bytes.get(local..local.checked_add(size)?))
                .ok_or_else(|| {
                    ContainerError::invalid_descriptor(
                        child.offset,
                        child.size,
                        format!("child outside {} bytes read", bytes.len()),
                    )
                })?;

            let descriptor = Descriptor::parse(slice, child.offset)?;
            match ContainerVariable::from_descriptor(descriptor, *child) {
                Some(variable) => variables.push(variable),
                None => debug!(offset = child.offset, "Skipping non-array child"),
            }
        }
        Ok(variables)
    }

    pub fn with_limits(mut self, limits: IoLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn layer(&self) -> CacheLayer {
        self.layer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn variables(&self) -> &[ContainerVariable] {
        &self.variables
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    /// Look up a variable by exact name.
    pub fn variable(&self, name: &str) -> Result<&ContainerVariable> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| ContainerError::VariableNotFound {
                name: name.to_string(),
                available: self.variable_names(),
            })
    }

    /// Decode `window` of `variable` into `out`, row-major over the window.
    ///
    /// Index reads and data reads are issued strictly in order.
    pub async fn read_window(
        &self,
        variable: &ContainerVariable,
        window: ReadWindow,
        out: &mut [f32],
    ) -> Result<()> {
        let mut session = DecodeSession::new(variable, window, self.limits)?;
        if out.len() != session.cell_count() {
            return Err(ContainerError::session_init(
                &variable.name,
                format!(
                    "destination holds {} cells, window needs {}",
                    out.len(),
                    session.cell_count()
                ),
            ));
        }

        while let Some(index_read) = session.next_index_read() {
            let index = self
                .source
                .read(&self.url, ByteRange::Span(index_read.range), self.layer)
                .await?;
            session.accept_index(&index_read, &index)?;

            while let Some(data_read) = session.next_data_read() {
                let data = self
                    .source
                    .read(&self.url, ByteRange::Span(data_read.range), self.layer)
                    .await?;
                session.accept_data(&data_read, &data, out)?;
            }
        }

        if !session.is_complete() {
            return Err(ContainerError::session_init(
                &variable.name,
                format!(
                    "session ended with {} of {} chunks decoded",
                    session.decoded_chunks(),
                    session.needed_chunks()
                ),
            ));
        }
        Ok(())
    }

    /// Decode a window of the named variable into a new array.
    pub async fn read_variable_window(&self, name: &str, window: ReadWindow) -> Result<DecodedArray> {
        let variable = self.variable(name)?;
        let cells = window
            .cell_count()
            .and_then(|c| usize::try_from(c).ok())
            .ok_or_else(|| ContainerError::session_init(name, "window too large"))?;

        let mut data = vec![0.0f32; cells];
        let dims = window.count.clone();
        self.read_window(variable, window, &mut data).await?;
        Ok(DecodedArray { dims, data })
    }

    /// Decode the full extent of the named variable.
    pub async fn read_variable(&self, name: &str) -> Result<DecodedArray> {
        let variable = self.variable(name)?;
        let window = ReadWindow::full(&variable.dims);
        self.read_variable_window(name, window).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Compression;
    use crate::writer::ContainerWriter;
    use std::sync::Arc;
    use stream_common::MemorySource;

    const URL: &str = "mem://2025-06-01T0000.om";

    fn source_with(bytes: bytes::Bytes) -> Arc<MemorySource> {
        let source = Arc::new(MemorySource::new());
        source.insert(URL, bytes);
        source
    }

    #[tokio::test]
    async fn test_open_reads_metadata_in_three_requests() {
        let bytes = ContainerWriter::new()
            .array("a", vec![1, 8], vec![1, 4], Compression::None, vec![1.0; 8])
            .unwrap()
            .array("b", vec![1, 8], vec![1, 4], Compression::Deflate, vec![2.0; 8])
            .unwrap()
            .finish()
            .unwrap();
        let source = source_with(bytes);

        let decoder = ContainerDecoder::open(source.clone(), URL, CacheLayer::Temp)
            .await
            .unwrap();
        assert_eq!(source.request_count(), 3);
        assert_eq!(decoder.variable_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_variable_lists_available() {
        let bytes = ContainerWriter::new()
            .array("temperature_2m", vec![4], vec![2], Compression::None, vec![0.0; 4])
            .unwrap()
            .finish()
            .unwrap();
        let decoder = ContainerDecoder::open(source_with(bytes), URL, CacheLayer::Temp)
            .await
            .unwrap();

        match decoder.read_variable("pressure_msl").await {
            Err(ContainerError::VariableNotFound { name, available }) => {
                assert_eq!(name, "pressure_msl");
                assert_eq!(available, vec!["temperature_2m".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undersized_file_is_trailer_error() {
        let decoder = ContainerDecoder::open(
            source_with(bytes::Bytes::from_static(b"short")),
            URL,
            CacheLayer::Temp,
        )
        .await;
        assert!(matches!(
            decoder,
            Err(ContainerError::InvalidTrailer { size: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_source_error() {
        let result = ContainerDecoder::open(Arc::new(MemorySource::new()), URL, CacheLayer::Temp).await;
        assert!(matches!(result, Err(ContainerError::Source(_))));
    }

    #[tokio::test]
    async fn test_corrupt_chunk_reports_variable_and_offset() {
        let mut raw = ContainerWriter::new()
            .array("v", vec![8], vec![4], Compression::Deflate, (0..8).map(|i| i as f32).collect())
            .unwrap()
            .finish()
            .unwrap()
            .to_vec();
        // Chunk 0 starts the file
        raw[0] = 0xff;
        raw[1] = 0xff;
        let decoder = ContainerDecoder::open(source_with(raw.into()), URL, CacheLayer::Temp)
            .await
            .unwrap();

        match decoder.read_variable("v").await {
            Err(ContainerError::ChunkDecode { variable, chunk, offset, .. }) => {
                assert_eq!(variable, "v");
                assert_eq!(chunk, 0);
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sub_window_of_2d_array() {
        let data: Vec<f32> = (0..30).map(|i| i as f32).collect();
        let bytes = ContainerWriter::new()
            .array("grid", vec![5, 6], vec![2, 4], Compression::Deflate, data)
            .unwrap()
            .finish()
            .unwrap();
        let decoder = ContainerDecoder::open(source_with(bytes), URL, CacheLayer::Temp)
            .await
            .unwrap();

        let window = ReadWindow::new(vec![1, 2], vec![3, 3]);
        let result = decoder.read_variable_window("grid", window).await.unwrap();
        assert_eq!(result.dims, vec![3, 3]);
        assert_eq!(
            result.data,
            vec![8.0, 9.0, 10.0, 14.0, 15.0, 16.0, 20.0, 21.0, 22.0]
        );
    }
}
