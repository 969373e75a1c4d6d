use super::{expect_id, read_payload};
use crate::prelude::*;

/// `axml` chunk: ADM XML, kept as opaque bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxmlChunk {
    data: Vec<u8>,
}

impl AxmlChunk {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The XML as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> R<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }
}

pub fn parse_axml_chunk<S: Read>(stream: &mut S, id: ChunkId, size: u64) -> R<AxmlChunk> {
    expect_id(id, AXML_ID)?;
    Ok(AxmlChunk {
        data: read_payload(stream, id, size)?,
    })
}
