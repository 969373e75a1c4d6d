use super::read_payload;
use crate::prelude::*;

/// Any chunk without a typed model. The payload is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChunk {
    id: ChunkId,
    data: Vec<u8>,
}

impl UnknownChunk {
    pub fn new(id: ChunkId, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    pub fn id(&self) -> ChunkId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> R<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }
}

pub fn parse_unknown_chunk<S: Read>(stream: &mut S, id: ChunkId, size: u64) -> R<UnknownChunk> {
    Ok(UnknownChunk {
        id,
        data: read_payload(stream, id, size)?,
    })
}
