//! Chunk model and the generic chunk framing shared by reader and writer.

use crate::prelude::*;
mod axml;
mod chna;
mod ds64;
mod format;
mod unknown;
pub use axml::{AxmlChunk, parse_axml_chunk};
pub use chna::{AudioId, ChnaChunk, parse_chna_chunk};
pub use ds64::{DS64_BASE_SIZE, DS64_ENTRY_SIZE, DataSize64Chunk, parse_data_size64_chunk};
pub use format::{FORMAT_EXTENSIBLE, FORMAT_PCM, FormatInfoChunk, parse_format_info_chunk};
pub use unknown::{UnknownChunk, parse_unknown_chunk};

/// id (4) + size (4)
pub const CHUNK_HEADER_SIZE: u64 = 8;

/// Header size value meaning "the real size lives in ds64".
pub const SIZE_SENTINEL: u32 = u32::MAX;

/// A chunk header exactly as it appears on disk, before any ds64 correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: ChunkId,
    pub size: u32,
}

/// Typed chunk payloads, with an opaque fallback for everything else.
///
/// `data` is not represented here: its payload is streamed by the writer
/// and read on demand by the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    FormatInfo(FormatInfoChunk),
    Chna(ChnaChunk),
    Axml(AxmlChunk),
    DataSize64(DataSize64Chunk),
    Unknown(UnknownChunk),
}

impl Chunk {
    pub fn id(&self) -> ChunkId {
        match self {
            Chunk::FormatInfo(_) => FMT_ID,
            Chunk::Chna(_) => CHNA_ID,
            Chunk::Axml(_) => AXML_ID,
            Chunk::DataSize64(_) => DS64_ID,
            Chunk::Unknown(c) => c.id(),
        }
    }

    /// Payload size in bytes, excluding header and pad byte.
    pub fn size(&self) -> R<u64> {
        match self {
            Chunk::FormatInfo(c) => Ok(c.size()),
            Chunk::Chna(c) => c.size(),
            Chunk::Axml(c) => Ok(c.size()),
            Chunk::DataSize64(c) => c.size(),
            Chunk::Unknown(c) => Ok(c.size()),
        }
    }

    pub fn write_payload<W: Write>(&self, writer: &mut W) -> R<()> {
        match self {
            Chunk::FormatInfo(c) => c.write(writer),
            Chunk::Chna(c) => c.write(writer),
            Chunk::Axml(c) => c.write(writer),
            Chunk::DataSize64(c) => c.write(writer),
            Chunk::Unknown(c) => c.write(writer),
        }
    }
}

impl From<FormatInfoChunk> for Chunk {
    fn from(c: FormatInfoChunk) -> Self {
        Chunk::FormatInfo(c)
    }
}

impl From<ChnaChunk> for Chunk {
    fn from(c: ChnaChunk) -> Self {
        Chunk::Chna(c)
    }
}

impl From<AxmlChunk> for Chunk {
    fn from(c: AxmlChunk) -> Self {
        Chunk::Axml(c)
    }
}

impl From<DataSize64Chunk> for Chunk {
    fn from(c: DataSize64Chunk) -> Self {
        Chunk::DataSize64(c)
    }
}

impl From<UnknownChunk> for Chunk {
    fn from(c: UnknownChunk) -> Self {
        Chunk::Unknown(c)
    }
}

/// Size of a payload once the pad byte for odd sizes is added.
pub fn padded_size(size: u64) -> R<u64> {
    safe_add(size, size & 1)
}

/// Read as many bytes as are available up to `buf.len()`.
fn read_up_to<S: Read>(stream: &mut S, buf: &mut [u8]) -> R<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Read the next chunk header. Returns `None` on a clean end of stream and a
/// format error if the stream ends inside the header.
pub fn read_chunk_header<S: Read>(stream: &mut S) -> R<Option<ChunkHeader>> {
    let mut buf = [0u8; CHUNK_HEADER_SIZE as usize];
    match read_up_to(stream, &mut buf)? {
        0 => Ok(None),
        8 => {
            let mut cursor = Cursor::new(&buf[..]);
            let id = ChunkId::from_u32(cursor.read_u32::<LittleEndian>()?);
            let size = cursor.read_u32::<LittleEndian>()?;
            Ok(Some(ChunkHeader { id, size }))
        }
        n => Err(Bw64Error::format(format!(
            "truncated chunk header: got {n} of {CHUNK_HEADER_SIZE} bytes"
        ))),
    }
}

/// Move past a payload of `size` bytes and its pad byte.
pub fn skip_chunk_payload<S: Seek>(stream: &mut S, size: u64) -> R<()> {
    let skip: i64 = safe_cast(padded_size(size)?)?;
    stream.seek(SeekFrom::Current(skip))?;
    Ok(())
}

/// Read a whole payload into memory. The buffer grows with what the stream
/// actually delivers, never with the declared size.
pub(crate) fn read_payload<S: Read>(stream: &mut S, id: ChunkId, size: u64) -> R<Vec<u8>> {
    let mut data = Vec::new();
    stream.by_ref().take(size).read_to_end(&mut data)?;
    let available: u64 = safe_cast(data.len())?;
    if available < size {
        return Err(Bw64Error::format(format!(
            "chunk '{id}' truncated: declared {size} bytes, {available} available"
        )));
    }
    Ok(data)
}

/// Map an end of stream inside a fixed-layout payload to a format error.
pub(crate) fn truncated(id: ChunkId, size: u64) -> impl FnOnce(Bw64Error) -> Bw64Error {
    move |e| match e {
        Bw64Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            Bw64Error::format(format!(
                "chunk '{id}' truncated: stream ends inside its {size} byte payload"
            ))
        }
        e => e,
    }
}

/// Write header, payload and (for odd sizes) one pad byte.
///
/// `size_for_header` is what goes into the 32-bit size field; it differs
/// from `chunk.size()` when the chunk is too large and carries the sentinel.
pub fn write_chunk<W: Write>(writer: &mut W, chunk: &Chunk, size_for_header: u32) -> R<()> {
    writer.write_u32::<LittleEndian>(chunk.id().as_u32())?;
    writer.write_u32::<LittleEndian>(size_for_header)?;
    chunk.write_payload(writer)?;
    if chunk.size()? % 2 == 1 {
        writer.write_u8(0)?; // padding
    }
    Ok(())
}

/// Write a zero-filled chunk of `size` payload bytes.
pub fn write_chunk_placeholder<W: Write>(writer: &mut W, id: ChunkId, size: u32) -> R<()> {
    writer.write_u32::<LittleEndian>(id.as_u32())?;
    writer.write_u32::<LittleEndian>(size)?;
    let zeros = vec![0u8; safe_cast::<usize, _>(padded_size(size as u64)?)?];
    writer.write_all(&zeros)?;
    Ok(())
}

/// Parse a payload of `size` bytes as the chunk type selected by `id`.
pub fn parse_chunk<S: Read>(stream: &mut S, id: ChunkId, size: u64) -> R<Chunk> {
    trace!("parsing chunk '{}' ({} bytes)", id, size);
    let chunk = match id {
        FMT_ID => parse_format_info_chunk(stream, id, size).map(Chunk::from),
        CHNA_ID => parse_chna_chunk(stream, id, size).map(Chunk::from),
        AXML_ID => parse_axml_chunk(stream, id, size).map(Chunk::from),
        DS64_ID => parse_data_size64_chunk(stream, id, size).map(Chunk::from),
        _ => parse_unknown_chunk(stream, id, size).map(Chunk::from),
    };
    chunk.map_err(truncated(id, size))
}

pub(crate) fn expect_id(id: ChunkId, expected: ChunkId) -> R<()> {
    if id != expected {
        return Err(Bw64Error::format(format!(
            "chunk id mismatch: expected '{expected}', got '{id}'"
        )));
    }
    Ok(())
}

// ================================== TESTS ==================================
