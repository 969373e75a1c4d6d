use super::expect_id;
use crate::prelude::*;

/// bw64Size + dataSize + dummySize + tableLength
pub const DS64_BASE_SIZE: u64 = 28;
/// chunk id + 64-bit size
pub const DS64_ENTRY_SIZE: u64 = 12;

/// `ds64` chunk: the 64-bit sizes that do not fit in 32-bit header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSize64Chunk {
    bw64_size: u64,
    data_size: u64,
    dummy_size: u64,
    table: Vec<(ChunkId, u64)>,
}

impl DataSize64Chunk {
    pub fn new(bw64_size: u64, data_size: u64) -> Self {
        Self {
            bw64_size,
            data_size,
            dummy_size: 0,
            table: Vec::new(),
        }
    }

    pub fn bw64_size(&self) -> u64 {
        self.bw64_size
    }
    pub fn data_size(&self) -> u64 {
        self.data_size
    }
    pub fn dummy_size(&self) -> u64 {
        self.dummy_size
    }

    pub fn set_bw64_size(&mut self, size: u64) {
        self.bw64_size = size;
    }
    pub fn set_data_size(&mut self, size: u64) {
        self.data_size = size;
    }

    /// Insert or replace the 64-bit size of `id`.
    pub fn set_chunk_size(&mut self, id: ChunkId, size: u64) {
        match self.table.iter_mut().find(|(entry_id, _)| *entry_id == id) {
            Some(entry) => entry.1 = size,
            None => self.table.push((id, size)),
        }
    }

    /// Size recorded for `id`. Absent ids are an error, never a default.
    pub fn chunk_size(&self, id: ChunkId) -> R<u64> {
        self.table
            .iter()
            .find(|(entry_id, _)| *entry_id == id)
            .map(|(_, size)| *size)
            .ok_or(Bw64Error::NotFound(id))
    }

    pub fn has_chunk_size(&self, id: ChunkId) -> bool {
        self.table.iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub fn table(&self) -> &[(ChunkId, u64)] {
        &self.table
    }

    /// Number of table entries as stored in the 32-bit tableLength field.
    pub fn table_length(&self) -> R<u32> {
        safe_cast(self.table.len())
    }

    pub fn size(&self) -> R<u64> {
        let entries: u64 = safe_cast(self.table.len())?;
        safe_add(DS64_BASE_SIZE, safe_mul(DS64_ENTRY_SIZE, entries)?)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> R<()> {
        writer.write_u64::<LittleEndian>(self.bw64_size)?;
        writer.write_u64::<LittleEndian>(self.data_size)?;
        writer.write_u64::<LittleEndian>(self.dummy_size)?;
        writer.write_u32::<LittleEndian>(self.table_length()?)?;
        for (id, size) in &self.table {
            writer.write_u32::<LittleEndian>(id.as_u32())?;
            writer.write_u64::<LittleEndian>(*size)?;
        }
        Ok(())
    }
}

/// Parse a ds64 payload. A declared size larger than the table needs is
/// accepted (the chunk may fill a larger reserved area); the rest is skipped.
pub fn parse_data_size64_chunk<S: Read>(stream: &mut S, id: ChunkId, size: u64) -> R<DataSize64Chunk> {
    expect_id(id, DS64_ID)?;
    if size < DS64_BASE_SIZE {
        return Err(Bw64Error::format(format!(
            "ds64 chunk too small: {size} bytes (minimum {DS64_BASE_SIZE})"
        )));
    }
    let bw64_size = stream.read_u64::<LittleEndian>()?;
    let data_size = stream.read_u64::<LittleEndian>()?;
    let dummy_size = stream.read_u64::<LittleEndian>()?;
    let table_length = stream.read_u32::<LittleEndian>()?;

    let needed = safe_add(DS64_BASE_SIZE, safe_mul(DS64_ENTRY_SIZE, table_length as u64)?)?;
    if size < needed {
        return Err(Bw64Error::format(format!(
            "ds64 chunk size {size} too small for {table_length} table entries ({needed} bytes)"
        )));
    }

    let mut chunk = DataSize64Chunk {
        bw64_size,
        data_size,
        dummy_size,
        table: Vec::new(),
    };
    for _ in 0..table_length {
        let entry_id = ChunkId::from_u32(stream.read_u32::<LittleEndian>()?);
        let entry_size = stream.read_u64::<LittleEndian>()?;
        if chunk.has_chunk_size(entry_id) {
            return Err(Bw64Error::format(format!(
                "ds64 table lists chunk '{entry_id}' twice"
            )));
        }
        chunk.table.push((entry_id, entry_size));
    }

    if size > needed {
        std::io::copy(&mut stream.by_ref().take(size - needed), &mut std::io::sink())?;
    }
    Ok(chunk)
}
