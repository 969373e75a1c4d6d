use std::fmt;

/// Pack a four character code into an integer, first character in the
/// least significant byte (the order it has on disk when read little-endian).
pub const fn fourcc(p: &[u8; 4]) -> u32 {
    (p[3] as u32) << 24 | (p[2] as u32) << 16 | (p[1] as u32) << 8 | p[0] as u32
}

/// Inverse of [`fourcc`].
pub fn fourcc_to_string(value: u32) -> String {
    String::from_utf8_lossy(&value.to_le_bytes()).into_owned()
}

/// Chunk identifier. Compared exactly, no case folding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(u32);

impl ChunkId {
    pub const fn new(p: &[u8; 4]) -> Self {
        ChunkId(fourcc(p))
    }

    pub const fn from_u32(value: u32) -> Self {
        ChunkId(value)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl From<[u8; 4]> for ChunkId {
    fn from(bytes: [u8; 4]) -> Self {
        ChunkId::new(&bytes)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&fourcc_to_string(self.0))
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({:?})", fourcc_to_string(self.0))
    }
}

// Container identifiers
pub const RIFF_ID: ChunkId = ChunkId::new(b"RIFF");
pub const RF64_ID: ChunkId = ChunkId::new(b"RF64");
pub const BW64_ID: ChunkId = ChunkId::new(b"BW64");
pub const WAVE_ID: ChunkId = ChunkId::new(b"WAVE");

// Chunk identifiers
pub const FMT_ID: ChunkId = ChunkId::new(b"fmt ");
pub const DATA_ID: ChunkId = ChunkId::new(b"data");
pub const DS64_ID: ChunkId = ChunkId::new(b"ds64");
pub const CHNA_ID: ChunkId = ChunkId::new(b"chna");
pub const AXML_ID: ChunkId = ChunkId::new(b"axml");
pub const JUNK_ID: ChunkId = ChunkId::new(b"JUNK");
