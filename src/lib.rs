pub mod chunks;
pub mod error;
pub mod fourcc;
pub mod pcm;
mod prelude;
pub mod reader;
pub mod safe_int;
pub mod writer;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub use chunks::{
    AudioId, AxmlChunk, ChnaChunk, Chunk, ChunkHeader, DataSize64Chunk, FormatInfoChunk,
    UnknownChunk,
};
pub use error::{Bw64Error, Result};
pub use fourcc::*;
pub use pcm::FloatSample;
pub use reader::{Bw64Reader, ChunkTableEntry};
pub use writer::{Bw64Writer, WriterConfig};

/// Open a reader session on any seekable stream.
pub fn open_reader<S: std::io::Read + std::io::Seek>(stream: S) -> Result<Bw64Reader<S>> {
    Bw64Reader::open(stream)
}

/// Open a writer session on any seekable stream.
pub fn open_writer<W: std::io::Write + std::io::Seek>(
    stream: W,
    channels: u16,
    sample_rate: u32,
    bit_depth: u16,
    chna: Option<ChnaChunk>,
    axml: Option<AxmlChunk>,
) -> Result<Bw64Writer<W>> {
    Bw64Writer::new(stream, channels, sample_rate, bit_depth, chna, axml)
}

/// Open a file for reading.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Bw64Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Bw64Reader::open(BufReader::new(file))
}

/// Create (or truncate) a file for writing.
pub fn write_file<P: AsRef<Path>>(
    path: P,
    config: WriterConfig,
    chna: Option<ChnaChunk>,
    axml: Option<AxmlChunk>,
) -> Result<Bw64Writer<BufWriter<File>>> {
    let file = File::create(path)?;
    Bw64Writer::with_config(BufWriter::new(file), config, chna, axml)
}
