use super::expect_id;
use crate::pcm::PcmDepth;
use crate::prelude::*;

// Format tags
pub const FORMAT_PCM: u16 = 1;
pub const FORMAT_EXTENSIBLE: u16 = 65534; // 0xFFFE

// Chunk Structures
const STANDARD_FMT_CHUNK_SIZE: u64 = 16;

/// `fmt ` chunk. All derived fields are validated on construction and parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatInfoChunk {
    format_tag: u16,
    channel_count: u16,
    sample_rate: u32,
    bytes_per_second: u32,
    block_alignment: u16,
    bits_per_sample: u16,
}

impl FormatInfoChunk {
    /// Build a PCM format description, deriving byte rate and block alignment.
    pub fn new(channel_count: u16, sample_rate: u32, bits_per_sample: u16) -> R<Self> {
        let depth = PcmDepth::from_bits(bits_per_sample)?;
        if channel_count == 0 {
            return Err(Bw64Error::format("channel count must be greater than 0"));
        }
        if sample_rate == 0 {
            return Err(Bw64Error::format("sample rate must be greater than 0"));
        }
        let block_alignment: u16 = safe_cast(safe_mul(
            channel_count as u32,
            depth.bytes_per_sample() as u32,
        )?)?;
        let bytes_per_second = safe_mul(sample_rate, block_alignment as u32)?;
        Ok(Self {
            format_tag: FORMAT_PCM,
            channel_count,
            sample_rate,
            bytes_per_second,
            block_alignment,
            bits_per_sample,
        })
    }

    pub fn format_tag(&self) -> u16 {
        self.format_tag
    }
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
    pub fn bytes_per_second(&self) -> u32 {
        self.bytes_per_second
    }
    pub fn block_alignment(&self) -> u16 {
        self.block_alignment
    }
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn size(&self) -> u64 {
        STANDARD_FMT_CHUNK_SIZE
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> R<()> {
        writer.write_u16::<LittleEndian>(self.format_tag)?;
        writer.write_u16::<LittleEndian>(self.channel_count)?;
        writer.write_u32::<LittleEndian>(self.sample_rate)?;
        writer.write_u32::<LittleEndian>(self.bytes_per_second)?;
        writer.write_u16::<LittleEndian>(self.block_alignment)?;
        writer.write_u16::<LittleEndian>(self.bits_per_sample)?;
        Ok(())
    }
}

pub fn parse_format_info_chunk<S: Read>(stream: &mut S, id: ChunkId, size: u64) -> R<FormatInfoChunk> {
    expect_id(id, FMT_ID)?;
    if size != STANDARD_FMT_CHUNK_SIZE {
        return Err(Bw64Error::format(format!(
            "illegal fmt chunk size: {size} (expected {STANDARD_FMT_CHUNK_SIZE})"
        )));
    }

    let format_tag = stream.read_u16::<LittleEndian>()?;
    let channel_count = stream.read_u16::<LittleEndian>()?;
    let sample_rate = stream.read_u32::<LittleEndian>()?;
    let bytes_per_second = stream.read_u32::<LittleEndian>()?;
    let block_alignment = stream.read_u16::<LittleEndian>()?;
    let bits_per_sample = stream.read_u16::<LittleEndian>()?;

    if format_tag != FORMAT_PCM && format_tag != FORMAT_EXTENSIBLE {
        return Err(Bw64Error::format(format!("illegal format tag: {format_tag}")));
    }
    if channel_count == 0 {
        return Err(Bw64Error::format("channel count must be greater than 0"));
    }
    if sample_rate == 0 {
        return Err(Bw64Error::format("sample rate must be greater than 0"));
    }

    let expected_alignment = safe_mul(channel_count as u32, (bits_per_sample / 8) as u32)?;
    if block_alignment as u32 != expected_alignment {
        return Err(Bw64Error::format(format!(
            "block alignment {block_alignment} does not match channels * bytes per sample = {expected_alignment}"
        )));
    }
    let expected_rate = safe_mul(sample_rate as u64, block_alignment as u64)?;
    if bytes_per_second as u64 != expected_rate {
        return Err(Bw64Error::format(format!(
            "bytes per second {bytes_per_second} does not match sample rate * block alignment = {expected_rate}"
        )));
    }

    Ok(FormatInfoChunk {
        format_tag,
        channel_count,
        sample_rate,
        bytes_per_second,
        block_alignment,
        bits_per_sample,
    })
}
