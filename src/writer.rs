use crate::chunks::*;
use crate::pcm::{FloatSample, PcmDepth, encode_pcm_samples};
use crate::prelude::*;

// Writer defaults
const DEFAULT_CHANNELS: u16 = 1;
const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_BIT_DEPTH: u16 = 24;
/// Largest size written literally into a 32-bit header field.
const DEFAULT_MAX_HEADER_SIZE: u32 = 0xFFFF_FFFE;
/// Offset of the size field inside a chunk header.
const SIZE_FIELD_OFFSET: u64 = 4;

/// Stream parameters and header limits for a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    pub channels: u16,
    pub sample_rate: u32,
    pub bit_depth: u16,
    /// Sizes above this are stored as the sentinel and resolved through ds64.
    pub max_header_size: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            bit_depth: DEFAULT_BIT_DEPTH,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Finalized,
    Failed,
}

/// Writer session.
///
/// Header sizes are placeholders until [`Bw64Writer::close`] patches them,
/// so the stream must support seeking backwards. Dropping an open writer
/// leaves the file unfinalized.
pub struct Bw64Writer<W: Write + Seek> {
    stream: W,
    format: FormatInfoChunk,
    max_header_size: u64,
    start: u64,
    junk_position: u64,
    reserved_size: u64,
    data_position: Option<u64>,
    chna_written: bool,
    axml_written: bool,
    /// Chunks whose header carries the sentinel; they go into the ds64 table.
    large_chunks: Vec<(ChunkId, u64)>,
    post_data_chunks: Vec<Chunk>,
    frames_written: u64,
    state: WriterState,
    buffer: Vec<u8>,
}

/// ds64 bytes to reserve for the chunks written before `data`, plus one
/// spare table slot for a late chunk.
fn reservation_size(pre_data_chunks: &[Chunk], max_header_size: u64) -> R<u64> {
    let mut slots = 1u64;
    for chunk in pre_data_chunks {
        if chunk.size()? > max_header_size {
            slots = safe_add(slots, 1)?;
        }
    }
    safe_add(DS64_BASE_SIZE, safe_mul(DS64_ENTRY_SIZE, slots)?)
}

impl<W: Write + Seek> Bw64Writer<W> {
    /// Start a file with the given stream parameters and default header limits.
    pub fn new(
        stream: W,
        channels: u16,
        sample_rate: u32,
        bit_depth: u16,
        chna: Option<ChnaChunk>,
        axml: Option<AxmlChunk>,
    ) -> R<Self> {
        let config = WriterConfig {
            channels,
            sample_rate,
            bit_depth,
            ..WriterConfig::default()
        };
        Self::with_config(stream, config, chna, axml)
    }

    pub fn with_config(
        mut stream: W,
        config: WriterConfig,
        chna: Option<ChnaChunk>,
        axml: Option<AxmlChunk>,
    ) -> R<Self> {
        let format = FormatInfoChunk::new(config.channels, config.sample_rate, config.bit_depth)?;
        let max_header_size = config.max_header_size as u64;

        let mut pre_data_chunks: Vec<Chunk> = Vec::new();
        let chna_written = chna.is_some();
        let axml_written = axml.is_some();
        pre_data_chunks.extend(chna.map(Chunk::from));
        pre_data_chunks.extend(axml.map(Chunk::from));

        let reserved_size = reservation_size(&pre_data_chunks, max_header_size)?;
        let start = stream.stream_position()?;

        // RIFF header, size patched on close
        stream.write_u32::<LittleEndian>(RIFF_ID.as_u32())?;
        stream.write_u32::<LittleEndian>(0)?;
        stream.write_u32::<LittleEndian>(WAVE_ID.as_u32())?;

        let junk_position = stream.stream_position()?;
        write_chunk_placeholder(&mut stream, JUNK_ID, safe_cast(reserved_size)?)?;
        debug!("reserved {} bytes for ds64 at offset {}", reserved_size, junk_position);

        let mut writer = Self {
            stream,
            format,
            max_header_size,
            start,
            junk_position,
            reserved_size,
            data_position: None,
            chna_written,
            axml_written,
            large_chunks: Vec::new(),
            post_data_chunks: Vec::new(),
            frames_written: 0,
            state: WriterState::Open,
            buffer: Vec::new(),
        };

        let fmt = Chunk::from(writer.format.clone());
        writer.write_sized_chunk(&fmt)?;
        for chunk in &pre_data_chunks {
            writer.write_sized_chunk(chunk)?;
        }
        Ok(writer)
    }

    pub fn format(&self) -> &FormatInfoChunk {
        &self.format
    }

    pub fn channels(&self) -> u16 {
        self.format.channel_count()
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate()
    }

    pub fn bit_depth(&self) -> u16 {
        self.format.bits_per_sample()
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn ensure_open(&self) -> R<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Finalized => Err(Bw64Error::InvalidState("writer is already closed")),
            WriterState::Failed => Err(Bw64Error::InvalidState(
                "writer failed and can no longer be used",
            )),
        }
    }

    /// Write a chunk, using the sentinel header size when it is too large.
    fn write_sized_chunk(&mut self, chunk: &Chunk) -> R<()> {
        let size = chunk.size()?;
        let header_size = if size > self.max_header_size {
            self.large_chunks.push((chunk.id(), size));
            SIZE_SENTINEL
        } else {
            safe_cast(size)?
        };
        trace!("writing chunk '{}' ({} bytes)", chunk.id(), size);
        write_chunk(&mut self.stream, chunk, header_size)
    }

    fn begin_data(&mut self) -> R<()> {
        if self.data_position.is_none() {
            let position = self.stream.stream_position()?;
            self.stream.write_u32::<LittleEndian>(DATA_ID.as_u32())?;
            self.stream.write_u32::<LittleEndian>(0)?;
            self.data_position = Some(position);
        }
        Ok(())
    }

    /// Write a `chna` chunk. Only possible before the first sample and if
    /// none was given on creation.
    pub fn set_chna_chunk(&mut self, chna: ChnaChunk) -> R<()> {
        self.ensure_open()?;
        if self.data_position.is_some() {
            return Err(Bw64Error::InvalidState(
                "chna chunk must be set before the first sample is written",
            ));
        }
        if self.chna_written {
            return Err(Bw64Error::InvalidState("chna chunk was already written"));
        }
        self.write_sized_chunk(&Chunk::from(chna))?;
        self.chna_written = true;
        Ok(())
    }

    /// Queue an `axml` chunk to be written after the audio data on close.
    pub fn set_axml_chunk(&mut self, axml: AxmlChunk) -> R<()> {
        self.ensure_open()?;
        if self.axml_written {
            return Err(Bw64Error::InvalidState("axml chunk was already written"));
        }
        self.post_data_chunks.retain(|c| c.id() != AXML_ID);
        self.post_data_chunks.push(axml.into());
        Ok(())
    }

    /// Queue any other chunk to be written after the audio data on close.
    pub fn add_post_data_chunk(&mut self, chunk: impl Into<Chunk>) -> R<()> {
        self.ensure_open()?;
        let chunk = chunk.into();
        if matches!(chunk.id(), FMT_ID | DS64_ID | DATA_ID | JUNK_ID) {
            return Err(Bw64Error::InvalidState(
                "fmt, ds64, data and JUNK chunks are managed by the writer",
            ));
        }
        self.post_data_chunks.push(chunk);
        Ok(())
    }

    /// Encode and append `frames` interleaved frames. Samples outside
    /// [-1, +1] are clipped.
    pub fn write<T: FloatSample>(&mut self, input: &[T], frames: usize) -> R<usize> {
        self.ensure_open()?;
        let samples = safe_mul(frames, self.channels() as usize)?;
        if input.len() < samples {
            return Err(Bw64Error::BufferTooSmall {
                needed: samples,
                got: input.len(),
            });
        }

        let result = self.write_samples(input, frames, samples);
        if result.is_err() {
            self.state = WriterState::Failed;
        }
        result
    }

    fn write_samples<T: FloatSample>(&mut self, input: &[T], frames: usize, samples: usize) -> R<usize> {
        self.begin_data()?;
        let depth = PcmDepth::from_bits(self.bit_depth())?;
        let bytes = safe_mul(samples, depth.bytes_per_sample())?;
        self.buffer.resize(bytes, 0);
        encode_pcm_samples(input, &mut self.buffer, samples, depth.bits_per_sample())?;
        self.stream.write_all(&self.buffer)?;
        self.frames_written = safe_add(self.frames_written, safe_cast(frames)?)?;
        Ok(frames)
    }

    /// Write the queued chunks and patch all header sizes. Fails with
    /// [`Bw64Error::Capacity`] if the ds64 chunk does not fit in the space
    /// reserved on creation. Can be called once.
    pub fn close(&mut self) -> R<()> {
        self.ensure_open()?;
        let result = self.finalize();
        self.state = match result {
            Ok(()) => WriterState::Finalized,
            Err(_) => WriterState::Failed,
        };
        result
    }

    fn finalize(&mut self) -> R<()> {
        self.begin_data()?;
        let data_header_position = self
            .data_position
            .ok_or(Bw64Error::InvalidState("data chunk was not started"))?;
        let data_size = safe_mul(self.frames_written, self.format.block_alignment() as u64)?;
        if data_size % 2 == 1 {
            self.stream.write_u8(0)?; // padding
        }

        for chunk in std::mem::take(&mut self.post_data_chunks) {
            self.write_sized_chunk(&chunk)?;
        }

        let end = self.stream.stream_position()?;
        let riff_size = safe_sub(end, safe_add(self.start, CHUNK_HEADER_SIZE)?)?;

        let needs_ds64 = riff_size > self.max_header_size
            || data_size > self.max_header_size
            || !self.large_chunks.is_empty();

        if needs_ds64 {
            let mut ds64 = DataSize64Chunk::new(riff_size, data_size);
            for (id, size) in &self.large_chunks {
                ds64.set_chunk_size(*id, *size);
            }
            let required = ds64.size()?;
            if required > self.reserved_size {
                return Err(Bw64Error::Capacity {
                    required,
                    reserved: self.reserved_size,
                });
            }
            debug!(
                "writing RF64: riff size {}, data size {}, {} ds64 table entries",
                riff_size,
                data_size,
                ds64.table_length()?
            );

            self.stream.seek(SeekFrom::Start(self.start))?;
            self.stream.write_u32::<LittleEndian>(RF64_ID.as_u32())?;
            self.stream.write_u32::<LittleEndian>(SIZE_SENTINEL)?;

            // ds64 takes over the whole reserved area, trailing bytes stay zero
            self.stream.seek(SeekFrom::Start(self.junk_position))?;
            self.stream.write_u32::<LittleEndian>(DS64_ID.as_u32())?;
            self.stream.write_u32::<LittleEndian>(safe_cast(self.reserved_size)?)?;
            ds64.write(&mut self.stream)?;

            self.stream
                .seek(SeekFrom::Start(safe_add(data_header_position, SIZE_FIELD_OFFSET)?))?;
            self.stream.write_u32::<LittleEndian>(SIZE_SENTINEL)?;
        } else {
            debug!("writing RIFF: riff size {}, data size {}", riff_size, data_size);
            self.stream
                .seek(SeekFrom::Start(safe_add(self.start, SIZE_FIELD_OFFSET)?))?;
            self.stream.write_u32::<LittleEndian>(safe_cast(riff_size)?)?;
            self.stream
                .seek(SeekFrom::Start(safe_add(data_header_position, SIZE_FIELD_OFFSET)?))?;
            self.stream.write_u32::<LittleEndian>(safe_cast(data_size)?)?;
        }

        self.stream.seek(SeekFrom::Start(end))?;
        self.stream.flush()?;
        Ok(())
    }
}

impl<W: Write + Seek> Drop for Bw64Writer<W> {
    fn drop(&mut self) {
        if self.state == WriterState::Open {
            warn!(
                "writer dropped without close() after {} frames; header sizes were not written",
                self.frames_written
            );
        }
    }
}

// ================================== TESTS ==================================
