use crate::chunks::*;
use crate::pcm::{FloatSample, PcmDepth, decode_pcm_samples};
use crate::prelude::*;

/// Position and resolved size of one chunk found while opening a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTableEntry {
    pub id: ChunkId,
    /// Byte offset of the chunk header.
    pub position: u64,
    /// Size field as stored on disk.
    pub header_size: u32,
    /// True payload size after ds64 resolution.
    pub size: u64,
}

impl ChunkTableEntry {
    /// Byte offset of the first payload byte.
    pub fn payload_position(&self) -> R<u64> {
        safe_add(self.position, CHUNK_HEADER_SIZE)
    }
}

/// Reader session over a RIFF, RF64 or BW64 stream.
///
/// The chunk table is built once on open; payloads other than `fmt `,
/// `ds64` and `chna` are only read when asked for.
pub struct Bw64Reader<S: Read + Seek> {
    stream: S,
    file_id: ChunkId,
    riff_size: u64,
    format: FormatInfoChunk,
    ds64: Option<DataSize64Chunk>,
    chna: Option<ChnaChunk>,
    axml: Option<AxmlChunk>,
    chunks: Vec<ChunkTableEntry>,
    data_start: u64,
    number_of_frames: u64,
    position: u64,
    buffer: Vec<u8>,
}

fn read_form_type<S: Read>(stream: &mut S) -> R<ChunkId> {
    match stream.read_u32::<LittleEndian>() {
        Ok(value) => Ok(ChunkId::from_u32(value)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(Bw64Error::format("file ends before the form type"))
        }
        Err(e) => Err(e.into()),
    }
}

/// True size of a chunk given its on-disk header and the ds64 seen so far.
fn resolve_chunk_size(header: &ChunkHeader, ds64: Option<&DataSize64Chunk>) -> R<u64> {
    match ds64 {
        Some(ds64) if header.id == DATA_ID => Ok(ds64.data_size()),
        Some(ds64) if header.size == SIZE_SENTINEL || ds64.has_chunk_size(header.id) => {
            ds64.chunk_size(header.id)
        }
        None if header.size == SIZE_SENTINEL => Err(Bw64Error::format(format!(
            "chunk '{}' has a 64-bit size but no ds64 chunk precedes it",
            header.id
        ))),
        _ => Ok(header.size as u64),
    }
}

impl<S: Read + Seek> Bw64Reader<S> {
    /// Parse the container structure of `stream`, starting at its current
    /// position.
    pub fn open(mut stream: S) -> R<Self> {
        let outer = read_chunk_header(&mut stream)?
            .ok_or_else(|| Bw64Error::format("stream is empty"))?;
        if !matches!(outer.id, RIFF_ID | RF64_ID | BW64_ID) {
            return Err(Bw64Error::format(format!(
                "not a RIFF, RF64 or BW64 file (outer id '{}')",
                outer.id
            )));
        }
        let form_type = read_form_type(&mut stream)?;
        if form_type != WAVE_ID {
            return Err(Bw64Error::format(format!(
                "form type is '{form_type}', expected 'WAVE'"
            )));
        }

        let mut chunks = Vec::new();
        let mut format = None;
        let mut ds64: Option<DataSize64Chunk> = None;
        let mut chna = None;

        loop {
            let position = stream.stream_position()?;
            let Some(header) = read_chunk_header(&mut stream)? else {
                break;
            };
            let size = resolve_chunk_size(&header, ds64.as_ref())?;
            trace!("chunk '{}' at {} ({} bytes)", header.id, position, size);

            let id = header.id;
            match id {
                DS64_ID => {
                    let chunk = parse_data_size64_chunk(&mut stream, id, size);
                    ds64 = Some(chunk.map_err(truncated(id, size))?);
                }
                FMT_ID => {
                    let chunk = parse_format_info_chunk(&mut stream, id, size);
                    format = Some(chunk.map_err(truncated(id, size))?);
                }
                CHNA_ID => {
                    let chunk = parse_chna_chunk(&mut stream, id, size);
                    chna = Some(chunk.map_err(truncated(id, size))?);
                }
                _ => {}
            }

            chunks.push(ChunkTableEntry {
                id: header.id,
                position,
                header_size: header.size,
                size,
            });

            let next = safe_add(safe_add(position, CHUNK_HEADER_SIZE)?, padded_size(size)?)?;
            stream.seek(SeekFrom::Start(next))?;
        }

        let format = format.ok_or(Bw64Error::MissingRequiredChunk(FMT_ID))?;
        PcmDepth::from_bits(format.bits_per_sample())?;
        let data = *chunks
            .iter()
            .find(|c| c.id == DATA_ID)
            .ok_or(Bw64Error::MissingRequiredChunk(DATA_ID))?;

        let block_alignment = format.block_alignment() as u64;
        let number_of_frames = data.size / block_alignment;
        if data.size % block_alignment != 0 {
            warn!(
                "data chunk size {} is not a multiple of the frame size {}; ignoring {} trailing bytes",
                data.size,
                block_alignment,
                data.size % block_alignment
            );
        }

        let riff_size = match &ds64 {
            Some(ds64) => ds64.bw64_size(),
            None => outer.size as u64,
        };

        let data_start = data.payload_position()?;
        stream.seek(SeekFrom::Start(data_start))?;

        debug!(
            "opened '{}' file: {} chunks, {} channels, {} Hz, {} bit, {} frames",
            outer.id,
            chunks.len(),
            format.channel_count(),
            format.sample_rate(),
            format.bits_per_sample(),
            number_of_frames
        );

        Ok(Self {
            stream,
            file_id: outer.id,
            riff_size,
            format,
            ds64,
            chna,
            axml: None,
            chunks,
            data_start,
            number_of_frames,
            position: 0,
            buffer: Vec::new(),
        })
    }

    /// Outer container id: RIFF, RF64 or BW64.
    pub fn file_id(&self) -> ChunkId {
        self.file_id
    }

    /// Size of everything after the outer header's size field.
    pub fn riff_size(&self) -> u64 {
        self.riff_size
    }

    pub fn format(&self) -> &FormatInfoChunk {
        &self.format
    }

    pub fn format_tag(&self) -> u16 {
        self.format.format_tag()
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

    pub fn number_of_frames(&self) -> u64 {
        self.number_of_frames
    }

    /// All chunks in file order.
    pub fn chunks(&self) -> &[ChunkTableEntry] {
        &self.chunks
    }

    pub fn has_chunk(&self, id: ChunkId) -> bool {
        self.chunks.iter().any(|c| c.id == id)
    }

    pub fn ds64_chunk(&self) -> Option<&DataSize64Chunk> {
        self.ds64.as_ref()
    }

    pub fn chna_chunk(&self) -> Option<&ChnaChunk> {
        self.chna.as_ref()
    }

    /// The `axml` chunk, loaded on first access.
    pub fn axml_chunk(&mut self) -> R<Option<&AxmlChunk>> {
        if self.axml.is_none() && self.has_chunk(AXML_ID) {
            if let Chunk::Axml(axml) = self.read_chunk(AXML_ID)? {
                self.axml = Some(axml);
            }
        }
        Ok(self.axml.as_ref())
    }

    /// Decode the payload of the first chunk with the given id. The sample
    /// position is left unchanged.
    pub fn read_chunk(&mut self, id: ChunkId) -> R<Chunk> {
        if id == DATA_ID {
            return Err(Bw64Error::InvalidState("the data chunk is read with read()"));
        }
        let entry = *self
            .chunks
            .iter()
            .find(|c| c.id == id)
            .ok_or(Bw64Error::NotFound(id))?;

        let resume = self.stream.stream_position()?;
        self.stream.seek(SeekFrom::Start(entry.payload_position()?))?;
        let chunk = parse_chunk(&mut self.stream, entry.id, entry.size);
        self.stream.seek(SeekFrom::Start(resume))?;
        chunk
    }

    /// Byte offset of the first sample.
    pub fn data_chunk_position(&self) -> u64 {
        self.data_start
    }

    /// Move the frame cursor. Targets outside `0..=number_of_frames` are
    /// clamped. Returns the new frame position.
    pub fn seek(&mut self, pos: SeekFrom) -> R<u64> {
        let target = match pos {
            SeekFrom::Start(frame) => frame as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
            SeekFrom::End(delta) => self.number_of_frames as i128 + delta as i128,
        };
        let frame = target.clamp(0, self.number_of_frames as i128) as u64;

        let offset = safe_add(
            self.data_start,
            safe_mul(frame, self.format.block_alignment() as u64)?,
        )?;
        self.stream.seek(SeekFrom::Start(offset))?;
        self.position = frame;
        Ok(frame)
    }

    /// Current frame position.
    pub fn tell(&self) -> u64 {
        self.position
    }

    pub fn eof(&self) -> bool {
        self.position >= self.number_of_frames
    }

    /// Read up to `frames` interleaved frames into `output`. Returns the
    /// number of frames read, which is short only at the end of the data.
    pub fn read<T: FloatSample>(&mut self, output: &mut [T], frames: usize) -> R<usize> {
        let remaining = safe_sub(self.number_of_frames, self.position)?;
        let frames: usize = safe_cast(safe_cast::<u64, _>(frames)?.min(remaining))?;
        if frames == 0 {
            return Ok(0);
        }

        let channels = self.channels() as usize;
        let samples = safe_mul(frames, channels)?;
        if output.len() < samples {
            return Err(Bw64Error::BufferTooSmall {
                needed: samples,
                got: output.len(),
            });
        }

        let bytes = safe_mul(frames, self.format.block_alignment() as usize)?;
        self.buffer.resize(bytes, 0);
        self.stream.read_exact(&mut self.buffer)?;
        decode_pcm_samples(&self.buffer, output, samples, self.bit_depth())?;

        self.position = safe_add(self.position, safe_cast(frames)?)?;
        Ok(frames)
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// End the session and release the stream.
    pub fn close(self) {
        debug!("closing reader at frame {}", self.position);
    }
}

// ================================== TESTS ==================================
