use super::expect_id;
use crate::prelude::*;
use std::collections::BTreeSet;

// Fixed field widths of one audio id entry
const UID_SIZE: usize = 12;
const TRACK_REF_SIZE: usize = 14;
const PACK_REF_SIZE: usize = 11;
/// trackIndex + uid + trackRef + packRef + 1 reserved byte
const AUDIO_ID_SIZE: u64 = 40;
/// numTracks + numUids
const CHNA_HEADER_SIZE: u64 = 4;

/// One row of the channel allocation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioId {
    track_index: u16,
    uid: String,
    track_ref: String,
    pack_ref: String,
}

fn check_field(name: &str, value: &str, width: usize) -> R<()> {
    if !value.is_ascii() {
        return Err(Bw64Error::format(format!("{name} '{value}' is not ASCII")));
    }
    if value.len() > width {
        return Err(Bw64Error::format(format!(
            "{name} '{value}' is longer than {width} characters"
        )));
    }
    Ok(())
}

fn write_fixed<W: Write>(writer: &mut W, value: &str, width: usize) -> R<()> {
    let bytes = value.as_bytes();
    if bytes.len() > width {
        return Err(Bw64Error::format(format!(
            "'{value}' does not fit in a {width} byte field"
        )));
    }
    let mut field = [0u8; TRACK_REF_SIZE];
    field[..bytes.len()].copy_from_slice(bytes);
    writer.write_all(&field[..width])?;
    Ok(())
}

fn read_fixed<S: Read>(stream: &mut S, width: usize) -> R<String> {
    let mut field = [0u8; TRACK_REF_SIZE];
    stream.read_exact(&mut field[..width])?;
    let text = String::from_utf8_lossy(&field[..width]);
    Ok(text.trim_end_matches('\0').to_string())
}

impl AudioId {
    pub fn new(track_index: u16, uid: &str, track_ref: &str, pack_ref: &str) -> R<Self> {
        check_field("uid", uid, UID_SIZE)?;
        check_field("trackRef", track_ref, TRACK_REF_SIZE)?;
        check_field("packRef", pack_ref, PACK_REF_SIZE)?;
        Ok(Self {
            track_index,
            uid: uid.to_string(),
            track_ref: track_ref.to_string(),
            pack_ref: pack_ref.to_string(),
        })
    }

    pub fn track_index(&self) -> u16 {
        self.track_index
    }
    pub fn uid(&self) -> &str {
        &self.uid
    }
    pub fn track_ref(&self) -> &str {
        &self.track_ref
    }
    pub fn pack_ref(&self) -> &str {
        &self.pack_ref
    }

    fn write<W: Write>(&self, writer: &mut W) -> R<()> {
        writer.write_u16::<LittleEndian>(self.track_index)?;
        write_fixed(writer, &self.uid, UID_SIZE)?;
        write_fixed(writer, &self.track_ref, TRACK_REF_SIZE)?;
        write_fixed(writer, &self.pack_ref, PACK_REF_SIZE)?;
        writer.write_u8(0)?; // reserved
        Ok(())
    }

    fn read<S: Read>(stream: &mut S) -> R<Self> {
        let track_index = stream.read_u16::<LittleEndian>()?;
        let uid = read_fixed(stream, UID_SIZE)?;
        let track_ref = read_fixed(stream, TRACK_REF_SIZE)?;
        let pack_ref = read_fixed(stream, PACK_REF_SIZE)?;
        stream.read_u8()?; // reserved
        Ok(Self {
            track_index,
            uid,
            track_ref,
            pack_ref,
        })
    }
}

/// `chna` chunk. Track and uid counts are always derived from the entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChnaChunk {
    audio_ids: Vec<AudioId>,
}

impl ChnaChunk {
    pub fn new(audio_ids: Vec<AudioId>) -> Self {
        Self { audio_ids }
    }

    pub fn add_audio_id(&mut self, audio_id: AudioId) {
        self.audio_ids.push(audio_id);
    }

    pub fn audio_ids(&self) -> &[AudioId] {
        &self.audio_ids
    }

    /// Number of distinct track indices.
    pub fn num_tracks(&self) -> R<u16> {
        let tracks: BTreeSet<u16> = self.audio_ids.iter().map(|a| a.track_index).collect();
        safe_cast(tracks.len())
    }

    /// Number of entries. More than 65535 entries cannot be stored.
    pub fn num_uids(&self) -> R<u16> {
        safe_cast(self.audio_ids.len())
    }

    pub fn size(&self) -> R<u64> {
        let entries: u64 = safe_cast(self.audio_ids.len())?;
        safe_add(CHNA_HEADER_SIZE, safe_mul(AUDIO_ID_SIZE, entries)?)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> R<()> {
        writer.write_u16::<LittleEndian>(self.num_tracks()?)?;
        writer.write_u16::<LittleEndian>(self.num_uids()?)?;
        for audio_id in &self.audio_ids {
            audio_id.write(writer)?;
        }
        Ok(())
    }
}

pub fn parse_chna_chunk<S: Read>(stream: &mut S, id: ChunkId, size: u64) -> R<ChnaChunk> {
    expect_id(id, CHNA_ID)?;
    if size < CHNA_HEADER_SIZE {
        return Err(Bw64Error::format(format!(
            "chna chunk too small: {size} bytes"
        )));
    }
    let num_tracks = stream.read_u16::<LittleEndian>()?;
    let num_uids = stream.read_u16::<LittleEndian>()?;

    let needed = safe_add(CHNA_HEADER_SIZE, safe_mul(AUDIO_ID_SIZE, num_uids as u64)?)?;
    if size < needed {
        return Err(Bw64Error::format(format!(
            "chna chunk size {size} too small for {num_uids} audio ids ({needed} bytes)"
        )));
    }

    let mut chna = ChnaChunk::default();
    for _ in 0..num_uids {
        chna.add_audio_id(AudioId::read(stream)?);
    }

    // unused pre-allocated entries
    if size > needed {
        std::io::copy(&mut stream.by_ref().take(size - needed), &mut std::io::sink())?;
    }

    let referenced = chna.num_tracks()?;
    if referenced != num_tracks {
        warn!(
            "chna declares {} tracks but its entries reference {}",
            num_tracks, referenced
        );
    }
    Ok(chna)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_id(track: u16, n: u32) -> AudioId {
        AudioId::new(
            track,
            &format!("ATU_{n:08}"),
            &format!("AT_0003100{n}_01"),
            &format!("AP_0003100{n}"),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_basic() {
        let mut bytes = vec![0x01, 0x00, 0x01, 0x00, 0x01, 0x00];
        bytes.extend_from_slice(b"ATU_00000001");
        bytes.extend_from_slice(b"AT_00031001_01");
        bytes.extend_from_slice(b"AP_00031001");
        bytes.push(0);
        assert_eq!(bytes.len(), 44);

        let chna = parse_chna_chunk(&mut Cursor::new(&bytes), CHNA_ID, 44).unwrap();
        assert_eq!(chna.num_tracks().unwrap(), 1);
        assert_eq!(chna.num_uids().unwrap(), 1);
        let id = &chna.audio_ids()[0];
        assert_eq!(id.track_index(), 1);
        assert_eq!(id.uid(), "ATU_00000001");
        assert_eq!(id.track_ref(), "AT_00031001_01");
        assert_eq!(id.pack_ref(), "AP_00031001");
    }

    #[test]
    fn test_read_write() {
        let mut chna = ChnaChunk::default();
        chna.add_audio_id(audio_id(1, 1));
        chna.add_audio_id(audio_id(1, 2));
        chna.add_audio_id(audio_id(2, 3));

        let mut out = Vec::new();
        chna.write(&mut out).unwrap();
        assert_eq!(out.len(), 124);

        let reread = parse_chna_chunk(&mut Cursor::new(&out), CHNA_ID, 124).unwrap();
        assert_eq!(reread.num_tracks().unwrap(), 2);
        assert_eq!(reread.num_uids().unwrap(), 3);
        assert_eq!(reread.audio_ids()[1].uid(), "ATU_00000002");
        assert_eq!(reread.audio_ids()[1].track_ref(), "AT_00031002_01");
        assert_eq!(reread.audio_ids()[2].track_index(), 2);
        assert_eq!(reread.audio_ids()[2].pack_ref(), "AP_00031003");
        assert_eq!(reread, chna);
    }

    #[test]
    fn test_short_fields_are_nul_padded() {
        let chna = ChnaChunk::new(vec![AudioId::new(3, "ATU_1", "", "AP").unwrap()]);
        let mut out = Vec::new();
        chna.write(&mut out).unwrap();
        assert_eq!(&out[6..18], b"ATU_1\0\0\0\0\0\0\0");
        let reread = parse_chna_chunk(&mut Cursor::new(&out), CHNA_ID, 44).unwrap();
        assert_eq!(reread.audio_ids()[0].uid(), "ATU_1");
        assert_eq!(reread.audio_ids()[0].track_ref(), "");
    }

    #[test]
    fn test_preallocated_slots_are_skipped() {
        let chna = ChnaChunk::new(vec![audio_id(1, 1)]);
        let mut out = Vec::new();
        chna.write(&mut out).unwrap();
        out.extend_from_slice(&[0u8; 80]);
        out.extend_from_slice(b"next");
        let mut cursor = Cursor::new(&out);
        let reread = parse_chna_chunk(&mut cursor, CHNA_ID, 124).unwrap();
        assert_eq!(reread.num_uids().unwrap(), 1);
        assert_eq!(cursor.position(), 124);
    }

    #[test]
    fn test_declared_size_too_small() {
        let chna = ChnaChunk::new(vec![audio_id(1, 1), audio_id(2, 2)]);
        let mut out = Vec::new();
        chna.write(&mut out).unwrap();
        assert!(matches!(
            parse_chna_chunk(&mut Cursor::new(&out), CHNA_ID, 44),
            Err(Bw64Error::Format(_))
        ));
    }

    #[test]
    fn test_field_validation() {
        assert!(AudioId::new(1, "ATU_000000001", "", "").is_err());
        assert!(AudioId::new(1, "", "AT_00031001_012", "").is_err());
        assert!(AudioId::new(1, "", "", "AP_000310012").is_err());
        assert!(AudioId::new(1, "ATU_ü", "", "").is_err());
    }

    #[test]
    fn test_too_many_entries_is_overflow() {
        let id = AudioId::new(1, "ATU_00000001", "", "").unwrap();
        let chna = ChnaChunk::new(vec![id; u16::MAX as usize + 1]);
        assert!(matches!(chna.num_uids(), Err(Bw64Error::Overflow { .. })));
        assert_eq!(chna.num_tracks().unwrap(), 1);
        assert_eq!(chna.size().unwrap(), 4 + 40 * 65536);
        assert!(matches!(
            chna.write(&mut std::io::sink()),
            Err(Bw64Error::Overflow { .. })
        ));
    }
}
