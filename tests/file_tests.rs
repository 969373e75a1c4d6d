use bw64_lib::*;
use rand::Rng;
use std::io::{Cursor, SeekFrom};

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn test_chna() -> ChnaChunk {
    let mut chna = ChnaChunk::default();
    chna.add_audio_id(AudioId::new(1, "ATU_00000001", "AT_00031001_01", "AP_00031001").unwrap());
    chna.add_audio_id(AudioId::new(1, "ATU_00000002", "AT_00031002_01", "AP_00031002").unwrap());
    chna.add_audio_id(AudioId::new(2, "ATU_00000003", "AT_00031003_01", "AP_00031003").unwrap());
    chna
}

fn write_frames(config: WriterConfig, samples: &[f32]) -> Vec<u8> {
    let mut file = Cursor::new(Vec::new());
    let mut writer = Bw64Writer::with_config(&mut file, config, None, None).unwrap();
    let frames = samples.len() / config.channels as usize;
    writer.write(samples, frames).unwrap();
    writer.close().unwrap();
    drop(writer);
    file.into_inner()
}

#[test]
fn test_write_then_read_frame_count() {
    for bit_depth in [16, 24, 32] {
        let config = WriterConfig {
            channels: 2,
            sample_rate: 44100,
            bit_depth,
            ..WriterConfig::default()
        };
        let samples = vec![0.125f32; 2 * 22050];
        let bytes = write_frames(config, &samples);

        let reader = open_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.file_id(), RIFF_ID);
        assert_eq!(reader.bit_depth(), bit_depth);
        assert_eq!(reader.sample_rate(), 44100);
        assert_eq!(reader.channels(), 2);
        assert_eq!(reader.number_of_frames(), 22050);
        assert!(reader.ds64_chunk().is_none());
    }
}

#[test]
fn test_sample_round_trip() {
    let mut rng = rand::rng();
    let samples: Vec<f32> = (0..3 * 1000).map(|_| rng.random_range(-1.0..1.0)).collect();
    let config = WriterConfig {
        channels: 3,
        bit_depth: 24,
        ..WriterConfig::default()
    };
    let bytes = write_frames(config, &samples);

    let mut reader = open_reader(Cursor::new(bytes)).unwrap();
    let mut buffer = vec![0f32; samples.len()];
    let mut read = 0;
    while !reader.eof() {
        let frames = reader.read(&mut buffer[read * 3..], 256).unwrap();
        read += frames;
    }
    assert_eq!(read, 1000);
    for (expected, actual) in samples.iter().zip(&buffer) {
        assert!((expected - actual).abs() < 1e-3, "{expected} != {actual}");
    }
}

#[test]
fn test_clipping_is_silent() {
    let config = WriterConfig {
        bit_depth: 16,
        ..WriterConfig::default()
    };
    let bytes = write_frames(config, &[2.0, -3.0, 1.0]);
    let mut reader = open_reader(Cursor::new(bytes)).unwrap();
    let mut buffer = [0f64; 3];
    assert_eq!(reader.read(&mut buffer, 3).unwrap(), 3);
    assert!((buffer[0] - 1.0).abs() < 1e-4);
    assert_eq!(buffer[1], -1.0);
    assert!((buffer[2] - 1.0).abs() < 1e-4);
}

#[test]
fn test_chna_and_axml_round_trip() {
    let xml = "<ebuCoreMain><coreMetadata><format><audioFormatExtended/></format></coreMetadata></ebuCoreMain>";
    let mut file = Cursor::new(Vec::new());
    let mut writer = open_writer(
        &mut file,
        1,
        48000,
        24,
        Some(test_chna()),
        Some(AxmlChunk::new(xml)),
    )
    .unwrap();
    writer.write(&[0.0f32; 10], 10).unwrap();
    writer.close().unwrap();
    drop(writer);

    file.set_position(0);
    let mut reader = open_reader(file).unwrap();
    assert!(reader.has_chunk(CHNA_ID));
    let chna = reader.chna_chunk().unwrap();
    assert_eq!(chna.num_tracks().unwrap(), 2);
    assert_eq!(chna.num_uids().unwrap(), 3);
    assert_eq!(chna, &test_chna());
    assert_eq!(chna.audio_ids()[2].uid(), "ATU_00000003");
    assert_eq!(chna.audio_ids()[2].track_ref(), "AT_00031003_01");
    assert_eq!(chna.audio_ids()[2].pack_ref(), "AP_00031003");

    assert_eq!(reader.axml_chunk().unwrap().unwrap().as_str(), Some(xml));
    assert_eq!(reader.number_of_frames(), 10);
}

#[test]
fn test_late_axml_is_written_after_data() {
    let mut file = Cursor::new(Vec::new());
    let mut writer = open_writer(&mut file, 1, 48000, 16, None, None).unwrap();
    writer.set_chna_chunk(test_chna()).unwrap();
    writer.write(&[0.5f32; 4], 4).unwrap();
    writer.set_axml_chunk(AxmlChunk::new("<late/>")).unwrap();
    writer.close().unwrap();
    drop(writer);

    file.set_position(0);
    let mut reader = open_reader(file).unwrap();
    let ids: Vec<ChunkId> = reader.chunks().iter().map(|c| c.id).collect();
    assert_eq!(ids, [JUNK_ID, FMT_ID, CHNA_ID, DATA_ID, AXML_ID]);
    assert_eq!(reader.axml_chunk().unwrap().unwrap().data(), b"<late/>");
    assert_eq!(reader.chna_chunk().unwrap().num_uids().unwrap(), 3);
}

#[test]
fn test_rf64_path() {
    let config = WriterConfig {
        channels: 2,
        bit_depth: 16,
        max_header_size: 1000,
        ..WriterConfig::default()
    };
    let samples = vec![-0.25f32; 2 * 600];
    let bytes = write_frames(config, &samples);

    assert_eq!(&bytes[0..4], b"RF64");
    assert_eq!(u32_at(&bytes, 4), 0xFFFF_FFFF);
    assert_eq!(&bytes[12..16], b"ds64");
    let data = bytes.windows(4).position(|w| w == b"data").unwrap();
    assert_eq!(u32_at(&bytes, data + 4), 0xFFFF_FFFF);

    let len = bytes.len() as u64;
    let mut reader = open_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.file_id(), RF64_ID);
    assert_eq!(reader.number_of_frames(), 600);
    assert_eq!(reader.riff_size(), len - 8);
    let ds64 = reader.ds64_chunk().unwrap();
    assert_eq!(ds64.data_size(), 2400);
    assert_eq!(ds64.bw64_size(), len - 8);

    let mut buffer = vec![0f32; 2 * 600];
    assert_eq!(reader.read(&mut buffer, 600).unwrap(), 600);
    assert!(buffer.iter().all(|&s| s == -0.25));
}

#[test]
fn test_rf64_large_axml() {
    let config = WriterConfig {
        max_header_size: 256,
        ..WriterConfig::default()
    };
    let xml = format!("<adm>{}</adm>", "x".repeat(400));
    let mut file = Cursor::new(Vec::new());
    let mut writer =
        Bw64Writer::with_config(&mut file, config, None, Some(AxmlChunk::new(xml.clone()))).unwrap();
    writer.write(&[0.0f32; 8], 8).unwrap();
    writer.close().unwrap();
    drop(writer);

    file.set_position(0);
    let mut reader = open_reader(file).unwrap();
    assert_eq!(reader.file_id(), RF64_ID);
    assert_eq!(reader.number_of_frames(), 8);
    let entry = *reader.chunks().iter().find(|c| c.id == AXML_ID).unwrap();
    assert_eq!(entry.header_size, 0xFFFF_FFFF);
    assert_eq!(entry.size, xml.len() as u64);
    assert_eq!(
        reader.ds64_chunk().unwrap().chunk_size(AXML_ID).unwrap(),
        xml.len() as u64
    );
    assert_eq!(reader.axml_chunk().unwrap().unwrap().as_str(), Some(xml.as_str()));
}

#[test]
fn test_capacity_error_names_both_sizes() {
    let config = WriterConfig {
        max_header_size: 64,
        ..WriterConfig::default()
    };
    let mut file = Cursor::new(Vec::new());
    let mut writer = Bw64Writer::with_config(&mut file, config, None, None).unwrap();
    writer.set_axml_chunk(AxmlChunk::new(vec![b' '; 100])).unwrap();
    writer
        .add_post_data_chunk(UnknownChunk::new(ChunkId::new(b"bxml"), vec![0u8; 100]))
        .unwrap();

    let err = writer.close().unwrap_err();
    assert!(matches!(err, Bw64Error::Capacity { .. }));
    let message = err.to_string();
    assert!(message.contains("52"), "{message}");
    assert!(message.contains("40"), "{message}");
}

#[test]
fn test_seek_clamps_and_reads_from_position() {
    let samples: Vec<f32> = (0..100).map(|i| i as f32 / 128.0).collect();
    let config = WriterConfig {
        bit_depth: 16,
        ..WriterConfig::default()
    };
    let bytes = write_frames(config, &samples);
    let mut reader = open_reader(Cursor::new(bytes)).unwrap();

    assert_eq!(reader.seek(SeekFrom::Start(50)).unwrap(), 50);
    let mut buffer = [0f32; 1];
    reader.read(&mut buffer, 1).unwrap();
    assert_eq!(buffer[0], 50.0 / 128.0);
    assert_eq!(reader.tell(), 51);

    assert_eq!(reader.seek(SeekFrom::Current(-1000)).unwrap(), 0);
    assert_eq!(reader.seek(SeekFrom::End(-1000)).unwrap(), 0);
    assert_eq!(reader.seek(SeekFrom::Start(1000)).unwrap(), 100);
    assert_eq!(reader.seek(SeekFrom::Current(5)).unwrap(), 100);
    assert_eq!(reader.read(&mut buffer, 1).unwrap(), 0);

    assert_eq!(reader.seek(SeekFrom::End(-1)).unwrap(), 99);
    reader.read(&mut buffer, 1).unwrap();
    assert_eq!(buffer[0], 99.0 / 128.0);
}

#[test]
fn test_partial_read_at_end() {
    let bytes = write_frames(WriterConfig::default(), &[0.0; 10]);
    let mut reader = open_reader(Cursor::new(bytes)).unwrap();
    let mut buffer = [0f32; 8];
    assert_eq!(reader.read(&mut buffer, 8).unwrap(), 8);
    assert_eq!(reader.read(&mut buffer, 8).unwrap(), 2);
    assert!(reader.eof());
}

#[test]
fn test_malformed_files_rejected() {
    let good = write_frames(WriterConfig::default(), &[0.0; 4]);

    let mut no_riff = good.clone();
    no_riff[0..4].copy_from_slice(b"RIFX");
    assert!(matches!(
        open_reader(Cursor::new(no_riff)),
        Err(Bw64Error::Format(_))
    ));

    let mut no_wave = good.clone();
    no_wave[8..12].copy_from_slice(b"AVI ");
    assert!(matches!(
        open_reader(Cursor::new(no_wave)),
        Err(Bw64Error::Format(_))
    ));

    // fmt header sits after the 48 byte JUNK chunk
    let mut wrong_fmt_size = good.clone();
    assert_eq!(&wrong_fmt_size[60..64], b"fmt ");
    wrong_fmt_size[64] = 18;
    assert!(matches!(
        open_reader(Cursor::new(wrong_fmt_size)),
        Err(Bw64Error::Format(_))
    ));
}

#[test]
fn test_uneven_data_chunk_size() {
    let config = WriterConfig {
        channels: 1,
        sample_rate: 44100,
        bit_depth: 24,
        ..WriterConfig::default()
    };
    let mut bytes = write_frames(config, &[0.1; 14]);
    // declare 40 bytes of 24 bit mono: 13 whole frames and one partial
    let data = bytes.windows(4).position(|w| w == b"data").unwrap();
    bytes[data + 4..data + 8].copy_from_slice(&40u32.to_le_bytes());
    bytes.truncate(data + 8 + 40);

    let reader = open_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.sample_rate(), 44100);
    assert_eq!(reader.number_of_frames(), 13);
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");

    let config = WriterConfig {
        channels: 2,
        sample_rate: 96000,
        bit_depth: 32,
        ..WriterConfig::default()
    };
    let samples: Vec<f32> = (0..2 * 4800).map(|i| ((i as f32) * 0.01).sin() * 0.9).collect();
    let mut writer = write_file(&path, config, Some(test_chna()), None).unwrap();
    for block in samples.chunks(2 * 1024) {
        writer.write(block, block.len() / 2).unwrap();
    }
    assert_eq!(writer.frames_written(), 4800);
    writer.close().unwrap();
    drop(writer);

    let mut reader = read_file(&path).unwrap();
    assert_eq!(reader.number_of_frames(), 4800);
    assert_eq!(reader.sample_rate(), 96000);
    assert_eq!(reader.chna_chunk().unwrap().num_uids().unwrap(), 3);

    let mut buffer = vec![0f32; samples.len()];
    assert_eq!(reader.read(&mut buffer, 4800).unwrap(), 4800);
    for (expected, actual) in samples.iter().zip(&buffer) {
        assert!((expected - actual).abs() < 1e-6);
    }
    reader.close();
}
