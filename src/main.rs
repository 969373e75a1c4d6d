//! bw64 command-line tool

use anyhow::{Context, Result as R, anyhow};
use bw64_lib::*;
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SINE_BLOCK_SIZE: usize = 512;

// ADM elements reported by `info`
const ADM_ELEMENTS: [&str; 8] = [
    "audioProgramme",
    "audioContent",
    "audioObject",
    "audioPackFormat",
    "audioChannelFormat",
    "audioStreamFormat",
    "audioTrackFormat",
    "audioTrackUID",
];

#[derive(Parser)]
#[command(name = "bw64")]
#[command(about = "Inspect and write BW64, RF64 and RIFF/WAVE files", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show format, chunks and channel allocation of a file
    Info {
        /// Input file path
        input: PathBuf,
    },

    /// Write the ADM XML (axml chunk) of a file to stdout or a file
    ExtractAdm {
        /// Input file path
        input: PathBuf,

        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a sine tone
    CreateSine {
        /// Output file path
        output: PathBuf,

        /// Duration in seconds
        #[arg(long, default_value_t = 10.0)]
        duration: f64,

        /// Frequency in Hz
        #[arg(long, default_value_t = 440.0)]
        frequency: f64,

        /// Linear gain
        #[arg(long, default_value_t = 0.5)]
        gain: f64,

        #[command(flatten)]
        format: FormatArgs,
    },

    /// Copy audio, chna and axml into a new file
    Copy {
        /// Input file path
        input: PathBuf,

        /// Output file path
        output: PathBuf,

        /// Frames per read/write block
        #[arg(long, default_value_t = 4096)]
        block_size: usize,

        /// Output bit depth (input bit depth if omitted)
        #[arg(long)]
        bit_depth: Option<u16>,

        /// Largest size stored directly in a 32-bit header field
        #[arg(long)]
        max_header_size: Option<u32>,
    },
}

#[derive(Args)]
struct FormatArgs {
    /// Number of channels
    #[arg(long)]
    channels: Option<u16>,

    /// Sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Bits per sample (16, 24 or 32)
    #[arg(long)]
    bit_depth: Option<u16>,

    /// Largest size stored directly in a 32-bit header field
    #[arg(long)]
    max_header_size: Option<u32>,
}

impl From<&FormatArgs> for WriterConfig {
    fn from(args: &FormatArgs) -> Self {
        let default = WriterConfig::default();
        WriterConfig {
            channels: args.channels.unwrap_or(default.channels),
            sample_rate: args.sample_rate.unwrap_or(default.sample_rate),
            bit_depth: args.bit_depth.unwrap_or(default.bit_depth),
            max_header_size: args.max_header_size.unwrap_or(default.max_header_size),
        }
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> R<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.debug);

    match cli.command {
        Commands::Info { input } => info_command(&input),
        Commands::ExtractAdm { input, output } => extract_adm_command(&input, output.as_deref()),
        Commands::CreateSine {
            output,
            duration,
            frequency,
            gain,
            format,
        } => create_sine_command(&output, duration, frequency, gain, (&format).into()),
        Commands::Copy {
            input,
            output,
            block_size,
            bit_depth,
            max_header_size,
        } => copy_command(&input, &output, block_size, bit_depth, max_header_size),
    }
}

fn open(input: &Path) -> R<Bw64Reader<std::io::BufReader<std::fs::File>>> {
    read_file(input).with_context(|| format!("failed to open {}", input.display()))
}

fn info_command(input: &Path) -> R<()> {
    let mut reader = open(input)?;

    println!("File: {} ('{}')", input.display(), reader.file_id());
    println!("Format:");
    println!(" - formatTag: {}", reader.format_tag());
    println!(" - channels: {}", reader.channels());
    println!(" - sampleRate: {}", reader.sample_rate());
    println!(" - bitDepth: {}", reader.bit_depth());
    println!(" - numberOfFrames: {}", reader.number_of_frames());

    println!("Chunks:");
    for chunk in reader.chunks() {
        println!(
            " - '{}' at {}: {} bytes{}",
            chunk.id,
            chunk.position,
            chunk.size,
            if chunk.header_size == u32::MAX { " (ds64)" } else { "" }
        );
    }

    if let Some(ds64) = reader.ds64_chunk() {
        println!("Ds64Chunk:");
        println!(" - bw64Size: {}", ds64.bw64_size());
        println!(" - dataSize: {}", ds64.data_size());
        for (id, size) in ds64.table() {
            println!(" - '{id}': {size}");
        }
    }

    if let Some(chna) = reader.chna_chunk() {
        println!("ChnaChunk:");
        println!(" - numTracks: {}", chna.num_tracks()?);
        println!(" - numUids: {}", chna.num_uids()?);
        println!(" - audioIds:");
        for id in chna.audio_ids() {
            println!(
                "   - {}, {}, {}, {}",
                id.track_index(),
                id.uid(),
                id.track_ref(),
                id.pack_ref()
            );
        }
    }

    if let Some(axml) = reader.axml_chunk()? {
        println!("AxmlChunk: {} bytes", axml.size());
        match axml.as_str() {
            Some(xml) => {
                let (root, counts) = summarize_axml(xml)?;
                println!(" - root: {root}");
                for name in ADM_ELEMENTS {
                    if let Some(count) = counts.get(name) {
                        println!(" - {name}: {count}");
                    }
                }
            }
            None => println!(" - not valid UTF-8"),
        }
    }
    Ok(())
}

/// Root element name and the number of elements of each name.
fn summarize_axml(xml: &str) -> R<(String, BTreeMap<String, usize>)> {
    use quick_xml::{Reader, events::Event};

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root = None;
    let mut counts = BTreeMap::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                root.get_or_insert_with(|| name.clone());
                *counts.entry(name).or_insert(0) += 1;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(anyhow!(
                    "axml is not well-formed at byte {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
        }
        buf.clear();
    }

    let root = root.ok_or_else(|| anyhow!("axml contains no elements"))?;
    Ok((root, counts))
}

fn extract_adm_command(input: &Path, output: Option<&Path>) -> R<()> {
    let mut reader = open(input)?;
    let axml = reader
        .axml_chunk()?
        .ok_or_else(|| anyhow!("could not find an axml chunk in {}", input.display()))?;

    match output {
        Some(path) => {
            std::fs::write(path, axml.data())
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote {} bytes of ADM to {}", axml.size(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(axml.data())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn create_sine_command(
    output: &Path,
    duration: f64,
    frequency: f64,
    gain: f64,
    config: WriterConfig,
) -> R<()> {
    if duration < 0.0 {
        return Err(anyhow!("duration must not be negative"));
    }
    let mut writer = write_file(output, config, None, None)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let channels = config.channels as usize;
    let total_frames = (duration * config.sample_rate as f64) as u64;
    let step = 2.0 * std::f64::consts::PI * frequency / config.sample_rate as f64;
    let mut phase = 0.0f64;
    let mut buffer = vec![0f32; SINE_BLOCK_SIZE * channels];

    while writer.frames_written() < total_frames {
        let frames = (total_frames - writer.frames_written()).min(SINE_BLOCK_SIZE as u64) as usize;
        for frame in buffer[..frames * channels].chunks_exact_mut(channels) {
            phase = (phase + step) % (2.0 * std::f64::consts::PI);
            frame.fill((phase.sin() * gain) as f32);
        }
        writer.write(&buffer, frames)?;
    }
    writer.close()?;

    info!(
        "wrote {} frames of {} Hz to {}",
        total_frames,
        frequency,
        output.display()
    );
    Ok(())
}

fn copy_command(
    input: &Path,
    output: &Path,
    block_size: usize,
    bit_depth: Option<u16>,
    max_header_size: Option<u32>,
) -> R<()> {
    if block_size == 0 {
        return Err(anyhow!("block size must be greater than 0"));
    }
    let mut reader = open(input)?;
    let chna = reader.chna_chunk().cloned();
    let axml = reader.axml_chunk()?.cloned();

    let config = WriterConfig {
        channels: reader.channels(),
        sample_rate: reader.sample_rate(),
        bit_depth: bit_depth.unwrap_or(reader.bit_depth()),
        max_header_size: max_header_size.unwrap_or(WriterConfig::default().max_header_size),
    };
    let mut writer = write_file(output, config, chna, axml)
        .with_context(|| format!("failed to create {}", output.display()))?;

    // f64 keeps 32 bit samples exact
    let mut buffer = vec![0f64; block_size * reader.channels() as usize];
    while !reader.eof() {
        let frames = reader.read(&mut buffer, block_size)?;
        writer.write(&buffer, frames)?;
    }
    writer.close()?;

    info!(
        "copied {} frames from {} to {}",
        writer.frames_written(),
        input.display(),
        output.display()
    );
    Ok(())
}
