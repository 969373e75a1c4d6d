use crate::prelude::*;

// Standard bit depths
const BIT_DEPTH_16: u16 = 16;
const BIT_DEPTH_24: u16 = 24;
const BIT_DEPTH_32: u16 = 32;

// Sample normalization constants (2^(bits-1))
const I16_DIVISOR: f64 = 32768.0;
const I24_DIVISOR: f64 = 8388608.0;
const I32_DIVISOR: f64 = 2147483648.0;

// Representable integer range per width
const I16_MAX: i32 = i16::MAX as i32;
const I16_MIN: i32 = i16::MIN as i32;
const I24_MAX: i32 = 0x7F_FFFF;
const I24_MIN: i32 = -0x80_0000;
const I32_MAX: i32 = i32::MAX;
const I32_MIN: i32 = i32::MIN;

/// Integer PCM widths the container engine can encode and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmDepth {
    I16,
    I24,
    I32,
}

impl PcmDepth {
    pub fn from_bits(bits_per_sample: u16) -> R<Self> {
        match bits_per_sample {
            BIT_DEPTH_16 => Ok(PcmDepth::I16),
            BIT_DEPTH_24 => Ok(PcmDepth::I24),
            BIT_DEPTH_32 => Ok(PcmDepth::I32),
            other => Err(Bw64Error::UnsupportedBitDepth(other)),
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        match self {
            PcmDepth::I16 => BIT_DEPTH_16,
            PcmDepth::I24 => BIT_DEPTH_24,
            PcmDepth::I32 => BIT_DEPTH_32,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            PcmDepth::I16 => 2,
            PcmDepth::I24 => 3,
            PcmDepth::I32 => 4,
        }
    }
}

/// Floating point sample types accepted by the sample I/O calls.
pub trait FloatSample: Copy + Default {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl FloatSample for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl FloatSample for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

/// Limit a sample to [-1, +1].
#[inline]
pub fn clip_sample(value: f64) -> f64 {
    value.clamp(-1.0, 1.0)
}

#[inline]
fn encode_one<const BYTES: usize>(value: f64, divisor: f64, min: i32, max: i32, out: &mut [u8]) {
    let scaled = value * divisor;
    let value_int = if scaled >= max as f64 {
        max
    } else if scaled <= min as f64 {
        min
    } else {
        // NaN falls through to here and saturates to 0
        scaled.round() as i32
    };
    out.copy_from_slice(&value_int.to_le_bytes()[..BYTES]);
}

#[inline]
fn decode_one<const BYTES: usize>(bytes: &[u8], divisor: f64) -> f64 {
    // Place the sample in the high bytes of an i32 so its top bit lands on
    // the sign bit, then shift back down: the arithmetic shift replicates
    // the sign into the high bytes without touching the low ones.
    let mut wide = [0u8; 4];
    wide[4 - BYTES..].copy_from_slice(bytes);
    let value = i32::from_le_bytes(wide) >> (8 * (4 - BYTES));
    clip_sample(value as f64 / divisor)
}

/// Encode one normalized sample into `out`, which must hold exactly
/// `bits_per_sample / 8` bytes.
pub fn encode_sample(value: f64, bits_per_sample: u16, out: &mut [u8]) -> R<()> {
    let depth = PcmDepth::from_bits(bits_per_sample)?;
    if out.len() != depth.bytes_per_sample() {
        return Err(Bw64Error::BufferTooSmall {
            needed: depth.bytes_per_sample(),
            got: out.len(),
        });
    }
    encode_pcm_samples(&[value], out, 1, bits_per_sample)
}

/// Decode one sample from `bytes` (exactly `bits_per_sample / 8` long).
pub fn decode_sample(bytes: &[u8], bits_per_sample: u16) -> R<f64> {
    let mut out = [0f64; 1];
    decode_pcm_samples(bytes, &mut out, 1, bits_per_sample)?;
    Ok(out[0])
}

/// Encode `number_of_samples` interleaved float samples to little-endian
/// integer PCM. Samples outside [-1, +1] are clipped.
pub fn encode_pcm_samples<T: FloatSample>(
    input: &[T],
    output: &mut [u8],
    number_of_samples: usize,
    bits_per_sample: u16,
) -> R<()> {
    let depth = PcmDepth::from_bits(bits_per_sample)?;
    let bytes = depth.bytes_per_sample();
    let needed = safe_mul(number_of_samples, bytes)?;
    if input.len() < number_of_samples {
        return Err(Bw64Error::BufferTooSmall {
            needed: number_of_samples,
            got: input.len(),
        });
    }
    if output.len() < needed {
        return Err(Bw64Error::BufferTooSmall {
            needed,
            got: output.len(),
        });
    }

    let samples = input[..number_of_samples].iter();
    let slots = output[..needed].chunks_exact_mut(bytes);
    match depth {
        PcmDepth::I16 => {
            for (s, out) in samples.zip(slots) {
                encode_one::<2>(s.to_f64(), I16_DIVISOR, I16_MIN, I16_MAX, out);
            }
        }
        PcmDepth::I24 => {
            for (s, out) in samples.zip(slots) {
                encode_one::<3>(s.to_f64(), I24_DIVISOR, I24_MIN, I24_MAX, out);
            }
        }
        PcmDepth::I32 => {
            // work in doubles for 32 bit: 2^31 - 1 is not representable in f32
            for (s, out) in samples.zip(slots) {
                encode_one::<4>(s.to_f64(), I32_DIVISOR, I32_MIN, I32_MAX, out);
            }
        }
    }
    Ok(())
}

/// Decode `number_of_samples` little-endian integer PCM samples into
/// normalized floats.
pub fn decode_pcm_samples<T: FloatSample>(
    input: &[u8],
    output: &mut [T],
    number_of_samples: usize,
    bits_per_sample: u16,
) -> R<()> {
    let depth = PcmDepth::from_bits(bits_per_sample)?;
    let bytes = depth.bytes_per_sample();
    let needed = safe_mul(number_of_samples, bytes)?;
    if input.len() < needed {
        return Err(Bw64Error::BufferTooSmall {
            needed,
            got: input.len(),
        });
    }
    if output.len() < number_of_samples {
        return Err(Bw64Error::BufferTooSmall {
            needed: number_of_samples,
            got: output.len(),
        });
    }

    let slots = input[..needed].chunks_exact(bytes);
    let samples = output[..number_of_samples].iter_mut();
    match depth {
        PcmDepth::I16 => {
            for (b, s) in slots.zip(samples) {
                *s = T::from_f64(decode_one::<2>(b, I16_DIVISOR));
            }
        }
        PcmDepth::I24 => {
            for (b, s) in slots.zip(samples) {
                *s = T::from_f64(decode_one::<3>(b, I24_DIVISOR));
            }
        }
        PcmDepth::I32 => {
            for (b, s) in slots.zip(samples) {
                *s = T::from_f64(decode_one::<4>(b, I32_DIVISOR));
            }
        }
    }
    Ok(())
}

// ================================== TESTS ==================================
