use std::path::Path;

use crate::{
    core::audio::{read_wav, write_wav, Samples, Waveform},
    error::{ConvertError, Result},
};

/// Result of [`normalize_to_pcm16`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Normalization {
    Converted,
    /// Already integer PCM at the given bit depth; the file was not touched.
    Unchanged { bits: u16 },
}

/// Adds `a` and `b` sample by sample and writes the sum to `out`.
///
/// Both inputs are truncated to the shorter frame count. Two 16-bit inputs
/// produce a 16-bit output clamped to the `i16` range; any other combination
/// is summed as full-scale `f32` and written as float without clamping.
/// `out` may be the same path as `a` or `b`.
pub fn mix<A, B, O>(a: A, b: B, out: O) -> Result<()>
where
    A: AsRef<Path>,
    B: AsRef<Path>,
    O: AsRef<Path>,
{
    let a = read_wav(a)?;
    let b = read_wav(b)?;

    if a.sample_rate != b.sample_rate {
        return Err(ConvertError::SampleRateMismatch {
            left: a.sample_rate,
            right: b.sample_rate,
        });
    }
    if a.channels != b.channels {
        return Err(ConvertError::ChannelMismatch {
            left: a.channels,
            right: b.channels,
        });
    }

    let len = a.frames().min(b.frames()) * a.channels as usize;

    let samples = match (&a.samples, &b.samples) {
        (Samples::Int16(x), Samples::Int16(y)) => Samples::Int16(
            x[..len]
                .iter()
                .zip(&y[..len])
                .map(|(&l, &r)| (l as i32 + r as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16)
                .collect(),
        ),
        _ => {
            let x = a.samples.to_float();
            let y = b.samples.to_float();
            Samples::Float(x[..len].iter().zip(&y[..len]).map(|(l, r)| l + r).collect())
        }
    };

    write_wav(
        out,
        &Waveform {
            sample_rate: a.sample_rate,
            channels: a.channels,
            samples,
        },
    )
}

/// Rewrites a float WAV in place as 16-bit PCM (`sample * 32767`,
/// truncated toward zero). Integer files are left as they are.
pub fn normalize_to_pcm16<P: AsRef<Path>>(path: P) -> Result<Normalization> {
    let path = path.as_ref();
    let wave = read_wav(path)?;

    match wave.samples {
        Samples::Float(data) => {
            // `as` saturates at the i16 limits for out-of-range floats.
            let pcm = data.iter().map(|&s| (s * 32767.0) as i16).collect();
            write_wav(
                path,
                &Waveform {
                    sample_rate: wave.sample_rate,
                    channels: wave.channels,
                    samples: Samples::Int16(pcm),
                },
            )?;
            Ok(Normalization::Converted)
        }
        Samples::Int16(_) => Ok(Normalization::Unchanged { bits: 16 }),
        Samples::Int { bits, .. } => Ok(Normalization::Unchanged { bits }),
    }
}
