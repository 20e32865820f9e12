use std::{fs, path::Path};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{ConvertError, Result};

/// Interleaved samples in the storage format they were read with.
#[derive(Clone, Debug, PartialEq)]
pub enum Samples {
    Int16(Vec<i16>),
    /// 8, 24 or 32-bit integer samples, widened to `i32`.
    Int { bits: u16, data: Vec<i32> },
    Float(Vec<f32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Int16(d) => d.len(),
            Samples::Int { data, .. } => data.len(),
            Samples::Float(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full-scale float view: integers are divided by 2^(bits-1).
    pub fn to_float(&self) -> Vec<f32> {
        match self {
            Samples::Int16(d) => d.iter().map(|&s| s as f32 / 32768.0).collect(),
            Samples::Int { bits, data } => {
                let scale = (1i64 << (bits - 1)) as f32;
                data.iter().map(|&s| s as f32 / scale).collect()
            }
            Samples::Float(d) => d.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Samples,
}

impl Waveform {
    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    fn spec(&self) -> WavSpec {
        let (bits_per_sample, sample_format) = match &self.samples {
            Samples::Int16(_) => (16, SampleFormat::Int),
            Samples::Int { bits, .. } => (*bits, SampleFormat::Int),
            Samples::Float(_) => (32, SampleFormat::Float),
        };
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Waveform> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => {
            Samples::Int16(reader.into_samples::<i16>().collect::<std::result::Result<_, _>>()?)
        }
        (SampleFormat::Int, bits @ (8 | 24 | 32)) => Samples::Int {
            bits,
            data: reader.into_samples::<i32>().collect::<std::result::Result<_, _>>()?,
        },
        (SampleFormat::Float, 32) => {
            Samples::Float(reader.into_samples::<f32>().collect::<std::result::Result<_, _>>()?)
        }
        (format, bits) => {
            return Err(ConvertError::UnsupportedFormat {
                path: path.to_path_buf(),
                detail: format!("{bits}-bit {format:?}"),
            })
        }
    };

    Ok(Waveform {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}

/// Writes through a sibling `.part` file and renames it over `path`, so
/// `path` may be one of the files the waveform was read from.
pub fn write_wav<P: AsRef<Path>>(path: P, wave: &Waveform) -> Result<()> {
    let path = path.as_ref();
    let tmp = path.with_extension("part");

    let mut writer = WavWriter::create(&tmp, wave.spec())?;
    match &wave.samples {
        Samples::Int16(d) => {
            for &s in d {
                writer.write_sample(s)?;
            }
        }
        Samples::Int { data, .. } => {
            for &s in data {
                writer.write_sample(s)?;
            }
        }
        Samples::Float(d) => {
            for &s in d {
                writer.write_sample(s)?;
            }
        }
    }
    writer.finalize()?;

    fs::rename(&tmp, path)?;
    Ok(())
}
