//! Recorded segments and the final artifact

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::media::AudioFormat;

/// One immutable chunk of encoded output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySegment {
    data: Vec<u8>,
}

impl BinarySegment {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for BinarySegment {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

/// Concatenated recording plus its media type
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    data: Vec<u8>,
    mime_type: String,
    segment_count: usize,
    created_at: DateTime<Utc>,
}

impl Artifact {
    /// Concatenate `segments` in order
    pub fn from_segments(segments: &[BinarySegment], mime_type: impl Into<String>) -> Self {
        let total = segments.iter().map(|s| s.len()).sum();
        let mut data = Vec::with_capacity(total);
        for segment in segments {
            data.extend_from_slice(segment.as_bytes());
        }

        Self {
            data,
            mime_type: mime_type.into(),
            segment_count: segments.len(),
            created_at: Utc::now(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Number of segments that made up the artifact
    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// File extension of the container this artifact is saved as
    pub fn extension(&self) -> &'static str {
        container_extension(&self.mime_type)
    }

    /// Download name: `capture-<epoch-ms>.<ext>`
    pub fn file_name(&self) -> String {
        format!(
            "capture-{}.{}",
            self.created_at.timestamp_millis(),
            self.extension()
        )
    }

    /// Write the artifact into `dir` under [`Artifact::file_name`]
    ///
    /// Raw `audio/L16` data is wrapped in a WAV container; every other type is
    /// written as-is.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

        let path = dir.join(self.file_name());

        if is_l16(&self.mime_type) {
            let format = l16_format(&self.mime_type).with_context(|| {
                format!("audio/L16 artifact is missing a rate parameter: {}", self.mime_type)
            })?;
            write_wav(&path, format, &self.data)?;
        } else {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create artifact file: {:?}", path))?;
            let mut writer = BufWriter::new(file);
            writer.write_all(&self.data)?;
            writer.flush()?;
        }

        info!("Saved {} byte artifact to {}", self.len(), path.display());
        Ok(path)
    }
}

fn base_type(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_l16(mime_type: &str) -> bool {
    base_type(mime_type) == "audio/l16"
}

/// Map a media type to a container file extension
pub fn container_extension(mime_type: &str) -> &'static str {
    match base_type(mime_type).as_str() {
        "video/webm" | "audio/webm" => "webm",
        "video/x-matroska" | "audio/x-matroska" => "mkv",
        "video/mp4" | "audio/mp4" => "mp4",
        "audio/ogg" | "video/ogg" => "ogg",
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/l16" => "wav",
        _ => "bin",
    }
}

/// Sample layout from `audio/L16;rate=..;channels=..` (channels default to 1)
pub fn l16_format(mime_type: &str) -> Option<AudioFormat> {
    if !is_l16(mime_type) {
        return None;
    }

    let mut rate = None;
    let mut channels = 1u16;
    for param in mime_type.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "rate" => rate = value.trim().parse().ok(),
            "channels" => channels = value.trim().parse().ok()?,
            _ => {}
        }
    }

    Some(AudioFormat::new(rate?, channels))
}

/// Write big-endian 16-bit PCM as a WAV file
fn write_wav(path: &Path, format: AudioFormat, data: &[u8]) -> Result<()> {
    if data.len() % 2 != 0 {
        bail!("L16 data has an odd number of bytes ({})", data.len());
    }

    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

    for pair in data.chunks_exact(2) {
        writer
            .write_sample(i16::from_be_bytes([pair[0], pair[1]]))
            .context("Failed to write sample to WAV")?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}
