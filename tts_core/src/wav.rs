use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::Result;

fn spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

// f32 [-1.0, 1.0] -> i16, truncating toward zero
fn to_pcm16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    (s * i16::MAX as f32) as i16
}

/// Sample count as stored in the header. The RIFF size field counts the data chunk
/// plus 36 header bytes and must fit in 32 bits.
fn riff_sample_count(len: usize) -> Result<u32> {
    const MAX_SAMPLES: usize = (u32::MAX as usize - 36) / 2;
    if len > MAX_SAMPLES {
        return Err(hound::Error::FormatError("data chunk exceeds the RIFF size limit").into());
    }
    Ok(len as u32)
}

fn write_samples<W>(writer: &mut WavWriter<W>, samples: &[f32]) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    let mut pcm = writer.get_i16_writer(riff_sample_count(samples.len())?);
    for &s in samples {
        pcm.write_sample(to_pcm16(s));
    }
    pcm.flush()?;
    Ok(())
}

/// Encode mono f32 samples as a 16-bit PCM WAV container.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    riff_sample_count(samples.len())?;
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec(sample_rate))?;
        write_samples(&mut writer, samples)?;
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Encode PCM f32 samples as 16-bit PCM WAV (RIFF) and return Base64.
pub fn encode_wav_base64(samples: &[f32], sample_rate: u32) -> Result<String> {
    let bytes = encode_wav(samples, sample_rate)?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

pub fn write_wav_file<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    riff_sample_count(samples.len())?;
    let mut writer = WavWriter::create(path.as_ref(), spec(sample_rate))?;
    write_samples(&mut writer, samples)?;
    writer.finalize()?;
    tracing::debug!(path = %path.as_ref().display(), samples = samples.len(), "wrote wav file");
    Ok(())
}
