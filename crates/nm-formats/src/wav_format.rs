//! WAV encoding and decoding for PCM audio.

use std::fs;
use std::io::Write;
use std::path::Path;

use binrw::io::Cursor;
use binrw::BinRead;
use nm_core::SampleStore;

use crate::DecodeError;

const FORMAT_PCM: u16 = 1;

// --- Reading ---

#[derive(BinRead, Debug)]
#[br(little, magic = b"RIFF")]
struct RiffHeader {
    _size: u32,
    form: [u8; 4],
}

#[derive(BinRead, Debug)]
#[br(little)]
struct ChunkHeader {
    id: [u8; 4],
    size: u32,
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
struct FmtChunk {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    _byte_rate: u32,
    _block_align: u16,
    bits_per_sample: u16,
}

fn header_error(err: binrw::Error) -> DecodeError {
    if err.is_eof() {
        DecodeError::Truncated
    } else {
        DecodeError::InvalidHeader(err.to_string())
    }
}

/// Decode the WAV file at `path`. The store is named after the file stem.
pub fn decode(path: impl AsRef<Path>) -> Result<SampleStore, DecodeError> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    load_wav(&data, &name)
}

/// Decode a WAV file from raw bytes.
///
/// Integer PCM only. Samples are normalized by `2^(bits - 1)`; 8-bit data is
/// unsigned with its center at 128, wider depths are signed little-endian.
pub fn load_wav(data: &[u8], name: &str) -> Result<SampleStore, DecodeError> {
    let mut cursor = Cursor::new(data);
    let riff = RiffHeader::read(&mut cursor).map_err(header_error)?;
    if &riff.form != b"WAVE" {
        return Err(DecodeError::InvalidHeader("missing WAVE form type".into()));
    }

    let mut pos = cursor.position() as usize;
    let mut fmt: Option<FmtChunk> = None;
    let mut pcm: Option<&[u8]> = None;

    while pos + 8 <= data.len() {
        cursor.set_position(pos as u64);
        let chunk = ChunkHeader::read(&mut cursor).map_err(header_error)?;
        let body = pos + 8;
        let end = body + chunk.size as usize;

        match &chunk.id {
            b"fmt " => {
                if chunk.size < 16 {
                    return Err(DecodeError::InvalidHeader(format!("fmt chunk of {} bytes", chunk.size)));
                }
                fmt = Some(FmtChunk::read(&mut cursor).map_err(header_error)?);
            }
            b"data" => {
                if end > data.len() {
                    return Err(DecodeError::Truncated);
                }
                pcm = Some(&data[body..end]);
            }
            other => {
                log::trace!("Skipping chunk {:?} ({} bytes)", String::from_utf8_lossy(other), chunk.size);
            }
        }

        // Chunks are word aligned.
        pos = end + (end & 1);
    }

    let fmt = fmt.ok_or(DecodeError::MissingChunk("fmt "))?;
    let pcm = pcm.ok_or(DecodeError::MissingChunk("data"))?;

    if fmt.format_tag != FORMAT_PCM {
        return Err(DecodeError::UnsupportedFormat(fmt.format_tag));
    }
    if fmt.channels == 0 {
        return Err(DecodeError::InvalidHeader("zero channels".into()));
    }

    let samples = read_pcm(pcm, fmt.bits_per_sample)?;
    log::debug!(
        "Decoded '{}': {} samples, {} Hz, {} bit, {} ch",
        name, samples.len(), fmt.sample_rate, fmt.bits_per_sample, fmt.channels
    );

    Ok(SampleStore::new(name, samples, fmt.sample_rate, fmt.bits_per_sample, fmt.channels))
}

/// `sample_count = raw.len() / bytes_per_sample`; a trailing partial sample is ignored.
fn read_pcm(raw: &[u8], bits: u16) -> Result<Vec<f64>, DecodeError> {
    let scale = match bits {
        8 | 16 | 24 | 32 => (1u64 << (bits - 1)) as f64,
        other => return Err(DecodeError::UnsupportedBitDepth(other)),
    };
    let width = bits as usize / 8;

    let samples = raw
        .chunks_exact(width)
        .map(|c| {
            let value = match width {
                // WAV stores 8-bit samples unsigned, with silence at 128.
                1 => c[0] as i32 - 128,
                2 => i16::from_le_bytes([c[0], c[1]]) as i32,
                3 => i32::from_le_bytes([0, c[0], c[1], c[2]]) >> 8,
                _ => i32::from_le_bytes([c[0], c[1], c[2], c[3]]),
            };
            value as f64 / scale
        })
        .collect();
    Ok(samples)
}

// --- Writing ---

const WRITE_BITS: u16 = 32;
const WRITE_BYTES: u16 = WRITE_BITS / 8;

fn too_large(what: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("{} does not fit a WAV header", what))
}

/// Write interleaved 32-bit integer PCM.
///
/// Fails with `InvalidInput` when the channel count, byte rate or data size
/// overflows its header field.
pub fn write_wav(
    w: &mut impl Write,
    samples: &[i32],
    channels: u16,
    sample_rate: u32,
) -> std::io::Result<()> {
    let block_align = channels
        .checked_mul(WRITE_BYTES)
        .ok_or_else(|| too_large("block alignment"))?;
    let byte_rate = sample_rate
        .checked_mul(block_align as u32)
        .ok_or_else(|| too_large("byte rate"))?;
    let data_size = u32::try_from(samples.len())
        .ok()
        .and_then(|n| n.checked_mul(WRITE_BYTES as u32))
        .filter(|size| size.checked_add(36).is_some())
        .ok_or_else(|| too_large("sample data"))?;

    write_riff_header(w, data_size)?;
    write_fmt_chunk(w, channels, sample_rate, byte_rate, block_align)?;
    write_data_chunk(w, samples, data_size)
}

/// `write_wav` into a fresh buffer.
pub fn samples_to_wav(samples: &[i32], channels: u16, sample_rate: u32) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(44 + samples.len() * WRITE_BYTES as usize);
    write_wav(&mut buf, samples, channels, sample_rate)?;
    Ok(buf)
}

fn write_riff_header(w: &mut impl Write, data_size: u32) -> std::io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")
}

fn write_fmt_chunk(
    w: &mut impl Write,
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
) -> std::io::Result<()> {
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&FORMAT_PCM.to_le_bytes())?;
    w.write_all(&channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&WRITE_BITS.to_le_bytes())
}

fn write_data_chunk(w: &mut impl Write, samples: &[i32], data_size: u32) -> std::io::Result<()> {
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for sample in samples {
        w.write_all(&sample.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal valid WAV file from raw parameters.
    fn make_wav(channels: u16, sample_rate: u32, bits: u16, pcm_data: &[u8]) -> Vec<u8> {
        make_wav_with_extra(channels, sample_rate, bits, pcm_data, &[])
    }

    fn make_wav_with_extra(channels: u16, sample_rate: u32, bits: u16, pcm_data: &[u8], extra: &[u8]) -> Vec<u8> {
        let block_align = channels * (bits / 8);
        let byte_rate = sample_rate * block_align as u32;
        let data_size = pcm_data.len() as u32;

        let mut buf = Vec::new();
        buf.extend(b"RIFF");
        buf.extend(&0u32.to_le_bytes());
        buf.extend(b"WAVE");
        buf.extend(b"fmt ");
        buf.extend(&16u32.to_le_bytes());
        buf.extend(&FORMAT_PCM.to_le_bytes());
        buf.extend(&channels.to_le_bytes());
        buf.extend(&sample_rate.to_le_bytes());
        buf.extend(&byte_rate.to_le_bytes());
        buf.extend(&block_align.to_le_bytes());
        buf.extend(&bits.to_le_bytes());
        buf.extend(extra);
        buf.extend(b"data");
        buf.extend(&data_size.to_le_bytes());
        buf.extend(pcm_data);
        let riff_size = buf.len() as u32 - 8;
        buf[4..8].copy_from_slice(&riff_size.to_le_bytes());
        buf
    }

    #[test]
    fn load_8bit_unsigned() {
        let wav = make_wav(1, 22050, 8, &[128, 255, 0, 192]);
        let store = load_wav(&wav, "eight").unwrap();
        assert_eq!(store.sample_rate(), 22050);
        assert_eq!(store.bits_per_sample(), 8);
        assert_eq!(store.samples(), &[0.0, 127.0 / 128.0, -1.0, 0.5]);
    }

    #[test]
    fn load_16bit_mono() {
        let pcm: Vec<u8> = [0i16, 16384, -32768, 32767]
            .iter()
            .flat_map(|&v| v.to_le_bytes())
            .collect();
        let store = load_wav(&make_wav(1, 44100, 16, &pcm), "sixteen").unwrap();
        assert_eq!(store.sample_count(), 4);
        assert_eq!(store.samples()[..3], [0.0, 0.5, -1.0]);
        assert_eq!(store.samples()[3], 32767.0 / 32768.0);
    }

    #[test]
    fn load_24bit_sign_extends() {
        let pcm = [0x00, 0x00, 0x40, 0x00, 0x00, 0xC0];
        let store = load_wav(&make_wav(1, 48000, 24, &pcm), "deep").unwrap();
        assert_eq!(store.samples(), &[0.5, -0.5]);
    }

    #[test]
    fn load_32bit_stereo_stays_interleaved() {
        let pcm: Vec<u8> = [i32::MIN, 1 << 30, 0, -(1 << 30)]
            .iter()
            .flat_map(|&v| v.to_le_bytes())
            .collect();
        let store = load_wav(&make_wav(2, 48000, 32, &pcm), "wide").unwrap();
        assert_eq!(store.channels(), 2);
        assert_eq!(store.samples(), &[-1.0, 0.5, 0.0, -0.5]);
    }

    #[test]
    fn unknown_chunks_are_skipped() {
        // Odd-sized LIST chunk followed by its pad byte.
        let mut extra = Vec::new();
        extra.extend(b"LIST");
        extra.extend(&3u32.to_le_bytes());
        extra.extend(&[1, 2, 3, 0]);
        let pcm = 16384i16.to_le_bytes();
        let store = load_wav(&make_wav_with_extra(1, 8000, 16, &pcm, &extra), "list").unwrap();
        assert_eq!(store.samples(), &[0.5]);
    }

    #[test]
    fn invalid_header_rejected() {
        assert!(matches!(load_wav(b"not a wav file at all", "bad"), Err(DecodeError::InvalidHeader(_))));
    }

    #[test]
    fn too_short_rejected() {
        assert!(matches!(load_wav(b"RIFF", "short"), Err(DecodeError::Truncated)));
    }

    #[test]
    fn truncated_data_rejected() {
        let mut wav = make_wav(1, 8000, 16, &[0, 0, 0, 0]);
        wav.truncate(wav.len() - 2);
        assert!(matches!(load_wav(&wav, "cut"), Err(DecodeError::Truncated)));
    }

    #[test]
    fn float_format_rejected() {
        let mut wav = make_wav(1, 8000, 32, &[0; 8]);
        wav[20..22].copy_from_slice(&3u16.to_le_bytes());
        assert!(matches!(load_wav(&wav, "float"), Err(DecodeError::UnsupportedFormat(3))));
    }

    #[test]
    fn odd_bit_depth_rejected() {
        let wav = make_wav(1, 8000, 12, &[0; 4]);
        assert!(matches!(load_wav(&wav, "twelve"), Err(DecodeError::UnsupportedBitDepth(12))));
    }

    #[test]
    fn missing_data_chunk_rejected() {
        let wav = make_wav(1, 8000, 16, &[]);
        let without_data = &wav[..wav.len() - 8];
        assert!(matches!(load_wav(without_data, "nodata"), Err(DecodeError::MissingChunk("data"))));
    }

    #[test]
    fn written_wav_decodes_back() {
        let samples = [0, i32::MAX, -(1 << 30), 1 << 29];
        let wav = samples_to_wav(&samples, 2, 48000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        let store = load_wav(&wav, "render").unwrap();
        assert_eq!(store.channels(), 2);
        assert_eq!(store.sample_rate(), 48000);
        assert_eq!(store.bits_per_sample(), 32);
        assert_eq!(store.samples()[2], -0.5);
        assert_eq!(store.samples()[3], 0.25);
    }

    #[test]
    fn oversized_header_fields_rejected() {
        let mut sink = Vec::new();
        let err = write_wav(&mut sink, &[0; 4], u16::MAX, 48000).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        assert!(sink.is_empty());

        let err = samples_to_wav(&[0; 4], 8, u32::MAX / 4).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        assert!(samples_to_wav(&[0; 4], 2, 192_000).is_ok());
    }

    #[test]
    fn decode_reports_missing_file() {
        let err = decode("/definitely/not/here.wav").unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
