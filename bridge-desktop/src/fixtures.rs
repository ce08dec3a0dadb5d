//! Audio files for tests.

use std::path::{Path, PathBuf};

/// Writes a silent 16-bit mono PCM WAV of `duration_ms` at 8 kHz.
pub fn write_wav(dir: &Path, name: &str, duration_ms: u32) -> PathBuf {
    const SAMPLE_RATE: u32 = 8_000;
    const BYTES_PER_SAMPLE: u32 = 2;

    let frames = SAMPLE_RATE * duration_ms / 1_000;
    let data_len = frames * BYTES_PER_SAMPLE;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    bytes.extend_from_slice(&(SAMPLE_RATE * BYTES_PER_SAMPLE).to_le_bytes());
    bytes.extend_from_slice(&(BYTES_PER_SAMPLE as u16).to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(44 + data_len as usize, 0);

    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Writes bytes no decoder recognizes.
pub fn write_garbage(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"this is not an audio file at all".repeat(8)).unwrap();
    path
}
