//! WAV files through the file driver and the whole-file helpers.

mod common;

use std::path::Path;

use common::gen_sine;
use phasestretch::io::wav::WavFileManager;
use phasestretch::io::{CancelFlag, LogProgress};
use phasestretch::{stretch_wav_file, FileTimeStretcher, StretchError, StretchParams};

fn write_pcm16(path: &Path, channels: &[Vec<f32>], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..channels[0].len() {
        for ch in channels {
            writer.write_sample((ch[i] * 32767.0) as i16).unwrap();
        }
    }
    writer.finalize().unwrap();
}

#[test]
fn test_stretch_pcm16_stereo_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("groove.wav");
    let left = gen_sine(440.0, 44100, 22050, |_| 0.5);
    let right = gen_sine(880.0, 44100, 22050, |_| 0.5);
    write_pcm16(&input, &[left, right], 44100);

    let mut files = WavFileManager::new(dir.path());
    let source = files.register(&input);
    let dest = FileTimeStretcher::new(&mut files)
        .stretch_file(source, 1.5)
        .unwrap();

    let path = files.path(dest).unwrap();
    assert_eq!(path, dir.path().join("stretch-groove.wav"));

    let reader = hound::WavReader::open(path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.sample_format, hound::SampleFormat::Float);
    assert_eq!(spec.bits_per_sample, 32);
    assert_eq!(reader.duration(), 33075);

    let peak = reader
        .into_samples::<f32>()
        .map(|s| s.unwrap().abs())
        .fold(0.0f32, f32::max);
    assert!(peak > 0.3 && peak < 1.0, "unexpected peak {}", peak);
}

#[test]
fn test_cancelled_wav_stretch_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("pad.wav");
    write_pcm16(&input, &[gen_sine(330.0, 22050, 22050, |_| 0.5)], 22050);

    let cancel = CancelFlag::new();
    cancel.cancel();
    let mut progress = LogProgress::new().with_cancel_flag(cancel);

    let mut files = WavFileManager::new(dir.path());
    let source = files.register(&input);
    let result = FileTimeStretcher::new(&mut files)
        .with_progress(&mut progress)
        .stretch_file(source, 2.0);

    assert_eq!(result, Err(StretchError::Cancelled));
    assert!(!dir.path().join("stretch-pad.wav").exists());
    assert!(input.exists());
}

#[test]
fn test_missing_wav_is_source_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut files = WavFileManager::new(dir.path());
    let source = files.register(dir.path().join("nope.wav"));
    let result = FileTimeStretcher::new(&mut files).stretch_file(source, 1.5);
    assert_eq!(result, Err(StretchError::SourceNotFound(source)));
}

#[test]
fn test_stretch_wav_file_helper() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");
    write_pcm16(&input, &[gen_sine(440.0, 48000, 48000, |_| 0.5)], 48000);

    let result = stretch_wav_file(&input, &output, &StretchParams::new(0.75)).unwrap();
    assert_eq!(result.sample_rate, 48000);
    assert_eq!(result.num_frames(), 36000);

    let reader = hound::WavReader::open(&output).unwrap();
    assert_eq!(reader.duration(), 36000);
}
