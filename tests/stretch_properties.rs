//! Behavioural properties of the streaming stretcher: identity, length,
//! channel lockstep, transient handling and long-run ratio accuracy.

mod common;

use approx::assert_abs_diff_eq;
use common::{gen_click_pad, gen_sine, run_stretcher, windowed_rms};
use phasestretch::{stretch, AudioBuffer, AudioTimeStretcher, StretchParams};

fn stereo(left: &[f32], right: &[f32], sample_rate: u32) -> AudioBuffer {
    AudioBuffer::from_channels(&[left.to_vec(), right.to_vec()], sample_rate).unwrap()
}

#[test]
fn test_identity_ratio_reproduces_input() {
    let left = gen_sine(440.0, 44100, 44100, |_| 0.5);
    let right = gen_sine(1234.5, 44100, 44100, |i| 0.3 * (i as f32 / 44100.0));
    let input = stereo(&left, &right, 44100);

    for &sharpen in &[false, true] {
        let params = StretchParams::new(1.0).with_sharpening(sharpen);
        let output = stretch(&input, &params).unwrap();
        assert_eq!(output.num_frames(), input.num_frames());

        for ch in 0..2 {
            let a = input.channel_data(ch);
            let b = output.channel_data(ch);
            for i in 2048..a.len() - 2048 {
                assert_abs_diff_eq!(a[i], b[i], epsilon = 1e-3);
            }
        }
    }
}

#[test]
fn test_output_length_scales_with_ratio() {
    let input = AudioBuffer::from_mono(gen_sine(330.0, 44100, 44100, |_| 0.8), 44100).unwrap();
    for &ratio in &[0.25, 0.5, 0.8, 1.2, 1.6, 2.5, 4.0] {
        let output = stretch(&input, &StretchParams::new(ratio)).unwrap();
        let expected = (44100.0 * ratio).ceil() as usize;
        assert_eq!(output.num_frames(), expected, "ratio {}", ratio);
    }
}

#[test]
fn test_stretched_sine_keeps_its_level() {
    let input = AudioBuffer::from_mono(gen_sine(440.0, 44100, 44100, |_| 1.0), 44100).unwrap();
    // 0.3 and 0.5 analyse at half the window length
    for &sharpen in &[false, true] {
        for &ratio in &[0.3, 0.5, 0.7, 0.9, 1.5, 2.0, 3.0] {
            let params = StretchParams::new(ratio).with_sharpening(sharpen);
            let output = stretch(&input, &params).unwrap();
            let n = output.num_frames();
            let rms = windowed_rms(&output.data, n / 4, n / 2);
            assert!(
                (0.6..0.8).contains(&rms),
                "ratio {} sharpen {}: RMS {} too far from 0.707",
                ratio,
                sharpen,
                rms
            );
        }
    }
}

#[test]
fn test_identical_channels_stay_identical() {
    let signal = gen_click_pad(44100, 30000, &[5000, 17000]);
    let input = stereo(&signal, &signal, 44100);
    let output = stretch(&input, &StretchParams::new(1.37)).unwrap();
    assert_eq!(output.channel_data(0), output.channel_data(1));
}

#[test]
fn test_transients_detected_only_with_sharpening() {
    let clicks: Vec<usize> = (22050..88200).step_by(11025).collect();
    let signal = vec![gen_click_pad(44100, 88200, &clicks)];

    let mut sharp = AudioTimeStretcher::new(&StretchParams::new(1.5)).unwrap();
    run_stretcher(&mut sharp, &signal, 512);
    assert!(sharp.stats().transient_frames > 0);
    assert!(sharp.stats().transient_frames < sharp.stats().frames / 4);

    let params = StretchParams::new(1.5).with_sharpening(false);
    let mut smooth = AudioTimeStretcher::new(&params).unwrap();
    run_stretcher(&mut smooth, &signal, 512);
    assert_eq!(smooth.stats().transient_frames, 0);
}

#[test]
fn test_sharpening_ignored_for_heavy_compression() {
    let clicks: Vec<usize> = (0..44100).step_by(4410).collect();
    let signal = vec![gen_click_pad(44100, 44100, &clicks)];
    let mut ts = AudioTimeStretcher::new(&StretchParams::new(0.2)).unwrap();
    assert!(ts.sharpening());
    run_stretcher(&mut ts, &signal, 1024);
    assert_eq!(ts.stats().transient_frames, 0);
}

#[test]
fn test_long_run_ratio_converges_despite_transients() {
    let n = 44100 * 10;
    let clicks: Vec<usize> = (4410..n).step_by(22050).collect();
    let signal = vec![gen_click_pad(44100, n, &clicks)];

    let mut ts = AudioTimeStretcher::new(&StretchParams::new(1.37)).unwrap();
    run_stretcher(&mut ts, &signal, 700);

    let stats = ts.stats();
    assert!(stats.transient_frames > 0);
    let achieved = stats.achieved_ratio();
    assert!(
        (achieved - 1.37).abs() < 0.0137,
        "achieved ratio {} too far from 1.37",
        achieved
    );
}

#[test]
fn test_chunking_does_not_change_output() {
    let signal = gen_click_pad(44100, 20000, &[3000, 12000]);
    let input = vec![signal];

    let mut a = AudioTimeStretcher::new(&StretchParams::new(0.7)).unwrap();
    let out_a = run_stretcher(&mut a, &input, 64);
    let mut b = AudioTimeStretcher::new(&StretchParams::new(0.7)).unwrap();
    let out_b = run_stretcher(&mut b, &input, 1000);

    assert_eq!(out_a[0], out_b[0]);
}
