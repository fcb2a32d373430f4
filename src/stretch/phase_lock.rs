//! Identity phase locking (Laroche & Dolson 1999).
//!
//! Bins around a spectral peak belong to the same sinusoid. Unwrapping them
//! one by one fails once a bin lies further from the sinusoid than the hop
//! can resolve, and the mismatched bins cancel on resynthesis. Locking gives
//! every non-peak bin its nearest peak's synthesis phase plus the analysis
//! phase offset it had from that peak.

/// Collects the local magnitude maxima of `magnitudes` into `peaks`.
fn find_peaks(magnitudes: &[f32], peaks: &mut Vec<usize>) {
    peaks.clear();
    if magnitudes.len() < 3 {
        return;
    }
    for bin in 1..magnitudes.len() - 1 {
        if magnitudes[bin] > magnitudes[bin - 1] && magnitudes[bin] > magnitudes[bin + 1] {
            peaks.push(bin);
        }
    }
}

/// Locks `synthesis_phases` to the spectral peaks of the analysed frame.
///
/// Peak bins keep their own synthesis phase. `peaks` is scratch space and
/// is left holding the peaks found. A spectrum without peaks is untouched.
pub fn identity_phase_lock(
    magnitudes: &[f32],
    analysis_phases: &[f32],
    synthesis_phases: &mut [f32],
    peaks: &mut Vec<usize>,
) {
    debug_assert_eq!(magnitudes.len(), analysis_phases.len());
    debug_assert_eq!(magnitudes.len(), synthesis_phases.len());

    find_peaks(magnitudes, peaks);
    if peaks.is_empty() {
        return;
    }

    let mut peak_idx = 0;
    for bin in 0..magnitudes.len() {
        while peak_idx + 1 < peaks.len()
            && peaks[peak_idx + 1].abs_diff(bin) < peaks[peak_idx].abs_diff(bin)
        {
            peak_idx += 1;
        }
        let peak = peaks[peak_idx];
        if bin != peak {
            let offset = analysis_phases[bin] - analysis_phases[peak];
            synthesis_phases[bin] = synthesis_phases[peak] + offset;
        }
    }
}
