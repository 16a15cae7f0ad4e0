//! Level measurement helpers
//!
//! Linear RMS and peak levels plus their dB conversions. Silence is floored
//! at -200 dB rather than negative infinity so values stay serializable.

/// Level reported for digital silence, in dB.
pub const SILENCE_DB: f32 = -200.0;

/// Compute RMS (Root Mean Square) level of a signal
///
/// Returns RMS value in linear scale (not dB)
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }

    let sum_sq: f64 = signal.iter().map(|&x| f64::from(x) * f64::from(x)).sum();
    (sum_sq / signal.len() as f64).sqrt() as f32
}

/// Compute peak level (maximum absolute value)
pub fn peak(signal: &[f32]) -> f32 {
    signal.iter().fold(0.0f32, |max, &x| max.max(x.abs()))
}

/// Convert a linear level to dB.
pub fn to_db(linear: f32) -> f32 {
    if linear > 1e-10 {
        20.0 * linear.log10()
    } else {
        SILENCE_DB
    }
}

/// Convert a dB level to linear.
pub fn from_db(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Compute RMS level in dB
pub fn rms_db(signal: &[f32]) -> f32 {
    to_db(rms(signal))
}

/// Find the minimum and maximum of `samples`, in the order they occur.
///
/// Returns `(min, max)` if the minimum comes first, `(max, min)` otherwise,
/// so a waveform drawn from consecutive pairs follows the signal's direction.
pub fn ordered_peaks(samples: &[f32]) -> Option<(f32, f32)> {
    let first = *samples.first()?;
    let (mut min_i, mut min_v) = (0, first);
    let (mut max_i, mut max_v) = (0, first);
    for (i, &s) in samples.iter().enumerate().skip(1) {
        if s < min_v {
            min_i = i;
            min_v = s;
        }
        if s > max_v {
            max_i = i;
            max_v = s;
        }
    }
    if min_i < max_i {
        Some((min_v, max_v))
    } else {
        Some((max_v, min_v))
    }
}
