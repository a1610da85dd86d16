//! Core sample and level types
//!
//! Complex baseband samples are `f64` I/Q pairs. Power levels travel through
//! the pipeline in decibels; the helpers here are the only place dB values are
//! turned into linear factors.
//!
//! ```text
//!   dBm ──(-30)──► dBW ──10^(x/10)──► W
//!   dB  ──10^(x/20)──► amplitude factor
//! ```

use num_complex::Complex64;

/// Type alias for complex numbers using f64 precision
pub type Complex = Complex64;

/// A single I/Q sample point
pub type IQSample = Complex64;

/// A buffer of I/Q samples
pub type IQBuffer = Vec<IQSample>;

/// A bit stored one-per-byte (0 or 1)
pub type Bit = u8;

/// Convert a gain in dB to an amplitude factor
#[inline]
pub fn db_to_amplitude(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert a gain in dB to a power factor
#[inline]
pub fn db_to_power(db: f64) -> f64 {
    10.0_f64.powf(db / 10.0)
}

/// Convert a power ratio to dB
#[inline]
pub fn power_to_db(ratio: f64) -> f64 {
    10.0 * ratio.log10()
}

/// Convert dBm to watts
#[inline]
pub fn dbm_to_watts(dbm: f64) -> f64 {
    db_to_power(dbm - 30.0)
}

/// Convert watts to dBm
#[inline]
pub fn watts_to_dbm(watts: f64) -> f64 {
    power_to_db(watts) + 30.0
}

/// Mean power of a sample buffer (0.0 for an empty buffer)
pub fn mean_power(samples: &[IQSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.norm_sqr()).sum::<f64>() / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_conversions() {
        assert!((db_to_amplitude(20.0) - 10.0).abs() < 1e-12);
        assert!((db_to_power(20.0) - 100.0).abs() < 1e-9);
        assert!((power_to_db(1000.0) - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_dbm_watts() {
        assert!((dbm_to_watts(30.0) - 1.0).abs() < 1e-12);
        assert!((watts_to_dbm(0.1) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_power() {
        let samples = vec![Complex::new(1.0, 0.0), Complex::new(0.0, 1.0)];
        assert!((mean_power(&samples) - 1.0).abs() < 1e-12);
        assert_eq!(mean_power(&[]), 0.0);
    }
}
