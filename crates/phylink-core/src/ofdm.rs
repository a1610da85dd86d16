//! OFDM numerology, training fields and symbol (de)modulation
//!
//! ## Subcarrier Layout
//!
//! ```text
//! format   width      FFT   data  pilots            used
//! non-HT   5/10/20    64    48    ±7 ±21            52
//! HT       20         64    52    ±7 ±21            56
//! HT       40         128   108   ±11 ±25 ±53       114
//! ```
//!
//! Subcarrier `k` sits in FFT bin `(k + N) mod N`. The cyclic prefix is
//! always `N/4`, so every OFDM symbol is `1.25 N` samples and the sample
//! rate equals the channel bandwidth.
//!
//! ## Legacy Bands
//!
//! Training and SIG fields use the 20 MHz legacy layout. A 40 MHz channel
//! carries it twice, at subcarrier offsets -32 and +32, with the upper copy
//! rotated by +j to break the duplicate's peak-to-average ratio.
//!
//! ## Power Normalization
//!
//! Every field is scaled by `1/√(Σ|X_k|²)` of its nominal frequency-domain
//! content, so each field (and the frame as a whole) has unit mean power.
//! The receiver undoes the same factor, which keeps channel estimates from
//! the LTF directly applicable to SIG and DATA symbols.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner};

use crate::rate::{ChannelWidth, Format, PhyConfig};
use crate::types::{Complex, IQSample};

/// Legacy long training sequence L_{-26..26}
const L_LTF: [f64; 53] = [
    1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, 1.0, -1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, -1.0, -1.0, 1.0,
    1.0, -1.0, 1.0, -1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, 1.0, -1.0, 1.0,
    -1.0, -1.0, -1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, 1.0, 1.0, 1.0,
];

/// Non-zero legacy short training subcarriers: (k, sign of 1+j)
const L_STF: [(i32, f64); 12] = [
    (-24, 1.0),
    (-20, -1.0),
    (-16, 1.0),
    (-12, -1.0),
    (-8, -1.0),
    (-4, 1.0),
    (4, -1.0),
    (8, -1.0),
    (12, 1.0),
    (16, 1.0),
    (20, 1.0),
    (24, 1.0),
];

/// Legacy (and HT20) pilot subcarriers and base values
const PILOTS_20: [(i32, f64); 4] = [(-21, 1.0), (-7, 1.0), (7, 1.0), (21, -1.0)];

/// HT40 pilot subcarriers and base values
const PILOTS_40: [(i32, f64); 6] = [
    (-53, 1.0),
    (-25, 1.0),
    (-11, 1.0),
    (11, 1.0),
    (25, -1.0),
    (53, -1.0),
];

/// Legacy long training value at subcarrier `k` (0 outside -26..=26)
fn l_ltf(k: i32) -> f64 {
    if (-26..=26).contains(&k) {
        L_LTF[(k + 26) as usize]
    } else {
        0.0
    }
}

/// HT20 long training value: L-LTF extended to ±28
fn ht20_ltf(k: i32) -> f64 {
    match k {
        -28 | -27 => 1.0,
        27 | 28 => -1.0,
        _ => l_ltf(k),
    }
}

/// HT40 long training value (before upper-band rotation)
fn ht40_ltf(k: i32) -> f64 {
    if !(-58..=58).contains(&k) || (-1..=1).contains(&k) {
        return 0.0;
    }
    let shifted = if k < 0 { k + 32 } else { k - 32 };
    match ht20_ltf(shifted) {
        v if v == 0.0 => 1.0,
        v => v,
    }
}

/// One 20 MHz copy of the legacy layout inside the channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyBand {
    /// Subcarrier offset of the copy's centre
    pub offset: i32,
    /// Phase rotation applied to every subcarrier of the copy
    pub rotation: Complex,
}

/// Subcarrier plan for one format and channel width
#[derive(Debug, Clone)]
pub struct Numerology {
    pub format: Format,
    pub width: ChannelWidth,
    pub fft_size: usize,
    /// DATA subcarriers in ascending order
    pub data_carriers: Vec<i32>,
    /// DATA pilot subcarriers and their base values
    pub pilots: Vec<(i32, f64)>,
    /// Copies of the legacy layout used by training and SIG fields
    pub bands: Vec<LegacyBand>,
    /// Interleaver column count for DATA symbols
    pub interleaver_columns: usize,
}

impl Numerology {
    pub fn new(format: Format, width: ChannelWidth) -> Self {
        let excluded_20 = |k: i32| k == 0 || PILOTS_20.iter().any(|&(p, _)| p == k);
        let legacy_data: Vec<i32> = (-26..=26).filter(|&k| !excluded_20(k)).collect();

        match (format, width) {
            (Format::Ht, ChannelWidth::Mhz40) => Self {
                format,
                width,
                fft_size: 128,
                data_carriers: (-58..=58)
                    .filter(|&k| !(-1..=1).contains(&k) && !PILOTS_40.iter().any(|&(p, _)| p == k))
                    .collect(),
                pilots: PILOTS_40.to_vec(),
                bands: vec![
                    LegacyBand {
                        offset: -32,
                        rotation: Complex::new(1.0, 0.0),
                    },
                    LegacyBand {
                        offset: 32,
                        rotation: Complex::new(0.0, 1.0),
                    },
                ],
                interleaver_columns: 18,
            },
            (Format::Ht, _) => Self {
                format,
                width,
                fft_size: 64,
                data_carriers: (-28..=28).filter(|&k| !excluded_20(k)).collect(),
                pilots: PILOTS_20.to_vec(),
                bands: vec![LegacyBand::centred()],
                interleaver_columns: 13,
            },
            (Format::NonHt, _) => Self {
                format,
                width,
                fft_size: 64,
                data_carriers: legacy_data,
                pilots: PILOTS_20.to_vec(),
                bands: vec![LegacyBand::centred()],
                interleaver_columns: 16,
            },
        }
    }

    pub fn for_config(config: &PhyConfig) -> Self {
        Self::new(config.format, config.width)
    }

    /// Cyclic prefix length (N/4)
    pub fn cp_len(&self) -> usize {
        self.fft_size / 4
    }

    /// One OFDM symbol including cyclic prefix (1.25 N)
    pub fn symbol_len(&self) -> usize {
        self.fft_size + self.cp_len()
    }

    /// Short training field length (2.5 N)
    pub fn stf_len(&self) -> usize {
        self.fft_size * 5 / 2
    }

    /// Long training field length: N/2 guard + 2 N
    pub fn ltf_len(&self) -> usize {
        self.fft_size / 2 + 2 * self.fft_size
    }

    /// Preamble length (STF + LTF)
    pub fn preamble_len(&self) -> usize {
        self.stf_len() + self.ltf_len()
    }

    /// FFT bin of subcarrier `k`
    #[inline]
    pub fn bin(&self, k: i32) -> usize {
        k.rem_euclid(self.fft_size as i32) as usize
    }

    /// Legacy SIG data subcarriers (48, ascending) relative to a band centre
    pub fn legacy_data_carriers() -> Vec<i32> {
        (-26..=26)
            .filter(|&k| k != 0 && !PILOTS_20.iter().any(|&(p, _)| p == k))
            .collect()
    }

    /// Legacy pilots relative to a band centre
    pub fn legacy_pilots() -> &'static [(i32, f64)] {
        &PILOTS_20
    }

    /// Frequency-domain STF (legacy layout in every band)
    pub fn stf_freq(&self) -> Vec<Complex> {
        let amp = (13.0_f64 / 6.0).sqrt();
        let mut freq = vec![Complex::new(0.0, 0.0); self.fft_size];
        for band in &self.bands {
            for &(k, sign) in &L_STF {
                freq[self.bin(band.offset + k)] = Complex::new(sign, sign) * amp * band.rotation;
            }
        }
        freq
    }

    /// Frequency-domain LTF for this format
    pub fn ltf_freq(&self) -> Vec<Complex> {
        let mut freq = vec![Complex::new(0.0, 0.0); self.fft_size];
        match (self.format, self.width) {
            (Format::NonHt, _) => {
                for k in -26..=26 {
                    freq[self.bin(k)] = Complex::new(l_ltf(k), 0.0);
                }
            }
            (Format::Ht, ChannelWidth::Mhz40) => {
                let upper = self.bands[1].rotation;
                for k in -58..=58 {
                    let v = Complex::new(ht40_ltf(k), 0.0);
                    freq[self.bin(k)] = if k > 0 { v * upper } else { v };
                }
            }
            (Format::Ht, _) => {
                for k in -28..=28 {
                    freq[self.bin(k)] = Complex::new(ht20_ltf(k), 0.0);
                }
            }
        }
        freq
    }

    /// Subcarriers carrying energy in DATA symbols (data + pilots)
    pub fn data_used(&self) -> usize {
        self.data_carriers.len() + self.pilots.len()
    }

    /// Subcarriers carrying energy in SIG symbols
    pub fn sig_used(&self) -> usize {
        52 * self.bands.len()
    }
}

impl LegacyBand {
    fn centred() -> Self {
        Self {
            offset: 0,
            rotation: Complex::new(1.0, 0.0),
        }
    }
}

/// Total energy of a frequency-domain vector
pub fn energy(freq: &[Complex]) -> f64 {
    freq.iter().map(|c| c.norm_sqr()).sum()
}

/// IFFT/FFT pair planned once per frame
pub struct OfdmModem {
    pub numerology: Numerology,
    ifft: Arc<dyn Fft<f64>>,
    fft: Arc<dyn Fft<f64>>,
}

impl OfdmModem {
    pub fn new(numerology: Numerology) -> Self {
        let mut planner = FftPlanner::new();
        let ifft = planner.plan_fft_inverse(numerology.fft_size);
        let fft = planner.plan_fft_forward(numerology.fft_size);
        Self {
            numerology,
            ifft,
            fft,
        }
    }

    /// One period of the time-domain signal for a frequency vector
    ///
    /// `used_energy` is the nominal `Σ|X_k|²` of the field; the output is
    /// scaled to unit mean power for that energy.
    pub fn to_time(&self, freq: &[Complex], used_energy: f64) -> Vec<IQSample> {
        let mut buf = freq.to_vec();
        self.ifft.process(&mut buf);
        let scale = 1.0 / used_energy.sqrt();
        buf.iter_mut().for_each(|s| *s *= scale);
        buf
    }

    /// One OFDM symbol with cyclic prefix
    pub fn symbol(&self, freq: &[Complex], used_energy: f64) -> Vec<IQSample> {
        let body = self.to_time(freq, used_energy);
        let n = self.numerology.fft_size;
        let cp = self.numerology.cp_len();
        let mut out = Vec::with_capacity(n + cp);
        out.extend_from_slice(&body[n - cp..]);
        out.extend_from_slice(&body);
        out
    }

    /// Short training field: one period cyclically extended to 2.5 N
    pub fn stf(&self) -> Vec<IQSample> {
        let freq = self.numerology.stf_freq();
        let period = self.to_time(&freq, energy(&freq));
        let n = self.numerology.fft_size;
        (0..self.numerology.stf_len()).map(|i| period[i % n]).collect()
    }

    /// Long training field: N/2 guard followed by two training symbols
    pub fn ltf(&self) -> Vec<IQSample> {
        let freq = self.numerology.ltf_freq();
        let body = self.to_time(&freq, energy(&freq));
        let n = self.numerology.fft_size;
        let mut out = Vec::with_capacity(self.numerology.ltf_len());
        out.extend_from_slice(&body[n / 2..]);
        out.extend_from_slice(&body);
        out.extend_from_slice(&body);
        out
    }

    /// FFT of N samples (cyclic prefix already removed), undoing the
    /// transmit scaling for a field of `used_energy`
    pub fn demodulate(&self, samples: &[IQSample], used_energy: f64) -> Vec<Complex> {
        let n = self.numerology.fft_size;
        let mut buf = samples[..n].to_vec();
        self.fft.process(&mut buf);
        let scale = used_energy.sqrt() / n as f64;
        buf.iter_mut().for_each(|s| *s *= scale);
        buf
    }
}
