//! 802.11a/n-class OFDM PHY
//!
//! ## Frame
//!
//! ```text
//! ┌───────────┬───────────┬─────────────┬──────────────────────────────┐
//! │ STF 2.5N  │ LTF 2.5N  │ SIG 1.25N×s │ DATA 1.25N × N_SYM           │
//! └───────────┴───────────┴─────────────┴──────────────────────────────┘
//!   s = 1 (L-SIG) for non-HT, 2 (HT-SIG) for HT; N_SYM = 0 for an empty PSDU
//! ```
//!
//! ## Transmit
//!
//! ```text
//! SERVICE(16) ‖ PSDU ‖ tail(6) ‖ pad → scramble → zero tail → BCC(K=7)
//!   → puncture → interleave per symbol → Gray map → + pilots → IFFT + CP
//! ```
//!
//! ## Receive
//!
//! The frame is expected at sample 0. The receiver:
//!
//! 1. scales by `rx_gain + agc_compensation` (dB, amplitude)
//! 2. checks the STF autocorrelation for a frame
//! 3. estimates CFO from the STF (lag N/4) and refines it on the LTF (lag N)
//! 4. estimates the channel from the averaged LTF symbols
//! 5. decodes SIG, which fixes the rate and length of the DATA field
//! 6. equalizes DATA symbols, removes common phase using the pilots, and
//!    computes CSI-weighted soft bits for the Viterbi decoder
//! 7. descrambles using the register recovered from the SERVICE field

use std::f64::consts::PI;

use tracing::{debug, trace};

use super::signal::{decode_sig, encode_sig, HtSignal, LegacySignal};
use super::{RecoveredFrame, Recovery, Waveform, WaveformInfo};
use crate::coding::{depuncture, pilot_polarity, puncture, ConvolutionalEncoder, Interleaver, Scrambler, ViterbiDecoder};
use crate::error::{DecodeFailure, PhyError, PhyResult};
use crate::modulation::{demap_hard, demap_soft, map_bits, map_symbol};
use crate::ofdm::{energy, Numerology, OfdmModem};
use crate::rate::{ChannelWidth, Format, Modulation, PhyConfig};
use crate::types::{db_to_amplitude, power_to_db, Bit, Complex, IQBuffer, IQSample};

/// SERVICE field length in bits
const SERVICE_BITS: usize = 16;

/// Convolutional tail length in bits
const TAIL_BITS: usize = 6;

/// Normalized STF autocorrelation needed to declare a frame
const DETECTION_THRESHOLD: f64 = 0.4;

/// Channel estimates weaker than this are treated as nulls
const MIN_CHANNEL_POWER: f64 = 1e-12;

/// EVM floor reported for a perfect constellation
const EVM_FLOOR_DB: f64 = -100.0;

/// OFDM PHY for non-HT (5/10/20 MHz) and HT (20/40 MHz) frames
#[derive(Debug, Clone, Copy, Default)]
pub struct OfdmPhy;

impl OfdmPhy {
    pub fn new() -> Self {
        Self
    }

    /// PSDU length in octets, after range checks
    fn psdu_len(bits: &[Bit], config: &PhyConfig) -> PhyResult<usize> {
        if bits.len() % 8 != 0 {
            return Err(PhyError::UnalignedPayload { bits: bits.len() });
        }
        let length = bits.len() / 8;
        if length > config.max_psdu_len() {
            return Err(PhyError::PayloadTooLarge {
                length,
                max: config.max_psdu_len(),
            });
        }
        Ok(length)
    }

    /// Uncoded SIG field bits for this configuration
    fn sig_bits(config: &PhyConfig, psdu_len: usize) -> PhyResult<Vec<Bit>> {
        match config.format {
            Format::NonHt => {
                let rate_bits = config.rate_bits.ok_or_else(|| {
                    PhyError::Configuration("non-HT configuration without RATE bits".to_string())
                })?;
                Ok(LegacySignal {
                    rate_bits,
                    length: psdu_len as u16,
                }
                .to_bits())
            }
            Format::Ht => {
                let mcs = config
                    .mcs()
                    .ok_or_else(|| PhyError::Configuration("HT configuration without MCS".to_string()))?;
                Ok(HtSignal {
                    mcs,
                    cbw40: config.width == ChannelWidth::Mhz40,
                    length: psdu_len as u16,
                }
                .to_bits())
            }
        }
    }

    /// SERVICE ‖ PSDU ‖ tail ‖ pad, scrambled, with the tail re-zeroed
    fn data_field_bits(psdu: &[Bit], config: &PhyConfig) -> Vec<Bit> {
        let n_sym = config.data_symbols(psdu.len() / 8);
        let total = n_sym * config.rate.n_dbps;
        let mut bits = vec![0; total];
        bits[SERVICE_BITS..SERVICE_BITS + psdu.len()].copy_from_slice(psdu);
        Scrambler::new(config.scrambler_seed).apply(&mut bits);
        let tail = SERVICE_BITS + psdu.len();
        bits[tail..tail + TAIL_BITS].fill(0);
        bits
    }

    /// SIG symbols in the time domain
    fn sig_samples(modem: &OfdmModem, blocks: &[Vec<Bit>], format: Format) -> Vec<IQSample> {
        let num = &modem.numerology;
        let polarity = pilot_polarity();
        let carriers = Numerology::legacy_data_carriers();
        // HT-SIG is sent on the quadrature axis
        let axis = match format {
            Format::NonHt => Complex::new(1.0, 0.0),
            Format::Ht => Complex::new(0.0, 1.0),
        };
        let used = num.sig_used() as f64;

        let mut out = Vec::with_capacity(blocks.len() * num.symbol_len());
        for (n, block) in blocks.iter().enumerate() {
            let points = map_bits(Modulation::Bpsk, block);
            let mut freq = vec![Complex::new(0.0, 0.0); num.fft_size];
            for band in &num.bands {
                for (&k, &point) in carriers.iter().zip(&points) {
                    freq[num.bin(band.offset + k)] = point * axis * band.rotation;
                }
                for &(k, value) in Numerology::legacy_pilots() {
                    freq[num.bin(band.offset + k)] = Complex::new(value * polarity[n % 127], 0.0) * band.rotation;
                }
            }
            out.extend(modem.symbol(&freq, used));
        }
        out
    }

    /// DATA symbols in the time domain
    fn data_samples(modem: &OfdmModem, coded: &[Bit], config: &PhyConfig) -> Vec<IQSample> {
        let num = &modem.numerology;
        let polarity = pilot_polarity();
        let interleaver = Interleaver::new(config.rate.n_cbps, config.rate.n_bpsc, num.interleaver_columns);
        let used = num.data_used() as f64;
        let first = config.sig_symbols();

        let mut out = Vec::with_capacity(coded.len() / config.rate.n_cbps * num.symbol_len());
        for (i, block) in coded.chunks(config.rate.n_cbps).enumerate() {
            let points = map_bits(config.rate.modulation, &interleaver.interleave(block));
            let mut freq = vec![Complex::new(0.0, 0.0); num.fft_size];
            for (&k, &point) in num.data_carriers.iter().zip(&points) {
                freq[num.bin(k)] = point;
            }
            let p = polarity[(first + i) % 127];
            for &(k, value) in &num.pilots {
                freq[num.bin(k)] = Complex::new(value * p, 0.0);
            }
            out.extend(modem.symbol(&freq, used));
        }
        out
    }
}

/// Equalize one subcarrier, returning the estimate and its CSI weight
#[inline]
fn equalize(y: Complex, h: Complex) -> (Complex, f64) {
    let power = h.norm_sqr();
    if power < MIN_CHANNEL_POWER || !power.is_finite() {
        (Complex::new(0.0, 0.0), 0.0)
    } else {
        (y / h, power)
    }
}

/// Common phase error of a symbol from its pilots
fn pilot_phase(y: &[Complex], h: &[Complex], pilots: impl Iterator<Item = (usize, Complex)>) -> f64 {
    let acc: Complex = pilots.map(|(bin, x)| y[bin] * (h[bin] * x).conj()).sum();
    if acc.norm_sqr() > 0.0 {
        acc.arg()
    } else {
        0.0
    }
}

/// Running error vector magnitude accumulator
#[derive(Default)]
struct EvmMeter {
    error: f64,
    count: usize,
}

impl EvmMeter {
    fn add(&mut self, modulation: Modulation, z: Complex) {
        let ideal = map_symbol(modulation, &demap_hard(modulation, z));
        self.error += (z - ideal).norm_sqr();
        self.count += 1;
    }

    fn db(&self) -> f64 {
        if self.count == 0 || self.error <= 0.0 {
            return EVM_FLOOR_DB;
        }
        power_to_db(self.error / self.count as f64).max(EVM_FLOOR_DB)
    }
}

/// Receiver state after synchronization and channel estimation
struct Synchronized<'a> {
    modem: OfdmModem,
    samples: Vec<IQSample>,
    channel: Vec<Complex>,
    config: &'a PhyConfig,
}

impl Synchronized<'_> {
    /// FFT of the symbol starting at `start` (cyclic prefix included)
    fn symbol(&self, start: usize, used: f64) -> Vec<Complex> {
        let cp = self.modem.numerology.cp_len();
        self.modem.demodulate(&self.samples[start + cp..], used)
    }

    /// Soft bits of one SIG symbol, combined over every legacy band
    fn sig_llrs(&self, start: usize, n: usize, polarity: &[f64; 127]) -> (Vec<f64>, EvmMeter) {
        let num = &self.modem.numerology;
        let y = self.symbol(start, num.sig_used() as f64);
        let axis = match self.config.format {
            Format::NonHt => Complex::new(1.0, 0.0),
            Format::Ht => Complex::new(0.0, -1.0),
        };
        let pilots = num.bands.iter().flat_map(|band| {
            Numerology::legacy_pilots().iter().map(move |&(k, v)| {
                (
                    num.bin(band.offset + k),
                    Complex::new(v * polarity[n % 127], 0.0) * band.rotation,
                )
            })
        });
        let derotate = Complex::from_polar(1.0, -pilot_phase(&y, &self.channel, pilots));

        let carriers = Numerology::legacy_data_carriers();
        let mut combined = vec![0.0; carriers.len()];
        let mut evm = EvmMeter::default();
        for band in &num.bands {
            let mut llrs = Vec::with_capacity(carriers.len());
            for &k in &carriers {
                let bin = num.bin(band.offset + k);
                let (z, w) = equalize(y[bin] * derotate, self.channel[bin]);
                let z = z * band.rotation.conj() * axis;
                if w > 0.0 {
                    evm.add(Modulation::Bpsk, z);
                }
                demap_soft(Modulation::Bpsk, z, w, &mut llrs);
            }
            combined.iter_mut().zip(&llrs).for_each(|(c, l)| *c += l);
        }
        (combined, evm)
    }

    /// Soft bits of one DATA symbol, deinterleaved
    fn data_llrs(
        &self,
        start: usize,
        n: usize,
        data_config: &PhyConfig,
        interleaver: &Interleaver,
        polarity: &[f64; 127],
        evm: &mut EvmMeter,
    ) -> Vec<f64> {
        let num = &self.modem.numerology;
        let y = self.symbol(start, num.data_used() as f64);
        let p = polarity[n % 127];
        let pilots = num
            .pilots
            .iter()
            .map(|&(k, v)| (num.bin(k), Complex::new(v * p, 0.0)));
        let derotate = Complex::from_polar(1.0, -pilot_phase(&y, &self.channel, pilots));

        let modulation = data_config.rate.modulation;
        let mut llrs = Vec::with_capacity(data_config.rate.n_cbps);
        for &k in &num.data_carriers {
            let bin = num.bin(k);
            let (z, w) = equalize(y[bin] * derotate, self.channel[bin]);
            if w > 0.0 {
                evm.add(modulation, z);
            }
            demap_soft(modulation, z, w, &mut llrs);
        }
        interleaver.deinterleave(&llrs)
    }
}

/// Rotate samples by `-phase_per_sample · n`
fn derotate(samples: &mut [IQSample], phase_per_sample: f64, offset: usize) {
    for (n, s) in samples.iter_mut().enumerate() {
        *s *= Complex::from_polar(1.0, -phase_per_sample * (n + offset) as f64);
    }
}

/// Lag autocorrelation `Σ r[n+lag]·r*[n]` and the energy it is normalized by
fn autocorrelate(samples: &[IQSample], lag: usize) -> (Complex, f64) {
    let mut acc = Complex::new(0.0, 0.0);
    let mut power = 0.0;
    for n in 0..samples.len().saturating_sub(lag) {
        acc += samples[n + lag] * samples[n].conj();
        power += samples[n + lag].norm_sqr();
    }
    (acc, power)
}

impl Waveform for OfdmPhy {
    fn info(&self) -> WaveformInfo {
        WaveformInfo {
            name: "OFDM",
            full_name: "802.11a/n OFDM PHY",
            description: "Non-HT (5/10/20 MHz) and HT single-stream (20/40 MHz) OFDM with BCC coding",
            bandwidths_mhz: &[5, 10, 20, 40],
        }
    }

    fn generate(&self, bits: &[Bit], config: &PhyConfig, tx_gain_db: f64) -> PhyResult<IQBuffer> {
        let psdu_len = Self::psdu_len(bits, config)?;
        let modem = OfdmModem::new(Numerology::for_config(config));

        let mut out = Vec::with_capacity(self.frame_len(config, psdu_len));
        out.extend(modem.stf());
        out.extend(modem.ltf());

        let sig = encode_sig(&Self::sig_bits(config, psdu_len)?);
        out.extend(Self::sig_samples(&modem, &sig, config.format));

        if psdu_len > 0 {
            let data = Self::data_field_bits(bits, config);
            let coded = puncture(&ConvolutionalEncoder::new().encode(&data), config.rate.code_rate);
            out.extend(Self::data_samples(&modem, &coded, config));
        }

        let gain = db_to_amplitude(tx_gain_db);
        out.iter_mut().for_each(|s| *s *= gain);

        trace!(
            psdu_len,
            n_sym = config.data_symbols(psdu_len),
            samples = out.len(),
            "generated {}",
            config
        );
        Ok(out)
    }

    fn recover(
        &self,
        samples: &[IQSample],
        config: &PhyConfig,
        rx_gain_db: f64,
        agc_compensation_db: f64,
    ) -> PhyResult<Recovery> {
        let num = Numerology::for_config(config);
        let n = num.fft_size;
        let sym_len = num.symbol_len();
        let sig_start = num.preamble_len();
        let data_start = sig_start + config.sig_symbols() * sym_len;

        if samples.len() < data_start {
            return Ok(Recovery::Failed(DecodeFailure::Truncated {
                needed: data_start,
                available: samples.len(),
            }));
        }

        let gain = db_to_amplitude(rx_gain_db + agc_compensation_db);
        let mut rx: Vec<IQSample> = samples.iter().map(|s| s * gain).collect();

        // Frame detection and coarse CFO on the STF
        let stf_lag = n / 4;
        let (acc, power) = autocorrelate(&rx[..num.stf_len()], stf_lag);
        let metric = if power > 0.0 { acc.norm() / power } else { 0.0 };
        if !metric.is_finite() || metric < DETECTION_THRESHOLD {
            debug!(metric, "no frame detected");
            return Ok(Recovery::Failed(DecodeFailure::NoSignal));
        }
        let coarse = acc.arg() / stf_lag as f64;

        // Fine CFO on the two LTF symbols
        let ltf_start = num.stf_len() + n / 2;
        let mut ltf = rx[ltf_start..ltf_start + 2 * n].to_vec();
        derotate(&mut ltf, coarse, ltf_start);
        let (acc, _) = autocorrelate(&ltf, n);
        let fine = if acc.norm_sqr() > 0.0 { acc.arg() / n as f64 } else { 0.0 };
        let cfo = coarse + fine;
        derotate(&mut rx, cfo, 0);
        trace!(
            metric,
            cfo_hz = cfo * config.sample_rate() / (2.0 * PI),
            "synchronized"
        );

        // Channel estimate from the averaged LTF symbols
        let modem = OfdmModem::new(num);
        let ltf_freq = modem.numerology.ltf_freq();
        let ltf_energy = energy(&ltf_freq);
        let y1 = modem.demodulate(&rx[ltf_start..], ltf_energy);
        let y2 = modem.demodulate(&rx[ltf_start + n..], ltf_energy);
        let channel: Vec<Complex> = ltf_freq
            .iter()
            .zip(y1.iter().zip(&y2))
            .map(|(&x, (&a, &b))| {
                if x.norm_sqr() > 0.0 {
                    (a + b) / (2.0 * x)
                } else {
                    Complex::new(0.0, 0.0)
                }
            })
            .collect();
        let channel_power: f64 = channel.iter().map(|h| h.norm_sqr()).sum();
        if !channel_power.is_finite() || channel_power < MIN_CHANNEL_POWER {
            return Ok(Recovery::Failed(DecodeFailure::NoSignal));
        }

        let sync = Synchronized {
            modem,
            samples: rx,
            channel,
            config,
        };
        let polarity = pilot_polarity();

        // SIG
        let mut sig_evm = EvmMeter::default();
        let sig_llrs: Vec<Vec<f64>> = (0..config.sig_symbols())
            .map(|s| {
                let (llrs, evm) = sync.sig_llrs(sig_start + s * sym_len, s, &polarity);
                sig_evm.error += evm.error;
                sig_evm.count += evm.count;
                llrs
            })
            .collect();
        let sig_bits = decode_sig(&sig_llrs);

        let header = match config.format {
            Format::NonHt => LegacySignal::parse(&sig_bits).and_then(|sig| {
                PhyConfig::non_ht(config.width, sig.rate_bits)
                    .map(|cfg| (cfg, sig.length as usize))
                    .map_err(|_| DecodeFailure::InvalidRate(sig.rate_bits))
            }),
            Format::Ht => HtSignal::parse(&sig_bits).and_then(|sig| {
                if sig.cbw40 != (config.width == ChannelWidth::Mhz40) {
                    return Err(DecodeFailure::BandwidthMismatch);
                }
                PhyConfig::ht(config.width, sig.mcs)
                    .map(|cfg| (cfg, sig.length as usize))
                    .map_err(|_| DecodeFailure::UnsupportedMcs(sig.mcs))
            }),
        };
        let (data_config, psdu_len) = match header {
            Ok(header) => header,
            Err(failure) => {
                debug!(%failure, "SIG rejected");
                return Ok(Recovery::Failed(failure));
            }
        };
        debug!(rate = %data_config, psdu_len, "SIG decoded");

        let n_sym = data_config.data_symbols(psdu_len);
        let needed = data_start + n_sym * sym_len;
        if sync.samples.len() < needed {
            return Ok(Recovery::Failed(DecodeFailure::Truncated {
                needed,
                available: sync.samples.len(),
            }));
        }
        if n_sym == 0 {
            return Ok(Recovery::Decoded(RecoveredFrame {
                bits: Vec::new(),
                rate_mbps: data_config.rate_mbps(),
                service_ok: true,
                evm_db: sig_evm.db(),
            }));
        }

        // DATA
        let rate = data_config.rate;
        let interleaver = Interleaver::new(rate.n_cbps, rate.n_bpsc, sync.modem.numerology.interleaver_columns);
        let mut evm = EvmMeter::default();
        let mut soft = Vec::with_capacity(n_sym * rate.n_cbps);
        for i in 0..n_sym {
            soft.extend(sync.data_llrs(
                data_start + i * sym_len,
                config.sig_symbols() + i,
                &data_config,
                &interleaver,
                &polarity,
                &mut evm,
            ));
        }

        let n_bits = n_sym * rate.n_dbps;
        let mut bits = ViterbiDecoder::new().decode(&depuncture(&soft, rate.code_rate, n_bits), false);
        let mut descrambler = Scrambler::from_zero_prefix(&bits[..7]);
        descrambler.apply(&mut bits[7..]);
        let service_ok = bits[7..SERVICE_BITS].iter().all(|&b| b == 0);
        let psdu = bits[SERVICE_BITS..SERVICE_BITS + 8 * psdu_len].to_vec();

        let evm_db = evm.db();
        trace!(n_sym, evm_db, service_ok, "DATA decoded");
        Ok(Recovery::Decoded(RecoveredFrame {
            bits: psdu,
            rate_mbps: data_config.rate_mbps(),
            service_ok,
            evm_db,
        }))
    }

    fn frame_len(&self, config: &PhyConfig, psdu_len: usize) -> usize {
        let num = Numerology::for_config(config);
        num.preamble_len() + (config.sig_symbols() + config.data_symbols(psdu_len)) * num.symbol_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::{bits_to_bytes, bytes_to_bits};
    use crate::rate::supported_selectors;
    use crate::types::mean_power;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn payload(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen()).collect()
    }

    fn loopback(config: &PhyConfig, data: &[u8]) -> Recovery {
        let phy = OfdmPhy::new();
        let samples = phy.generate(&bytes_to_bits(data), config, 0.0).unwrap();
        assert_eq!(samples.len(), phy.frame_len(config, data.len()));
        phy.recover(&samples, config, 0.0, 0.0).unwrap()
    }

    fn assert_delivered(config: &PhyConfig, data: &[u8]) {
        match loopback(config, data) {
            Recovery::Decoded(frame) => {
                assert_eq!(bits_to_bytes(&frame.bits), data, "{}", config);
                assert!(frame.service_ok);
                assert!((frame.rate_mbps - config.rate_mbps()).abs() < 1e-9);
                assert!(frame.evm_db < -60.0, "{} evm {}", config, frame.evm_db);
            }
            Recovery::Failed(f) => panic!("{}: {}", config, f),
        }
    }

    #[test]
    fn test_all_legacy_rates() {
        let data = payload(57, 1);
        for bw in [5, 10, 20] {
            for selector in supported_selectors(true, bw) {
                let config = PhyConfig::resolve(true, selector, bw).unwrap();
                assert_delivered(&config, &data);
            }
        }
    }

    #[test]
    fn test_all_ht_mcs() {
        let data = payload(211, 2);
        for bw in [20, 40] {
            for mcs in 0..=7 {
                let config = PhyConfig::resolve(false, mcs, bw).unwrap();
                assert_delivered(&config, &data);
            }
        }
    }

    #[test]
    fn test_single_byte_legacy() {
        let config = PhyConfig::resolve(true, 12, 20).unwrap();
        assert_delivered(&config, &[0xAA]);
        // 160 + 160 + 80 + 2 × 80
        assert_eq!(OfdmPhy::new().frame_len(&config, 1), 560);
    }

    #[test]
    fn test_empty_payload_is_header_only() {
        for (legacy, selector, bw) in [(true, 12, 20), (false, 0, 20), (false, 4, 40)] {
            let config = PhyConfig::resolve(legacy, selector, bw).unwrap();
            let phy = OfdmPhy::new();
            let samples = phy.generate(&[], &config, 0.0).unwrap();
            let num = Numerology::for_config(&config);
            assert_eq!(
                samples.len(),
                num.preamble_len() + config.sig_symbols() * num.symbol_len()
            );
            match phy.recover(&samples, &config, 0.0, 0.0).unwrap() {
                Recovery::Decoded(frame) => assert!(frame.bits.is_empty()),
                Recovery::Failed(f) => panic!("{}", f),
            }
        }
    }

    #[test]
    fn test_payload_limits() {
        let phy = OfdmPhy::new();
        let legacy = PhyConfig::resolve(true, 108, 20).unwrap();
        let too_big = vec![0u8; 8 * 4096];
        assert_eq!(
            phy.generate(&too_big, &legacy, 0.0),
            Err(PhyError::PayloadTooLarge {
                length: 4096,
                max: 4095
            })
        );
        assert_eq!(
            phy.generate(&[1, 0, 1], &legacy, 0.0),
            Err(PhyError::UnalignedPayload { bits: 3 })
        );
    }

    #[test]
    fn test_deterministic() {
        let config = PhyConfig::resolve(false, 5, 20).unwrap();
        let bits = bytes_to_bits(&payload(64, 3));
        let phy = OfdmPhy::new();
        assert_eq!(
            phy.generate(&bits, &config, 3.0).unwrap(),
            phy.generate(&bits, &config, 3.0).unwrap()
        );
    }

    #[test]
    fn test_unit_power_and_gain() {
        let config = PhyConfig::resolve(true, 36, 20).unwrap();
        let bits = bytes_to_bits(&payload(500, 4));
        let phy = OfdmPhy::new();
        let unit = phy.generate(&bits, &config, 0.0).unwrap();
        assert!((mean_power(&unit) - 1.0).abs() < 0.1);
        let boosted = phy.generate(&bits, &config, 10.0).unwrap();
        assert!((mean_power(&boosted) / mean_power(&unit) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_receiver_gain_invariance() {
        let config = PhyConfig::resolve(true, 24, 20).unwrap();
        let data = payload(40, 5);
        let phy = OfdmPhy::new();
        let samples: Vec<IQSample> = phy
            .generate(&bytes_to_bits(&data), &config, 0.0)
            .unwrap()
            .iter()
            .map(|s| s * 1e-4)
            .collect();
        let recovered = phy.recover(&samples, &config, 10.0, 70.0).unwrap();
        assert_eq!(bits_to_bytes(recovered.bits()), data);
    }

    #[test]
    fn test_truncated() {
        let config = PhyConfig::resolve(true, 12, 20).unwrap();
        let phy = OfdmPhy::new();
        let samples = phy.generate(&bytes_to_bits(&payload(20, 6)), &config, 0.0).unwrap();
        let cut = &samples[..samples.len() - 80];
        assert!(matches!(
            phy.recover(cut, &config, 0.0, 0.0).unwrap(),
            Recovery::Failed(DecodeFailure::Truncated { .. })
        ));
        assert!(matches!(
            phy.recover(&samples[..100], &config, 0.0, 0.0).unwrap(),
            Recovery::Failed(DecodeFailure::Truncated {
                needed: 400,
                available: 100
            })
        ));
    }

    #[test]
    fn test_silence_is_no_signal() {
        let config = PhyConfig::resolve(false, 0, 20).unwrap();
        let zeros = vec![Complex::new(0.0, 0.0); 2000];
        assert_eq!(
            OfdmPhy::new().recover(&zeros, &config, 0.0, 0.0).unwrap(),
            Recovery::Failed(DecodeFailure::NoSignal)
        );
    }

    #[test]
    fn test_bandwidth_mismatch() {
        // Forge an HT-SIG announcing 20 MHz inside a 40 MHz frame
        let tx = PhyConfig::resolve(false, 0, 40).unwrap();
        let rx = PhyConfig::resolve(false, 0, 40).unwrap();
        let phy = OfdmPhy::new();
        let samples = phy.generate(&bytes_to_bits(&[1, 2, 3]), &tx, 0.0).unwrap();
        assert!(phy.recover(&samples, &rx, 0.0, 0.0).unwrap().is_decoded());

        let sig = HtSignal {
            mcs: 0,
            cbw40: false,
            length: 3,
        };
        let modem = OfdmModem::new(Numerology::for_config(&tx));
        let mut forged = modem.stf();
        forged.extend(modem.ltf());
        forged.extend(OfdmPhy::sig_samples(&modem, &encode_sig(&sig.to_bits()), Format::Ht));
        forged.extend(vec![Complex::new(0.0, 0.0); 2000]);
        assert_eq!(
            phy.recover(&forged, &rx, 0.0, 0.0).unwrap(),
            Recovery::Failed(DecodeFailure::BandwidthMismatch)
        );
    }

    #[test]
    fn test_invalid_rate_bits() {
        let config = PhyConfig::resolve(true, 12, 20).unwrap();
        let sig = LegacySignal {
            rate_bits: 0b0010,
            length: 10,
        };
        let modem = OfdmModem::new(Numerology::for_config(&config));
        let mut forged = modem.stf();
        forged.extend(modem.ltf());
        forged.extend(OfdmPhy::sig_samples(&modem, &encode_sig(&sig.to_bits()), Format::NonHt));
        assert_eq!(
            OfdmPhy::new().recover(&forged, &config, 0.0, 0.0).unwrap(),
            Recovery::Failed(DecodeFailure::InvalidRate(0b0010))
        );
    }

    #[test]
    fn test_frequency_offset_and_phase() {
        let config = PhyConfig::resolve(false, 4, 20).unwrap();
        let data = payload(300, 7);
        let phy = OfdmPhy::new();
        let samples = phy.generate(&bytes_to_bits(&data), &config, 0.0).unwrap();
        // 20 kHz offset at 20 Msps plus a fixed phase and complex gain
        let w = 2.0 * PI * 20e3 / 20e6;
        let h = Complex::from_polar(0.3, 1.1);
        let shifted: Vec<IQSample> = samples
            .iter()
            .enumerate()
            .map(|(n, s)| s * h * Complex::from_polar(1.0, w * n as f64))
            .collect();
        let recovered = phy.recover(&shifted, &config, 0.0, 0.0).unwrap();
        assert_eq!(bits_to_bytes(recovered.bits()), data);
    }

    fn add_noise(samples: &[IQSample], snr_db: f64, seed: u64) -> Vec<IQSample> {
        use rand_distr::{Distribution, Normal};
        let sigma = (10f64.powf(-snr_db / 10.0) / 2.0).sqrt();
        let normal = Normal::new(0.0, sigma).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        samples
            .iter()
            .map(|s| s + Complex::new(normal.sample(&mut rng), normal.sample(&mut rng)))
            .collect()
    }

    #[test]
    fn test_noise_tolerance() {
        let config = PhyConfig::resolve(true, 12, 20).unwrap();
        let data = payload(100, 8);
        let phy = OfdmPhy::new();
        let samples = phy.generate(&bytes_to_bits(&data), &config, 0.0).unwrap();
        // 15 dB SNR is ample for BPSK 1/2
        let noisy = add_noise(&samples, 15.0, 9);
        match phy.recover(&noisy, &config, 0.0, 0.0).unwrap() {
            Recovery::Decoded(frame) => {
                assert_eq!(bits_to_bytes(&frame.bits), data);
                assert!(frame.evm_db > -25.0 && frame.evm_db < -5.0);
            }
            Recovery::Failed(f) => panic!("{}", f),
        }
    }

    #[test]
    fn test_corrupted_data_still_decodes() {
        // 10 dB carries the BPSK SIG but not 64-QAM 3/4 data
        let config = PhyConfig::resolve(true, 108, 20).unwrap();
        let data = payload(200, 10);
        let phy = OfdmPhy::new();
        let samples = phy.generate(&bytes_to_bits(&data), &config, 0.0).unwrap();
        let noisy = add_noise(&samples, 10.0, 11);
        match phy.recover(&noisy, &config, 0.0, 0.0).unwrap() {
            Recovery::Decoded(frame) => {
                let received = bits_to_bytes(&frame.bits);
                assert_eq!(received.len(), data.len());
                assert_ne!(received, data);
                assert!((frame.rate_mbps - 54.0).abs() < 1e-9);
            }
            Recovery::Failed(f) => panic!("SIG should survive 10 dB: {}", f),
        }
    }
}
