//! phylink Command-Line Interface
//!
//! This CLI provides tools for:
//! - Running single link simulations and distance sweeps
//! - Generating OFDM I/Q sample files
//! - Recovering payloads from captured samples
//! - Listing supported rates and printing configuration

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use phylink_core::types::{mean_power, power_to_db};
use phylink_core::{
    bits_to_bytes, bytes_to_bits, supported_selectors, IQSample, OfdmPhy, PhyConfig, Recovery,
    Waveform,
};
use phylink_sim::{LinkOutcome, LinkRequest, LinkSimulator, LinkStatus, SimConfig, Vec3};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "phylink")]
#[command(author, version, about = "OFDM link simulator CLI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: search path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct RateArgs {
    /// Use HT (802.11n) instead of legacy rates
    #[arg(long)]
    ht: bool,

    /// Legacy rate in 500 kbps units, or HT MCS index with --ht
    #[arg(long, default_value = "12")]
    selector: u32,

    /// Channel bandwidth in MHz (5, 10, 20, 40)
    #[arg(long, default_value = "20")]
    bandwidth: u32,
}

impl RateArgs {
    fn resolve(&self, scrambler_seed: u8) -> Result<PhyConfig> {
        Ok(PhyConfig::resolve(!self.ht, self.selector, self.bandwidth)?
            .with_scrambler_seed(scrambler_seed)?)
    }
}

#[derive(Args, Clone)]
struct PayloadArgs {
    /// Payload as text
    #[arg(short, long)]
    message: Option<String>,

    /// Payload as hex bytes (e.g. AA01FF)
    #[arg(long, conflicts_with = "message")]
    hex: Option<String>,
}

impl PayloadArgs {
    fn bytes(&self) -> Result<Vec<u8>> {
        match (&self.message, &self.hex) {
            (_, Some(hex)) => parse_hex(hex),
            (Some(message), None) => Ok(message.as_bytes().to_vec()),
            (None, None) => Ok(Vec::new()),
        }
    }
}

#[derive(Args, Clone)]
struct RadioArgs {
    /// Transmit power in dBm
    #[arg(long, default_value = "20.0")]
    tx_power: f64,

    /// Transmit antenna gain in dB
    #[arg(long, default_value = "0.0")]
    tx_gain: f64,

    /// Receive antenna gain in dB
    #[arg(long, default_value = "0.0")]
    rx_gain: f64,

    /// Closing speed between the nodes in m/s
    #[arg(long, default_value = "0.0")]
    speed: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one packet over one link
    Link {
        #[command(flatten)]
        payload: PayloadArgs,

        #[command(flatten)]
        rate: RateArgs,

        #[command(flatten)]
        radio: RadioArgs,

        /// Sender-receiver distance in meters
        #[arg(short, long, default_value = "100.0")]
        distance: f64,

        /// Channel RNG seed (default: derived from the configuration)
        #[arg(long)]
        seed: Option<u64>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sweep distance and report delivery and received power
    Sweep {
        #[command(flatten)]
        payload: PayloadArgs,

        #[command(flatten)]
        rate: RateArgs,

        #[command(flatten)]
        radio: RadioArgs,

        /// First distance in meters
        #[arg(long, default_value = "10.0")]
        from: f64,

        /// Last distance in meters
        #[arg(long, default_value = "10000.0")]
        to: f64,

        /// Number of logarithmically spaced points
        #[arg(long, default_value = "20")]
        steps: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a frame and write it as f32 I/Q samples
    Tx {
        #[command(flatten)]
        payload: PayloadArgs,

        #[command(flatten)]
        rate: RateArgs,

        /// Output file for I/Q samples
        #[arg(short, long, default_value = "tx_samples.iq")]
        output: PathBuf,

        /// Transmit gain in dB applied to the waveform
        #[arg(long, default_value = "0.0")]
        gain: f64,
    },

    /// Recover a payload from f32 I/Q samples
    Rx {
        /// Input file with I/Q samples
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        rate: RateArgs,
    },

    /// List supported rates
    Rates {
        /// Only this bandwidth in MHz
        #[arg(long)]
        bandwidth: Option<u32>,
    },

    /// Print configuration as YAML
    Config {
        /// Print an annotated example instead of the effective configuration
        #[arg(long)]
        example: bool,
    },
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits.trim_start_matches("0x");
    if digits.len() % 2 != 0 {
        bail!("hex payload must have an even number of digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte '{}'", &digits[i..i + 2]))
        })
        .collect()
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    let config = match path {
        Some(path) => SimConfig::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => SimConfig::load().context("Failed to load configuration")?,
    };
    Ok(config)
}

fn write_samples_f32(samples: &[IQSample], path: &Path) -> Result<()> {
    use byteorder::{LittleEndian, WriteBytesExt};

    let file = File::create(path).context("Failed to create output file")?;
    let mut writer = BufWriter::new(file);

    for sample in samples {
        writer.write_f32::<LittleEndian>(sample.re as f32)?;
        writer.write_f32::<LittleEndian>(sample.im as f32)?;
    }

    writer.flush()?;
    Ok(())
}

fn read_samples_f32(path: &Path) -> Result<Vec<IQSample>> {
    use byteorder::{LittleEndian, ReadBytesExt};

    let file = File::open(path).context("Failed to open input file")?;
    let num_samples = file.metadata()?.len() as usize / 8; // 2 x f32 per sample

    let mut reader = BufReader::new(file);
    let mut samples = Vec::with_capacity(num_samples);

    for _ in 0..num_samples {
        let re = reader.read_f32::<LittleEndian>()? as f64;
        let im = reader.read_f32::<LittleEndian>()? as f64;
        samples.push(IQSample::new(re, im));
    }

    Ok(samples)
}

fn build_request(
    payload: Vec<u8>,
    rate: &RateArgs,
    radio: &RadioArgs,
    distance: f64,
) -> LinkRequest {
    LinkRequest::new(payload)
        .with_positions(Vec3::ZERO, Vec3::new(distance, 0.0, 0.0))
        .with_velocities(Vec3::ZERO, Vec3::new(-radio.speed, 0.0, 0.0))
        .with_tx_power(radio.tx_power)
        .with_gains(radio.tx_gain, radio.rx_gain)
        .with_rate(!rate.ht, rate.selector)
        .with_bandwidth(rate.bandwidth)
        .with_ids(0, 1)
}

fn describe_payload(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.is_empty() && text.chars().all(|c| !c.is_control()) => {
            format!("\"{}\"", text)
        }
        _ => format!("{:02X?}", payload),
    }
}

fn print_outcome(outcome: &LinkOutcome) {
    println!("Distance:       {:.1} m", outcome.distance_m);
    println!("Path loss:      {:.2} dB", outcome.path_loss_db);
    println!("RX power:       {:.2} dBm", outcome.rx_power_dbm);
    if outcome.doppler_hz != 0.0 {
        println!("Doppler:        {:.1} Hz", outcome.doppler_hz);
    }
    println!(
        "Airtime:        {:.1} us ({} samples)",
        outcome.airtime_us, outcome.frame_samples
    );
    match &outcome.status {
        LinkStatus::Decoded {
            rate_mbps,
            service_ok,
            evm_db,
        } => {
            println!("Status:         decoded at {} Mbps", rate_mbps);
            println!("EVM:            {:.1} dB", evm_db);
            if !service_ok {
                println!("SERVICE:        nonzero (payload likely corrupted)");
            }
            println!("Payload:        {}", describe_payload(&outcome.payload));
        }
        LinkStatus::Failed { reason } => println!("Status:         failed ({})", reason),
    }
}

fn cmd_link(
    config: SimConfig,
    payload: PayloadArgs,
    rate: RateArgs,
    radio: RadioArgs,
    distance: f64,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let sim = LinkSimulator::new(config).context("Invalid configuration")?;
    let sent = payload.bytes()?;
    let mut request = build_request(sent.clone(), &rate, &radio, distance);
    if let Some(seed) = seed {
        request = request.with_seed(seed);
    }

    let outcome = sim.simulate(&request)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
        println!(
            "Delivered:      {}",
            if outcome.delivered(&sent) { "yes" } else { "no" }
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct SweepRow {
    distance_m: f64,
    rx_power_dbm: f64,
    delivered: bool,
    status: LinkStatus,
}

#[allow(clippy::too_many_arguments)]
fn cmd_sweep(
    config: SimConfig,
    payload: PayloadArgs,
    rate: RateArgs,
    radio: RadioArgs,
    from: f64,
    to: f64,
    steps: usize,
    json: bool,
) -> Result<()> {
    if !(from > 0.0 && to > from) {
        bail!("sweep needs 0 < from < to");
    }
    if steps < 2 {
        bail!("sweep needs at least 2 steps");
    }

    let sim = LinkSimulator::new(config).context("Invalid configuration")?;
    let sent = payload.bytes()?;
    let ratio = (to / from).powf(1.0 / (steps - 1) as f64);
    let requests: Vec<LinkRequest> = (0..steps)
        .map(|i| {
            build_request(sent.clone(), &rate, &radio, from * ratio.powi(i as i32))
                .with_timestamp(i as u64)
        })
        .collect();

    info!("Sweeping {} points from {} m to {} m", steps, from, to);
    let rows = sim
        .simulate_batch(&requests)
        .into_iter()
        .map(|result| {
            result.map(|outcome| SweepRow {
                distance_m: outcome.distance_m,
                rx_power_dbm: outcome.rx_power_dbm,
                delivered: outcome.delivered(&sent),
                status: outcome.status,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:>12}  {:>10}  {:>9}  status", "distance_m", "rx_dBm", "delivered");
    for row in &rows {
        let status = match &row.status {
            LinkStatus::Decoded { evm_db, .. } => format!("decoded, EVM {:.1} dB", evm_db),
            LinkStatus::Failed { reason } => reason.to_string(),
        };
        println!(
            "{:>12.1}  {:>10.2}  {:>9}  {}",
            row.distance_m,
            row.rx_power_dbm,
            if row.delivered { "yes" } else { "no" },
            status
        );
    }
    if let Some(edge) = rows.iter().rev().find(|row| row.delivered) {
        println!("\nLast delivered at {:.1} m", edge.distance_m);
    }
    Ok(())
}

fn cmd_tx(
    config: SimConfig,
    payload: PayloadArgs,
    rate: RateArgs,
    output: PathBuf,
    gain: f64,
) -> Result<()> {
    let phy_config = rate.resolve(config.scrambler_seed)?;
    let bytes = payload.bytes()?;

    info!("Transmitting {} bytes with {}", bytes.len(), phy_config);
    let samples = OfdmPhy::new().generate(&bytes_to_bits(&bytes), &phy_config, gain)?;

    info!("Generated {} I/Q samples", samples.len());
    info!(
        "Duration: {:.1} us",
        samples.len() as f64 / phy_config.sample_rate() * 1e6
    );

    write_samples_f32(&samples, &output)?;
    println!("Wrote {} samples to {}", samples.len(), output.display());
    Ok(())
}

fn cmd_rx(config: SimConfig, input: PathBuf, rate: RateArgs) -> Result<()> {
    let phy_config = rate.resolve(config.scrambler_seed)?;

    info!("Reading samples from {}", input.display());
    let samples = read_samples_f32(&input)?;
    info!("Read {} I/Q samples", samples.len());

    let power = mean_power(&samples);
    if power <= 0.0 {
        bail!("input file contains no signal");
    }
    // Normalize the capture to unit power before decoding
    let agc_db = -power_to_db(power);

    match OfdmPhy::new().recover(&samples, &phy_config, 0.0, agc_db)? {
        Recovery::Decoded(frame) => {
            let payload = bits_to_bytes(&frame.bits);
            println!("Received {} bytes at {} Mbps", payload.len(), frame.rate_mbps);
            println!("Payload: {}", describe_payload(&payload));
            info!("EVM: {:.1} dB", frame.evm_db);
            if !frame.service_ok {
                warn!("SERVICE field is nonzero; payload is likely corrupted");
            }
        }
        Recovery::Failed(reason) => {
            warn!("Recovery failed: {}", reason);
            println!("No frame recovered: {}", reason);
        }
    }
    Ok(())
}

fn cmd_rates(bandwidth: Option<u32>) -> Result<()> {
    let bandwidths = match bandwidth {
        Some(bw) => vec![bw],
        None => vec![5, 10, 20, 40],
    };

    for bw in bandwidths {
        for legacy in [true, false] {
            let selectors = supported_selectors(legacy, bw);
            if selectors.is_empty() {
                continue;
            }
            println!(
                "{} MHz {}:",
                bw,
                if legacy { "non-HT (selector = 500 kbps units)" } else { "HT (selector = MCS)" }
            );
            for selector in selectors {
                let config = PhyConfig::resolve(legacy, selector, bw)?;
                println!(
                    "  {:>3}  {}  max PSDU {} bytes",
                    selector,
                    config,
                    config.max_psdu_len()
                );
            }
        }
    }
    Ok(())
}

fn cmd_config(config: Option<SimConfig>) -> Result<()> {
    match config {
        Some(config) => print!("{}", config.to_yaml()?),
        None => print!("{}", SimConfig::example_yaml()),
    }
    Ok(())
}

fn log_filter(verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => return EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    EnvFilter::new(level)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging: -v overrides RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Link {
            payload,
            rate,
            radio,
            distance,
            seed,
            json,
        } => cmd_link(load_config(config_path)?, payload, rate, radio, distance, seed, json),

        Commands::Sweep {
            payload,
            rate,
            radio,
            from,
            to,
            steps,
            json,
        } => cmd_sweep(
            load_config(config_path)?,
            payload,
            rate,
            radio,
            from,
            to,
            steps,
            json,
        ),

        Commands::Tx {
            payload,
            rate,
            output,
            gain,
        } => cmd_tx(load_config(config_path)?, payload, rate, output, gain),

        Commands::Rx { input, rate } => cmd_rx(load_config(config_path)?, input, rate),

        Commands::Rates { bandwidth } => cmd_rates(bandwidth),

        Commands::Config { example } => {
            if example {
                cmd_config(None)
            } else {
                cmd_config(Some(load_config(config_path)?))
            }
        }
    }
}
