mod platform;
mod session;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use voltmeter_core::config::{REFERENCE_VOLTAGE, VoltmeterConfig};
use voltmeter_core::converter::{OffsetMode, RoundingMode, StepConvention};

use platform::{BenchSetup, SimulatedAdc};
use session::Session;

/// Interactive console for the bench voltmeter, backed by a simulated ADC.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Voltage applied to the bench terminals.
    #[arg(long, default_value_t = 12.0)]
    input: f32,

    /// Peak uniform noise per conversion, in LSB.
    #[arg(long, default_value_t = 0.0)]
    noise: f32,

    /// Seed for the noise generator.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Reference voltage; 1.10 or 2.56 select the internal reference.
    #[arg(long, default_value_t = REFERENCE_VOLTAGE)]
    vref: f32,

    /// Input divider as `R1:R2` in kΩ.
    #[arg(long, value_parser = parse_divider, default_value = "100.50:8.21")]
    divider: (f32, f32),

    /// ADC clock division factor.
    #[arg(long, default_value_t = VoltmeterConfig::DEFAULT.clock_divider)]
    clock_divider: u16,

    /// Oversampling depth used by `volts os`.
    #[arg(long, default_value_t = VoltmeterConfig::DEFAULT.extra_bits)]
    extra_bits: u8,

    /// Add half an LSB before scaling.
    #[arg(long)]
    round: bool,

    /// Subtract the calibration offsets.
    #[arg(long)]
    offset: bool,

    /// Use vref/2^n as the step instead of vref/(2^n-1).
    #[arg(long)]
    full_scale: bool,

    /// Settling wait after the throwaway conversion, in microseconds.
    #[arg(long, default_value_t = 0)]
    settle_us: u64,

    /// Write the session transcript to this file.
    #[arg(long)]
    transcript: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> VoltmeterConfig {
        let (r1, r2) = self.divider;
        let mut config = VoltmeterConfig::DEFAULT
            .with_reference_voltage(self.vref)
            .with_divider_resistors(r1, r2)
            .with_clock_divider(self.clock_divider)
            .with_extra_bits(self.extra_bits)
            .with_settling_time(Duration::from_micros(self.settle_us));
        if self.round {
            config = config.with_rounding(RoundingMode::HalfLsb);
        }
        if self.offset {
            config = config.with_offset_mode(
                OffsetMode::Subtract,
                config.calibration_offset,
                config.oversampled_calibration_offset,
            );
        }
        if self.full_scale {
            config = config.with_step_convention(StepConvention::FullScale);
        }
        config
    }
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config = args.config();
    config.validate().context("invalid voltmeter configuration")?;
    if args.noise < 0.0 || !args.noise.is_finite() {
        bail!("--noise must be a non-negative number of LSB");
    }

    let mut adc = SimulatedAdc::new(BenchSetup {
        reference_voltage: config.reference_voltage,
        divider_ratio: config.divider_ratio().get(),
        noise_lsb: args.noise,
        seed: args.seed,
    });
    adc.set_input(config.channel, args.input);

    let mut session = match &args.transcript {
        Some(path) => Session::with_transcript(adc, config, path, "Voltmeter emulator session")
            .with_context(|| format!("opening transcript {}", path.display()))?,
        None => Session::new(adc, config),
    };
    log::info!(
        "bench input {:.3} V on ch{} (noise ±{} LSB)",
        args.input,
        config.channel,
        args.noise
    );

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Voltmeter Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_divider(value: &str) -> Result<(f32, f32)> {
    let Some((r1, r2)) = value.split_once(':') else {
        bail!("expected R1:R2, got `{value}`");
    };
    let r1 = r1.trim().parse().with_context(|| format!("bad R1 `{r1}`"))?;
    let r2 = r2.trim().parse().with_context(|| format!("bad R2 `{r2}`"))?;
    Ok((r1, r2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltmeter_core::config::{R1_DIVIDER_KOHM, R2_DIVIDER_KOHM};

    #[test]
    fn divider_argument_parses_both_resistors() {
        let (r1, r2) = parse_divider("100.50:8.21").unwrap();
        assert_eq!(r1, R1_DIVIDER_KOHM);
        assert_eq!(r2, R2_DIVIDER_KOHM);
        assert!(parse_divider("100.5").is_err());
        assert!(parse_divider("a:b").is_err());
    }

    #[test]
    fn flags_toggle_scaling() {
        let args = Args::parse_from(["voltmeter-emulator", "--round", "--offset", "--full-scale"]);
        let config = args.config();

        assert_eq!(config.rounding, RoundingMode::HalfLsb);
        assert_eq!(config.offset_mode, OffsetMode::Subtract);
        assert_eq!(config.step_convention, StepConvention::FullScale);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn defaults_match_board_constants() {
        let args = Args::parse_from(["voltmeter-emulator"]);
        let config = args.config();

        assert_eq!(config.divider_r1_kohm, R1_DIVIDER_KOHM);
        assert_eq!(config.divider_r2_kohm, R2_DIVIDER_KOHM);
        assert_eq!(config.clock_divider, 64);
        assert_eq!(config.offset_mode, OffsetMode::Disabled);
    }
}
