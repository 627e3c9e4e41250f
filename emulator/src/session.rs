use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use voltmeter_core::config::VoltmeterConfig;
use voltmeter_core::console::{self, ConsoleCommand, MAX_LINE_LEN};
use voltmeter_core::converter::{
    OffsetMode, Reading, ReadingKind, RoundingMode, StepConvention, VoltageConverter,
};
use voltmeter_core::sampler::Channel;
use voltmeter_core::telemetry::{ReadingRecord, ReadingRecorder, TelemetryInstant};

use crate::platform::SimulatedAdc;

/// Host instant adapted to the shared telemetry trait.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct HostInstant(Instant);

impl HostInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }
}

impl TelemetryInstant for HostInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }
}

/// Runs console commands against a simulated converter.
pub struct Session {
    converter: VoltageConverter<SimulatedAdc>,
    config: VoltmeterConfig,
    history: ReadingRecorder<HostInstant>,
    transcript: Option<TranscriptLogger>,
    started_at: Instant,
}

impl Session {
    /// Builds and initializes the converter. No transcript is written.
    pub fn new(adc: SimulatedAdc, config: VoltmeterConfig) -> Self {
        let mut converter = VoltageConverter::new(adc, &config);
        converter.initialize();

        Self {
            converter,
            config,
            history: ReadingRecorder::new(),
            transcript: None,
            started_at: Instant::now(),
        }
    }

    /// Same as [`Session::new`], also logging every exchange to `path`.
    pub fn with_transcript(
        adc: SimulatedAdc,
        config: VoltmeterConfig,
        path: &Path,
        header: &str,
    ) -> io::Result<Self> {
        let mut session = Self::new(adc, config);
        session.transcript = Some(TranscriptLogger::new(path, header)?);
        Ok(session)
    }

    pub fn adc(&self) -> &SimulatedAdc {
        self.converter.sampler().platform()
    }

    pub fn adc_mut(&mut self) -> &mut SimulatedAdc {
        self.converter.sampler_mut().platform_mut()
    }

    pub fn history(&self) -> &ReadingRecorder<HostInstant> {
        &self.history
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.log(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = if trimmed.len() > MAX_LINE_LEN {
            vec![format!("ERR line longer than {MAX_LINE_LEN} bytes")]
        } else {
            match console::parse(trimmed) {
                Ok(command) => self.execute(command),
                Err(err) => vec![format!("ERR {err}")],
            }
        };

        for response in &lines {
            self.log(elapsed, TranscriptRole::Emulator, response)?;
        }
        Ok(lines)
    }

    fn execute(&mut self, command: ConsoleCommand<'_>) -> Vec<String> {
        log::debug!("session: executing `{}`", command.keyword());
        match command {
            ConsoleCommand::Raw { channel } => {
                let reading = self.take_reading(channel, ReadingKind::Raw);
                vec![format!(
                    "raw ch{} code={} ({}-bit)",
                    reading.channel, reading.code, reading.resolution_bits
                )]
            }
            ConsoleCommand::Oversample {
                channel,
                extra_bits,
            } => self.oversample(channel, extra_bits),
            ConsoleCommand::Volts {
                channel,
                oversampled,
            } => {
                let kind = if oversampled {
                    ReadingKind::Oversampled
                } else {
                    ReadingKind::Raw
                };
                let reading = self.take_reading(channel, kind);
                vec![format!(
                    "volts ch{} {:.3} V (code={}, {}-bit {})",
                    reading.channel,
                    reading.volts,
                    reading.code,
                    reading.resolution_bits,
                    reading.kind.label()
                )]
            }
            ConsoleCommand::Config => self.describe_config(),
            ConsoleCommand::History => self.describe_history(),
            ConsoleCommand::Help { topic } => match console::help_text(topic) {
                Some(text) => vec![text.to_string()],
                None => vec![format!("ERR unknown help topic `{}`", topic.unwrap_or(""))],
            },
        }
    }

    fn take_reading(&mut self, channel: Option<Channel>, kind: ReadingKind) -> Reading {
        let channel = channel.unwrap_or(self.converter.default_channel());
        let ratio = self.converter.default_ratio();
        let reading = self.converter.read(channel, kind, ratio);
        self.history.record(&reading, HostInstant::now());
        reading
    }

    fn oversample(&mut self, channel: Option<Channel>, extra_bits: Option<u8>) -> Vec<String> {
        let channel = channel.unwrap_or(self.converter.default_channel());
        let before = self.adc().conversions();
        let sampler = self.converter.sampler_mut();
        let requested = extra_bits.unwrap_or(sampler.config().extra_bits.get());
        let code = sampler.read_oversampled(channel, requested);
        let conversions = self.adc().conversions() - before;

        vec![format!(
            "oversample ch{channel} bits={requested} code={code} conversions={conversions}"
        )]
    }

    fn describe_config(&self) -> Vec<String> {
        let config = &self.config;
        let sampler = self.converter.sampler().config();
        let scaling = self.converter.scaling();
        let mut lines = vec![
            format!(
                "reference {:.3} V ({})",
                config.reference_voltage, sampler.reference
            ),
            format!(
                "clock divider /{} (ADPS={:03b})",
                sampler.clock_divider.factor(),
                sampler.clock_divider.prescaler_bits()
            ),
            format!(
                "extra bits {} ({} conversions)",
                sampler.extra_bits.get(),
                sampler.extra_bits.sample_count()
            ),
            format!(
                "divider {:.2}k/{:.2}k ratio={:.5}",
                config.divider_r1_kohm,
                config.divider_r2_kohm,
                self.converter.default_ratio().get()
            ),
            format!(
                "step {} rounding={} offset={}",
                match scaling.convention {
                    StepConvention::FullScaleMinusOne => "vref/(2^n-1)",
                    StepConvention::FullScale => "vref/2^n",
                },
                match scaling.rounding {
                    RoundingMode::Truncate => "truncate",
                    RoundingMode::HalfLsb => "half-lsb",
                },
                match scaling.offset_mode {
                    OffsetMode::Disabled => "off".to_string(),
                    OffsetMode::Subtract => format!(
                        "-{:.3}/-{:.3} V",
                        scaling.base_offset, scaling.oversampled_offset
                    ),
                }
            ),
            format!("channel {}", config.channel),
        ];
        if sampler.divider_fell_back() {
            lines.push(format!(
                "note: divider {} unsupported, fell back to /{}",
                sampler.requested_divider,
                sampler.clock_divider.factor()
            ));
        }
        if !sampler.settling_time.is_zero() {
            lines.push(format!(
                "settling {} us",
                sampler.settling_time.as_micros()
            ));
        }
        lines
    }

    fn describe_history(&self) -> Vec<String> {
        if self.history.is_empty() {
            return vec!["history empty".to_string()];
        }

        self.history.oldest_first().map(describe_record).collect()
    }

    fn log(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(elapsed, role, line),
            None => Ok(()),
        }
    }
}

fn describe_record(record: &ReadingRecord<HostInstant>) -> String {
    let delta = record
        .elapsed_since_previous
        .map(|elapsed| format!(" Δ={}ms", elapsed.as_millis()))
        .unwrap_or_default();
    format!(
        "#{} {} ch{} code={} {}mV{}",
        record.id,
        record.kind.label(),
        record.channel,
        record.code,
        record.millivolts(),
        delta
    )
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(header)?;
        Ok(logger)
    }

    fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.writer, "# {header}")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::BenchSetup;

    fn session(input_volts: f32, config: VoltmeterConfig) -> Session {
        let setup = BenchSetup {
            reference_voltage: config.reference_voltage,
            divider_ratio: config.divider_ratio().get(),
            noise_lsb: 0.0,
            seed: 1,
        };
        let mut adc = SimulatedAdc::new(setup);
        adc.set_input(config.channel, input_volts);
        Session::new(adc, config)
    }

    fn bench_config() -> VoltmeterConfig {
        VoltmeterConfig::DEFAULT.with_reference_voltage(3.3)
    }

    #[test]
    fn initializes_converter_on_creation() {
        let session = session(12.0, bench_config());
        assert_eq!(
            session.adc().reference(),
            Some(voltmeter_core::sampler::ReferenceMode::External)
        );
        assert_eq!(
            session.adc().clock_divider(),
            Some(voltmeter_core::sampler::ClockDivider::Div64)
        );
    }

    #[test]
    fn volts_reports_bench_input() {
        let mut session = session(21.87, bench_config());
        let lines = session.handle_command("volts").unwrap();

        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("volts ch0 21.8"), "{}", lines[0]);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn oversample_counts_conversions() {
        let mut session = session(12.0, bench_config());
        let lines = session.handle_command("oversample bits=2").unwrap();
        assert!(lines[0].ends_with("conversions=16"), "{}", lines[0]);

        let lines = session.handle_command("oversample 0 bits=9").unwrap();
        assert!(lines[0].contains("bits=9"), "{}", lines[0]);
        assert!(lines[0].ends_with("conversions=4096"), "{}", lines[0]);
    }

    #[test]
    fn raw_reads_two_conversions() {
        let mut session = session(12.0, bench_config());
        let before = session.adc().conversions();
        let lines = session.handle_command("raw").unwrap();

        assert!(lines[0].starts_with("raw ch0 code="), "{}", lines[0]);
        assert_eq!(session.adc().conversions() - before, 2);
    }

    #[test]
    fn history_lists_readings_oldest_first() {
        let mut session = session(5.0, bench_config());
        assert_eq!(
            session.handle_command("history").unwrap(),
            vec!["history empty".to_string()]
        );

        session.handle_command("raw").unwrap();
        session.handle_command("volts os").unwrap();
        let lines = session.handle_command("history").unwrap();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("#0 raw"), "{}", lines[0]);
        assert!(lines[1].starts_with("#1 oversampled"), "{}", lines[1]);
    }

    #[test]
    fn config_reports_fallback_divider() {
        let config = bench_config().with_clock_divider(100);
        let mut session = session(0.0, config);
        let lines = session.handle_command("config").unwrap();

        assert!(lines.iter().any(|line| line == "clock divider /128 (ADPS=111)"));
        assert!(lines.iter().any(|line| line.starts_with("note: divider 100")));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let mut session = session(0.0, bench_config());
        let lines = session.handle_command("volts fast").unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERR syntax error"), "{}", lines[0]);

        let lines = session.handle_command("help reboot").unwrap();
        assert_eq!(lines, vec!["ERR unknown help topic `reboot`".to_string()]);
    }

    #[test]
    fn blank_lines_produce_no_output() {
        let mut session = session(0.0, bench_config());
        assert!(session.handle_command("   ").unwrap().is_empty());
    }
}
