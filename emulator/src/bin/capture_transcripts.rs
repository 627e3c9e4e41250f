use std::path::Path;

use anyhow::Result;
use voltmeter_core::config::VoltmeterConfig;
use voltmeter_core::converter::OffsetMode;

#[allow(dead_code)]
#[path = "../platform.rs"]
mod platform;
#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use platform::{BenchSetup, SimulatedAdc};
use session::Session;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Bench,
    Noisy,
    Calibrated,
}

impl TranscriptProfile {
    pub const ALL: [TranscriptProfile; 3] = [
        TranscriptProfile::Bench,
        TranscriptProfile::Noisy,
        TranscriptProfile::Calibrated,
    ];

    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Bench => "evidence/voltmeter-bench.log",
            TranscriptProfile::Noisy => "evidence/voltmeter-noisy.log",
            TranscriptProfile::Calibrated => "evidence/voltmeter-calibrated.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Bench => "Voltmeter emulator bench transcript",
            TranscriptProfile::Noisy => "Voltmeter emulator noisy-input transcript",
            TranscriptProfile::Calibrated => "Voltmeter emulator calibrated transcript",
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    for profile in TranscriptProfile::ALL {
        record_profile(profile)?;
        log::info!("wrote {}", profile.log_path());
    }
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> Result<()> {
    let config = match profile {
        TranscriptProfile::Bench | TranscriptProfile::Noisy => VoltmeterConfig::DEFAULT,
        TranscriptProfile::Calibrated => VoltmeterConfig::DEFAULT.with_offset_mode(
            OffsetMode::Subtract,
            VoltmeterConfig::DEFAULT.calibration_offset,
            VoltmeterConfig::DEFAULT.oversampled_calibration_offset,
        ),
    };
    let noise_lsb = match profile {
        TranscriptProfile::Noisy => 3.0,
        TranscriptProfile::Bench | TranscriptProfile::Calibrated => 0.0,
    };

    let mut adc = SimulatedAdc::new(BenchSetup {
        reference_voltage: config.reference_voltage,
        divider_ratio: config.divider_ratio().get(),
        noise_lsb,
        seed: 0x5EED,
    });
    adc.set_input(config.channel, 13.8);

    let mut session = Session::with_transcript(
        adc,
        config,
        Path::new(profile.log_path()),
        profile.header(),
    )?;

    match profile {
        TranscriptProfile::Bench => record_bench(&mut session),
        TranscriptProfile::Noisy => record_noisy(&mut session),
        TranscriptProfile::Calibrated => record_calibrated(&mut session),
    }
}

fn record_bench(session: &mut Session) -> Result<()> {
    session.handle_command("config")?;
    session.handle_command("raw")?;
    session.handle_command("oversample")?;
    session.handle_command("volts")?;
    session.handle_command("volts os")?;

    session.adc_mut().set_input(0, 0.0);
    session.handle_command("volts")?;
    session.adc_mut().set_input(0, 100.0);
    session.handle_command("volts")?;
    session.handle_command("history")?;
    Ok(())
}

fn record_noisy(session: &mut Session) -> Result<()> {
    for _ in 0..4 {
        session.handle_command("volts")?;
    }
    for bits in [0, 2, 4, 6, 9] {
        session.handle_command(&format!("oversample bits={bits}"))?;
    }
    for _ in 0..4 {
        session.handle_command("volts os")?;
    }
    session.handle_command("history")?;
    Ok(())
}

fn record_calibrated(session: &mut Session) -> Result<()> {
    session.handle_command("config")?;
    session.adc_mut().set_input(0, 0.0);
    session.handle_command("volts")?;
    session.handle_command("volts os")?;
    session.adc_mut().set_input(0, 13.8);
    session.handle_command("volts")?;
    session.handle_command("volts os")?;
    session.handle_command("help volts")?;
    session.handle_command("bogus")?;
    Ok(())
}
