use embassy_time::{Duration, Ticker};
use voltmeter_core::converter::{ReadingKind, VoltageConverter};

use crate::hw::adc::G0AdcPlatform;
use crate::status;
use crate::telemetry::{self, FirmwareInstant, FirmwareRecorder};

/// Interval between reading pairs.
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(500);

/// A status summary is logged after this many readings.
const SUMMARY_EVERY: u32 = 40;

#[embassy_executor::task]
pub async fn run(
    mut converter: VoltageConverter<G0AdcPlatform<'static>>,
    mut recorder: FirmwareRecorder,
) -> ! {
    let channel = converter.default_channel();
    let ratio = converter.default_ratio();
    let mut ticker = Ticker::every(SAMPLE_PERIOD);

    loop {
        for kind in [ReadingKind::Raw, ReadingKind::Oversampled] {
            let reading = converter.read(channel, kind, ratio);
            telemetry::record_reading(&mut recorder, &reading, FirmwareInstant::now());
            if let Some(record) = recorder.latest() {
                status::record_millivolts(kind, record.millivolts());
            }
        }

        let taken = status::readings_taken();
        if taken % SUMMARY_EVERY == 0 {
            defmt::info!(
                "status: raw={}mV os={}mV readings={}",
                status::millivolts(ReadingKind::Raw),
                status::millivolts(ReadingKind::Oversampled),
                taken
            );
        }

        ticker.next().await;
    }
}
