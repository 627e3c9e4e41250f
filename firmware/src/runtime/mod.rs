use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use voltmeter_core::config::VoltmeterConfig;
use voltmeter_core::converter::VoltageConverter;

use crate::hw::adc::G0AdcPlatform;
use crate::telemetry::FirmwareRecorder;

mod voltmeter_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Board configuration flashed into this build.
const BOARD_CONFIG: VoltmeterConfig = VoltmeterConfig::DEFAULT;

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals { ADC1, PA0, PA1, .. } = hal::init(config);

    BOARD_CONFIG
        .validate()
        .expect("voltmeter board configuration");

    let platform = G0AdcPlatform::new(Adc::new(ADC1), [PA0.degrade_adc(), PA1.degrade_adc()]);
    let mut converter = VoltageConverter::new(platform, &BOARD_CONFIG);
    converter.initialize();

    spawner
        .spawn(voltmeter_task::run(converter, FirmwareRecorder::new()))
        .expect("failed to spawn voltmeter task");

    core::future::pending::<()>().await;
}
