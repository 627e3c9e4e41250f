#![no_std]

// Shared logic for the bench supply voltmeter.
//
// The ADC sampler and voltage converter live here so the STM32 firmware and the
// host emulator run the same oversampling and scaling code. Hardware access is
// reached only through the `sampler::AdcPlatform` trait.

pub(crate) mod fmt;

pub mod config;
pub mod console;
pub mod converter;
pub mod sampler;
pub mod telemetry;
