mod common;

use common::{MockPlatform, PlatformCall};
use voltmeter_core::config::VoltmeterConfig;
use voltmeter_core::sampler::{AdcSampler, ClockDivider, SamplerConfig};

fn initialized_divider(factor: u16) -> ClockDivider {
    let config = VoltmeterConfig::DEFAULT.with_clock_divider(factor);
    let mut sampler = AdcSampler::new(MockPlatform::steady(0), SamplerConfig::from_config(&config));
    sampler.initialize();

    sampler
        .platform()
        .calls
        .iter()
        .find_map(|call| match call {
            PlatformCall::SetClockDivider(divider) => Some(*divider),
            _ => None,
        })
        .expect("initialize did not program the divider")
}

#[test]
fn supported_factors_program_matching_bits() {
    let table = [
        (2, 0b001),
        (4, 0b010),
        (8, 0b011),
        (16, 0b100),
        (32, 0b101),
        (64, 0b110),
        (128, 0b111),
    ];

    for (factor, bits) in table {
        let divider = initialized_divider(factor);
        assert_eq!(divider.factor(), factor);
        assert_eq!(divider.prescaler_bits(), bits, "factor {factor}");
    }
}

#[test]
fn unsupported_factors_program_div128() {
    for factor in [0, 1, 3, 12, 100, 256, 1024] {
        let divider = initialized_divider(factor);
        assert_eq!(divider, ClockDivider::Div128, "factor {factor}");
        assert_eq!(divider.prescaler_bits(), 0b111);
    }
}

#[test]
fn default_board_divider_is_64() {
    assert_eq!(
        initialized_divider(VoltmeterConfig::DEFAULT.clock_divider),
        ClockDivider::Div64
    );
}
