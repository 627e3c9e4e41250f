//! Converter settings the sampler writes once during initialization.

use core::fmt;

use crate::config::{BASE_RESOLUTION_BITS, INTERNAL_REFERENCE_LEVELS, MAX_EXTRA_BITS};

/// Tolerance used when matching a configured reference voltage against the
/// internal reference levels.
const REFERENCE_MATCH_TOLERANCE: f32 = 1.0e-3;

/// Voltage reference source feeding the converter.
///
/// Selecting [`ReferenceMode::Internal`] while a voltage above the internal
/// level is applied to the reference pin damages the MCU. Nothing in software
/// can detect that wiring, so the board configuration must guarantee it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReferenceMode {
    /// Supply rail (AVCC) used as reference.
    Default,
    /// On-chip bandgap reference (1.10 V or 2.56 V depending on the part).
    Internal,
    /// Voltage applied to the AREF pin.
    External,
}

impl ReferenceMode {
    /// Derives the reference mode from the configured reference voltage.
    ///
    /// Voltages matching one of [`INTERNAL_REFERENCE_LEVELS`] select the
    /// internal reference; everything else is treated as an external AREF.
    #[must_use]
    pub fn for_voltage(volts: f32) -> Self {
        let internal = INTERNAL_REFERENCE_LEVELS.iter().any(|level| {
            let delta = volts - level;
            delta < REFERENCE_MATCH_TOLERANCE && delta > -REFERENCE_MATCH_TOLERANCE
        });

        if internal {
            ReferenceMode::Internal
        } else {
            ReferenceMode::External
        }
    }

    /// Short label used in logs and console output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ReferenceMode::Default => "default",
            ReferenceMode::Internal => "internal",
            ReferenceMode::External => "external",
        }
    }
}

impl fmt::Display for ReferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// ADC clock prescaler. Larger factors convert slower and more accurately.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockDivider {
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl ClockDivider {
    /// Every supported divider, fastest first.
    pub const ALL: [ClockDivider; 7] = [
        ClockDivider::Div2,
        ClockDivider::Div4,
        ClockDivider::Div8,
        ClockDivider::Div16,
        ClockDivider::Div32,
        ClockDivider::Div64,
        ClockDivider::Div128,
    ];

    /// Slowest divider, used whenever the requested factor is not supported.
    pub const FALLBACK: ClockDivider = ClockDivider::Div128;

    /// Maps a division factor onto a supported divider.
    ///
    /// Anything other than 2, 4, 8, 16, 32, 64 or 128 resolves to
    /// [`ClockDivider::FALLBACK`], favouring accuracy over speed.
    #[must_use]
    pub const fn from_factor(factor: u16) -> Self {
        match Self::try_from_factor(factor) {
            Some(divider) => divider,
            None => Self::FALLBACK,
        }
    }

    /// Exact lookup without the fallback.
    #[must_use]
    pub const fn try_from_factor(factor: u16) -> Option<Self> {
        match factor {
            2 => Some(ClockDivider::Div2),
            4 => Some(ClockDivider::Div4),
            8 => Some(ClockDivider::Div8),
            16 => Some(ClockDivider::Div16),
            32 => Some(ClockDivider::Div32),
            64 => Some(ClockDivider::Div64),
            128 => Some(ClockDivider::Div128),
            _ => None,
        }
    }

    /// Division factor applied to the system clock.
    #[must_use]
    pub const fn factor(self) -> u16 {
        match self {
            ClockDivider::Div2 => 2,
            ClockDivider::Div4 => 4,
            ClockDivider::Div8 => 8,
            ClockDivider::Div16 => 16,
            ClockDivider::Div32 => 32,
            ClockDivider::Div64 => 64,
            ClockDivider::Div128 => 128,
        }
    }

    /// ADPS2..ADPS0 prescaler select bits for an AVR-style ADCSRA register.
    ///
    /// `000` also divides by two on that hardware; `001` is the canonical
    /// pattern written for [`ClockDivider::Div2`].
    #[must_use]
    pub const fn prescaler_bits(self) -> u8 {
        match self {
            ClockDivider::Div2 => 0b001,
            ClockDivider::Div4 => 0b010,
            ClockDivider::Div8 => 0b011,
            ClockDivider::Div16 => 0b100,
            ClockDivider::Div32 => 0b101,
            ClockDivider::Div64 => 0b110,
            ClockDivider::Div128 => 0b111,
        }
    }
}

/// Additional resolution requested from oversampling, clamped to
/// [`MAX_EXTRA_BITS`] so the `u32` accumulator can never overflow.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExtraBits(u8);

impl ExtraBits {
    /// No oversampling.
    pub const NONE: ExtraBits = ExtraBits(0);
    /// Deepest supported oversampling (4096 conversions).
    pub const MAX: ExtraBits = ExtraBits(MAX_EXTRA_BITS);

    /// Saturates `bits` at [`MAX_EXTRA_BITS`].
    #[must_use]
    pub const fn clamped(bits: u8) -> Self {
        if bits > MAX_EXTRA_BITS {
            ExtraBits(MAX_EXTRA_BITS)
        } else {
            ExtraBits(bits)
        }
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Number of conversions issued for one oversampled reading (`4^bits`).
    #[must_use]
    pub const fn sample_count(self) -> u32 {
        1 << (self.0 << 1)
    }

    /// Resolution of the decimated code.
    #[must_use]
    pub const fn resolution_bits(self) -> u8 {
        BASE_RESOLUTION_BITS + self.0
    }

    /// Largest code representable at the boosted resolution.
    #[must_use]
    pub const fn max_code(self) -> u32 {
        (1 << self.resolution_bits()) - 1
    }
}
