//! Line grammar for the voltmeter diagnostics console.
//!
//! ```text
//! raw [<channel>]
//! oversample [<channel>] [bits=<0-15>]
//! volts [<channel>] [os]
//! config
//! history
//! help [<topic>]
//! ```
//!
//! Keywords are case-insensitive. Leading and trailing whitespace is ignored;
//! anything else left on the line is a syntax error.

use core::fmt;

use winnow::ascii::{Caseless, dec_uint, multispace0, multispace1};
use winnow::combinator::{alt, eof, opt, preceded, terminated};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_while;

use crate::sampler::Channel;

/// Largest `bits=` value the console accepts. The sampler clamps further.
pub const MAX_CONSOLE_EXTRA_BITS: u8 = 15;

/// Maximum number of bytes accepted on a single console line.
pub const MAX_LINE_LEN: usize = 64;

/// Parsed console command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleCommand<'a> {
    /// Single settled sample at base resolution.
    Raw { channel: Option<Channel> },
    /// Oversampled code; `extra_bits` defaults to the configured depth.
    Oversample {
        channel: Option<Channel>,
        extra_bits: Option<u8>,
    },
    /// Scaled voltage through the configured divider.
    Volts {
        channel: Option<Channel>,
        oversampled: bool,
    },
    /// Print the active configuration.
    Config,
    /// Print recorded readings, oldest first.
    History,
    /// Print help, optionally for one command.
    Help { topic: Option<&'a str> },
}

impl ConsoleCommand<'_> {
    /// Keyword that introduces the command.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            ConsoleCommand::Raw { .. } => "raw",
            ConsoleCommand::Oversample { .. } => "oversample",
            ConsoleCommand::Volts { .. } => "volts",
            ConsoleCommand::Config => "config",
            ConsoleCommand::History => "history",
            ConsoleCommand::Help { .. } => "help",
        }
    }
}

/// Errors returned by [`parse`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleError {
    /// Line held nothing but whitespace.
    Empty,
    /// Parser stopped at byte `offset`.
    Syntax { offset: usize },
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Empty => f.write_str("empty command"),
            ConsoleError::Syntax { offset } => write!(f, "syntax error at column {}", offset + 1),
        }
    }
}

impl core::error::Error for ConsoleError {}

/// Parses one console line.
///
/// # Errors
///
/// Returns [`ConsoleError::Empty`] for blank input and
/// [`ConsoleError::Syntax`] for anything the grammar rejects.
pub fn parse(line: &str) -> Result<ConsoleCommand<'_>, ConsoleError> {
    if line.trim().is_empty() {
        return Err(ConsoleError::Empty);
    }

    command.parse(line).map_err(|error| ConsoleError::Syntax {
        offset: error.offset(),
    })
}

/// One-line usage for `topic`, or the command summary when `topic` is `None`.
///
/// Returns `None` for unknown topics.
#[must_use]
pub fn help_text(topic: Option<&str>) -> Option<&'static str> {
    let Some(topic) = topic else {
        return Some(SUMMARY);
    };

    TOPICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        .map(|(_, text)| *text)
}

const SUMMARY: &str = "commands: raw, oversample, volts, config, history, help [topic]";

const TOPICS: [(&str, &str); 6] = [
    ("raw", "raw [channel]: discard one conversion, print the next code"),
    (
        "oversample",
        "oversample [channel] [bits=N]: sum 4^N conversions, print sum >> N",
    ),
    (
        "volts",
        "volts [channel] [os]: scale a reading through the input divider",
    ),
    ("config", "config: print reference, divider, and scaling settings"),
    ("history", "history: print recorded readings, oldest first"),
    ("help", "help [topic]: print usage"),
];

type PResult<O> = Result<O, ContextError>;

fn command<'a>(input: &mut &'a str) -> PResult<ConsoleCommand<'a>> {
    preceded(
        multispace0,
        terminated(
            alt((raw, oversample, volts, config, history, help)),
            (multispace0, eof),
        ),
    )
    .parse_next(input)
}

fn raw<'a>(input: &mut &'a str) -> PResult<ConsoleCommand<'a>> {
    preceded(Caseless("raw"), channel_arg)
        .map(|channel| ConsoleCommand::Raw { channel })
        .parse_next(input)
}

fn oversample<'a>(input: &mut &'a str) -> PResult<ConsoleCommand<'a>> {
    preceded(Caseless("oversample"), (channel_arg, bits_arg))
        .map(|(channel, extra_bits)| ConsoleCommand::Oversample {
            channel,
            extra_bits,
        })
        .parse_next(input)
}

fn volts<'a>(input: &mut &'a str) -> PResult<ConsoleCommand<'a>> {
    preceded(
        Caseless("volts"),
        (
            channel_arg,
            opt(preceded(multispace1, Caseless("os"))).map(|flag| flag.is_some()),
        ),
    )
    .map(|(channel, oversampled)| ConsoleCommand::Volts {
        channel,
        oversampled,
    })
    .parse_next(input)
}

fn config<'a>(input: &mut &'a str) -> PResult<ConsoleCommand<'a>> {
    Caseless("config").value(ConsoleCommand::Config).parse_next(input)
}

fn history<'a>(input: &mut &'a str) -> PResult<ConsoleCommand<'a>> {
    Caseless("history")
        .value(ConsoleCommand::History)
        .parse_next(input)
}

fn help<'a>(input: &mut &'a str) -> PResult<ConsoleCommand<'a>> {
    preceded(
        Caseless("help"),
        opt(preceded(
            multispace1,
            take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-'),
        )),
    )
    .map(|topic| ConsoleCommand::Help { topic })
    .parse_next(input)
}

fn channel_arg(input: &mut &str) -> PResult<Option<Channel>> {
    opt(preceded(multispace1, dec_uint)).parse_next(input)
}

fn bits_arg(input: &mut &str) -> PResult<Option<u8>> {
    opt(preceded(
        (multispace1, Caseless("bits"), '='),
        dec_uint::<_, u8, _>.verify(|bits: &u8| *bits <= MAX_CONSOLE_EXTRA_BITS),
    ))
    .parse_next(input)
}
