//! # Expression Command
//!
//! The handler installed as `expression`, `p` and `zig print`.
//!
//! The command line follows LLDB's raw-command convention: options come first
//! and are ended by `--`; without a `--` the whole line is the expression, so
//! `p -x` still negates `x`. A gdb-style `/x` prefix is accepted as well.
//!
//! Supported options:
//!
//! | option | effect |
//! |--------|--------|
//! | `-f F`, `--format F`, `-G F` | display integers in format `F` |
//! | `-t US`, `--timeout US` | evaluation timeout in microseconds |
//!
//! Any other option is reported as ignored and the expression still runs.

use std::fmt::{self, Write};
use std::time::Duration;

use tracing::debug;

use crate::error::{ZdbError, ZdbResult};
use crate::host::{CommandHandler, HostFrame, HostValue};
use crate::rewriter::{self, EVALUATION_TIMEOUT};

/// Short options of LLDB's `expression` that take an argument.
const VALUE_OPTIONS: [char; 13] = ['a', 'd', 'D', 'f', 'G', 'i', 'j', 'l', 'P', 't', 'u', 'X', 'Z'];

/// Write `error: <message>` and report the command as failed.
///
/// A closed output stream is logged; the command has failed either way.
pub fn report_error(out: &mut dyn Write, message: fmt::Arguments<'_>) -> bool
{
    if writeln!(out, "error: {message}").is_err() {
        debug!(%message, "command output closed");
    }
    false
}

/// Display format for integer results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat
{
    Hex,
    Decimal,
    Unsigned,
    Octal,
    Binary,
    Char,
}

impl ValueFormat
{
    /// Parse an LLDB format name (`x`, `hex`, ...) or gdb format letter.
    pub fn parse(name: &str) -> Option<Self>
    {
        let format = match name {
            "x" | "X" | "z" | "hex" => Self::Hex,
            "d" | "i" | "decimal" => Self::Decimal,
            "u" | "unsigned" | "unsigned decimal" => Self::Unsigned,
            "o" | "octal" => Self::Octal,
            "b" | "t" | "binary" => Self::Binary,
            "c" | "char" | "character" => Self::Char,
            _ => return None,
        };
        Some(format)
    }

    /// `value` in this format, or `None` when it is not an integer.
    pub fn render(self, value: &dyn HostValue) -> Option<String>
    {
        let n = value.value_as_unsigned()?;
        let text = match self {
            Self::Hex => format!("0x{n:x}"),
            Self::Decimal => value.value().filter(|text| !text.is_empty()).unwrap_or_else(|| n.to_string()),
            Self::Unsigned => n.to_string(),
            Self::Octal => format!("0{n:o}"),
            Self::Binary => format!("0b{n:b}"),
            Self::Char => {
                let byte = u8::try_from(n).ok()?;
                format!("'{}'", byte.escape_ascii())
            }
        };
        Some(text)
    }
}

/// A parsed `expression` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine<'a>
{
    pub format: Option<ValueFormat>,
    pub timeout: Option<Duration>,
    /// Options accepted but not acted on, as typed
    pub ignored: Vec<String>,
    pub expression: &'a str,
}

impl<'a> CommandLine<'a>
{
    /// Split `command` into options and expression.
    ///
    /// ## Errors
    ///
    /// `InvalidCommand` for an unknown format, a malformed timeout or an option
    /// missing its argument.
    pub fn parse(command: &'a str) -> ZdbResult<Self>
    {
        let command = command.trim();
        let mut line = Self {
            format: None,
            timeout: None,
            ignored: Vec::new(),
            expression: command,
        };

        if let Some(rest) = command.strip_prefix('/') {
            let (letters, expression) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            line.format = Some(gdb_format(letters)?);
            line.expression = expression.trim();
            return Ok(line);
        }

        if !command.starts_with('-') {
            return Ok(line);
        }
        let Some((options, expression)) = split_terminator(command) else {
            return Ok(line);
        };
        line.expression = expression.trim();

        let mut tokens = options.split_whitespace();
        while let Some(token) = tokens.next() {
            let (name, inline) = split_option(token);
            let takes_value = match name {
                OptionName::Short(c) => VALUE_OPTIONS.contains(&c),
                OptionName::Long("format" | "gdb-format" | "timeout") => true,
                OptionName::Long(_) => tokens.clone().next().is_some_and(|next| !next.starts_with('-')),
            };
            let value = match inline {
                Some(value) => Some(value),
                None if takes_value => Some(
                    tokens
                        .next()
                        .ok_or_else(|| ZdbError::InvalidCommand(format!("option '{token}' needs an argument")))?,
                ),
                None => None,
            };

            match (name, value) {
                (OptionName::Short('f') | OptionName::Long("format"), Some(value)) => {
                    line.format = Some(
                        ValueFormat::parse(value)
                            .ok_or_else(|| ZdbError::InvalidCommand(format!("invalid format '{value}'")))?,
                    );
                }
                (OptionName::Short('G') | OptionName::Long("gdb-format"), Some(value)) => {
                    line.format = Some(gdb_format(value)?);
                }
                (OptionName::Short('t') | OptionName::Long("timeout"), Some(value)) => {
                    let micros: u64 = value
                        .parse()
                        .map_err(|_| ZdbError::InvalidCommand(format!("invalid timeout '{value}'")))?;
                    line.timeout = Some(Duration::from_micros(micros));
                }
                (_, Some(value)) if inline.is_none() => line.ignored.push(format!("{token} {value}")),
                _ => line.ignored.push(token.to_string()),
            }
        }
        Ok(line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionName<'a>
{
    Short(char),
    Long(&'a str),
}

/// `-fx` to (`f`, `x`), `--format=x` to (`format`, `x`), `-O` to (`O`, none).
fn split_option(token: &str) -> (OptionName<'_>, Option<&str>)
{
    if let Some(long) = token.strip_prefix("--") {
        return match long.split_once('=') {
            Some((name, value)) => (OptionName::Long(name), Some(value)),
            None => (OptionName::Long(long), None),
        };
    }
    let short = token.trim_start_matches('-');
    let mut chars = short.chars();
    let name = chars.next().unwrap_or('-');
    let rest = chars.as_str();
    (OptionName::Short(name), (!rest.is_empty()).then_some(rest))
}

/// Options and expression around the first standalone `--`.
fn split_terminator(command: &str) -> Option<(&str, &str)>
{
    let mut at = 0;
    for token in command.split(' ') {
        if token == "--" {
            return Some((&command[..at], &command[at + 2..]));
        }
        at += token.len() + 1;
    }
    None
}

/// The format letter of a gdb `/FMT` spec; counts and sizes are skipped.
fn gdb_format(letters: &str) -> ZdbResult<ValueFormat>
{
    letters
        .chars()
        .filter(|c| !c.is_ascii_digit() && !matches!(c, 'h' | 'w' | 'g'))
        .last()
        .and_then(|c| ValueFormat::parse(c.encode_utf8(&mut [0; 4])))
        .ok_or_else(|| ZdbError::InvalidCommand(format!("invalid format '/{letters}'")))
}

/// Replacement for LLDB's `expression` command.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionCommand
{
    timeout: Duration,
}

impl ExpressionCommand
{
    pub fn new(timeout: Duration) -> Self
    {
        Self { timeout }
    }
}

impl Default for ExpressionCommand
{
    fn default() -> Self
    {
        Self::new(EVALUATION_TIMEOUT)
    }
}

impl CommandHandler for ExpressionCommand
{
    fn execute(&self, frame: Option<&dyn HostFrame>, command: &str, out: &mut dyn Write) -> bool
    {
        let line = match CommandLine::parse(command) {
            Ok(line) => line,
            Err(e) => return report_error(out, format_args!("{e}")),
        };
        for option in &line.ignored {
            if writeln!(out, "warning: option '{option}' is not supported and was ignored").is_err() {
                return false;
            }
        }
        if line.expression.is_empty() {
            return report_error(out, format_args!("expected an expression"));
        }
        let Some(frame) = frame else {
            return report_error(out, format_args!("no stopped process to evaluate in"));
        };

        let timeout = line.timeout.unwrap_or(self.timeout);
        match rewriter::evaluate(frame, line.expression, timeout) {
            Ok(value) => {
                let text = line
                    .format
                    .and_then(|format| format.render(value.as_ref()))
                    .or_else(|| value.summary().filter(|text| !text.is_empty()))
                    .or_else(|| value.value())
                    .unwrap_or_default();
                let written = match value.type_name() {
                    Some(type_name) => writeln!(out, "({type_name}) {text}"),
                    None => writeln!(out, "{text}"),
                };
                written.is_ok()
            }
            Err(e) => report_error(out, format_args!("{e}")),
        }
    }
}
