//! Probe report parsing and unit normalization
//!
//! Each probe tool has its own report grammar. A measurement is only accepted
//! when the report structure is positively matched; the throughput token found
//! at the tool's value position must then be a number in kilobits per second.
//! Failure markers printed by the tools are checked first and always win over
//! any numeric-looking text elsewhere in the output.

use crate::error::ParseError;
use crate::models::{ParsedThroughput, ProbeToolKind};
use regex::Regex;
use std::sync::OnceLock;

/// Longest excerpt of tool output carried in a parse error
const MAX_EXCERPT_LEN: usize = 200;

/// iperf3 `-f k` summary line for the receiving side, e.g.
/// `[  5]   0.00-5.04   sec  54.8 MBytes  91234 Kbits/sec      receiver`
fn iperf_receiver_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\[\s*(?P<id>\d+|SUM)\]\s+\S+\s+sec\s+\S+\s+\S*Bytes\s+(?P<value>\S+)\s+Kbits/sec\b.*\breceiver$",
        )
        .expect("static iperf3 grammar")
    })
}

/// netperf `-P 0` result row: socket sizes, elapsed time, throughput
fn netperf_result_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d+\s+\d+\s+\d+\s+\d+(?:\.\d+)?\s+(?P<value>\S+)$").expect("static netperf grammar")
    })
}

fn numeric_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<sign>-?)(?P<whole>\d+)(?:\.(?P<frac>\d+))?$").expect("static number grammar"))
}

/// Substring that marks a failed run in the tool's own diagnostics
pub fn failure_marker(tool: ProbeToolKind) -> &'static str {
    match tool {
        ProbeToolKind::Iperf3 => "error",
        // "are you sure there is a netserver listening on ..."
        ProbeToolKind::Netperf => "sure",
    }
}

/// Extract the throughput from a complete probe report
pub fn parse(raw_text: &str, tool: ProbeToolKind) -> Result<ParsedThroughput, ParseError> {
    let marker = failure_marker(tool);
    if let Some(line) = raw_text.lines().find(|line| line.contains(marker)) {
        return Err(ParseError::ProbeReported { excerpt: excerpt(line) });
    }

    let token = match tool {
        ProbeToolKind::Iperf3 => iperf_token(raw_text),
        ProbeToolKind::Netperf => netperf_token(raw_text),
    }
    .ok_or(ParseError::MissingReport)?;

    parse_token(token)
}

/// The `[SUM]` receiver line when parallel streams were used, else the last
/// per-stream receiver line
fn iperf_token(raw_text: &str) -> Option<&str> {
    let mut last_stream = None;
    let mut last_sum = None;

    for line in raw_text.lines().map(str::trim) {
        if let Some(caps) = iperf_receiver_line().captures(line) {
            let value = caps.name("value").map(|m| m.as_str());
            match caps.name("id").map(|m| m.as_str()) {
                Some("SUM") => last_sum = value,
                _ => last_stream = value,
            }
        }
    }

    last_sum.or(last_stream)
}

fn netperf_token(raw_text: &str) -> Option<&str> {
    raw_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| netperf_result_line().captures(line))
        .last()
        .and_then(|caps| caps.name("value"))
        .map(|m| m.as_str())
}

/// Parse a kilobits-per-second token.
///
/// Integers are taken as-is; a decimal keeps its first three fractional
/// digits. Anything else is a format error, never a zero reading.
pub fn parse_token(token: &str) -> Result<ParsedThroughput, ParseError> {
    let token = token.trim();
    let caps = numeric_token()
        .captures(token)
        .ok_or_else(|| ParseError::InvalidNumber { token: token.to_string() })?;

    let negative = caps.name("sign").is_some_and(|m| !m.as_str().is_empty());
    let whole: i64 = caps["whole"]
        .parse()
        .map_err(|_| ParseError::Overflow { token: token.to_string() })?;

    let thousandths = caps
        .name("frac")
        .map(|m| {
            let digits: String = m.as_str().chars().chain("000".chars()).take(3).collect();
            digits.parse::<i16>().unwrap_or(0)
        })
        .unwrap_or(0);

    let (kilobits_per_second, thousandths) = if negative {
        (-whole, -thousandths)
    } else {
        (whole, thousandths)
    };

    let parsed = ParsedThroughput { kilobits_per_second, thousandths };
    checked_bits(parsed).ok_or_else(|| ParseError::Overflow { token: token.to_string() })?;
    Ok(parsed)
}

/// Convert kilobits per second into bits per second
pub fn normalize(parsed: ParsedThroughput) -> i64 {
    // parse_token only hands out values that fit
    checked_bits(parsed).unwrap_or(i64::MAX)
}

fn checked_bits(parsed: ParsedThroughput) -> Option<i64> {
    parsed
        .kilobits_per_second
        .checked_mul(1000)?
        .checked_add(i64::from(parsed.thousandths))
}

/// Parse a report and normalize it in one step
pub fn bits_per_second(raw_text: &str, tool: ProbeToolKind) -> Result<i64, ParseError> {
    parse(raw_text, tool).map(normalize)
}

fn excerpt(line: &str) -> String {
    let line = line.trim();
    if line.len() <= MAX_EXCERPT_LEN {
        return line.to_string();
    }
    let mut end = MAX_EXCERPT_LEN;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &line[..end])
}
