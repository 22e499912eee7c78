//! SRT caption import.
//!
//! Parses SubRip text into engine [`Interval`]s so a caption file can
//! drive both cutting and timeline alignment. Entries look like:
//!
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:04,000
//! Hello, world!
//! ```
//!
//! Index numbers are ignored; both `,` and `.` millisecond separators and
//! CRLF line endings are accepted. Blocks without a recognizable timing
//! line are skipped, matching how caption tooling tolerates stray text.

use std::path::Path;

use thiserror::Error;

use crate::models::Interval;

/// Errors from SRT import.
#[derive(Error, Debug)]
pub enum SrtError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid timing line {line}: '{content}'")]
    InvalidTiming { line: usize, content: String },
}

/// Parse SRT content into intervals, in file order.
pub fn parse_srt(content: &str) -> Result<Vec<Interval>, SrtError> {
    let content = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut intervals = Vec::new();
    let mut line_offset = 0usize;

    for block in content.split("\n\n") {
        let lines: Vec<&str> = block.lines().collect();
        let trimmed = block.trim();
        if trimmed.is_empty() || lines.len() < 2 {
            line_offset += lines.len() + 1;
            continue;
        }

        let Some((timing_idx, timing_line)) = find_timing_line(&lines) else {
            line_offset += lines.len() + 1;
            continue;
        };

        let (start_secs, end_secs) =
            parse_timing(timing_line).ok_or_else(|| SrtError::InvalidTiming {
                line: line_offset + timing_idx + 1,
                content: timing_line.to_string(),
            })?;

        let text = lines[timing_idx + 1..].join("\n");
        if !text.is_empty() {
            intervals.push(Interval::new(start_secs, end_secs, text));
        }

        line_offset += lines.len() + 1;
    }

    Ok(intervals)
}

/// Read and parse an SRT file.
pub fn load_srt(path: &Path) -> Result<Vec<Interval>, SrtError> {
    let content = std::fs::read_to_string(path).map_err(|e| SrtError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_srt(&content)
}

fn find_timing_line<'a>(lines: &[&'a str]) -> Option<(usize, &'a str)> {
    lines
        .iter()
        .enumerate()
        .find(|(_, line)| line.contains(" --> "))
        .map(|(i, line)| (i, *line))
}

/// Parse `HH:MM:SS,mmm --> HH:MM:SS,mmm` into seconds.
fn parse_timing(line: &str) -> Option<(f64, f64)> {
    let mut parts = line.split(" --> ");
    let start = parse_timestamp(parts.next()?)?;
    let end = parse_timestamp(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((start, end))
}

/// Parse `HH:MM:SS,mmm` (or `.mmm`) into seconds.
fn parse_timestamp(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', ".");
    let fields: Vec<&str> = s.split(':').collect();
    if fields.len() != 3 {
        return None;
    }

    let hours: f64 = fields[0].parse().ok()?;
    let minutes: f64 = fields[1].parse().ok()?;
    let seconds: f64 = fields[2].parse().ok()?;
    if hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }

    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
