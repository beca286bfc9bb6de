//! Token extraction from session transcripts.
//!
//! A transcript is newline-delimited JSON; each line may carry a
//! `message.usage` object. Two independent statistics are derived from it:
//! cumulative session totals across every line, and the context size of the
//! most recent assistant turn. Scanning is tolerant: lines that fail to
//! parse, are not valid UTF-8, or lack the expected shape are skipped.
//! Numeric payloads that fail conversion abort the whole extraction, since
//! they indicate a corrupt source rather than a benign gap.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, StatusError};
use crate::numeric;

/// Cumulative token counters for one session.
///
/// `total` is only meaningful after [`TokenCounts::derive_total`] succeeds;
/// it is never computed with unchecked addition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input: u64,
    pub output: u64,
    pub cache_creation: u64,
    pub cache_read: u64,
    pub total: u64,
}

impl TokenCounts {
    /// Sum the four categories into `total` with overflow checking.
    pub fn derive_total(&mut self) -> Result<()> {
        let mut sum = numeric::checked_add_u64(self.input, self.output)?;
        sum = numeric::checked_add_u64(sum, self.cache_creation)?;
        sum = numeric::checked_add_u64(sum, self.cache_read)?;
        self.total = sum;
        Ok(())
    }
}

/// Both naming conventions for the cache categories, checked in priority
/// order: the raw provider naming first, then the legacy aggregated naming.
/// First found wins, even if a line carries both.
fn cache_field<'a>(usage: &'a Value, raw: &str, legacy: &str) -> Option<&'a Value> {
    usage.get(raw).or_else(|| usage.get(legacy))
}

fn accumulate(field: Option<&Value>, slot: &mut u64) -> Result<()> {
    let Some(number) = field.and_then(Value::as_f64) else {
        return Ok(());
    };
    let value = numeric::f64_to_u64(number)?;
    *slot = numeric::checked_add_u64(*slot, value)?;
    Ok(())
}

/// Fold one `message.usage` object into the running counts.
fn extract_usage(usage: &Value, counts: &mut TokenCounts) -> Result<()> {
    if !usage.is_object() {
        return Ok(());
    }
    accumulate(usage.get("input_tokens"), &mut counts.input)?;
    accumulate(usage.get("output_tokens"), &mut counts.output)?;
    accumulate(
        cache_field(usage, "cache_creation_input_tokens", "cache_creation_tokens"),
        &mut counts.cache_creation,
    )?;
    accumulate(
        cache_field(usage, "cache_read_input_tokens", "cache_read_tokens"),
        &mut counts.cache_read,
    )?;
    Ok(())
}

/// Context size of a single assistant turn: input plus both cache
/// categories. Output tokens are excluded; context reflects what was sent,
/// not what was generated. Conversion failures on individual fields are
/// ignored here, matching the tolerant context scan.
fn context_from_usage(usage: &Value) -> u64 {
    let mut total = 0u64;
    let fields = [
        usage.get("input_tokens"),
        cache_field(usage, "cache_creation_input_tokens", "cache_creation_tokens"),
        cache_field(usage, "cache_read_input_tokens", "cache_read_tokens"),
    ];
    for field in fields {
        let Some(number) = field.and_then(Value::as_f64) else {
            continue;
        };
        if let Ok(value) = numeric::f64_to_u64(number) {
            if let Ok(sum) = numeric::checked_add_u64(total, value) {
                total = sum;
            }
        }
    }
    total
}

#[derive(Debug, Default)]
struct ScanOutput {
    session: Option<TokenCounts>,
    context: Option<u64>,
}

/// One traversal of the transcript, filling whichever outputs were
/// requested. Both public entry points go through here, so the single-pass
/// combination is identical to running the scans independently.
fn scan(path: &Path, want_session: bool, want_context: bool) -> Result<ScanOutput> {
    let file =
        File::open(path).map_err(|_| StatusError::NotFound(path.to_path_buf()))?;
    let mut reader = BufReader::new(file);

    let mut counts = TokenCounts::default();
    let mut context: Option<u64> = None;
    let mut line_count = 0usize;

    // Raw byte lines: a line that is not valid UTF-8 is skipped like any
    // other unparseable line instead of failing the read.
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        line_count += 1;
        let Ok(text) = std::str::from_utf8(&raw) else {
            continue;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parsed = match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => value,
            Err(_) => continue,
        };
        let Some(message) = parsed.get("message").filter(|m| m.is_object()) else {
            continue;
        };
        let usage = message.get("usage");

        if want_session {
            if let Some(usage) = usage {
                extract_usage(usage, &mut counts)?;
            }
        }

        if want_context
            && message.get("role").and_then(Value::as_str) == Some("assistant")
        {
            if let Some(usage) = usage.filter(|u| u.is_object()) {
                context = Some(context_from_usage(usage));
            }
        }
    }

    let mut output = ScanOutput::default();
    if want_session {
        counts.derive_total()?;
        debug!(lines = line_count, total = counts.total, "scanned transcript");
        output.session = Some(counts);
    }
    if want_context {
        output.context = Some(context.unwrap_or(0));
    }
    Ok(output)
}

/// Accumulate session totals across every usage-bearing line.
pub fn parse_session_tokens(path: &Path) -> Result<TokenCounts> {
    let output = scan(path, true, false)?;
    Ok(output.session.unwrap_or_default())
}

/// Context size of the most recent assistant turn, 0 when the transcript
/// contains no assistant message.
pub fn count_context_tokens(path: &Path) -> Result<u64> {
    let output = scan(path, false, true)?;
    Ok(output.context.unwrap_or(0))
}

/// Compute session totals and context size in one file traversal.
pub fn parse_tokens_single_pass(path: &Path) -> Result<(TokenCounts, u64)> {
    let output = scan(path, true, true)?;
    Ok((
        output.session.unwrap_or_default(),
        output.context.unwrap_or(0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_transcript(content: &str) -> (TempDir, std::path::PathBuf) {
        let tmp = TempDir::new().expect("temp dir");
        let path = tmp.path().join("transcript.jsonl");
        std::fs::write(&path, content).expect("write transcript");
        (tmp, path)
    }

    #[test]
    fn accumulates_session_totals() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"role":"user","usage":{"input_tokens":10,"output_tokens":1}}}
{"message":{"role":"assistant","usage":{"input_tokens":100,"output_tokens":50,"cache_creation_input_tokens":30,"cache_read_input_tokens":20}}}"#,
        );

        let counts = parse_session_tokens(&path).expect("parse");
        assert_eq!(counts.input, 110);
        assert_eq!(counts.output, 51);
        assert_eq!(counts.cache_creation, 30);
        assert_eq!(counts.cache_read, 20);
        assert_eq!(counts.total, 211);
    }

    #[test]
    fn tolerates_garbage_between_valid_lines() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"usage":{"input_tokens":100}}}
{not json at all
{"message":{"usage":{"input_tokens":50}}}"#,
        );

        let counts = parse_session_tokens(&path).expect("parse");
        assert_eq!(counts.input, 150);
        assert_eq!(counts.total, 150);
    }

    #[test]
    fn tolerates_invalid_utf8_lines() {
        let tmp = TempDir::new().expect("temp dir");
        let path = tmp.path().join("transcript.jsonl");
        let mut content = Vec::new();
        content.extend_from_slice(br#"{"message":{"usage":{"input_tokens":100}}}"#);
        content.extend_from_slice(b"\n\xFF\xFE\x80\n");
        content.extend_from_slice(br#"{"message":{"usage":{"input_tokens":50}}}"#);
        std::fs::write(&path, content).expect("write transcript");

        let counts = parse_session_tokens(&path).expect("parse");
        assert_eq!(counts.input, 150);
        assert_eq!(counts.total, 150);
    }

    #[test]
    fn skips_lines_without_usage_shape() {
        let (_tmp, path) = write_transcript(
            r#"{"type":"summary"}
{"message":"not an object"}
{"message":{"usage":{"input_tokens":7}}}
"#,
        );

        let counts = parse_session_tokens(&path).expect("parse");
        assert_eq!(counts.total, 7);
    }

    #[test]
    fn legacy_cache_field_names_are_accepted() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"usage":{"cache_creation_tokens":40,"cache_read_tokens":60}}}"#,
        );

        let counts = parse_session_tokens(&path).expect("parse");
        assert_eq!(counts.cache_creation, 40);
        assert_eq!(counts.cache_read, 60);
    }

    #[test]
    fn raw_naming_wins_when_both_conventions_present() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"usage":{"cache_creation_input_tokens":5,"cache_creation_tokens":500}}}"#,
        );

        let counts = parse_session_tokens(&path).expect("parse");
        assert_eq!(counts.cache_creation, 5);
    }

    #[test]
    fn negative_count_aborts_extraction() {
        let (_tmp, path) =
            write_transcript(r#"{"message":{"usage":{"input_tokens":-5}}}"#);

        assert!(matches!(
            parse_session_tokens(&path),
            Err(StatusError::InvalidConversion)
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().expect("temp dir");
        let path = tmp.path().join("absent.jsonl");
        assert!(matches!(
            parse_session_tokens(&path),
            Err(StatusError::NotFound(_))
        ));
    }

    #[test]
    fn context_uses_last_assistant_line() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"role":"user","usage":{"input_tokens":9}}}
{"message":{"role":"assistant","usage":{"input_tokens":200,"cache_creation_tokens":50,"cache_read_tokens":20}}}
{"message":{"role":"user","usage":{"input_tokens":9}}}
{"message":{"role":"assistant","usage":{"input_tokens":300}}}"#,
        );

        let context = count_context_tokens(&path).expect("context");
        assert_eq!(context, 300);
    }

    #[test]
    fn context_excludes_output_tokens() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"role":"assistant","usage":{"input_tokens":200,"output_tokens":9999,"cache_creation_input_tokens":50,"cache_read_input_tokens":20}}}"#,
        );

        let context = count_context_tokens(&path).expect("context");
        assert_eq!(context, 270);
    }

    #[test]
    fn context_is_zero_without_assistant_message() {
        let (_tmp, path) =
            write_transcript(r#"{"message":{"role":"user","usage":{"input_tokens":10}}}"#);

        assert_eq!(count_context_tokens(&path).expect("context"), 0);
    }

    #[test]
    fn single_pass_matches_independent_scans() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"role":"user","usage":{"input_tokens":10,"output_tokens":2}}}
garbage line
{"message":{"role":"assistant","usage":{"input_tokens":120,"output_tokens":80,"cache_read_input_tokens":40}}}
{"message":{"role":"assistant","usage":{"input_tokens":150,"cache_creation_tokens":10}}}"#,
        );

        let (session, context) = parse_tokens_single_pass(&path).expect("single pass");
        assert_eq!(session, parse_session_tokens(&path).expect("session"));
        assert_eq!(context, count_context_tokens(&path).expect("context"));
        assert_eq!(context, 160);
    }

    #[test]
    fn derive_total_reports_overflow() {
        let mut counts = TokenCounts {
            input: u64::MAX - 100,
            output: 200,
            ..TokenCounts::default()
        };
        assert!(matches!(counts.derive_total(), Err(StatusError::Overflow)));

        let mut counts = TokenCounts {
            input: 1000,
            output: 500,
            cache_creation: 2000,
            cache_read: 300,
            total: 0,
        };
        counts.derive_total().expect("total");
        assert_eq!(counts.total, 3800);
    }
}
