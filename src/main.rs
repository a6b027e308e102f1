//! adsift - line-oriented driver around the detection library.
//!
//! Reads one message per line from stdin and prints one JSON verdict per line.

use adsift::{Config, SpamDetectionService};
use std::borrow::Cow;
use std::io::{self, BufRead, BufWriter, Write};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout carries verdicts, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = std::env::var("ADSIFT_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(io::stderr)
            .init();
    }

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load_validated(&path).map_err(|e| {
            error!(path = %path, error = %e, "Failed to load config");
            e
        })?,
        None => {
            info!("No config file given; using built-in defaults");
            Config::default()
        }
    };

    let service = SpamDetectionService::new(config);
    let sensitivity = service.default_sensitivity();

    let stdin = io::stdin();
    let mut out = BufWriter::new(io::stdout().lock());
    let mut classified = 0usize;
    let mut flagged = 0usize;

    // Lines are read as bytes; invalid UTF-8 is replaced, not fatal
    for (number, line) in stdin.lock().split(b'\n').enumerate() {
        let bytes = line?;
        let text = decode_line(&bytes);
        if matches!(text, Cow::Owned(_)) {
            warn!(line = number + 1, "Input line is not valid UTF-8; classifying a lossy decoding");
        }
        let result = service.classify_message(&text, 0, 0, sensitivity);
        classified += 1;
        if result.is_spam {
            flagged += 1;
        }
        serde_json::to_writer(&mut out, &result)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    info!(classified, flagged, "Input exhausted");
    Ok(())
}

/// One input line without its `\r`, with invalid UTF-8 replaced.
fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(raw.strip_suffix(b"\r").unwrap_or(raw))
}
