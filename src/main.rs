use std::io::{self, BufRead, Read};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use tracing::debug;

use claude_statusline::cli::Cli;
use claude_statusline::render::{self, Theme};
use claude_statusline::stats::{self, SessionStats};
use claude_statusline::status::StatusDocument;
use claude_statusline::util;

/// A status document is one line; anything past this is not ours to parse.
const MAX_INPUT_BYTES: u64 = 1024 * 1024;

const EXIT_READ_FAILURE: u8 = 3;
const EXIT_INVALID_JSON: u8 = 4;

fn main() -> ExitCode {
    util::setup_tracing();
    let cli = Cli::parse();
    ExitCode::from(run(&cli))
}

fn run(cli: &Cli) -> u8 {
    let mut line = String::new();
    match io::stdin().lock().take(MAX_INPUT_BYTES).read_line(&mut line) {
        Ok(0) => return 0,
        Ok(_) => {}
        Err(err) => {
            debug!(%err, "failed to read stdin");
            return EXIT_READ_FAILURE;
        }
    }
    let payload = line.trim();
    if payload.is_empty() {
        return 0;
    }

    let root: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            debug!(%err, "status document did not parse");
            eprintln!("error: invalid JSON");
            return EXIT_INVALID_JSON;
        }
    };
    let doc = StatusDocument::from_value(&root);

    let use_color = !cli.no_color && std::env::var_os("NO_COLOR").is_none();
    let theme = Theme::select(use_color);

    println!(
        "{}",
        render::status_line(theme, &doc, cli.verbose, cli.simple)
    );
    if cli.simple {
        return 0;
    }

    let request = cli.stats_request();
    let stats = match &doc.transcript_path {
        Some(path) if request.any() && !path.is_empty() => {
            let session_id = doc.session_id.as_deref().unwrap_or("");
            stats::collect(session_id, &doc.project_dir, Path::new(path), request)
        }
        _ => SessionStats::default(),
    };

    if cli.show_context_tokens() {
        if let Some(context) = stats.context_tokens {
            println!(
                "{}",
                render::context_line(theme, cli.verbose, context, cli.clamping)
            );
        }
    }
    if cli.show_session_tokens() {
        if let Some(tokens) = stats.session_tokens {
            if let Some(out) = render::session_line(theme, cli.verbose, tokens.total, cli.clamping)
            {
                println!("{out}");
            }
        }
    }
    if cli.show_cache_efficiency() {
        if let Some(tokens) = stats.session_tokens {
            if let Some(out) = render::cache_efficiency_line(theme, cli.verbose, &tokens) {
                println!("{out}");
            }
        }
    }
    if cli.show_api_time_ratio() {
        println!(
            "{}",
            render::api_time_line(theme, cli.verbose, doc.api_duration_ms, doc.duration_ms)
        );
    }
    if cli.show_lines_ratio() {
        if let Some(out) =
            render::lines_ratio_line(theme, cli.verbose, doc.lines_added, doc.lines_removed)
        {
            println!("{out}");
        }
    }
    if cli.show_input_output_ratio() {
        if let Some(tokens) = stats.session_tokens {
            if let Some(out) = render::input_output_line(theme, cli.verbose, &tokens) {
                println!("{out}");
            }
        }
    }
    if cli.show_cache_write_read_ratio() {
        if let Some(tokens) = stats.session_tokens {
            if let Some(out) = render::cache_write_read_line(theme, cli.verbose, &tokens) {
                println!("{out}");
            }
        }
    }
    if cli.show_token_breakdown() {
        if let Some(tokens) = stats.session_tokens {
            if let Some(out) = render::token_breakdown_line(theme, cli.verbose, &tokens) {
                println!("{out}");
            }
        }
    }

    0
}
