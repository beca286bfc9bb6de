use clap::Parser;

use crate::stats::StatsRequest;

/// Status line generator for Claude Code. Reads one session JSON document
/// from stdin and prints the status line plus any requested metric lines.
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "claude-statusline", version, about)]
pub struct Cli {
    /// Show the session token breakdown (input/output/cache write/cache read)
    #[arg(short = 'd', long = "token-breakdown")]
    pub token_breakdown: bool,

    /// Show context window usage parsed from the transcript
    #[arg(short = 'c', long = "context-tokens")]
    pub context_tokens: bool,

    /// Show cumulative session token usage
    #[arg(short = 't', long = "session-tokens")]
    pub session_tokens: bool,

    /// Show cache efficiency (reads as a share of all cache traffic)
    #[arg(short = 'e', long = "cache-efficiency")]
    pub cache_efficiency: bool,

    /// Show API time as a share of total session time
    #[arg(short = 'p', long = "api-time-ratio")]
    pub api_time_ratio: bool,

    /// Show the added/removed lines ratio
    #[arg(short = 'l', long = "lines-ratio")]
    pub lines_ratio: bool,

    /// Show the input/output token ratio
    #[arg(short = 'i', long = "input-output-ratio")]
    pub input_output_ratio: bool,

    /// Show the cache write/read token ratio
    #[arg(short = 'w', long = "cache-write-read-ratio")]
    pub cache_write_read_ratio: bool,

    /// Clamp percentages at 100%
    #[arg(short = 'C', long = "clamping")]
    pub clamping: bool,

    /// Enable every metric line
    #[arg(short = 'a', long = "all")]
    pub all: bool,

    /// Disable colored output (NO_COLOR is honored as well)
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Verbose labels and percentages on every metric line
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Hide the token breakdown even when --all is set
    #[arg(short = 'H', long = "hide-breakdown")]
    pub hide_breakdown: bool,

    /// Minimal status line: model, version, cost, directory
    #[arg(short = 's', long = "simple")]
    pub simple: bool,
}

impl Cli {
    pub fn show_token_breakdown(&self) -> bool {
        (self.token_breakdown || self.all) && !self.hide_breakdown
    }

    pub fn show_context_tokens(&self) -> bool {
        self.context_tokens || self.all
    }

    pub fn show_session_tokens(&self) -> bool {
        self.session_tokens || self.all
    }

    pub fn show_cache_efficiency(&self) -> bool {
        self.cache_efficiency || self.all
    }

    pub fn show_api_time_ratio(&self) -> bool {
        self.api_time_ratio || self.all
    }

    pub fn show_lines_ratio(&self) -> bool {
        self.lines_ratio || self.all
    }

    pub fn show_input_output_ratio(&self) -> bool {
        self.input_output_ratio || self.all
    }

    pub fn show_cache_write_read_ratio(&self) -> bool {
        self.cache_write_read_ratio || self.all
    }

    /// Which transcript-derived statistics the selected flags require.
    pub fn stats_request(&self) -> StatsRequest {
        StatsRequest {
            session: self.show_token_breakdown()
                || self.show_session_tokens()
                || self.show_cache_efficiency()
                || self.show_input_output_ratio()
                || self.show_cache_write_read_ratio(),
            context: self.show_context_tokens(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_request_nothing() {
        let cli = Cli::parse_from(["claude-statusline"]);
        let request = cli.stats_request();
        assert!(!request.session);
        assert!(!request.context);
        assert!(!request.any());
    }

    #[test]
    fn all_enables_every_section() {
        let cli = Cli::parse_from(["claude-statusline", "-a"]);
        assert!(cli.show_token_breakdown());
        assert!(cli.show_context_tokens());
        assert!(cli.show_session_tokens());
        assert!(cli.show_cache_efficiency());
        assert!(cli.show_api_time_ratio());
        assert!(cli.show_lines_ratio());
        assert!(cli.show_input_output_ratio());
        assert!(cli.show_cache_write_read_ratio());
        let request = cli.stats_request();
        assert!(request.session && request.context);
    }

    #[test]
    fn hide_breakdown_wins_over_all() {
        let cli = Cli::parse_from(["claude-statusline", "-a", "-H"]);
        assert!(!cli.show_token_breakdown());
        // Other session-backed sections still need the scan.
        assert!(cli.stats_request().session);
    }

    #[test]
    fn context_only_requests_context_scan() {
        let cli = Cli::parse_from(["claude-statusline", "-c"]);
        let request = cli.stats_request();
        assert!(request.context);
        assert!(!request.session);
    }

    #[test]
    fn short_flags_parse() {
        let cli = Cli::parse_from(["claude-statusline", "-d", "-t", "-e", "-C", "-v", "-s"]);
        assert!(cli.token_breakdown);
        assert!(cli.session_tokens);
        assert!(cli.cache_efficiency);
        assert!(cli.clamping);
        assert!(cli.verbose);
        assert!(cli.simple);
    }
}
