//! Status line and metric rendering.
//!
//! A theme maps UI elements to ANSI 256-color escapes (Monokai palette) or
//! to empty strings for no-color output. Every function builds a `String`;
//! sections whose counters are all zero render nothing, keeping the status
//! line quiet when there is nothing to say.

use crate::numeric;
use crate::status::StatusDocument;
use crate::transcript::TokenCounts;
use crate::util::{basename, calculate_percentage, format_tokens};

/// Claude's standard 200k context window.
pub const DEFAULT_TOKEN_LIMIT: u64 = 200_000;
const PROGRESS_BAR_WIDTH: u32 = 20;
const BAR_FILLED: &str = "\u{2588}";
const BAR_EMPTY: &str = "\u{2591}";

const ANSI_RED: &str = "\x1b[1m\x1b[38;5;197m";
const ANSI_RED_MUTED: &str = "\x1b[1m\x1b[38;5;161m";
const ANSI_GREEN: &str = "\x1b[1m\x1b[38;5;148m";
const ANSI_CYAN: &str = "\x1b[1m\x1b[38;5;81m";
const ANSI_DARK_CYAN: &str = "\x1b[1m\x1b[38;5;68m";
const ANSI_YELLOW: &str = "\x1b[1m\x1b[38;5;186m";
const ANSI_DARK_YELLOW: &str = "\x1b[1m\x1b[38;5;179m";
const ANSI_PURPLE: &str = "\x1b[1m\x1b[38;5;141m";
const ANSI_LIGHT_PURPLE: &str = "\x1b[1m\x1b[38;5;104m";
const ANSI_ORANGE: &str = "\x1b[1m\x1b[38;5;208m";
const ANSI_ORCHID: &str = "\x1b[1m\x1b[38;5;176m";
const ANSI_ORCHID_SOFT: &str = "\x1b[1m\x1b[38;5;139m";
const ANSI_LAVENDER: &str = "\x1b[1m\x1b[38;5;189m";
const ANSI_STEEL_BLUE: &str = "\x1b[1m\x1b[38;5;60m";
const ANSI_CTX_EMPTY: &str = "\x1b[1m\x1b[38;5;233m";
const ANSI_RESET: &str = "\x1b[0m";

/// Semantic color assignments for the status display.
pub struct Theme {
    pub label: &'static str,
    pub model_name: &'static str,
    pub model_id: &'static str,
    pub version: &'static str,
    pub dir: &'static str,
    pub cost: &'static str,
    pub time_total: &'static str,
    pub time_api: &'static str,
    pub lines_added: &'static str,
    pub lines_removed: &'static str,
    pub badge_under: &'static str,
    pub badge_over: &'static str,
    pub token_input: &'static str,
    pub token_output: &'static str,
    pub token_cache_create: &'static str,
    pub token_cache_read: &'static str,
    pub progress_empty: &'static str,
    pub progress_ctx: &'static str,
    pub progress_ses: &'static str,
    pub progress_cache: &'static str,
    pub progress_api_time: &'static str,
    pub reset: &'static str,
}

static THEME_COLOR: Theme = Theme {
    label: ANSI_RESET,
    model_name: ANSI_PURPLE,
    model_id: ANSI_LIGHT_PURPLE,
    version: ANSI_ORANGE,
    dir: ANSI_CYAN,
    cost: ANSI_YELLOW,
    time_total: ANSI_ORCHID,
    time_api: ANSI_LAVENDER,
    lines_added: ANSI_GREEN,
    lines_removed: ANSI_RED_MUTED,
    badge_under: ANSI_GREEN,
    badge_over: ANSI_RED,
    token_input: ANSI_CYAN,
    token_output: ANSI_DARK_CYAN,
    token_cache_create: ANSI_YELLOW,
    token_cache_read: ANSI_DARK_YELLOW,
    progress_empty: ANSI_CTX_EMPTY,
    progress_ctx: ANSI_STEEL_BLUE,
    progress_ses: ANSI_LIGHT_PURPLE,
    progress_cache: ANSI_ORCHID_SOFT,
    progress_api_time: ANSI_STEEL_BLUE,
    reset: ANSI_RESET,
};

static THEME_NONE: Theme = Theme {
    label: "",
    model_name: "",
    model_id: "",
    version: "",
    dir: "",
    cost: "",
    time_total: "",
    time_api: "",
    lines_added: "",
    lines_removed: "",
    badge_under: "",
    badge_over: "",
    token_input: "",
    token_output: "",
    token_cache_create: "",
    token_cache_read: "",
    progress_empty: "",
    progress_ctx: "",
    progress_ses: "",
    progress_cache: "",
    progress_api_time: "",
    reset: "",
};

impl Theme {
    pub fn select(use_color: bool) -> &'static Theme {
        if use_color { &THEME_COLOR } else { &THEME_NONE }
    }
}

fn progress_bar(theme: &Theme, percentage: u32, clamp: bool, bar_color: &str) -> String {
    let display_pct = if clamp && percentage > 100 {
        100
    } else {
        percentage
    };
    let filled = (u64::from(display_pct) * u64::from(PROGRESS_BAR_WIDTH) / 100)
        .min(u64::from(PROGRESS_BAR_WIDTH)) as u32;

    let mut out = format!("{}[{}", theme.reset, bar_color);
    for i in 0..PROGRESS_BAR_WIDTH {
        if i < filled {
            out.push_str(BAR_FILLED);
        } else {
            out.push_str(theme.progress_empty);
            out.push_str(BAR_EMPTY);
        }
    }
    out.push_str(theme.reset);
    out.push(']');
    out
}

/// Two-segment bar splitting the width proportionally between two counters.
fn split_bar(theme: &Theme, left_width: u32, left_color: &str, right_color: &str) -> String {
    let left_width = left_width.min(PROGRESS_BAR_WIDTH);
    let right_width = PROGRESS_BAR_WIDTH - left_width;
    let mut out = format!("{}[{}", theme.reset, left_color);
    for _ in 0..left_width {
        out.push_str(BAR_FILLED);
    }
    out.push_str(right_color);
    for _ in 0..right_width {
        out.push_str(BAR_FILLED);
    }
    out.push_str(theme.reset);
    out.push(']');
    out
}

/// Left share of the bar and left percentage for a two-counter split, both
/// through checked multiplication.
fn split_shares(left: u64, total: u64) -> (u32, u32) {
    if total == 0 {
        return (0, 0);
    }
    let pct = match numeric::checked_mul_u64(left, 100) {
        Ok(product) => ((product / total) as u32).min(100),
        Err(_) => 0,
    };
    let width = match numeric::checked_mul_u64(left, u64::from(PROGRESS_BAR_WIDTH)) {
        Ok(product) => ((product / total) as u32).min(PROGRESS_BAR_WIDTH),
        Err(_) => 0,
    };
    (pct, width)
}

pub fn status_line(theme: &Theme, doc: &StatusDocument, verbose: bool, simple: bool) -> String {
    let cost = doc.cost_usd.filter(|c| c.is_finite()).unwrap_or(0.0);
    let cwd = basename(&doc.cwd);
    let project = basename(&doc.project_dir);
    let t = theme;

    if simple {
        return if verbose {
            format!(
                "{r}Model: {mn}{model}{r} ({mi}{id}{r}) | Version: {vc}{version}{r} | Cost: {cc}${cost:.4}{r} | Directory: {dc}{cwd}{r}",
                r = t.reset,
                mn = t.model_name,
                model = doc.model_name,
                mi = t.model_id,
                id = doc.model_id,
                vc = t.version,
                version = doc.version,
                cc = t.cost,
                dc = t.dir,
            )
        } else {
            format!(
                "{r}{mn}{model}{r} ({mi}{id}{r}) | {vc}{version}{r} | {cc}${cost:.4}{r} | {dc}{cwd}{r}",
                r = t.reset,
                mn = t.model_name,
                model = doc.model_name,
                mi = t.model_id,
                id = doc.model_id,
                vc = t.version,
                version = doc.version,
                cc = t.cost,
                dc = t.dir,
            )
        };
    }

    let dur_s = f64::from(doc.duration_ms) / 1000.0;
    let api_s = f64::from(doc.api_duration_ms) / 1000.0;
    let (badge, badge_color) = if doc.exceeds_200k_tokens {
        (">200k", t.badge_over)
    } else {
        ("<200k", t.badge_under)
    };

    // Show the project dir separately only when it differs from cwd.
    let project_part = if cwd == project {
        String::new()
    } else if verbose {
        format!("Project: {}{}{} | ", t.dir, project, t.reset)
    } else {
        format!("{}{}{} | ", t.dir, project, t.reset)
    };

    if verbose {
        format!(
            "{r}Model: {mn}{model}{r} ({mi}{id}{r}) | Version: {vc}{version}{r} | Directory: {dc}{cwd}{r} | {proj}Cost: {cc}${cost:.4}{r} Tokens: {bc}{badge}{r} | Total: {tt}{dur_s:.1}s{r} API: {ta}{api_s:.1}s{r} | Lines: {la}+{added}{r}/{lr}-{removed}{r}",
            r = t.reset,
            mn = t.model_name,
            model = doc.model_name,
            mi = t.model_id,
            id = doc.model_id,
            vc = t.version,
            version = doc.version,
            dc = t.dir,
            proj = project_part,
            cc = t.cost,
            bc = badge_color,
            tt = t.time_total,
            ta = t.time_api,
            la = t.lines_added,
            added = doc.lines_added,
            lr = t.lines_removed,
            removed = doc.lines_removed,
        )
    } else {
        format!(
            "{r}{mn}{model}{r} ({mi}{id}{r}) | {vc}{version}{r} | {dc}{cwd}{r} | {proj}{cc}${cost:.4}{r} {bc}{badge}{r} | {tt}{dur_s:.1}s{r} {ta}{api_s:.1}s{r} | {la}+{added}{r}/{lr}-{removed}{r}",
            r = t.reset,
            mn = t.model_name,
            model = doc.model_name,
            mi = t.model_id,
            id = doc.model_id,
            vc = t.version,
            version = doc.version,
            dc = t.dir,
            proj = project_part,
            cc = t.cost,
            bc = badge_color,
            tt = t.time_total,
            ta = t.time_api,
            la = t.lines_added,
            added = doc.lines_added,
            lr = t.lines_removed,
            removed = doc.lines_removed,
        )
    }
}

pub fn context_line(theme: &Theme, verbose: bool, context_tokens: u64, clamp: bool) -> String {
    let percentage = calculate_percentage(context_tokens, DEFAULT_TOKEN_LIMIT, clamp);
    let bar = progress_bar(theme, percentage, clamp, theme.progress_ctx);
    let used = format_tokens(context_tokens);
    let limit = format_tokens(DEFAULT_TOKEN_LIMIT);
    if verbose {
        format!(
            "{}Context   {bar} {percentage:>7}% ({used} used / {limit} limit)",
            theme.reset
        )
    } else {
        format!("{}Ctx{} {bar} {used}", theme.label, theme.reset)
    }
}

pub fn session_line(
    theme: &Theme,
    verbose: bool,
    total_tokens: u64,
    clamp: bool,
) -> Option<String> {
    if total_tokens == 0 {
        return None;
    }
    let percentage = calculate_percentage(total_tokens, DEFAULT_TOKEN_LIMIT, clamp);
    let bar = progress_bar(theme, percentage, clamp, theme.progress_ses);
    let used = format_tokens(total_tokens);
    let limit = format_tokens(DEFAULT_TOKEN_LIMIT);
    Some(if verbose {
        format!(
            "{}Session   {bar} {percentage:>7}% ({used} used / {limit} limit)",
            theme.reset
        )
    } else {
        format!("{}Ses{} {bar} {used}", theme.label, theme.reset)
    })
}

/// Cache efficiency: reads as a share of all cache traffic.
pub fn cache_efficiency_line(theme: &Theme, verbose: bool, tokens: &TokenCounts) -> Option<String> {
    let cache_total =
        numeric::checked_add_u64(tokens.cache_read, tokens.cache_creation).unwrap_or(u64::MAX);
    if cache_total == 0 {
        return None;
    }
    let percentage = match numeric::checked_mul_u64(tokens.cache_read, 100) {
        Ok(product) => u32::try_from(product / cache_total).unwrap_or(u32::MAX),
        Err(_) => 0,
    };
    let bar = progress_bar(theme, percentage, false, theme.progress_cache);
    let read = format_tokens(tokens.cache_read);
    let total = format_tokens(cache_total);
    Some(if verbose {
        format!(
            "{}Cache     {bar} {percentage:>7}% ({read} read / {total} total)",
            theme.reset
        )
    } else {
        format!("{}Cef{} {bar} {read}/{total}", theme.label, theme.reset)
    })
}

pub fn api_time_line(theme: &Theme, verbose: bool, api_ms: u32, total_ms: u32) -> String {
    let percentage = if total_ms > 0 {
        ((u64::from(api_ms) * 100 / u64::from(total_ms)) as u32).min(100)
    } else {
        0
    };
    let bar = progress_bar(theme, percentage, false, theme.progress_api_time);
    let api_s = f64::from(api_ms) / 1000.0;
    let total_s = f64::from(total_ms) / 1000.0;
    if verbose {
        format!(
            "{}API Time  {bar} {percentage:>7}% ({api_s:.1}s API / {total_s:.1}s total)",
            theme.reset
        )
    } else {
        format!(
            "{}API{} {bar} {api_s:.1}s/{total_s:.1}s",
            theme.label, theme.reset
        )
    }
}

pub fn lines_ratio_line(theme: &Theme, verbose: bool, added: u32, removed: u32) -> Option<String> {
    let total = numeric::checked_add_u32(added, removed).unwrap_or(u32::MAX);
    if total == 0 {
        return None;
    }
    let (added_pct, added_width) = split_shares(u64::from(added), u64::from(total));
    let removed_pct = 100 - added_pct;
    let bar = split_bar(theme, added_width, theme.lines_added, theme.lines_removed);
    Some(if verbose {
        format!(
            "{}Lines     {bar} {added_pct:>3}%/{removed_pct}% ({added} added / {removed} removed)",
            theme.reset
        )
    } else {
        format!(
            "{}Lin{} {bar} {la}+{added}{r}/{lr}-{removed}{r}",
            theme.label,
            theme.reset,
            la = theme.lines_added,
            r = theme.reset,
            lr = theme.lines_removed,
        )
    })
}

pub fn input_output_line(theme: &Theme, verbose: bool, tokens: &TokenCounts) -> Option<String> {
    let total = numeric::checked_add_u64(tokens.input, tokens.output).unwrap_or(u64::MAX);
    if total == 0 {
        return None;
    }
    let (input_pct, input_width) = split_shares(tokens.input, total);
    let output_pct = 100 - input_pct;
    let bar = split_bar(theme, input_width, theme.token_input, theme.token_output);
    let input = format_tokens(tokens.input);
    let output = format_tokens(tokens.output);
    Some(if verbose {
        format!(
            "{}Tokens IO {bar} {input_pct:>3}%/{output_pct}% ({input} input / {output} output)",
            theme.reset
        )
    } else {
        format!("{}TIO{} {bar} {input}/{output}", theme.label, theme.reset)
    })
}

pub fn cache_write_read_line(theme: &Theme, verbose: bool, tokens: &TokenCounts) -> Option<String> {
    let total =
        numeric::checked_add_u64(tokens.cache_creation, tokens.cache_read).unwrap_or(u64::MAX);
    if total == 0 {
        return None;
    }
    let (write_pct, write_width) = split_shares(tokens.cache_creation, total);
    let read_pct = 100 - write_pct;
    let bar = split_bar(
        theme,
        write_width,
        theme.token_cache_create,
        theme.token_cache_read,
    );
    let write = format_tokens(tokens.cache_creation);
    let read = format_tokens(tokens.cache_read);
    Some(if verbose {
        format!(
            "{}Cache RW  {bar} {write_pct:>3}%/{read_pct}% ({write} write / {read} read)",
            theme.reset
        )
    } else {
        format!("{}CWR{} {bar} {write}/{read}", theme.label, theme.reset)
    })
}

pub fn token_breakdown_line(theme: &Theme, verbose: bool, tokens: &TokenCounts) -> Option<String> {
    if tokens.input == 0
        && tokens.output == 0
        && tokens.cache_creation == 0
        && tokens.cache_read == 0
    {
        return None;
    }
    let t = theme;
    let input = format_tokens(tokens.input);
    let output = format_tokens(tokens.output);
    let write = format_tokens(tokens.cache_creation);
    let read = format_tokens(tokens.cache_read);
    Some(if verbose {
        format!(
            "{r}Input: {ti}{input}{r}  Output: {to}{output}{r}  Cache Write: {tc}{write}{r}  Cache Read: {tr}{read}{r}",
            r = t.reset,
            ti = t.token_input,
            to = t.token_output,
            tc = t.token_cache_create,
            tr = t.token_cache_read,
        )
    } else {
        format!(
            "{r}In: {ti}{input}{r}  Out: {to}{output}{r}  CaWr: {tc}{write}{r}  CaRd: {tr}{read}{r}",
            r = t.reset,
            ti = t.token_input,
            to = t.token_output,
            tc = t.token_cache_create,
            tr = t.token_cache_read,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> &'static Theme {
        Theme::select(false)
    }

    fn sample_counts() -> TokenCounts {
        TokenCounts {
            input: 1_000,
            output: 3_000,
            cache_creation: 500,
            cache_read: 1_500,
            total: 6_000,
        }
    }

    #[test]
    fn status_line_compact_merges_matching_dirs() {
        let doc = StatusDocument {
            model_name: "Claude 3.5 Sonnet".to_string(),
            model_id: "claude-3-5-sonnet".to_string(),
            cwd: "/home/user/repo".to_string(),
            project_dir: "/home/user/repo".to_string(),
            version: "4.5.0".to_string(),
            cost_usd: Some(0.1234),
            duration_ms: 12_000,
            api_duration_ms: 3_000,
            lines_added: 10,
            lines_removed: 4,
            ..StatusDocument::default()
        };
        let line = status_line(plain(), &doc, false, false);
        assert_eq!(
            line,
            "Claude 3.5 Sonnet (claude-3-5-sonnet) | 4.5.0 | repo | $0.1234 <200k | 12.0s 3.0s | +10/-4"
        );
    }

    #[test]
    fn status_line_extends_when_project_differs() {
        let doc = StatusDocument {
            cwd: "/home/user/repo/sub".to_string(),
            project_dir: "/home/user/repo".to_string(),
            ..StatusDocument::default()
        };
        let line = status_line(plain(), &doc, false, false);
        assert!(line.contains("sub | repo |"));
    }

    #[test]
    fn simple_status_line_has_four_fields() {
        let doc = StatusDocument {
            model_name: "Sonnet".to_string(),
            model_id: "id".to_string(),
            version: "1.0".to_string(),
            cwd: "/r".to_string(),
            ..StatusDocument::default()
        };
        assert_eq!(
            status_line(plain(), &doc, false, true),
            "Sonnet (id) | 1.0 | $0.0000 | r"
        );
    }

    #[test]
    fn over_200k_badge_flips() {
        let doc = StatusDocument {
            exceeds_200k_tokens: true,
            ..StatusDocument::default()
        };
        assert!(status_line(plain(), &doc, false, false).contains(">200k"));
    }

    #[test]
    fn context_line_shows_percentage_of_200k() {
        let line = context_line(plain(), true, 50_000, false);
        assert!(line.contains("25%"), "{line}");
        assert!(line.contains("50.0K used / 200.0K limit"), "{line}");
    }

    #[test]
    fn zero_sections_are_suppressed() {
        let zero = TokenCounts::default();
        assert!(session_line(plain(), false, 0, false).is_none());
        assert!(cache_efficiency_line(plain(), false, &zero).is_none());
        assert!(lines_ratio_line(plain(), false, 0, 0).is_none());
        assert!(input_output_line(plain(), false, &zero).is_none());
        assert!(cache_write_read_line(plain(), false, &zero).is_none());
        assert!(token_breakdown_line(plain(), false, &zero).is_none());
    }

    #[test]
    fn cache_efficiency_is_reads_over_traffic() {
        let line = cache_efficiency_line(plain(), true, &sample_counts()).expect("line");
        // 1500 reads of 2000 total cache tokens.
        assert!(line.contains("75%"), "{line}");
        assert!(line.contains("1.5K read / 2.0K total"), "{line}");
    }

    #[test]
    fn input_output_split_shares() {
        let line = input_output_line(plain(), true, &sample_counts()).expect("line");
        assert!(line.contains("25%/75%"), "{line}");
    }

    #[test]
    fn token_breakdown_lists_all_categories() {
        let line = token_breakdown_line(plain(), false, &sample_counts()).expect("line");
        assert_eq!(line, "In: 1.0K  Out: 3.0K  CaWr: 500  CaRd: 1.5K");
    }

    #[test]
    fn progress_bar_width_is_stable() {
        for pct in [0, 33, 100, 250] {
            let bar = progress_bar(plain(), pct, false, "");
            assert_eq!(bar.chars().count(), PROGRESS_BAR_WIDTH as usize + 2);
        }
    }

    #[test]
    fn api_time_line_formats_seconds() {
        let line = api_time_line(plain(), false, 2_500, 10_000);
        assert!(line.contains("2.5s/10.0s"), "{line}");
    }
}
