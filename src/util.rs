use tracing_subscriber::{EnvFilter, fmt};

use crate::numeric;

pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// Human-scale token count: 999, 1.5K, 1.5M, 1.5G.
pub fn format_tokens(tokens: u64) -> String {
    if tokens >= 1_000_000_000 {
        format!("{:.1}G", tokens as f64 / 1_000_000_000.0)
    } else if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{:.1}K", tokens as f64 / 1_000.0)
    } else {
        tokens.to_string()
    }
}

/// Integer percentage of `tokens` against `limit`. Overflow of the
/// intermediate product reads as 100 when clamping, `u32::MAX` otherwise;
/// this is the one place a checked-arithmetic failure maps to a display
/// fallback instead of an error.
pub fn calculate_percentage(tokens: u64, limit: u64, clamp: bool) -> u32 {
    if limit == 0 {
        return 0;
    }
    let product = match numeric::checked_mul_u64(tokens, 100) {
        Ok(product) => product,
        Err(_) => return if clamp { 100 } else { u32::MAX },
    };
    let pct = product / limit;
    if clamp && pct > 100 {
        return 100;
    }
    u32::try_from(pct).unwrap_or(u32::MAX)
}

/// Final path component for display, `?` for empty input.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "?" } else { "/" };
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_formatting_scales() {
        assert_eq!(format_tokens(0), "0");
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(1_500), "1.5K");
        assert_eq!(format_tokens(1_500_000), "1.5M");
        assert_eq!(format_tokens(1_500_000_000), "1.5G");
    }

    #[test]
    fn percentage_basic_cases() {
        assert_eq!(calculate_percentage(50_000, 200_000, false), 25);
        assert_eq!(calculate_percentage(0, 200_000, false), 0);
        assert_eq!(calculate_percentage(10, 0, false), 0);
        assert_eq!(calculate_percentage(400_000, 200_000, true), 100);
        assert_eq!(calculate_percentage(400_000, 200_000, false), 200);
    }

    #[test]
    fn percentage_overflow_fallback() {
        assert_eq!(calculate_percentage(u64::MAX, 200_000, true), 100);
        assert_eq!(calculate_percentage(u64::MAX, 200_000, false), u32::MAX);
    }

    #[test]
    fn basename_extraction() {
        assert_eq!(basename("/home/user/project"), "project");
        assert_eq!(basename("/home/user/project/"), "project");
        assert_eq!(basename("/"), "/");
        assert_eq!(basename(""), "?");
        assert_eq!(basename("plain"), "plain");
    }
}
