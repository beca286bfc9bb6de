//! Decides, per invocation, whether to trust the session cache or re-scan
//! the transcript, and writes back a refreshed record on a miss.
//!
//! Caching is a best-effort optimization: a save failure is logged and the
//! freshly computed statistics are still used. Nothing here is fatal.

use std::path::Path;

use tracing::{debug, warn};

use crate::cache::{self, CacheRecord};
use crate::transcript::{self, TokenCounts};

/// Which derived statistics the renderer actually requires.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsRequest {
    pub session: bool,
    pub context: bool,
}

impl StatsRequest {
    pub fn any(self) -> bool {
        self.session || self.context
    }
}

/// Statistics handed to the display layer, each tagged with whether it was
/// successfully obtained so the renderer can hide what it couldn't get.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    pub session_tokens: Option<TokenCounts>,
    pub context_tokens: Option<u64>,
}

/// Resolve token statistics for one invocation: cache hit when a loaded
/// record validates and the transcript size is unchanged, otherwise a fresh
/// scan followed by a best-effort cache write.
pub fn collect(
    session_id: &str,
    project_dir: &str,
    transcript_path: &Path,
    request: StatsRequest,
) -> SessionStats {
    if !request.any() {
        return SessionStats::default();
    }

    if let Ok(record) = cache::load_cache(session_id) {
        if !cache::should_refresh_cache(
            &record,
            Some(session_id),
            Some(project_dir),
            transcript_path,
        ) {
            debug!("using cached token statistics");
            return SessionStats {
                session_tokens: Some(record.session_tokens),
                context_tokens: (record.context_tokens > 0).then_some(record.context_tokens),
            };
        }
    }

    debug!("cache miss, scanning transcript");
    let mut stats = SessionStats::default();
    if request.session && request.context {
        if let Ok((session, context)) = transcript::parse_tokens_single_pass(transcript_path) {
            stats.session_tokens = Some(session);
            stats.context_tokens = (context > 0).then_some(context);
        }
    } else if request.session {
        if let Ok(session) = transcript::parse_session_tokens(transcript_path) {
            stats.session_tokens = Some(session);
        }
    } else if let Ok(context) = transcript::count_context_tokens(transcript_path) {
        stats.context_tokens = (context > 0).then_some(context);
    }

    let record = CacheRecord::new(
        session_id,
        project_dir,
        stats.session_tokens.unwrap_or_default(),
        stats.context_tokens.unwrap_or(0),
        cache::file_size(transcript_path),
    );
    if let Err(err) = cache::save_cache(&record, session_id) {
        warn!(%err, "failed to save token cache");
    }

    stats
}
