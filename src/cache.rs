//! Persistent per-session token cache.
//!
//! One fixed-size binary record per session, stored under a per-user cache
//! directory and guarded by advisory file locks so that concurrent status
//! line invocations (two terminal panes refreshing at once) never observe a
//! torn record. Records are validated by magic number, session/project
//! identity, age, and the transcript's byte size at cache-write time.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use fs2::FileExt;
use tracing::debug;

use crate::error::{Result, StatusError};
use crate::numeric;
use crate::transcript::TokenCounts;

pub const CACHE_MAGIC: u32 = 0xCCCC_0002;
/// Records older than this are expired regardless of anything else.
pub const CACHE_MAX_AGE_SECS: i64 = 60;

const LOCK_TIMEOUT: Duration = Duration::from_millis(2000);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

const SESSION_ID_CAP: usize = 128;
const PROJECT_DIR_CAP: usize = 256;

/// magic + timestamp + two identity buffers + five session counters +
/// context count + transcript size.
pub const RECORD_SIZE: usize = 4 + 8 + SESSION_ID_CAP + PROJECT_DIR_CAP + 5 * 8 + 8 + 8;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const CACHE_DIR_ENV: &str = "CLAUDE_STATUSLINE_CACHE_DIR";
const CACHE_DIR_NAME: &str = "claude-statusline";
const CACHE_FILE_EXT: &str = "cache";
const FALLBACK_KEY: &str = "default";

/// On-disk cache record. Overwritten wholesale on every refresh, never
/// partially mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub magic: u32,
    pub last_update: i64,
    pub session_id: String,
    pub project_dir: String,
    pub session_tokens: TokenCounts,
    pub context_tokens: u64,
    pub transcript_file_size: u64,
}

impl CacheRecord {
    pub fn new(
        session_id: &str,
        project_dir: &str,
        session_tokens: TokenCounts,
        context_tokens: u64,
        transcript_file_size: u64,
    ) -> Self {
        Self {
            magic: CACHE_MAGIC,
            last_update: Utc::now().timestamp(),
            session_id: truncate_to_cap(session_id, SESSION_ID_CAP),
            project_dir: truncate_to_cap(project_dir, PROJECT_DIR_CAP),
            session_tokens,
            context_tokens,
            transcript_file_size,
        }
    }

    fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        let mut at = 0usize;
        put(&mut buf, &mut at, &self.magic.to_ne_bytes());
        put(&mut buf, &mut at, &self.last_update.to_ne_bytes());
        put_str(&mut buf, &mut at, &self.session_id, SESSION_ID_CAP);
        put_str(&mut buf, &mut at, &self.project_dir, PROJECT_DIR_CAP);
        for counter in [
            self.session_tokens.input,
            self.session_tokens.output,
            self.session_tokens.cache_creation,
            self.session_tokens.cache_read,
            self.session_tokens.total,
        ] {
            put(&mut buf, &mut at, &counter.to_ne_bytes());
        }
        put(&mut buf, &mut at, &self.context_tokens.to_ne_bytes());
        put(&mut buf, &mut at, &self.transcript_file_size.to_ne_bytes());
        debug_assert_eq!(at, RECORD_SIZE);
        buf
    }

    fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        let mut at = 0usize;
        let magic = u32::from_ne_bytes(take(buf, &mut at));
        let last_update = i64::from_ne_bytes(take(buf, &mut at));
        let session_id = take_str(buf, &mut at, SESSION_ID_CAP);
        let project_dir = take_str(buf, &mut at, PROJECT_DIR_CAP);
        let mut counters = [0u64; 5];
        for counter in counters.iter_mut() {
            *counter = u64::from_ne_bytes(take(buf, &mut at));
        }
        let context_tokens = u64::from_ne_bytes(take(buf, &mut at));
        let transcript_file_size = u64::from_ne_bytes(take(buf, &mut at));

        Self {
            magic,
            last_update,
            session_id,
            project_dir,
            session_tokens: TokenCounts {
                input: counters[0],
                output: counters[1],
                cache_creation: counters[2],
                cache_read: counters[3],
                total: counters[4],
            },
            context_tokens,
            transcript_file_size,
        }
    }

    fn age_secs(&self) -> i64 {
        Utc::now().timestamp() - self.last_update
    }
}

fn put(buf: &mut [u8; RECORD_SIZE], at: &mut usize, bytes: &[u8]) {
    buf[*at..*at + bytes.len()].copy_from_slice(bytes);
    *at += bytes.len();
}

fn put_str(buf: &mut [u8; RECORD_SIZE], at: &mut usize, value: &str, cap: usize) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(cap - 1);
    buf[*at..*at + len].copy_from_slice(&bytes[..len]);
    *at += cap;
}

fn take<const N: usize>(buf: &[u8; RECORD_SIZE], at: &mut usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[*at..*at + N]);
    *at += N;
    out
}

fn take_str(buf: &[u8; RECORD_SIZE], at: &mut usize, cap: usize) -> String {
    let field = &buf[*at..*at + cap];
    *at += cap;
    let len = field.iter().position(|&b| b == 0).unwrap_or(cap);
    String::from_utf8_lossy(&field[..len]).into_owned()
}

/// Silent truncation at capacity, preserving the fixed-width record layout.
/// A multi-byte character straddling the cut is dropped entirely.
fn truncate_to_cap(value: &str, cap: usize) -> String {
    let limit = cap - 1;
    if value.len() <= limit {
        return value.to_string();
    }
    let mut end = limit;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// Hash a session identifier to a filesystem-safe cache key. FNV-1a 64,
/// hex-encoded; an empty identifier maps to a fixed fallback key.
pub fn session_cache_key(session_id: &str) -> String {
    if session_id.is_empty() {
        return FALLBACK_KEY.to_string();
    }
    let mut hash = FNV_OFFSET;
    for byte in session_id.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:016x}")
}

fn cache_root() -> PathBuf {
    if let Some(dir) = env::var_os(CACHE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    match dirs::cache_dir() {
        Some(dir) => dir.join(CACHE_DIR_NAME),
        None => env::temp_dir().join(CACHE_DIR_NAME),
    }
}

#[cfg(unix)]
fn create_cache_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_cache_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

/// Filesystem path for a session's cache file, creating the per-user cache
/// directory if absent.
pub fn cache_path(session_id: &str) -> PathBuf {
    let root = cache_root();
    if let Err(err) = create_cache_dir(&root) {
        debug!(dir = %root.display(), %err, "failed to create cache directory");
    }
    let key = session_cache_key(session_id);
    let path = root.join(format!("{key}.{CACHE_FILE_EXT}"));
    debug!(path = %path.display(), "cache path");
    path
}

enum LockMode {
    Shared,
    Exclusive,
}

/// Acquire an advisory lock with a bounded wait: poll at a fixed interval up
/// to a wall-clock deadline, then fail rather than hang the status line.
fn lock_with_timeout(file: &File, mode: LockMode) -> Result<()> {
    let deadline = Instant::now() + LOCK_TIMEOUT;
    loop {
        let attempt = match mode {
            LockMode::Shared => FileExt::try_lock_shared(file),
            LockMode::Exclusive => FileExt::try_lock_exclusive(file),
        };
        match attempt {
            Ok(()) => return Ok(()),
            Err(err)
                if err.kind() == ErrorKind::WouldBlock
                    || err.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
            {
                if Instant::now() >= deadline {
                    debug!("timed out acquiring cache lock");
                    return Err(StatusError::lock_timeout());
                }
                thread::sleep(LOCK_POLL_INTERVAL);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Load the cache record for a session.
///
/// Takes a shared lock with a bounded wait, reads exactly one record, and
/// validates the magic and age. Any failure here means "treat as a miss".
pub fn load_cache(session_id: &str) -> Result<CacheRecord> {
    let path = cache_path(session_id);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(StatusError::NotFound(path));
        }
        Err(err) => return Err(err.into()),
    };

    lock_with_timeout(&file, LockMode::Shared)?;
    let mut buf = [0u8; RECORD_SIZE];
    let read_result = (&file).read_exact(&mut buf);
    let _ = FileExt::unlock(&file);
    read_result?;

    let record = CacheRecord::decode(&buf);
    if record.magic != CACHE_MAGIC {
        debug!(
            expected = CACHE_MAGIC,
            got = record.magic,
            "cache magic mismatch"
        );
        return Err(StatusError::InvalidFormat);
    }

    let age = record.age_secs();
    if age > CACHE_MAX_AGE_SECS {
        debug!(age, "cache record expired");
        return Err(StatusError::InvalidFormat);
    }

    debug!(age, "cache loaded");
    Ok(record)
}

/// Persist a record under an exclusive lock. The whole record is written in
/// one operation; a short write is a hard error.
pub fn save_cache(record: &CacheRecord, session_id: &str) -> Result<()> {
    let path = cache_path(session_id);
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|_| StatusError::NotFound(path.clone()))?;

    lock_with_timeout(&file, LockMode::Exclusive)?;
    file.set_len(0)?;
    let write_result = file.write_all(&record.encode()).and_then(|()| file.flush());
    let _ = FileExt::unlock(&file);
    write_result?;

    debug!(path = %path.display(), "cache saved");
    Ok(())
}

/// Structural validity: magic, identity match against the caller's session
/// and project (exact string equality, after the same truncation applied at
/// write time), and age within threshold.
pub fn is_cache_valid(
    record: &CacheRecord,
    session_id: Option<&str>,
    project_dir: Option<&str>,
) -> bool {
    if record.magic != CACHE_MAGIC {
        debug!("cache invalid: bad magic");
        return false;
    }
    if let Some(session_id) = session_id {
        if record.session_id != truncate_to_cap(session_id, SESSION_ID_CAP) {
            debug!("cache invalid: session id mismatch");
            return false;
        }
    }
    if let Some(project_dir) = project_dir {
        if record.project_dir != truncate_to_cap(project_dir, PROJECT_DIR_CAP) {
            debug!("cache invalid: project dir mismatch");
            return false;
        }
    }
    if record.age_secs() > CACHE_MAX_AGE_SECS {
        debug!("cache invalid: expired");
        return false;
    }
    true
}

/// Current byte size of a file, 0 when it is absent or unreadable.
pub fn file_size(path: &Path) -> u64 {
    let Ok(metadata) = fs::metadata(path) else {
        return 0;
    };
    match numeric::i64_to_u64(metadata.len() as i64) {
        Ok(size) => size,
        Err(_) => 0,
    }
}

/// A structurally valid record still needs a refresh when the transcript's
/// on-disk size no longer matches the size recorded at cache-write time.
/// Size is a cheap proxy for "the transcript changed" that avoids re-reading
/// its contents.
pub fn should_refresh_cache(
    record: &CacheRecord,
    session_id: Option<&str>,
    project_dir: Option<&str>,
    transcript_path: &Path,
) -> bool {
    if !is_cache_valid(record, session_id, project_dir) {
        return true;
    }
    let current_size = file_size(transcript_path);
    if current_size != record.transcript_file_size {
        debug!(
            cached = record.transcript_file_size,
            current = current_size,
            "cache refresh needed: transcript size changed"
        );
        return true;
    }
    debug!("cache is fresh");
    false
}
