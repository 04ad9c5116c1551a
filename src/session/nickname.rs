//! Display names for connect attempts and ghost detection.

use rand::Rng;
use tsq_proto::ClientInfo;

/// Longest display name the server accepts.
pub const MAX_NICKNAME_LEN: usize = 30;

/// Name to request on the given 1-based attempt.
///
/// The first attempt uses the base name; later attempts add a unique suffix
/// so a name still held by a stale session cannot block the connect.
pub fn for_attempt(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        truncate(base, MAX_NICKNAME_LEN).to_string()
    } else {
        let millis = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
        let random = rand::thread_rng().gen_range(0..1000);
        unique(base, millis, random)
    }
}

/// `<base>_<base36 millis><3 digits>`, with the base shortened to fit.
pub fn unique(base: &str, millis: u64, random: u16) -> String {
    let suffix = format!("_{}{:03}", to_base36(millis), random % 1000);
    let room = MAX_NICKNAME_LEN.saturating_sub(suffix.chars().count());
    format!("{}{suffix}", truncate(base, room).trim_end())
}

/// Whether `client` is a leftover bot session named after `base`.
pub fn is_ghost(client: &ClientInfo, base: &str) -> bool {
    if !client.is_query() {
        return false;
    }
    let nickname = client.nickname.as_str();
    if nickname == truncate(base, MAX_NICKNAME_LEN) {
        return true;
    }
    let Some((stem, suffix)) = nickname.rsplit_once('_') else {
        return false;
    };
    if stem.is_empty() || suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    // Long bases are shortened to make room for the suffix.
    stem == base.trim_end()
        || (nickname.chars().count() == MAX_NICKNAME_LEN && base.starts_with(stem))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
