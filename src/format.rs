//! path-change formatter (§4.11) and the status/log and raw-diff line
//! renderers (§6).

use crate::error::Result;
use crate::object::read_blob;
use crate::repo::Repo;
use crate::types::{Delta, DeltaStatus};

/// render `(old, new)` as a rename description.
pub fn format_rename(old: &str, new: &str) -> String {
    let old_comps: Vec<&str> = old.split('/').collect();
    let new_comps: Vec<&str> = new.split('/').collect();
    let old_len = old_comps.len();
    let new_len = new_comps.len();
    let min_len = old_len.min(new_len);

    let mut prefix_len = 0;
    while prefix_len < min_len && old_comps[prefix_len] == new_comps[prefix_len] {
        prefix_len += 1;
    }

    let max_suffix = min_len - prefix_len;
    let mut suffix_len = 0;
    while suffix_len < max_suffix
        && old_comps[old_len - 1 - suffix_len] == new_comps[new_len - 1 - suffix_len]
    {
        suffix_len += 1;
    }

    // shrink the suffix (or failing that, the prefix) until both sides keep
    // at least one unique component — braces must never contain empty text.
    while (prefix_len >= old_len - suffix_len || prefix_len >= new_len - suffix_len)
        && (prefix_len > 0 || suffix_len > 0)
    {
        if suffix_len > 0 {
            suffix_len -= 1;
        } else {
            prefix_len -= 1;
        }
    }

    if prefix_len == 0 && suffix_len == 0 {
        return format!("{old} -> {new}");
    }

    let prefix_str = old_comps[..prefix_len].join("/");
    let suffix_str = old_comps[old_len - suffix_len..].join("/");
    let unique_old = old_comps[prefix_len..old_len - suffix_len].join("/");
    let unique_new = new_comps[prefix_len..new_len - suffix_len].join("/");

    let mut out = String::new();
    if !prefix_str.is_empty() {
        out.push_str(&prefix_str);
        out.push('/');
    }
    out.push('{');
    out.push_str(&unique_old);
    out.push_str(" -> ");
    out.push_str(&unique_new);
    out.push('}');
    if !suffix_str.is_empty() {
        out.push('/');
        out.push_str(&suffix_str);
    }
    out
}

/// path-info component of a status/raw-diff line: a plain path, or a
/// rename/copy description per [`format_rename`].
fn path_info(delta: &Delta) -> String {
    match (&delta.old_path, &delta.new_path) {
        (Some(old), Some(new)) if old != new => format_rename(old, new),
        (Some(old), Some(new)) => {
            debug_assert_eq!(old, new);
            new.clone()
        }
        (Some(old), None) => old.clone(),
        (None, Some(new)) => new.clone(),
        (None, None) => String::new(),
    }
}

/// the digest shown for an entry is always the *old* blob's, per §6: a dash
/// for additions and for 100%-similar renames/copies, otherwise the leading
/// hex characters of the old blob's content (if it parses as a regular-blob
/// digest; symlink blobs have no digest to show).
fn digest_value(repo: &Repo, delta: &Delta, width: usize) -> Result<String> {
    let is_dash = delta.status == DeltaStatus::Added
        || ((delta.status == DeltaStatus::Renamed || delta.status == DeltaStatus::Copied)
            && delta.similarity == 100);

    if is_dash {
        return Ok("-".to_string());
    }

    let Some(hash) = delta.old_hash else {
        return Ok("-".to_string());
    };

    let content = read_blob(repo, &hash)?;
    match extract_regular_digest(&content) {
        Some(digest) => Ok(digest[..width.min(digest.len())].to_string()),
        None => Ok("-".to_string()),
    }
}

/// parse a regular-blob's content (`<40-hex-digit digest>\n`) back into its
/// digest string; returns `None` for anything else (a symlink blob's raw
/// target bytes, most commonly).
fn extract_regular_digest(content: &[u8]) -> Option<&str> {
    let text = std::str::from_utf8(content).ok()?;
    let digest = text.strip_suffix('\n')?;
    if digest.len() == crate::digest::DIGEST_WIDTH && digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(digest)
    } else {
        None
    }
}

/// render one line of the status/log text format (§6):
/// `  <status>:<pad>  <digest-or-dash>  <path-info>\n`
pub fn format_status_line(repo: &Repo, delta: &Delta, abbreviated: bool) -> Result<String> {
    let status_width = DeltaStatus::max_name_width() + 1;
    let status_col = format!("{:>width$}", format!("{}:", delta.status.name()), width = status_width);

    let digest_width = if abbreviated { 10 } else { crate::digest::DIGEST_WIDTH };
    let digest = digest_value(repo, delta, digest_width)?;
    let digest_col = format!("{digest:<digest_width$}");

    Ok(format!("  {status_col}  {digest_col}  {}\n", path_info(delta)))
}

/// render one line of the raw diff format (§6):
/// `<status-code> <digest-or-dash>\t<old-path>[\t<new-path>]\n`, or with
/// `null_terminated`, `\n` -> `\0` and `\t` -> `\0`.
pub fn format_raw_diff_line(repo: &Repo, delta: &Delta, abbreviated: bool, null_terminated: bool) -> Result<String> {
    let digest_width = if abbreviated { 10 } else { crate::digest::DIGEST_WIDTH };
    let digest = digest_value(repo, delta, digest_width)?;

    let (sep, term) = if null_terminated { ('\0', '\0') } else { ('\t', '\n') };

    let mut line = format!("{} {}{sep}", delta.status.raw_code(), digest);
    match (&delta.old_path, &delta.new_path) {
        (Some(old), Some(new)) if old != new => {
            line.push_str(old);
            line.push(sep);
            line.push_str(new);
        }
        (Some(path), _) | (_, Some(path)) => line.push_str(path),
        (None, None) => {}
    }
    line.push(term);
    Ok(line)
}
