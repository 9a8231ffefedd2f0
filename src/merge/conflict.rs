//! Conflict marker formatting and merge messages
//!
//! The marker layout is consumed by external tooling and must stay byte-for-byte stable:
//!
//! ```text
//! <<<<<<< refs/heads/ours
//! ours line 1
//! =======
//! theirs line 1
//! >>>>>>> refs/heads/theirs
//! ```

use crate::merge::types::Conflict;
use crate::store::refs::{short_name, HEADS_PREFIX};

const OURS_MARKER: &[u8] = b"<<<<<<< ";
const SEPARATOR: &[u8] = b"=======\n";
const THEIRS_MARKER: &[u8] = b">>>>>>> ";

/// Content that cannot be marker-formatted.
pub fn is_binary(content: &[u8]) -> bool {
    content.contains(&0)
}

/// Lines of `content` without their terminators. A trailing newline does not start an
/// extra empty line, and empty content has no lines.
fn lines(content: &[u8]) -> impl Iterator<Item = &[u8]> {
    let body = content.strip_suffix(b"\n").unwrap_or(content);
    let empty = content.is_empty();
    body.split(|b| *b == b'\n').filter(move |_| !empty)
}

/// Build the conflicted file body. An absent side contributes an empty section.
pub fn format_conflict(ours_name: &str, ours: &[u8], theirs_name: &str, theirs: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ours.len() + theirs.len() + 64);
    out.extend_from_slice(OURS_MARKER);
    out.extend_from_slice(ours_name.as_bytes());
    out.push(b'\n');
    for line in lines(ours) {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out.extend_from_slice(SEPARATOR);
    for line in lines(theirs) {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out.extend_from_slice(THEIRS_MARKER);
    out.extend_from_slice(theirs_name.as_bytes());
    out.push(b'\n');
    out
}

/// `branch 'x'` for branch refs, `commit '<id>'` otherwise.
fn describe_source(theirs_name: &str) -> String {
    if theirs_name.starts_with(HEADS_PREFIX) {
        format!("branch '{}'", short_name(theirs_name))
    } else if theirs_name.starts_with("refs/") {
        format!("'{}'", theirs_name)
    } else {
        format!("commit '{}'", theirs_name)
    }
}

/// Commit message for a merge of `theirs_name` into `ours_name`, listing conflicting paths.
pub fn merge_message(ours_name: &str, theirs_name: &str, squash: bool, conflicts: &[Conflict]) -> String {
    let verb = if squash { "Squash merge" } else { "Merge" };
    let mut message = format!(
        "{} {} into {}",
        verb,
        describe_source(theirs_name),
        short_name(ours_name)
    );
    if !conflicts.is_empty() {
        message.push_str("\n\nConflicts:");
        for conflict in conflicts {
            message.push_str(&format!("\n\t{} ({})", conflict.path, conflict.kind));
        }
    }
    message
}

/// Note message for a fast-forward to `theirs_name`.
pub fn fast_forward_message(theirs_name: &str, squash: bool) -> String {
    if squash {
        format!("Squash fast-forward to {}", describe_source(theirs_name))
    } else {
        format!("Fast-forward to {}", describe_source(theirs_name))
    }
}
