//! Small helpers shared across modules.

use std::path::PathBuf;

/// Generate a unique message id.
#[must_use]
pub fn generate_message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

/// The user's home directory, or `.` if it cannot be determined.
#[must_use]
pub fn home_dir() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Split text into chunks of at most `max_len` bytes.
///
/// Splits on line boundaries where possible; a single line longer than
/// `max_len` is cut at character boundaries.
#[must_use]
pub fn split_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len || max_len == 0 {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if !current.is_empty() && current.len() + line.len() + 1 > max_len {
            chunks.push(std::mem::take(&mut current));
        }
        if line.len() > max_len {
            let mut piece = String::new();
            for ch in line.chars() {
                if piece.len() + ch.len_utf8() > max_len {
                    chunks.push(std::mem::take(&mut piece));
                }
                piece.push(ch);
            }
            current = piece;
            continue;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
