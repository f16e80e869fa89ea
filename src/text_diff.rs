//! The plain-text diff/patch primitive backing `TextSynchronizer`.
//!
//! Adapted from the teacher crate's original `diff.rs` (common-prefix /
//! common-suffix stripping around a single differing middle section),
//! generalized to emit the `ADD`/`DELETE`/`UNCHANGED` segment sequence
//! spec.md §6 documents for the text synchronizer's wire format, rather
//! than the teacher's original position-addressed `Insert`/`Delete`/
//! `Replace` edits.

use serde::{Deserialize, Serialize};

/// One segment of a text diff: either carried over unchanged, removed
/// from the old text, or inserted into the new text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "UPPERCASE")]
pub enum TextOp {
    Add { text: String },
    Delete { text: String },
    Unchanged { text: String },
}

/// Computes the ordered segment list that turns `old` into `new`.
///
/// Finds the longest common prefix and (non-overlapping) suffix, then
/// emits `Unchanged` for the prefix, `Delete`/`Add` for whatever differs
/// in between, and `Unchanged` for the suffix. Empty segments are
/// omitted.
pub fn diff(old: &str, new: &str) -> Vec<TextOp> {
    if old == new {
        return if old.is_empty() {
            Vec::new()
        } else {
            vec![TextOp::Unchanged {
                text: old.to_string(),
            }]
        };
    }

    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let mut prefix = 0;
    while prefix < old_chars.len()
        && prefix < new_chars.len()
        && old_chars[prefix] == new_chars[prefix]
    {
        prefix += 1;
    }

    let mut suffix = 0;
    while suffix < old_chars.len() - prefix
        && suffix < new_chars.len() - prefix
        && old_chars[old_chars.len() - 1 - suffix] == new_chars[new_chars.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let old_middle: String = old_chars[prefix..old_chars.len() - suffix].iter().collect();
    let new_middle: String = new_chars[prefix..new_chars.len() - suffix].iter().collect();

    let mut ops = Vec::new();
    if prefix > 0 {
        ops.push(TextOp::Unchanged {
            text: old_chars[..prefix].iter().collect(),
        });
    }
    if !old_middle.is_empty() {
        ops.push(TextOp::Delete { text: old_middle });
    }
    if !new_middle.is_empty() {
        ops.push(TextOp::Add { text: new_middle });
    }
    if suffix > 0 {
        ops.push(TextOp::Unchanged {
            text: old_chars[old_chars.len() - suffix..].iter().collect(),
        });
    }
    ops
}

/// Applies a segment list to `text`, returning the patched result.
///
/// Walks `text` with a cursor: an `Unchanged` or `Delete` segment
/// advances the cursor by its own character count (clamped to what's
/// left of `text`), and an `Unchanged` segment additionally copies that
/// many characters from `text` (not from the segment's own stored copy)
/// into the result; an `Add` segment appends its text without touching
/// the cursor. Patching the caller's own `text` this way, rather than
/// just concatenating the segments' stored text, is what lets the
/// receiver's actual content (which may have drifted from whatever the
/// diff was computed against) flow through the unchanged spans.
pub fn apply(text: &str, ops: &[TextOp]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut cursor = 0;
    let mut result = String::new();

    for op in ops {
        match op {
            TextOp::Unchanged { text: segment } => {
                let len = segment.chars().count().min(chars.len() - cursor);
                result.extend(chars[cursor..cursor + len].iter());
                cursor += len;
            }
            TextOp::Delete { text: segment } => {
                let len = segment.chars().count().min(chars.len() - cursor);
                cursor += len;
            }
            TextOp::Add { text: segment } => {
                result.push_str(segment);
            }
        }
    }

    result
}
