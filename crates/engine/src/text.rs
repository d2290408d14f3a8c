//! Output-boundary text cleanup.
//!
//! Streamed text is stored raw.  Everything a consumer sees passes through
//! exactly one of these functions, at read time or at final compilation.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Strip angle-bracket tags (`<sub-question>`, `<query 1>`, ...) and
/// collapse runs of whitespace into single spaces.
pub fn clean_text(raw: &str) -> String {
    let stripped = TAG_RE.replace_all(raw, "");
    WHITESPACE_RE.replace_all(stripped.trim(), " ").into_owned()
}

/// Separate `<think>...</think>` blocks from answer text.
///
/// Returns `(visible, thinking)`.  An unterminated `<think>` hides the rest
/// of the text, since the block is still being streamed.  A trailing
/// partial opening tag (`"<thi"`) is held back from the visible text for the
/// same reason.
pub fn split_think_blocks(raw: &str) -> (String, String) {
    let mut visible = String::with_capacity(raw.len());
    let mut thinking = String::new();
    let mut rest = raw;

    loop {
        match rest.find(THINK_OPEN) {
            Some(open) => {
                visible.push_str(&rest[..open]);
                let inner = &rest[open + THINK_OPEN.len()..];
                match inner.find(THINK_CLOSE) {
                    Some(close) => {
                        push_block(&mut thinking, &inner[..close]);
                        rest = &inner[close + THINK_CLOSE.len()..];
                    }
                    None => {
                        push_block(&mut thinking, inner);
                        return (visible, thinking);
                    }
                }
            }
            None => {
                let held = partial_tag_suffix(rest, THINK_OPEN);
                visible.push_str(&rest[..rest.len() - held]);
                return (visible, thinking);
            }
        }
    }
}

fn push_block(thinking: &mut String, block: &str) {
    let block = block.trim();
    if block.is_empty() {
        return;
    }
    if !thinking.is_empty() {
        thinking.push('\n');
    }
    thinking.push_str(block);
}

/// Length of the longest suffix of `text` that is a proper prefix of `tag`.
fn partial_tag_suffix(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&n| text.ends_with(&tag[..n]))
        .unwrap_or(0)
}
