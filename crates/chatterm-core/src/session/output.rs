//! Terminal output cleaning.
//!
//! The PTY hands us raw terminal bytes: ANSI escape sequences, carriage
//! returns, bells, and an echo of whatever was just typed. Chat transports
//! want plain text, so everything that only makes sense on a real terminal
//! is stripped before output is surfaced.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Cursor-forward sequences become spaces so column-aligned output
/// (e.g. `ls` listings) stays readable.
static CURSOR_FORWARD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[(\d*)C").unwrap());

/// Everything else terminal-specific is removed outright: CSI (including
/// private modes), OSC, DCS, two-character ESC sequences, 8-bit CSI, bare
/// carriage returns, bells and NULs.
static ANSI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(\x1b\[[0-9;?<>=! "']*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1bP[^\x1b]*\x1b\\|\x1b[^\[\]P]|\x9b[0-9;?<>=! ]*[@-~]|\r|\x07|\x00)"#,
    )
    .unwrap()
});

/// Strip ANSI codes from terminal output, replacing cursor-forward
/// sequences with spaces.
pub fn clean_output(text: &str) -> String {
    // CRLF first, so the ANSI pass only sees bare CRs (cursor tricks).
    let text = text.replace("\r\n", "\n");

    let text = CURSOR_FORWARD.replace_all(&text, |caps: &Captures| {
        let n = if caps[1].is_empty() {
            1
        } else {
            caps[1].parse::<usize>().unwrap_or(1)
        };
        " ".repeat(n)
    });

    ANSI.replace_all(&text, "").into_owned()
}

/// Remove the echoed command from the front of an output flush.
///
/// The PTY echoes what was written to it, so the first flush after a
/// `write_line` starts with (a possibly decorated copy of) the command
/// itself. Everything up to and including the first occurrence of the sent
/// line is cut.
pub fn strip_echo(output: &str, sent: &str) -> String {
    if sent.is_empty() {
        return output.to_string();
    }
    match output.find(sent) {
        Some(idx) => output[idx + sent.len()..].to_string(),
        None => output.to_string(),
    }
}
