//! Log formatting and output with ANSI colors and text wrapping
//!
//! Console lines are `HH:MM:SS [TAG] [LEVEL] message`, wrapped at word
//! boundaries with continuation lines aligned under the message column. File
//! lines carry the full date and no colors.

use super::file::write_to_file;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 7;

/// Maximum line length before wrapping
const MAX_LINE_LENGTH: usize = 145;

pub fn format_and_log(tag: &LogTag, level: LogLevel, message: &str, plain: bool) {
    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string();
    let tag_plain = tag.to_plain_string();

    // "HH:MM:SS [" + tag + "] [" + level + "] "
    let prefix_width = time.len() + 2 + TAG_WIDTH + 3 + LEVEL_WIDTH + 2;
    let available = MAX_LINE_LENGTH.saturating_sub(prefix_width).max(50);
    let chunks = wrap_text(message, available);

    let base_line = if plain {
        format!(
            "{} [{:<tw$}] [{:<lw$}] ",
            time,
            tag_plain,
            level.as_str(),
            tw = TAG_WIDTH,
            lw = LEVEL_WIDTH
        )
    } else {
        format!(
            "{} [{}] [{}] ",
            time.dimmed(),
            format_tag(tag, &tag_plain),
            format_level(level)
        )
    };

    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let continuation = " ".repeat(prefix_width);

    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            print_stdout_safe(&format!("{}{}", base_line, chunk));
        } else {
            print_stdout_safe(&format!("{}{}", continuation, chunk));
        }
        write_to_file(&format!(
            "{} [{}] [{}] {}",
            timestamp,
            tag_plain,
            level.as_str(),
            chunk
        ));
    }
}

fn format_tag(tag: &LogTag, label: &str) -> ColoredString {
    let padded = format!("{:<width$}", label, width = TAG_WIDTH);
    match tag {
        LogTag::System => padded.bright_yellow().bold(),
        LogTag::Config => padded.bright_white().bold(),
        LogTag::Cli => padded.bright_blue().bold(),
        LogTag::Ledger => padded.bright_cyan().bold(),
        LogTag::Reader => padded.bright_green().bold(),
        LogTag::Executor => padded.bright_magenta().bold(),
        LogTag::Controller => padded.bright_yellow().bold(),
        LogTag::Other(_) => padded.white().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let padded = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => padded.bright_red().bold(),
        LogLevel::Warning => padded.yellow().bold(),
        LogLevel::Info => padded.white().bold(),
        LogLevel::Debug | LogLevel::Verbose => padded.dimmed(),
    }
}

/// Print to stdout but ignore broken pipe errors
fn print_stdout_safe(message: &str) {
    let mut out = stdout().lock();
    if let Err(e) = writeln!(out, "{}", message).and_then(|_| out.flush()) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
}

/// Wrap text at word boundaries, respecting existing newlines.
///
/// Words longer than the width are hard-split on char boundaries.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for line in text.split('\n') {
        if line.chars().count() <= max_width {
            result.push(line.to_string());
            continue;
        }

        let mut current = String::new();
        for word in line.split_whitespace() {
            let word_len = word.chars().count();
            let current_len = current.chars().count();

            if word_len > max_width {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                }
                let chars: Vec<char> = word.chars().collect();
                for piece in chars.chunks(max_width) {
                    result.push(piece.iter().collect());
                }
            } else if current.is_empty() {
                current = word.to_string();
            } else if current_len + 1 + word_len <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                result.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }

    if result.is_empty() {
        result.push(String::new());
    }
    result
}
