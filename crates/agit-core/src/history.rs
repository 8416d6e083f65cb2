use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::Path;

/// Appends messages to a thread's chat history file.
pub trait HistoryWriter: Send + Sync {
    fn append_user(&self, path: &Path, content: &str) -> io::Result<()>;
}

/// Writes aider's chat-history markdown: one `#### ` line per input line.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownHistory;

const USER_PREFIX: &str = "####";
const BLANK_INPUT: &str = "<blank>";

impl HistoryWriter for MarkdownHistory {
    fn append_user(&self, path: &Path, content: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(format_user_input(content).as_bytes())
    }
}

pub fn format_user_input(content: &str) -> String {
    let lines: Vec<&str> = if content.is_empty() {
        vec![BLANK_INPUT]
    } else {
        content.lines().collect()
    };
    let joined = lines.join(&format!("  \n{USER_PREFIX} "));
    let text = format!("\n{USER_PREFIX} {joined}");
    format!("{}  \n", text.trim_end())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub content: String,
}

/// Splits history markdown back into user and assistant turns.
///
/// `# ` headings are session banners and `> ` lines are tool output; both are
/// dropped. A blank line ends a user turn.
pub fn parse_history(text: &str) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = Vec::new();
    let mut current: Option<(HistoryRole, Vec<String>)> = None;

    let mut flush = |current: &mut Option<(HistoryRole, Vec<String>)>| {
        if let Some((role, lines)) = current.take() {
            let content = trim_blank_lines(&lines).join("\n");
            if !content.is_empty() || role == HistoryRole::User {
                entries.push(HistoryEntry { role, content });
            }
        }
    };

    for line in text.lines() {
        if let Some(user) = user_line(line) {
            let user = if user == BLANK_INPUT { "" } else { user };
            match current.as_mut() {
                Some((HistoryRole::User, lines)) => lines.push(user.to_string()),
                _ => {
                    flush(&mut current);
                    current = Some((HistoryRole::User, vec![user.to_string()]));
                }
            }
            continue;
        }

        if line.starts_with("# ") || line.starts_with('>') {
            if matches!(current, Some((HistoryRole::Assistant, _))) {
                flush(&mut current);
            }
            continue;
        }

        if line.trim().is_empty() {
            match current.as_mut() {
                Some((HistoryRole::Assistant, lines)) => lines.push(String::new()),
                Some((HistoryRole::User, _)) => flush(&mut current),
                None => {}
            }
            continue;
        }

        match current.as_mut() {
            Some((HistoryRole::Assistant, lines)) => lines.push(line.to_string()),
            _ => {
                flush(&mut current);
                current = Some((HistoryRole::Assistant, vec![line.to_string()]));
            }
        }
    }
    flush(&mut current);
    entries
}

/// Drops leading and trailing blank lines; indentation inside is kept.
fn trim_blank_lines(lines: &[String]) -> &[String] {
    let blank = |line: &String| line.trim().is_empty();
    let Some(first) = lines.iter().position(|line| !blank(line)) else {
        return &[];
    };
    let last = lines.iter().rposition(|line| !blank(line)).unwrap_or(first);
    &lines[first..=last]
}

fn user_line(line: &str) -> Option<&str> {
    if line == USER_PREFIX {
        return Some("");
    }
    line.strip_prefix("#### ").map(str::trim_end)
}

/// Content of every entry with `role`, joined by blank lines.
pub fn join_role(entries: &[HistoryEntry], role: HistoryRole) -> Option<String> {
    let parts: Vec<&str> = entries
        .iter()
        .filter(|entry| entry.role == role)
        .map(|entry| entry.content.as_str())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}
