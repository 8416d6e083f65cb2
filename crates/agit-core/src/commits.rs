use crate::types::run::RunStatus;
use agit_vcs::CommitInfo;
use std::collections::BTreeMap;

pub const RUN_ASSISTANT: &str = "Run-Assistant";
pub const RUN_MODEL: &str = "Run-Model";
pub const RUN_STATUS: &str = "Run-Status";
pub const RUN_EXIT_CODE: &str = "Run-Exit-Code";
pub const RUN_TEMPERATURE: &str = "Run-Temperature";
pub const RUN_TOP_P: &str = "Run-Top-P";

pub fn assistant_created(name: &str) -> String {
    format!("aider: Add {name} config and add {name} to model settings")
}

pub fn assistant_deleted(name: &str) -> String {
    format!("aider: Remove {name} config and remove {name} from model settings")
}

pub fn thread_created(thread: &str) -> String {
    format!("aider: Create thread {thread}")
}

pub fn message_added(role: &str, thread: &str) -> String {
    format!("aider: Add '{role}' message to {thread}")
}

pub fn run_subject(assistant: &str, thread: &str) -> String {
    format!("aider: Run {assistant} on {thread}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunTrailers<'a> {
    pub assistant: &'a str,
    pub model: &'a str,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

pub fn run_message(thread: &str, trailers: &RunTrailers<'_>) -> String {
    let mut message = format!(
        "{}\n\n{RUN_ASSISTANT}: {}\n{RUN_MODEL}: {}\n{RUN_STATUS}: {}",
        run_subject(trailers.assistant, thread),
        trailers.assistant,
        trailers.model,
        trailers.status.as_str()
    );
    if let Some(code) = trailers.exit_code {
        message.push_str(&format!("\n{RUN_EXIT_CODE}: {code}"));
    }
    if let Some(temperature) = trailers.temperature {
        message.push_str(&format!("\n{RUN_TEMPERATURE}: {temperature}"));
    }
    if let Some(top_p) = trailers.top_p {
        message.push_str(&format!("\n{RUN_TOP_P}: {top_p}"));
    }
    message
}

/// `Key: value` lines of the last paragraph of a commit message.
pub fn parse_trailers(message: &str) -> BTreeMap<String, String> {
    let Some(paragraph) = message.trim_end().rsplit("\n\n").next() else {
        return BTreeMap::new();
    };
    paragraph
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(": ")?;
            let valid_key = !key.is_empty() && key.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-');
            valid_key.then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// What a commit on a thread branch represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadCommit {
    Created,
    UserMessage,
    Run { assistant: String },
    Other,
}

pub fn classify(commit: &CommitInfo, thread: &str) -> ThreadCommit {
    let summary = commit.summary();
    if summary == thread_created(thread) {
        return ThreadCommit::Created;
    }
    if summary == message_added("user", thread) {
        return ThreadCommit::UserMessage;
    }
    let suffix = format!(" on {thread}");
    if let Some(assistant) = summary
        .strip_prefix("aider: Run ")
        .and_then(|rest| rest.strip_suffix(&suffix))
    {
        return ThreadCommit::Run {
            assistant: assistant.to_string(),
        };
    }
    ThreadCommit::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn commit(message: &str) -> CommitInfo {
        CommitInfo {
            id: "a".repeat(40),
            parent_ids: vec!["b".repeat(40)],
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn classifies_thread_commits() {
        assert_eq!(
            classify(&commit("aider: Create thread bugfix1"), "bugfix1"),
            ThreadCommit::Created
        );
        assert_eq!(
            classify(&commit("aider: Add 'user' message to bugfix1"), "bugfix1"),
            ThreadCommit::UserMessage
        );
        assert_eq!(
            classify(&commit(&run_subject("reviewer", "bugfix1")), "bugfix1"),
            ThreadCommit::Run {
                assistant: "reviewer".to_string()
            }
        );
        assert_eq!(
            classify(&commit("aider: Add 'user' message to other"), "bugfix1"),
            ThreadCommit::Other
        );
    }

    #[test]
    fn run_message_round_trips_through_trailers() {
        let message = run_message(
            "bugfix1",
            &RunTrailers {
                assistant: "reviewer",
                model: "reviewer",
                status: RunStatus::Failed,
                exit_code: Some(2),
                temperature: Some(0.2),
                top_p: None,
            },
        );
        assert!(message.starts_with("aider: Run reviewer on bugfix1\n\n"));

        let trailers = parse_trailers(&message);
        assert_eq!(trailers.get(RUN_ASSISTANT).map(String::as_str), Some("reviewer"));
        assert_eq!(trailers.get(RUN_STATUS).map(String::as_str), Some("failed"));
        assert_eq!(trailers.get(RUN_EXIT_CODE).map(String::as_str), Some("2"));
        assert_eq!(trailers.get(RUN_TEMPERATURE).map(String::as_str), Some("0.2"));
        assert!(!trailers.contains_key(RUN_TOP_P));
    }

    #[test]
    fn subject_only_message_has_no_trailers() {
        assert!(parse_trailers("aider: Create thread x").is_empty());
    }
}
