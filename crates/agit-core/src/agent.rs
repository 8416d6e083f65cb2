use crate::error::AgentError;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const OUTPUT_LIMIT: usize = 64 * 1024;

pub const DEFAULT_AGENT_COMMAND: &str = "aider --yes-always --no-pretty --no-stream --config {config} --model {model} --chat-history-file {history} --message {prompt}";

/// Everything the agent needs for one invocation against a thread.
#[derive(Debug, Clone)]
pub struct AgentRequest<'a> {
    pub workdir: &'a Path,
    pub thread_id: &'a str,
    pub assistant_id: &'a str,
    /// Repository-relative path of the thread's history file.
    pub history_file: &'a str,
    /// Repository-relative path of the assistant's config overlay.
    pub config_file: &'a str,
    pub model: &'a str,
    pub prompt: &'a str,
    pub instructions: Option<&'a str>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentOutcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl AgentOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// The code-modification agent a run hands control to.
///
/// It edits files in `workdir` and may commit on the checked-out branch;
/// the orchestrator folds whatever it leaves behind into one run commit.
pub trait Agent: Send + Sync {
    fn invoke(&self, request: &AgentRequest<'_>) -> Result<AgentOutcome, AgentError>;
}

/// Runs a configured command line as the agent.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    command: String,
    timeout: Duration,
}

impl CommandAgent {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    fn argv(&self, request: &AgentRequest<'_>) -> Result<Vec<String>, AgentError> {
        let words = shell_words::split(&self.command).map_err(|err| AgentError::InvalidCommand {
            message: err.to_string(),
        })?;
        if words.is_empty() {
            return Err(AgentError::InvalidCommand {
                message: "agent command empty".to_string(),
            });
        }
        Ok(words
            .into_iter()
            .map(|word| substitute(&word, request))
            .collect())
    }
}

impl Agent for CommandAgent {
    fn invoke(&self, request: &AgentRequest<'_>) -> Result<AgentOutcome, AgentError> {
        let argv = self.argv(request)?;
        let (program, args) = argv.split_first().ok_or_else(|| AgentError::InvalidCommand {
            message: "agent command empty".to_string(),
        })?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(request.workdir)
            .env("AGIT_THREAD_ID", request.thread_id)
            .env("AGIT_ASSISTANT_ID", request.assistant_id)
            .env("AGIT_HISTORY_FILE", request.history_file)
            .env("AGIT_CONFIG_FILE", request.config_file)
            .env("AGIT_MODEL", request.model)
            .env("AGIT_PROMPT", request.prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(instructions) = request.instructions {
            command.env("AGIT_INSTRUCTIONS", instructions);
        }
        if let Some(temperature) = request.temperature {
            command.env("AGIT_TEMPERATURE", temperature.to_string());
        }
        if let Some(top_p) = request.top_p {
            command.env("AGIT_TOP_P", top_p.to_string());
        }

        debug!(program = %program, thread = request.thread_id, "spawning agent");
        let mut child = command.spawn().map_err(|err| AgentError::Spawn {
            message: format!("{program}: {err}"),
        })?;

        // Pipes are drained while the wait loop polls.
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().map_err(|err| AgentError::Spawn {
                message: err.to_string(),
            })? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                warn!(thread = request.thread_id, "agent timed out");
                return Err(AgentError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
            std::thread::sleep(Duration::from_millis(50));
        };

        let stdout = stdout_reader.map(join_reader).unwrap_or_default();
        let stderr = stderr_reader.map(join_reader).unwrap_or_default();
        Ok(AgentOutcome {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

fn substitute(word: &str, request: &AgentRequest<'_>) -> String {
    word.replace("{history}", request.history_file)
        .replace("{config}", request.config_file)
        .replace("{model}", request.model)
        .replace("{prompt}", request.prompt)
}

fn spawn_reader<R>(mut pipe: R) -> std::thread::JoinHandle<Vec<u8>>
where
    R: std::io::Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        buffer
    })
}

fn join_reader(handle: std::thread::JoinHandle<Vec<u8>>) -> String {
    handle.join().map(limit_output).unwrap_or_default()
}

fn limit_output(data: Vec<u8>) -> String {
    let mut sliced = data;
    if sliced.len() > OUTPUT_LIMIT {
        sliced.truncate(OUTPUT_LIMIT);
    }
    String::from_utf8_lossy(&sliced).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(workdir: &'a Path, prompt: &'a str) -> AgentRequest<'a> {
        AgentRequest {
            workdir,
            thread_id: "bugfix1",
            assistant_id: "reviewer",
            history_file: ".aider/threads/bugfix1.chat.history.md",
            config_file: ".aider/assistants/reviewer.conf.yml",
            model: "reviewer",
            prompt,
            instructions: None,
            temperature: None,
            top_p: None,
        }
    }

    #[test]
    fn substitutes_placeholders_per_word() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CommandAgent::new(
            "tool --config {config} --message {prompt}",
            Duration::from_secs(5),
        );
        let argv = agent.argv(&request(dir.path(), "fix it; rm -rf /")).unwrap();
        assert_eq!(
            argv,
            vec![
                "tool",
                "--config",
                ".aider/assistants/reviewer.conf.yml",
                "--message",
                "fix it; rm -rf /",
            ]
        );
    }

    #[test]
    fn rejects_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CommandAgent::new("   ", Duration::from_secs(5));
        let result = agent.invoke(&request(dir.path(), "x"));
        assert!(matches!(result, Err(AgentError::InvalidCommand { .. })));
    }

    #[test]
    fn reports_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CommandAgent::new("definitely-not-a-real-agent-binary", Duration::from_secs(5));
        let result = agent.invoke(&request(dir.path(), "x"));
        assert!(matches!(result, Err(AgentError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CommandAgent::new(
            "sh -c 'echo \"$AGIT_PROMPT\"; echo oops >&2; exit 3'",
            Duration::from_secs(5),
        );
        let outcome = agent.invoke(&request(dir.path(), "hello")).unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.succeeded());
        assert_eq!(outcome.stdout.trim(), "hello");
        assert_eq!(outcome.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[test]
    fn times_out() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CommandAgent::new("sleep 5", Duration::from_millis(200));
        let result = agent.invoke(&request(dir.path(), "x"));
        assert!(matches!(result, Err(AgentError::Timeout { .. })));
    }
}
