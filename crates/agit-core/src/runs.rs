use crate::agent::{AgentOutcome, AgentRequest};
use crate::agit::Agit;
use crate::assistants::{assistant_files, load_assistants, validate_sampling};
use crate::commits::{self, RunTrailers, ThreadCommit};
use crate::error::{AgitError, AssistantError, RequestError, ThreadError};
use crate::gateway::WriteSession;
use crate::history::{parse_history, HistoryRole};
use crate::ids::{is_commit_id, parse_step_id, AssistantName, Layout, ThreadName};
use crate::pagination::paginate;
use crate::threads::{
    append_user_message, create_thread_in, parse_thread_id, thread_log, validate_message,
    validate_thread,
};
use crate::types::is_present;
use crate::types::list::{ListQuery, ListResponse};
use crate::types::run::{
    CreateRunRequest, CreateThreadAndRunRequest, Run, RunError, RunStatus, RunStep, RunStepType,
    StepDetails,
};
use crate::unified_diff::parse_unified_diff;
use agit_vcs::{CommitInfo, VcsBackend};
use tracing::{info, instrument, warn};

pub struct RunsApi<'a, B: VcsBackend> {
    pub(crate) core: &'a Agit<B>,
}

#[derive(Debug)]
pub(crate) struct NewRun {
    assistant_id: String,
    model: Option<String>,
    instructions: Option<String>,
    temperature: Option<f64>,
    top_p: Option<f64>,
    messages: Vec<String>,
}

impl<'a, B: VcsBackend> RunsApi<'a, B> {
    /// Hands the thread to the agent and records whatever it changed as one
    /// commit on the thread branch.
    #[instrument(skip(self, request), fields(assistant = %request.assistant_id))]
    pub fn create(&self, thread_id: &str, request: CreateRunRequest) -> Result<Run, AgitError> {
        let layout = &self.core.layout;
        let thread = parse_thread_id(layout, thread_id)?;
        let input = validate_run(&request)?;
        let branch = layout.thread_branch(&thread);
        self.core.gateway.write(|session| {
            session.checkout_working_branch()?;
            let assistant = resolve_assistant(session, layout, &input.assistant_id)?;
            session.checkout_thread(thread.as_str(), &branch)?;
            execute_run(session, self.core, &thread, &assistant, &input)
        })
    }

    #[instrument(skip(self, request), fields(assistant = %request.assistant_id))]
    pub fn create_thread_and_run(
        &self,
        request: CreateThreadAndRunRequest,
    ) -> Result<Run, AgitError> {
        let (thread_request, run_request) = request.into_parts();
        let thread_request =
            thread_request.ok_or(RequestError::MissingField { field: "thread" })?;
        let new_thread = validate_thread(&thread_request, &self.core.layout)?;
        let input = validate_run(&run_request)?;
        self.core.gateway.write(|session| {
            session.checkout_working_branch()?;
            let assistant = resolve_assistant(session, &self.core.layout, &input.assistant_id)?;
            create_thread_in(session, self.core, &new_thread)?;
            execute_run(session, self.core, &new_thread.name, &assistant, &input)
        })
    }

    pub fn list(&self, thread_id: &str, query: &ListQuery) -> Result<ListResponse<Run>, AgitError> {
        let layout = &self.core.layout;
        let thread = parse_thread_id(layout, thread_id)?;
        let runs = self.core.gateway.read(|backend| {
            let log = thread_log(backend, layout, &thread)?;
            Ok(log
                .commits
                .iter()
                .filter_map(|commit| run_record(&thread, commit))
                .collect::<Vec<_>>())
        })?;
        Ok(paginate(runs, query, |run| run.id.as_str())?)
    }

    pub fn get(&self, thread_id: &str, run_id: &str) -> Result<Run, AgitError> {
        let layout = &self.core.layout;
        let thread = parse_thread_id(layout, thread_id)?;
        self.core.gateway.read(|backend| {
            let commit = find_run_commit(backend, layout, &thread, run_id)?;
            run_record(&thread, &commit).ok_or_else(|| run_not_found(&thread, run_id))
        })
    }

    pub fn list_steps(
        &self,
        thread_id: &str,
        run_id: &str,
        query: &ListQuery,
    ) -> Result<ListResponse<RunStep>, AgitError> {
        let layout = &self.core.layout;
        let thread = parse_thread_id(layout, thread_id)?;
        let steps = self
            .core
            .gateway
            .read(|backend| load_steps(backend, layout, &thread, run_id))?;
        Ok(paginate(steps, query, |step| step.id.as_str())?)
    }

    pub fn get_step(
        &self,
        thread_id: &str,
        run_id: &str,
        step_id: &str,
    ) -> Result<RunStep, AgitError> {
        let layout = &self.core.layout;
        let thread = parse_thread_id(layout, thread_id)?;
        let index = parse_step_id(run_id, step_id)?;
        self.core
            .gateway
            .read(|backend| load_steps(backend, layout, &thread, run_id))?
            .into_iter()
            .nth(index)
            .ok_or_else(|| {
                ThreadError::StepNotFound {
                    run_id: run_id.to_string(),
                    step_id: step_id.to_string(),
                }
                .into()
            })
    }

    pub fn modify(&self, _thread_id: &str, _run_id: &str) -> Result<Run, AgitError> {
        Err(AgitError::unsupported("modify_run"))
    }

    pub fn cancel(&self, _thread_id: &str, _run_id: &str) -> Result<Run, AgitError> {
        Err(AgitError::unsupported("cancel_run"))
    }

    pub fn submit_tool_outputs(&self, _thread_id: &str, _run_id: &str) -> Result<Run, AgitError> {
        Err(AgitError::unsupported("submit_tool_outputs"))
    }
}

fn validate_run(request: &CreateRunRequest) -> Result<NewRun, RequestError> {
    if request.assistant_id.is_empty() {
        return Err(RequestError::MissingField {
            field: "assistant_id",
        });
    }
    if !request.tools.is_empty() {
        return Err(RequestError::UnsupportedField { field: "tools" });
    }
    if is_present(request.metadata.as_ref()) {
        return Err(RequestError::UnsupportedField { field: "metadata" });
    }
    if request.stream == Some(true) {
        return Err(RequestError::UnsupportedField { field: "stream" });
    }
    validate_sampling(request.temperature, request.top_p)?;
    let messages = request
        .additional_messages
        .iter()
        .map(validate_message)
        .collect::<Result<Vec<_>, _>>()?;

    let instructions: Vec<&str> = [
        request.instructions.as_deref(),
        request.additional_instructions.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|text| !text.is_empty())
    .collect();

    Ok(NewRun {
        assistant_id: request.assistant_id.clone(),
        model: request
            .model
            .clone()
            .filter(|model| !model.trim().is_empty()),
        instructions: (!instructions.is_empty()).then(|| instructions.join("\n\n")),
        temperature: request.temperature,
        top_p: request.top_p,
        messages,
    })
}

/// An assistant resolved on the working branch, with the files a run lends
/// to the thread's working tree while the agent runs.
struct RunAssistant {
    name: AssistantName,
    files: Vec<(String, String)>,
}

/// What the agent left behind, before it is folded into the run commit.
struct AgentPass {
    base: String,
    model: String,
    lent: Vec<String>,
    outcome: AgentOutcome,
}

/// Runs the agent on the checked-out thread branch. Anything that fails
/// before the run commit leaves the branch where it started.
fn execute_run<B: VcsBackend>(
    session: &mut WriteSession<'_, B>,
    core: &Agit<B>,
    thread: &ThreadName,
    assistant: &RunAssistant,
    input: &NewRun,
) -> Result<Run, AgitError> {
    let branch = core.layout.thread_branch(thread);
    let start = session.backend().head_commit()?;
    let pass = match invoke_agent(session, core, thread, assistant, input) {
        Ok(pass) => pass,
        Err(err) => {
            warn!(thread = %thread, error = %err, "run aborted, restoring thread branch");
            session.discard_to(&start)?;
            return Err(err);
        }
    };

    // Agent commits are folded into the single run commit.
    session.backend().reset_soft(&pass.base)?;
    session.restore(&pass.lent)?;
    let changed = session.backend().changed_paths()?;
    let outcome = &pass.outcome;
    let status = if outcome.succeeded() {
        RunStatus::Completed
    } else {
        warn!(
            thread = %thread,
            exit_code = ?outcome.exit_code,
            stderr = %outcome.stderr,
            "agent exited unsuccessfully"
        );
        RunStatus::Failed
    };
    let message = commits::run_message(
        thread.as_str(),
        &RunTrailers {
            assistant: assistant.name.as_str(),
            model: &pass.model,
            status,
            exit_code: outcome.exit_code,
            temperature: input.temperature,
            top_p: input.top_p,
        },
    );
    let commit = if changed.is_empty() {
        session.commit_marker(&message)?
    } else {
        let paths: Vec<&str> = changed.iter().map(String::as_str).collect();
        session.stage_and_commit(&paths, &message)?
    };
    session.push(&branch)?;

    let info = session.backend().find_commit(&commit)?;
    info!(thread = %thread, run = %commit, status = status.as_str(), "run recorded");
    let mut run =
        run_record(thread, &info).ok_or_else(|| AgitError::internal("run commit unreadable"))?;
    run.instructions = input.instructions.clone();
    Ok(run)
}

/// Appends the extra messages, lends the assistant's files and invokes the
/// agent against the resulting history.
fn invoke_agent<B: VcsBackend>(
    session: &mut WriteSession<'_, B>,
    core: &Agit<B>,
    thread: &ThreadName,
    assistant: &RunAssistant,
    input: &NewRun,
) -> Result<AgentPass, AgitError> {
    let layout = &core.layout;
    for text in &input.messages {
        append_user_message(session, core, thread, text)?;
    }

    let history_file = layout.history_file(thread);
    let history = session.read_to_string(&history_file)?.unwrap_or_default();
    let prompt = parse_history(&history)
        .into_iter()
        .rev()
        .find(|entry| entry.role == HistoryRole::User)
        .map(|entry| entry.content)
        .ok_or(RequestError::InvalidField {
            field: "additional_messages",
            message: "thread has no user message to run on".to_string(),
        })?;

    let mut lent = Vec::new();
    for (path, content) in &assistant.files {
        if session.read_to_string(path)?.as_deref() != Some(content.as_str()) {
            session.write_file(path, content)?;
            lent.push(path.clone());
        }
    }

    let base = session.backend().head_commit()?;
    let model = input
        .model
        .clone()
        .unwrap_or_else(|| assistant.name.to_string());
    let config_file = layout.assistant_config(&assistant.name);
    let request = AgentRequest {
        workdir: session.root(),
        thread_id: thread.as_str(),
        assistant_id: assistant.name.as_str(),
        history_file: &history_file,
        config_file: &config_file,
        model: &model,
        prompt: &prompt,
        instructions: input.instructions.as_deref(),
        temperature: input.temperature,
        top_p: input.top_p,
    };

    info!(thread = %thread, assistant = %assistant.name, base = %base, "starting run");
    let outcome = core.agent.invoke(&request)?;
    Ok(AgentPass {
        base,
        model,
        lent,
        outcome,
    })
}

/// Looks the assistant up on the working-branch tip, where assistants live,
/// whatever the thread branch was forked from.
fn resolve_assistant<B: VcsBackend>(
    session: &WriteSession<'_, B>,
    layout: &Layout,
    assistant_id: &str,
) -> Result<RunAssistant, AgitError> {
    let backend = session.backend();
    let working = session.working_branch();
    let not_found = || -> AgitError {
        AssistantError::NotFound {
            id: assistant_id.to_string(),
        }
        .into()
    };

    let by_commit = if is_commit_id(assistant_id) {
        load_assistants(backend, layout, working)?
            .into_iter()
            .find(|assistant| assistant.id == assistant_id)
    } else {
        None
    };
    let name = match by_commit {
        Some(found) => AssistantName::parse(&found.name),
        None => AssistantName::parse(assistant_id),
    }
    .map_err(|_| not_found())?;
    let files = assistant_files(backend, layout, working, &name)?.ok_or_else(not_found)?;
    Ok(RunAssistant { name, files })
}

/// A run as recorded in its commit's subject and trailers.
fn run_record(thread: &ThreadName, commit: &CommitInfo) -> Option<Run> {
    let ThreadCommit::Run { assistant } = commits::classify(commit, thread.as_str()) else {
        return None;
    };
    let trailers = commits::parse_trailers(&commit.message);
    let trailer = |key: &str| trailers.get(key).map(String::as_str);

    let status = trailer(commits::RUN_STATUS)
        .and_then(RunStatus::parse)
        .unwrap_or(RunStatus::Completed);
    let exit_code: Option<i32> = trailer(commits::RUN_EXIT_CODE).and_then(|code| code.parse().ok());
    let model = trailer(commits::RUN_MODEL).unwrap_or(assistant.as_str()).to_string();
    let at = commit.timestamp.timestamp();

    let last_error = (status == RunStatus::Failed).then(|| RunError {
        code: "agent_failed".to_string(),
        message: match exit_code {
            Some(code) => format!("agent exited with status {code}"),
            None => "agent was terminated by a signal".to_string(),
        },
    });

    Some(Run {
        id: commit.id.clone(),
        object: "thread.run".to_string(),
        created_at: at,
        thread_id: thread.to_string(),
        assistant_id: trailer(commits::RUN_ASSISTANT)
            .unwrap_or(assistant.as_str())
            .to_string(),
        status,
        model,
        instructions: None,
        started_at: Some(at),
        completed_at: (status == RunStatus::Completed).then_some(at),
        failed_at: (status == RunStatus::Failed).then_some(at),
        last_error,
        tools: Vec::new(),
        metadata: None,
        temperature: trailer(commits::RUN_TEMPERATURE).and_then(|value| value.parse().ok()),
        top_p: trailer(commits::RUN_TOP_P).and_then(|value| value.parse().ok()),
    })
}

fn find_run_commit<B: VcsBackend>(
    backend: &B,
    layout: &Layout,
    thread: &ThreadName,
    run_id: &str,
) -> Result<CommitInfo, AgitError> {
    thread_log(backend, layout, thread)?
        .commits
        .into_iter()
        .find(|commit| {
            commit.id == run_id
                && matches!(
                    commits::classify(commit, thread.as_str()),
                    ThreadCommit::Run { .. }
                )
        })
        .ok_or_else(|| run_not_found(thread, run_id))
}

/// One step per hunk of the run's diff against its parent, in diff order.
fn load_steps<B: VcsBackend>(
    backend: &B,
    layout: &Layout,
    thread: &ThreadName,
    run_id: &str,
) -> Result<Vec<RunStep>, AgitError> {
    let commit = find_run_commit(backend, layout, thread, run_id)?;
    let run = run_record(thread, &commit).ok_or_else(|| run_not_found(thread, run_id))?;
    let Some(parent) = commit.first_parent() else {
        return Ok(Vec::new());
    };
    let diff = backend.diff_range(parent, &commit.id, None)?;
    let files = parse_unified_diff(&diff.unified);
    let history_file = layout.history_file(thread);

    let steps = files
        .into_iter()
        .flat_map(|file| {
            let step_type = if file.path == history_file {
                RunStepType::MessageCreation
            } else {
                RunStepType::FileEdit
            };
            let path = file.path;
            file.hunks
                .into_iter()
                .map(move |hunk| (step_type, path.clone(), hunk))
        })
        .enumerate()
        .map(|(index, (step_type, path, hunk))| RunStep {
            id: index.to_string(),
            object: "thread.run.step".to_string(),
            created_at: run.created_at,
            run_id: run.id.clone(),
            thread_id: run.thread_id.clone(),
            assistant_id: run.assistant_id.clone(),
            step_type,
            status: run.status,
            step_details: StepDetails {
                path,
                old_start: hunk.old_start,
                old_lines: hunk.old_lines,
                new_start: hunk.new_start,
                new_lines: hunk.new_lines,
                header: hunk.header,
                lines: hunk.lines,
            },
        })
        .collect();
    Ok(steps)
}

fn run_not_found(thread: &ThreadName, run_id: &str) -> AgitError {
    ThreadError::RunNotFound {
        thread_id: thread.to_string(),
        run_id: run_id.to_string(),
    }
    .into()
}
