use crate::agit::Agit;
use crate::commits::{self, ThreadCommit};
use crate::error::{AgitError, RequestError, ThreadError};
use crate::gateway::WriteSession;
use crate::history::{join_role, parse_history, HistoryRole};
use crate::ids::{Layout, ThreadName};
use crate::pagination::paginate;
use crate::types::list::{ListResponse, MessageListQuery};
use crate::types::message::{
    CreateMessageRequest, Message, MessageContent, MessageContentInput, MessageContentPart,
    MessageRole,
};
use crate::types::thread::{CreateThreadRequest, Thread, ThreadMetadata};
use crate::types::{is_present, DeletionStatus};
use crate::unified_diff::{added_text, parse_unified_diff};
use agit_vcs::{CommitInfo, VcsBackend};
use serde_json::Value;
use tracing::{info, instrument, warn};

pub struct ThreadsApi<'a, B: VcsBackend> {
    pub(crate) core: &'a Agit<B>,
}

pub struct MessagesApi<'a, B: VcsBackend> {
    pub(crate) core: &'a Agit<B>,
}

/// A validated thread-creation request.
#[derive(Debug)]
pub(crate) struct NewThread {
    pub name: ThreadName,
    pub messages: Vec<String>,
}

impl<'a, B: VcsBackend> ThreadsApi<'a, B> {
    /// Creates the thread branch off the working branch, then appends any
    /// initial messages.
    #[instrument(skip(self, request))]
    pub fn create(&self, request: Option<CreateThreadRequest>) -> Result<Thread, AgitError> {
        let request = request.ok_or(RequestError::MissingField { field: "metadata" })?;
        let input = validate_thread(&request, &self.core.layout)?;
        self.core.gateway.write(|session| {
            session.checkout_working_branch()?;
            create_thread_in(session, self.core, &input)
        })
    }

    pub fn get(&self, thread_id: &str) -> Result<Thread, AgitError> {
        let layout = &self.core.layout;
        let thread = parse_thread_id(layout, thread_id)?;
        self.core.gateway.read(|backend| {
            let log = thread_log(backend, layout, &thread)?;
            let created = match log.created {
                Some(commit) => commit,
                None => backend.find_commit(&backend.branch_tip(&layout.thread_branch(&thread))?)?,
            };
            Ok(thread_record(&thread, &created))
        })
    }

    pub fn modify(&self, _thread_id: &str) -> Result<Thread, AgitError> {
        Err(AgitError::unsupported("modify_thread"))
    }

    /// Deletes the thread branch locally and on the remote.
    #[instrument(skip(self))]
    pub fn delete(&self, thread_id: &str) -> Result<DeletionStatus, AgitError> {
        let layout = &self.core.layout;
        let thread = parse_thread_id(layout, thread_id)?;
        let branch = layout.thread_branch(&thread);
        self.core.gateway.write(|session| {
            session.checkout_working_branch()?;
            if !session.backend().branch_exists(&branch)? {
                return Err(thread_not_found(&thread));
            }
            session.backend().delete_branch(&branch)?;
            session.delete_remote_branch(&branch)?;
            info!(thread = %thread, "thread deleted");
            Ok(DeletionStatus::new(thread.as_str(), "thread.deleted"))
        })
    }
}

impl<'a, B: VcsBackend> MessagesApi<'a, B> {
    #[instrument(skip(self, request))]
    pub fn create(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> Result<Message, AgitError> {
        let layout = &self.core.layout;
        let thread = parse_thread_id(layout, thread_id)?;
        let text = validate_message(&request)?;
        let branch = layout.thread_branch(&thread);
        self.core.gateway.write(|session| {
            session.checkout_working_branch()?;
            session.checkout_thread(thread.as_str(), &branch)?;
            let message = append_user_message(session, self.core, &thread, &text)?;
            session.push(&branch)?;
            info!(thread = %thread, message = %message.id, "message added");
            Ok(message)
        })
    }

    pub fn list(
        &self,
        thread_id: &str,
        query: &MessageListQuery,
    ) -> Result<ListResponse<Message>, AgitError> {
        let layout = &self.core.layout;
        let thread = parse_thread_id(layout, thread_id)?;
        let mut messages = self
            .core
            .gateway
            .read(|backend| load_messages(backend, layout, &thread))?;
        if let Some(run_id) = query.run_id.as_deref() {
            messages.retain(|message| message.run_id.as_deref() == Some(run_id));
        }
        Ok(paginate(messages, &query.page(), |message| message.id.as_str())?)
    }

    pub fn get(&self, thread_id: &str, message_id: &str) -> Result<Message, AgitError> {
        let layout = &self.core.layout;
        let thread = parse_thread_id(layout, thread_id)?;
        self.core
            .gateway
            .read(|backend| load_messages(backend, layout, &thread))?
            .into_iter()
            .find(|message| message.id == message_id)
            .ok_or_else(|| {
                ThreadError::MessageNotFound {
                    thread_id: thread.to_string(),
                    message_id: message_id.to_string(),
                }
                .into()
            })
    }

    pub fn modify(&self, _thread_id: &str, _message_id: &str) -> Result<Message, AgitError> {
        Err(AgitError::unsupported("modify_message"))
    }

    pub fn delete(&self, _thread_id: &str, _message_id: &str) -> Result<DeletionStatus, AgitError> {
        Err(AgitError::unsupported("delete_message"))
    }
}

pub(crate) fn parse_thread_id(layout: &Layout, thread_id: &str) -> Result<ThreadName, AgitError> {
    Ok(layout.parse_thread(thread_id)?)
}

pub(crate) fn validate_thread(
    request: &CreateThreadRequest,
    layout: &Layout,
) -> Result<NewThread, RequestError> {
    if is_present(request.tool_resources.as_ref()) {
        return Err(RequestError::UnsupportedField {
            field: "tool_resources",
        });
    }
    let metadata = request
        .metadata
        .as_ref()
        .ok_or(RequestError::MissingField { field: "metadata" })?;
    if let Some(key) = metadata.keys().find(|key| key.as_str() != "name") {
        return Err(RequestError::InvalidField {
            field: "metadata",
            message: format!("only `name` is accepted, got `{key}`"),
        });
    }
    let name = match metadata.get("name") {
        Some(Value::String(name)) if !name.is_empty() => name,
        Some(Value::String(_)) | None => {
            return Err(RequestError::MissingField {
                field: "metadata.name",
            })
        }
        Some(_) => {
            return Err(RequestError::InvalidField {
                field: "metadata.name",
                message: "must be a string".to_string(),
            })
        }
    };
    let name = layout.parse_thread(name)?;
    let messages = request
        .messages
        .iter()
        .map(validate_message)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NewThread { name, messages })
}

/// Text of a writable message. Only plain-text user messages are accepted.
pub(crate) fn validate_message(request: &CreateMessageRequest) -> Result<String, RequestError> {
    if is_present(request.metadata.as_ref()) {
        return Err(RequestError::UnsupportedField { field: "metadata" });
    }
    if !request.attachments.is_empty() {
        return Err(RequestError::UnsupportedField {
            field: "attachments",
        });
    }
    match request.role.as_str() {
        "user" => {}
        "assistant" => return Err(RequestError::UnsupportedField { field: "role" }),
        other => {
            return Err(RequestError::InvalidField {
                field: "role",
                message: format!("expected `user`, got `{other}`"),
            })
        }
    }
    match &request.content {
        MessageContentInput::Text(text) => Ok(text.clone()),
        MessageContentInput::Parts(parts) => {
            let mut texts = Vec::with_capacity(parts.len());
            for part in parts {
                match part {
                    MessageContentPart::Text { text } => texts.push(text.as_str()),
                    _ => return Err(RequestError::UnsupportedField { field: "content" }),
                }
            }
            Ok(texts.join("\n"))
        }
    }
}

/// Creates and pushes a thread branch; expects the working branch checked out.
pub(crate) fn create_thread_in<B: VcsBackend>(
    session: &mut WriteSession<'_, B>,
    core: &Agit<B>,
    input: &NewThread,
) -> Result<Thread, AgitError> {
    let layout = &core.layout;
    let thread = &input.name;
    let branch = layout.thread_branch(thread);
    if session.backend().branch_exists(&branch)? {
        return Err(ThreadError::AlreadyExists {
            id: thread.to_string(),
        }
        .into());
    }

    let working = session.working_branch().to_string();
    session.create_branch(&branch, Some(&working))?;
    let commit = match start_thread(session, layout, thread, &branch) {
        Ok(commit) => commit,
        Err(err) => {
            warn!(thread = %thread, error = %err, "thread creation failed, removing branch");
            session.discard_writes();
            let cleanup = session.checkout(&working).and_then(|()| {
                session
                    .backend()
                    .delete_branch(&branch)
                    .map_err(AgitError::from)
            });
            if let Err(cleanup) = cleanup {
                warn!(thread = %thread, error = %cleanup, "could not remove thread branch");
            }
            return Err(err);
        }
    };
    session.push(&branch)?;

    for text in &input.messages {
        append_user_message(session, core, thread, text)?;
    }
    if !input.messages.is_empty() {
        session.push(&branch)?;
    }

    let created = session.backend().find_commit(&commit)?;
    info!(thread = %thread, commit = %commit, "thread created");
    Ok(thread_record(thread, &created))
}

fn start_thread<B: VcsBackend>(
    session: &mut WriteSession<'_, B>,
    layout: &Layout,
    thread: &ThreadName,
    branch: &str,
) -> Result<String, AgitError> {
    session.checkout(branch)?;
    let history = layout.history_file(thread);
    session.write_file(&history, "")?;
    session.stage_and_commit(&[&history], &commits::thread_created(thread.as_str()))
}

/// Appends to the history file and commits; expects the thread checked out.
pub(crate) fn append_user_message<B: VcsBackend>(
    session: &mut WriteSession<'_, B>,
    core: &Agit<B>,
    thread: &ThreadName,
    text: &str,
) -> Result<Message, AgitError> {
    let history = core.layout.history_file(thread);
    let writer = &core.history;
    session.modify_file(&history, |path| writer.append_user(path, text))?;
    let commit =
        session.stage_and_commit(&[&history], &commits::message_added("user", thread.as_str()))?;
    let info = session.backend().find_commit(&commit)?;
    Ok(message_record(
        thread,
        &info,
        MessageRole::User,
        text.to_string(),
        None,
    ))
}

fn thread_record(thread: &ThreadName, created: &CommitInfo) -> Thread {
    Thread {
        id: thread.to_string(),
        object: "thread".to_string(),
        created_at: created.timestamp.timestamp(),
        metadata: ThreadMetadata {
            name: thread.to_string(),
        },
    }
}

fn message_record(
    thread: &ThreadName,
    commit: &CommitInfo,
    role: MessageRole,
    text: String,
    assistant: Option<String>,
) -> Message {
    let created_at = commit.timestamp.timestamp();
    let run_id = assistant.as_ref().map(|_| commit.id.clone());
    Message {
        id: commit.id.clone(),
        object: "thread.message".to_string(),
        created_at,
        completed_at: Some(created_at),
        thread_id: thread.to_string(),
        status: "completed".to_string(),
        role,
        content: vec![MessageContent::text(text)],
        assistant_id: assistant,
        run_id,
        attachments: Vec::new(),
        metadata: None,
    }
}

fn thread_not_found(thread: &ThreadName) -> AgitError {
    ThreadError::NotFound {
        id: thread.to_string(),
    }
    .into()
}

/// Commits on a thread branch, split at the thread's creation commit.
pub(crate) struct ThreadLog {
    pub created: Option<CommitInfo>,
    /// Commits after creation, oldest first.
    pub commits: Vec<CommitInfo>,
}

pub(crate) fn thread_log<B: VcsBackend>(
    backend: &B,
    layout: &Layout,
    thread: &ThreadName,
) -> Result<ThreadLog, AgitError> {
    let branch = layout.thread_branch(thread);
    if !backend.branch_exists(&branch)? {
        return Err(thread_not_found(thread));
    }
    let mut created = None;
    let mut commits = Vec::new();
    for commit in backend.log(&branch, None)? {
        if commits::classify(&commit, thread.as_str()) == ThreadCommit::Created {
            created = Some(commit);
            break;
        }
        commits.push(commit);
    }
    commits.reverse();
    Ok(ThreadLog { created, commits })
}

/// Messages reconstructed from what each commit added to the history file.
pub(crate) fn load_messages<B: VcsBackend>(
    backend: &B,
    layout: &Layout,
    thread: &ThreadName,
) -> Result<Vec<Message>, AgitError> {
    let history = layout.history_file(thread);
    let log = thread_log(backend, layout, thread)?;

    let mut messages = Vec::new();
    for commit in &log.commits {
        let (role, assistant) = match commits::classify(commit, thread.as_str()) {
            ThreadCommit::UserMessage => (HistoryRole::User, None),
            ThreadCommit::Run { assistant } => (HistoryRole::Assistant, Some(assistant)),
            ThreadCommit::Created | ThreadCommit::Other => continue,
        };
        let Some(parent) = commit.first_parent() else {
            continue;
        };
        let diff = backend.diff_range(parent, &commit.id, Some(&history))?;
        let entries = parse_history(&added_text(&parse_unified_diff(&diff.unified)));
        let content = join_role(&entries, role);

        match role {
            HistoryRole::User => messages.push(message_record(
                thread,
                commit,
                MessageRole::User,
                content.unwrap_or_default(),
                None,
            )),
            HistoryRole::Assistant => {
                if let Some(content) = content {
                    messages.push(message_record(
                        thread,
                        commit,
                        MessageRole::Assistant,
                        content,
                        assistant,
                    ));
                }
            }
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use serde_json::{json, Map};

    fn layout() -> Layout {
        Layout::new(&Settings::default())
    }

    #[test]
    fn thread_name_comes_from_metadata() {
        let input = validate_thread(&CreateThreadRequest::named("aider/bugfix1"), &layout()).unwrap();
        assert_eq!(input.name.as_str(), "bugfix1");
        assert!(input.messages.is_empty());
    }

    #[test]
    fn thread_metadata_is_required() {
        assert!(matches!(
            validate_thread(&CreateThreadRequest::default(), &layout()),
            Err(RequestError::MissingField { field: "metadata" })
        ));

        let mut extra = Map::new();
        extra.insert("name".to_string(), json!("t1"));
        extra.insert("owner".to_string(), json!("me"));
        let request = CreateThreadRequest {
            metadata: Some(extra),
            ..CreateThreadRequest::default()
        };
        assert!(matches!(
            validate_thread(&request, &layout()),
            Err(RequestError::InvalidField {
                field: "metadata",
                ..
            })
        ));

        assert!(matches!(
            validate_thread(&CreateThreadRequest::named("bad name"), &layout()),
            Err(RequestError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn thread_rejects_tool_resources() {
        let request = CreateThreadRequest {
            tool_resources: Some(json!({"code_interpreter": {}})),
            ..CreateThreadRequest::named("t1")
        };
        assert!(matches!(
            validate_thread(&request, &layout()),
            Err(RequestError::UnsupportedField {
                field: "tool_resources"
            })
        ));
    }

    #[test]
    fn only_user_text_messages_are_writable() {
        assert_eq!(
            validate_message(&CreateMessageRequest::user("fix it")).unwrap(),
            "fix it"
        );

        let assistant = CreateMessageRequest {
            role: "assistant".to_string(),
            ..CreateMessageRequest::user("hi")
        };
        assert!(matches!(
            validate_message(&assistant),
            Err(RequestError::UnsupportedField { field: "role" })
        ));

        let system = CreateMessageRequest {
            role: "system".to_string(),
            ..CreateMessageRequest::user("hi")
        };
        assert!(matches!(
            validate_message(&system),
            Err(RequestError::InvalidField { field: "role", .. })
        ));

        let with_attachment = CreateMessageRequest {
            attachments: vec![json!({"file_id": "f"})],
            ..CreateMessageRequest::user("hi")
        };
        assert!(matches!(
            validate_message(&with_attachment),
            Err(RequestError::UnsupportedField {
                field: "attachments"
            })
        ));
    }

    #[test]
    fn text_parts_are_joined_and_images_rejected() {
        let parts: CreateMessageRequest = serde_json::from_value(json!({
            "role": "user",
            "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]
        }))
        .unwrap();
        assert_eq!(validate_message(&parts).unwrap(), "a\nb");

        let image: CreateMessageRequest = serde_json::from_value(json!({
            "role": "user",
            "content": [{"type": "image_url", "image_url": {"url": "http://x"}}]
        }))
        .unwrap();
        assert!(matches!(
            validate_message(&image),
            Err(RequestError::UnsupportedField { field: "content" })
        ));
    }
}
