mod common;

use agit_core::error::{AgentError, AgitError, AssistantError, ThreadError};
use agit_core::types::{
    CreateMessageRequest, CreateRunRequest, CreateThreadAndRunRequest, CreateThreadRequest,
    ListQuery, MessageListQuery, MessageRole, RunStatus, RunStepType, SortOrder,
};
use agit_core::Agit;
use agit_vcs::GitBackend;
use common::{assistant_request, Fixture, ScriptedAgent};

fn prepare(fixture: &Fixture, agent: ScriptedAgent) -> Agit<GitBackend> {
    let agit = fixture.agit(agent);
    agit.assistants()
        .create(assistant_request("coder", "gpt-4o"))
        .unwrap();
    let mut thread = CreateThreadRequest::named("feature");
    thread.messages = vec![CreateMessageRequest::user("add a greeting")];
    agit.threads().create(Some(thread)).unwrap();
    agit
}

fn run_request() -> CreateRunRequest {
    CreateRunRequest {
        assistant_id: "coder".to_string(),
        ..CreateRunRequest::default()
    }
}

fn ascending() -> ListQuery {
    ListQuery {
        order: Some(SortOrder::Asc),
        ..ListQuery::default()
    }
}

#[test]
fn test_run_records_edits_as_steps_and_reply_as_message() {
    let fixture = Fixture::new();
    let agit = prepare(
        &fixture,
        ScriptedAgent::editing("hello.txt", "hello\n", "I added hello.txt."),
    );

    let run = agit.runs().create("feature", run_request()).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.assistant_id, "coder");
    assert_eq!(run.model, "coder");
    assert_eq!(run.thread_id, "feature");
    assert_eq!(fixture.origin_tip("aider/feature").as_deref(), Some(run.id.as_str()));
    assert_eq!(fixture.show("aider/feature", "hello.txt"), "hello");

    let steps = agit.runs().list_steps("feature", &run.id, &ascending()).unwrap();
    let kinds: Vec<(RunStepType, &str)> = steps
        .data
        .iter()
        .map(|step| (step.step_type, step.step_details.path.as_str()))
        .collect();
    assert!(kinds.contains(&(RunStepType::FileEdit, "hello.txt")));
    assert!(kinds.contains(&(
        RunStepType::MessageCreation,
        ".aider/threads/feature.chat.history.md"
    )));
    let first = agit.runs().get_step("feature", &run.id, "0").unwrap();
    assert_eq!(first, steps.data[0]);
    assert!(matches!(
        agit.runs().get_step("feature", &run.id, "99").unwrap_err(),
        AgitError::Thread(ThreadError::StepNotFound { .. })
    ));

    let messages = agit
        .messages()
        .list(
            "feature",
            &MessageListQuery {
                order: Some(SortOrder::Asc),
                ..MessageListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(messages.data.len(), 2);
    let reply = &messages.data[1];
    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.text(), "I added hello.txt.");
    assert_eq!(reply.run_id.as_deref(), Some(run.id.as_str()));
    assert_eq!(reply.assistant_id.as_deref(), Some("coder"));

    let filtered = agit
        .messages()
        .list(
            "feature",
            &MessageListQuery {
                run_id: Some(run.id.clone()),
                ..MessageListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(filtered.data.len(), 1);
}

#[test]
fn test_agent_commits_fold_into_one_run_commit() {
    let fixture = Fixture::new();
    let agent = ScriptedAgent {
        commit_own_work: true,
        ..ScriptedAgent::editing("src/lib.rs", "pub fn hi() {}\n", "Done.")
    };
    let agit = prepare(&fixture, agent);
    let before = fixture.git(&["rev-parse", "aider/feature"]);

    let run = agit.runs().create("feature", run_request()).unwrap();
    assert_eq!(fixture.git(&["rev-parse", &format!("{}^", run.id)]), before);
    assert!(fixture
        .git(&["log", "-1", "--format=%B", &run.id])
        .contains("Run-Status: completed"));
    assert!(fixture.git(&["status", "--porcelain"]).is_empty());
}

#[test]
fn test_run_without_changes_leaves_a_marker_commit() {
    let fixture = Fixture::new();
    let agit = prepare(&fixture, ScriptedAgent::idle());
    let before = fixture.git(&["rev-parse", "aider/feature"]);

    let run = agit.runs().create("feature", run_request()).unwrap();
    assert_ne!(run.id, before);
    assert_eq!(
        fixture.git(&["log", "-1", "--format=%s", "aider/feature"]),
        "aider: Run coder on feature"
    );
    let steps = agit.runs().list_steps("feature", &run.id, &ascending()).unwrap();
    assert!(steps.data.is_empty());

    let runs = agit.runs().list("feature", &ascending()).unwrap();
    assert_eq!(runs.data.len(), 1);
    assert_eq!(agit.runs().get("feature", &run.id).unwrap(), runs.data[0]);
}

#[test]
fn test_nonzero_exit_marks_run_failed() {
    let fixture = Fixture::new();
    let agent = ScriptedAgent {
        exit_code: 2,
        ..ScriptedAgent::idle()
    };
    let agit = prepare(&fixture, agent);

    let run = agit.runs().create("feature", run_request()).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.failed_at.is_some());
    assert!(run.last_error.unwrap().message.contains('2'));
}

#[test]
fn test_agent_error_discards_partial_edits() {
    let fixture = Fixture::new();
    let agent = ScriptedAgent {
        fail_with_error: true,
        ..ScriptedAgent::editing("README.md", "clobbered\n", "never")
    };
    let agit = prepare(&fixture, agent);
    let before = fixture.git(&["rev-parse", "aider/feature"]);
    let pushed = fixture.origin_tip("aider/feature");

    let request = CreateRunRequest {
        additional_messages: vec![CreateMessageRequest::user("extra context")],
        ..run_request()
    };
    let err = agit.runs().create("feature", request).unwrap_err();
    assert!(matches!(err, AgitError::Agent(AgentError::Spawn { .. })));
    assert_eq!(fixture.git(&["rev-parse", "aider/feature"]), before);
    assert_eq!(fixture.origin_tip("aider/feature"), pushed);
    assert!(fixture.git(&["status", "--porcelain"]).is_empty());
    assert_eq!(
        std::fs::read_to_string(fixture.path().join("README.md")).unwrap(),
        "# demo\n"
    );

    // The next push must not carry the abandoned messages along.
    agit.messages()
        .create("feature", CreateMessageRequest::user("later"))
        .unwrap();
    let texts: Vec<String> = agit
        .messages()
        .list("feature", &MessageListQuery::default())
        .unwrap()
        .data
        .iter()
        .map(|message| message.text())
        .collect();
    assert!(!texts.iter().any(|text| text == "extra context"));
    assert!(!fixture
        .show("aider/feature", ".aider/threads/feature.chat.history.md")
        .contains("extra context"));
}

#[test]
fn test_run_with_assistant_created_after_the_thread() {
    let fixture = Fixture::new();
    let agit = fixture.agit(ScriptedAgent::editing("late.txt", "late\n", "Done."));
    let mut thread = CreateThreadRequest::named("early");
    thread.messages = vec![CreateMessageRequest::user("write late.txt")];
    agit.threads().create(Some(thread)).unwrap();
    agit.assistants()
        .create(assistant_request("late", "gpt-4o"))
        .unwrap();

    let run = agit
        .runs()
        .create(
            "early",
            CreateRunRequest {
                assistant_id: "late".to_string(),
                ..CreateRunRequest::default()
            },
        )
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.assistant_id, "late");
    assert_eq!(fixture.show("aider/early", "late.txt"), "late");

    // The overlay is lent for the run, not committed to the thread.
    assert!(!common::git_ok(
        fixture.path(),
        &["cat-file", "-e", "aider/early:.aider/assistants/late.conf.yml"]
    ));
    assert!(fixture.git(&["status", "--porcelain"]).is_empty());
}

#[test]
fn test_run_by_assistant_commit_id_created_after_the_thread() {
    let fixture = Fixture::new();
    let agit = fixture.agit(ScriptedAgent::idle());
    let mut thread = CreateThreadRequest::named("early");
    thread.messages = vec![CreateMessageRequest::user("look around")];
    agit.threads().create(Some(thread)).unwrap();
    let assistant = agit
        .assistants()
        .create(assistant_request("late", "gpt-4o"))
        .unwrap();

    let run = agit
        .runs()
        .create(
            "early",
            CreateRunRequest {
                assistant_id: assistant.id.clone(),
                ..CreateRunRequest::default()
            },
        )
        .unwrap();
    assert_eq!(run.assistant_id, "late");
}

#[test]
fn test_create_thread_and_run_with_unknown_assistant_leaves_no_thread() {
    let fixture = Fixture::new();
    let agit = fixture.agit(ScriptedAgent::idle());
    let mut thread = CreateThreadRequest::named("orphan");
    thread.messages = vec![CreateMessageRequest::user("hello")];

    let err = agit
        .runs()
        .create_thread_and_run(CreateThreadAndRunRequest {
            assistant_id: "nobody".to_string(),
            thread: Some(thread),
            ..CreateThreadAndRunRequest::default()
        })
        .unwrap_err();
    assert!(matches!(
        err,
        AgitError::Assistant(AssistantError::NotFound { .. })
    ));
    assert!(fixture.origin_tip("aider/orphan").is_none());
    assert!(!common::git_ok(
        fixture.path(),
        &["rev-parse", "--verify", "refs/heads/aider/orphan"]
    ));
    assert!(matches!(
        agit.threads().get("orphan").unwrap_err(),
        AgitError::Thread(ThreadError::NotFound { .. })
    ));
}

#[test]
fn test_run_with_unknown_assistant() {
    let fixture = Fixture::new();
    let agit = prepare(&fixture, ScriptedAgent::idle());
    let err = agit
        .runs()
        .create(
            "feature",
            CreateRunRequest {
                assistant_id: "nobody".to_string(),
                ..CreateRunRequest::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AgitError::Assistant(AssistantError::NotFound { .. })
    ));
}

#[test]
fn test_additional_messages_are_committed_before_the_run() {
    let fixture = Fixture::new();
    let agit = prepare(&fixture, ScriptedAgent::idle());

    let run = agit
        .runs()
        .create(
            "feature",
            CreateRunRequest {
                additional_messages: vec![CreateMessageRequest::user("also add tests")],
                ..run_request()
            },
        )
        .unwrap();

    let parent = fixture.git(&["rev-parse", &format!("{}^", run.id)]);
    assert_eq!(
        fixture.git(&["log", "-1", "--format=%s", &parent]),
        "aider: Add 'user' message to feature"
    );
}

#[test]
fn test_create_thread_and_run() {
    let fixture = Fixture::new();
    let agit = fixture.agit(ScriptedAgent::editing("notes.md", "notes\n", "Wrote notes."));
    let assistant = agit
        .assistants()
        .create(assistant_request("writer", "gpt-4o"))
        .unwrap();

    let mut thread = CreateThreadRequest::named("docs");
    thread.messages = vec![CreateMessageRequest::user("write notes")];
    let run = agit
        .runs()
        .create_thread_and_run(CreateThreadAndRunRequest {
            assistant_id: assistant.id.clone(),
            thread: Some(thread),
            ..CreateThreadAndRunRequest::default()
        })
        .unwrap();

    assert_eq!(run.thread_id, "docs");
    assert_eq!(run.assistant_id, "writer");
    assert_eq!(fixture.show("aider/docs", "notes.md"), "notes");
    assert_eq!(agit.threads().get("docs").unwrap().id, "docs");
}

#[test]
fn test_unsupported_run_operations() {
    let fixture = Fixture::new();
    let agit = fixture.agit(ScriptedAgent::idle());
    assert!(matches!(
        agit.runs().cancel("t", "r").unwrap_err(),
        AgitError::UnsupportedOperation { .. }
    ));
    assert!(matches!(
        agit.runs().submit_tool_outputs("t", "r").unwrap_err(),
        AgitError::UnsupportedOperation { .. }
    ));
}
