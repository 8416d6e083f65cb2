mod common;

use agit_core::error::{AgitError, AssistantError, RequestError};
use agit_core::types::{CreateAssistantRequest, ListQuery, SortOrder};
use common::{assistant_request, Fixture, ScriptedAgent};

#[test]
fn test_create_assistant_writes_overlay_and_registry() {
    let fixture = Fixture::new();
    let agit = fixture.agit(ScriptedAgent::idle());

    let assistant = agit
        .assistants()
        .create(CreateAssistantRequest {
            instructions: Some("Review carefully.".to_string()),
            temperature: Some(0.2),
            ..assistant_request("reviewer", "gpt-4o")
        })
        .unwrap();

    assert_eq!(assistant.id.len(), 40);
    assert_eq!(assistant.name, "reviewer");
    assert_eq!(assistant.model, "gpt-4o");
    assert_eq!(assistant.temperature, Some(0.2));
    assert_eq!(
        fixture.git(&["log", "-1", "--format=%s", "aider-main"]),
        "aider: Add reviewer config and add reviewer to model settings"
    );
    assert_eq!(fixture.origin_tip("aider-main").as_deref(), Some(assistant.id.as_str()));

    let overlay = fixture.show("aider-main", ".aider/assistants/reviewer.conf.yml");
    assert!(overlay.contains("reviewer:gpt-4o"));
    assert!(overlay.contains(".aider/instructions/reviewer.md"));
    assert_eq!(
        fixture.show("aider-main", ".aider/instructions/reviewer.md"),
        "Review carefully."
    );

    let registry = fixture.show("aider-main", ".aider.model.settings.yml");
    assert!(registry.contains("name: reviewer"));
    assert!(registry.contains("use_temperature: true"));
    assert!(registry.contains("temperature: 0.2"));
}

#[test]
fn test_overlay_keeps_base_aliases() {
    let fixture = Fixture::with_files(&[
        ("README.md", "# demo\n"),
        (".aider.conf.yml", "alias:\n  - fast:gpt-4o-mini\n"),
    ]);
    let agit = fixture.agit(ScriptedAgent::idle());

    agit.assistants()
        .create(assistant_request("coder", "claude-3-5-sonnet"))
        .unwrap();

    let overlay = fixture.show("aider-main", ".aider/assistants/coder.conf.yml");
    assert!(overlay.contains("fast:gpt-4o-mini"));
    assert!(overlay.contains("coder:claude-3-5-sonnet"));
    assert!(!overlay.contains("read"));
}

#[test]
fn test_duplicate_assistant_is_rejected() {
    let fixture = Fixture::new();
    let agit = fixture.agit(ScriptedAgent::idle());

    agit.assistants()
        .create(assistant_request("reviewer", "gpt-4o"))
        .unwrap();
    let tip = fixture.git(&["rev-parse", "aider-main"]);

    let err = agit
        .assistants()
        .create(assistant_request("reviewer", "gpt-4o-mini"))
        .unwrap_err();
    assert!(matches!(
        err,
        AgitError::Assistant(AssistantError::AlreadyExists { .. })
    ));
    assert_eq!(fixture.git(&["rev-parse", "aider-main"]), tip);
}

#[test]
fn test_registry_name_collision_is_a_conflict() {
    let fixture = Fixture::with_files(&[
        ("README.md", "# demo\n"),
        (".aider.model.settings.yml", "- name: taken\n  edit_format: diff\n"),
    ]);
    let agit = fixture.agit(ScriptedAgent::idle());

    let err = agit
        .assistants()
        .create(assistant_request("taken", "gpt-4o"))
        .unwrap_err();
    assert!(matches!(
        err,
        AgitError::Assistant(AssistantError::Conflict { .. })
    ));
    assert!(fixture.git(&["status", "--porcelain"]).is_empty());
}

#[test]
fn test_invalid_requests_touch_nothing() {
    let fixture = Fixture::new();
    let agit = fixture.agit(ScriptedAgent::idle());

    let err = agit
        .assistants()
        .create(assistant_request("not valid", "gpt-4o"))
        .unwrap_err();
    assert!(matches!(
        err,
        AgitError::Request(RequestError::InvalidIdentifier { .. })
    ));

    let err = agit
        .assistants()
        .create(CreateAssistantRequest {
            tools: vec![serde_json::json!({"type": "retrieval"})],
            ..assistant_request("reviewer", "gpt-4o")
        })
        .unwrap_err();
    assert!(matches!(
        err,
        AgitError::Request(RequestError::UnsupportedField { field: "tools" })
    ));

    assert!(!common::git_ok(
        fixture.path(),
        &["rev-parse", "--verify", "--quiet", "refs/heads/aider-main"]
    ));
}

#[test]
fn test_list_and_get_assistants() {
    let fixture = Fixture::new();
    let agit = fixture.agit(ScriptedAgent::idle());

    let first = agit
        .assistants()
        .create(assistant_request("first", "gpt-4o"))
        .unwrap();
    let second = agit
        .assistants()
        .create(CreateAssistantRequest {
            top_p: Some(0.5),
            instructions: Some("Be terse.".to_string()),
            ..assistant_request("second", "gpt-4o-mini")
        })
        .unwrap();

    let listed = agit
        .assistants()
        .list(&ListQuery {
            order: Some(SortOrder::Asc),
            ..ListQuery::default()
        })
        .unwrap();
    let ids: Vec<&str> = listed.data.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);
    assert!(!listed.has_more);

    let by_name = agit.assistants().get("second").unwrap();
    let by_id = agit.assistants().get(&second.id).unwrap();
    assert_eq!(by_name, by_id);
    assert_eq!(by_name.model, "gpt-4o-mini");
    assert_eq!(by_name.top_p, Some(0.5));
    assert_eq!(by_name.temperature, None);
    assert_eq!(by_name.instructions.as_deref(), Some("Be terse."));

    let newest_first = agit.assistants().list(&ListQuery::default()).unwrap();
    assert_eq!(newest_first.first_id.as_deref(), Some(second.id.as_str()));
}

#[test]
fn test_delete_assistant() {
    let fixture = Fixture::new();
    let agit = fixture.agit(ScriptedAgent::idle());

    let created = agit
        .assistants()
        .create(CreateAssistantRequest {
            instructions: Some("x".to_string()),
            ..assistant_request("reviewer", "gpt-4o")
        })
        .unwrap();
    let deleted = agit.assistants().delete(&created.id).unwrap();
    assert!(deleted.deleted);
    assert_eq!(deleted.object, "assistant.deleted");

    assert!(matches!(
        agit.assistants().get("reviewer").unwrap_err(),
        AgitError::Assistant(AssistantError::NotFound { .. })
    ));
    let registry = fixture.show("aider-main", ".aider.model.settings.yml");
    assert!(!registry.contains("reviewer"));
    assert!(!common::git_ok(
        fixture.path(),
        &["cat-file", "-e", "aider-main:.aider/instructions/reviewer.md"]
    ));

    assert!(matches!(
        agit.assistants().delete("reviewer").unwrap_err(),
        AgitError::Assistant(AssistantError::NotFound { .. })
    ));
}

#[test]
fn test_modify_is_unsupported() {
    let fixture = Fixture::new();
    let agit = fixture.agit(ScriptedAgent::idle());
    assert!(matches!(
        agit.assistants().modify("reviewer").unwrap_err(),
        AgitError::UnsupportedOperation { .. }
    ));
}
