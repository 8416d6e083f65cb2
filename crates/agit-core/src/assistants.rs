use crate::agit::Agit;
use crate::aider_config::{AiderConfig, AssistantOverlay, ModelSettings, ModelSettingsRegistry};
use crate::commits;
use crate::error::{AgitError, AssistantError, RequestError};
use crate::ids::{is_commit_id, AssistantName, Layout};
use crate::pagination::paginate;
use crate::types::assistant::{Assistant, CreateAssistantRequest, ResponseFormat};
use crate::types::list::{ListQuery, ListResponse};
use crate::types::{is_present, DeletionStatus};
use agit_vcs::{CommitInfo, VcsBackend};
use tracing::{info, instrument};

pub struct AssistantsApi<'a, B: VcsBackend> {
    pub(crate) core: &'a Agit<B>,
}

#[derive(Debug)]
struct NewAssistant {
    name: AssistantName,
    model: String,
    instructions: Option<String>,
    temperature: Option<f64>,
    top_p: Option<f64>,
}

impl<'a, B: VcsBackend> AssistantsApi<'a, B> {
    #[instrument(skip(self, request), fields(name = ?request.name))]
    pub fn create(&self, request: CreateAssistantRequest) -> Result<Assistant, AgitError> {
        let input = validate_create(&request)?;
        let layout = &self.core.layout;

        self.core.gateway.write(|session| {
            session.checkout_working_branch()?;

            let config_path = layout.assistant_config(&input.name);
            if session.exists(&config_path) {
                return Err(AssistantError::AlreadyExists {
                    id: input.name.to_string(),
                }
                .into());
            }

            let shared = SharedConfig::load(layout, |path| session.read_to_string(path))?;
            if shared.registry.contains(input.name.as_str()) {
                return Err(AssistantError::Conflict {
                    id: input.name.to_string(),
                }
                .into());
            }

            let mut overlay = AssistantOverlay {
                alias: shared.base.aliases(),
                read: Vec::new(),
            };
            overlay.alias.push(format!("{}:{}", input.name, input.model));

            let mut registry = shared.registry;
            registry.push(ModelSettings::new(
                input.name.as_str(),
                input.temperature,
                input.top_p,
            ));

            let mut paths = vec![config_path.clone(), shared.registry_path.clone()];
            if let Some(instructions) = input.instructions.as_deref() {
                let instructions_path = layout.instructions_file(&input.name);
                overlay.read = shared.base.read_files();
                overlay.read.push(instructions_path.clone());
                session.write_file(&instructions_path, instructions)?;
                paths.push(instructions_path);
            }
            session.write_file(&shared.registry_path, &registry.to_yaml()?)?;
            session.write_file(&config_path, &overlay.to_yaml()?)?;

            let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
            let commit = session.stage_and_commit(
                &paths,
                &commits::assistant_created(input.name.as_str()),
            )?;
            let info = session.backend().find_commit(&commit)?;
            session.push(session.working_branch())?;

            info!(assistant = %input.name, commit = %commit, "assistant created");
            Ok(Assistant {
                id: commit,
                object: "assistant".to_string(),
                created_at: info.timestamp.timestamp(),
                name: input.name.to_string(),
                description: None,
                model: input.model,
                instructions: input.instructions,
                tools: Vec::new(),
                metadata: None,
                temperature: input.temperature,
                top_p: input.top_p,
                response_format: ResponseFormat::default(),
            })
        })
    }

    pub fn list(&self, query: &ListQuery) -> Result<ListResponse<Assistant>, AgitError> {
        let layout = &self.core.layout;
        let working = self.core.gateway.working_branch();
        let assistants = self
            .core
            .gateway
            .read(|backend| load_assistants(backend, layout, working))?;
        Ok(paginate(assistants, query, |assistant| assistant.id.as_str())?)
    }

    /// Looks an assistant up by name or by the hash of its creation commit.
    pub fn get(&self, assistant_id: &str) -> Result<Assistant, AgitError> {
        let layout = &self.core.layout;
        let working = self.core.gateway.working_branch();
        self.core.gateway.read(|backend| {
            if is_commit_id(assistant_id) {
                let assistants = load_assistants(backend, layout, working)?;
                if let Some(found) = assistants.into_iter().find(|a| a.id == assistant_id) {
                    return Ok(found);
                }
            }
            let name = AssistantName::parse(assistant_id).map_err(|_| not_found(assistant_id))?;
            if !backend.branch_exists(working)? {
                return Err(not_found(assistant_id));
            }
            let log = backend.log(working, None)?;
            let registry = SharedConfig::load(layout, |path| read_at(backend, working, path))?
                .registry;
            load_assistant(backend, layout, working, &name, &registry, &log)?
                .ok_or_else(|| not_found(assistant_id))
        })
    }

    pub fn modify(&self, _assistant_id: &str) -> Result<Assistant, AgitError> {
        Err(AgitError::unsupported("modify_assistant"))
    }

    /// Removes the overlay, the instructions file and the registry record in
    /// one commit.
    #[instrument(skip(self))]
    pub fn delete(&self, assistant_id: &str) -> Result<DeletionStatus, AgitError> {
        let layout = &self.core.layout;
        self.core.gateway.write(|session| {
            session.checkout_working_branch()?;

            let name = if is_commit_id(assistant_id) {
                let working = session.working_branch();
                load_assistants(session.backend(), layout, working)?
                    .into_iter()
                    .find(|assistant| assistant.id == assistant_id)
                    .and_then(|assistant| AssistantName::parse(&assistant.name).ok())
                    .ok_or_else(|| not_found(assistant_id))?
            } else {
                AssistantName::parse(assistant_id).map_err(|_| not_found(assistant_id))?
            };

            let config_path = layout.assistant_config(&name);
            if !session.exists(&config_path) {
                return Err(not_found(assistant_id));
            }

            let shared = SharedConfig::load(layout, |path| session.read_to_string(path))?;
            let mut registry = shared.registry;
            let mut paths = vec![config_path.clone()];
            if registry.remove(name.as_str()) {
                session.write_file(&shared.registry_path, &registry.to_yaml()?)?;
                paths.push(shared.registry_path.clone());
            }
            let instructions_path = layout.instructions_file(&name);
            if session.exists(&instructions_path) {
                session.remove_file(&instructions_path)?;
                paths.push(instructions_path);
            }
            session.remove_file(&config_path)?;

            let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
            let commit =
                session.stage_and_commit(&paths, &commits::assistant_deleted(name.as_str()))?;
            session.push(session.working_branch())?;

            info!(assistant = %name, commit = %commit, "assistant deleted");
            Ok(DeletionStatus::new(assistant_id, "assistant.deleted"))
        })
    }
}

fn validate_create(request: &CreateAssistantRequest) -> Result<NewAssistant, RequestError> {
    let name = request
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or(RequestError::MissingField { field: "name" })?;
    let name = AssistantName::parse(name)?;
    let model = request
        .model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .ok_or(RequestError::MissingField { field: "model" })?;

    if !request.tools.is_empty() {
        return Err(RequestError::UnsupportedField { field: "tools" });
    }
    if is_present(request.tool_resources.as_ref()) {
        return Err(RequestError::UnsupportedField {
            field: "tool_resources",
        });
    }
    if request
        .response_format
        .as_ref()
        .is_some_and(|format| !format.is_auto())
    {
        return Err(RequestError::UnsupportedField {
            field: "response_format",
        });
    }
    if is_present(request.metadata.as_ref()) {
        return Err(RequestError::UnsupportedField { field: "metadata" });
    }
    if request
        .description
        .as_deref()
        .is_some_and(|description| !description.is_empty())
    {
        return Err(RequestError::UnsupportedField {
            field: "description",
        });
    }
    validate_sampling(request.temperature, request.top_p)?;

    Ok(NewAssistant {
        name,
        model: model.to_string(),
        instructions: request
            .instructions
            .clone()
            .filter(|instructions| !instructions.is_empty()),
        temperature: request.temperature,
        top_p: request.top_p,
    })
}

pub(crate) fn validate_sampling(
    temperature: Option<f64>,
    top_p: Option<f64>,
) -> Result<(), RequestError> {
    if let Some(value) = temperature {
        if !(0.0..=2.0).contains(&value) {
            return Err(RequestError::InvalidField {
                field: "temperature",
                message: format!("must be between 0 and 2, got {value}"),
            });
        }
    }
    if let Some(value) = top_p {
        if !(0.0..=1.0).contains(&value) {
            return Err(RequestError::InvalidField {
                field: "top_p",
                message: format!("must be between 0 and 1, got {value}"),
            });
        }
    }
    Ok(())
}

/// The base config plus the registry it points at.
struct SharedConfig {
    base: AiderConfig,
    registry_path: String,
    registry: ModelSettingsRegistry,
}

impl SharedConfig {
    fn load<F>(layout: &Layout, read: F) -> Result<Self, AgitError>
    where
        F: Fn(&str) -> Result<Option<String>, AgitError>,
    {
        let base = match read(layout.base_config())? {
            Some(text) => AiderConfig::parse(layout.base_config(), &text)?,
            None => AiderConfig::default(),
        };
        let registry_path = layout.model_settings_file(base.model_settings_file.as_deref());
        let registry = match read(&registry_path)? {
            Some(text) => ModelSettingsRegistry::parse(&registry_path, &text)?,
            None => ModelSettingsRegistry::default(),
        };
        Ok(Self {
            base,
            registry_path,
            registry,
        })
    }
}

fn read_at<B: VcsBackend>(backend: &B, rev: &str, path: &str) -> Result<Option<String>, AgitError> {
    Ok(backend.read_file(rev, path)?)
}

/// Every assistant visible at `rev`, oldest first.
pub(crate) fn load_assistants<B: VcsBackend>(
    backend: &B,
    layout: &Layout,
    rev: &str,
) -> Result<Vec<Assistant>, AgitError> {
    if !backend.branch_exists(rev)? {
        return Ok(Vec::new());
    }
    let registry = SharedConfig::load(layout, |path| read_at(backend, rev, path))?.registry;
    let log = backend.log(rev, None)?;

    let mut found: Vec<(usize, Assistant)> = Vec::new();
    for path in backend.list_dir(rev, &layout.assistants_dir())? {
        let Some(name) = layout.assistant_from_config_path(&path) else {
            continue;
        };
        if let Some(assistant) = load_assistant(backend, layout, rev, &name, &registry, &log)? {
            let age = log
                .iter()
                .position(|commit| commit.id == assistant.id)
                .unwrap_or(log.len());
            found.push((age, assistant));
        }
    }
    // `log` is newest first, so a larger position means an older assistant.
    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
    Ok(found.into_iter().map(|(_, assistant)| assistant).collect())
}

/// The files an agent needs to act as `name`, as `(path, content)` read at
/// `rev`: the overlay, its instructions file and the model-settings registry.
/// `None` when the assistant has no overlay there.
pub(crate) fn assistant_files<B: VcsBackend>(
    backend: &B,
    layout: &Layout,
    rev: &str,
    name: &AssistantName,
) -> Result<Option<Vec<(String, String)>>, AgitError> {
    let config_path = layout.assistant_config(name);
    let Some(overlay_text) = backend.read_file(rev, &config_path)? else {
        return Ok(None);
    };
    let overlay = AiderConfig::parse(&config_path, &overlay_text)?;

    let mut files = Vec::new();
    let instructions_path = layout.instructions_file(name);
    if overlay.read_files().contains(&instructions_path) {
        if let Some(text) = backend.read_file(rev, &instructions_path)? {
            files.push((instructions_path, text));
        }
    }
    let registry_path =
        SharedConfig::load(layout, |path| read_at(backend, rev, path))?.registry_path;
    if let Some(text) = backend.read_file(rev, &registry_path)? {
        files.push((registry_path, text));
    }
    files.push((config_path, overlay_text));
    Ok(Some(files))
}

fn load_assistant<B: VcsBackend>(
    backend: &B,
    layout: &Layout,
    rev: &str,
    name: &AssistantName,
    registry: &ModelSettingsRegistry,
    log: &[CommitInfo],
) -> Result<Option<Assistant>, AgitError> {
    let config_path = layout.assistant_config(name);
    let Some(text) = backend.read_file(rev, &config_path)? else {
        return Ok(None);
    };
    let overlay = AiderConfig::parse(&config_path, &text)?;

    let instructions_path = layout.instructions_file(name);
    let instructions = if overlay.read_files().contains(&instructions_path) {
        backend.read_file(rev, &instructions_path)?
    } else {
        None
    };

    let Some(created) = creation_commit(backend, name, &config_path, log)? else {
        return Ok(None);
    };
    let record = registry.get(name.as_str());

    Ok(Some(Assistant {
        id: created.id.clone(),
        object: "assistant".to_string(),
        created_at: created.timestamp.timestamp(),
        name: name.to_string(),
        description: None,
        model: overlay.model_for(name.as_str()).unwrap_or_default(),
        instructions,
        tools: Vec::new(),
        metadata: None,
        temperature: record.and_then(ModelSettings::temperature),
        top_p: record.and_then(ModelSettings::top_p),
        response_format: ResponseFormat::default(),
    }))
}

/// The commit that added the assistant: the one with the creation subject,
/// else the oldest commit whose tree holds its config.
fn creation_commit<'l, B: VcsBackend>(
    backend: &B,
    name: &AssistantName,
    config_path: &str,
    log: &'l [CommitInfo],
) -> Result<Option<&'l CommitInfo>, AgitError> {
    let subject = commits::assistant_created(name.as_str());
    if let Some(commit) = log.iter().find(|commit| commit.summary() == subject) {
        return Ok(Some(commit));
    }
    let mut oldest = None;
    for commit in log {
        if backend.read_file(&commit.id, config_path)?.is_none() {
            break;
        }
        oldest = Some(commit);
    }
    Ok(oldest)
}

fn not_found(id: &str) -> AgitError {
    AssistantError::NotFound { id: id.to_string() }.into()
}
