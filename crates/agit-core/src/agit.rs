use crate::agent::{Agent, CommandAgent, DEFAULT_AGENT_COMMAND};
use crate::assistants::AssistantsApi;
use crate::config::Settings;
use crate::gateway::Gateway;
use crate::history::{HistoryWriter, MarkdownHistory};
use crate::ids::Layout;
use crate::runs::RunsApi;
use crate::threads::{MessagesApi, ThreadsApi};
use agit_vcs::VcsBackend;

/// Assistants, threads, messages and runs over one git working tree.
pub struct Agit<B: VcsBackend> {
    pub(crate) gateway: Gateway<B>,
    pub(crate) layout: Layout,
    pub(crate) history: Box<dyn HistoryWriter>,
    pub(crate) agent: Box<dyn Agent>,
}

impl<B: VcsBackend> Agit<B> {
    pub fn new(backend: B, settings: &Settings) -> Self {
        let command = settings
            .agent_command
            .clone()
            .unwrap_or_else(|| DEFAULT_AGENT_COMMAND.to_string());
        Self {
            gateway: Gateway::new(backend, settings),
            layout: Layout::new(settings),
            history: Box::new(MarkdownHistory),
            agent: Box::new(CommandAgent::new(command, settings.agent_timeout())),
        }
    }

    pub fn with_agent(mut self, agent: impl Agent + 'static) -> Self {
        self.agent = Box::new(agent);
        self
    }

    pub fn with_history_writer(mut self, writer: impl HistoryWriter + 'static) -> Self {
        self.history = Box::new(writer);
        self
    }

    pub fn assistants(&self) -> AssistantsApi<'_, B> {
        AssistantsApi { core: self }
    }

    pub fn threads(&self) -> ThreadsApi<'_, B> {
        ThreadsApi { core: self }
    }

    pub fn messages(&self) -> MessagesApi<'_, B> {
        MessagesApi { core: self }
    }

    pub fn runs(&self) -> RunsApi<'_, B> {
        RunsApi { core: self }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }
}
