use anyhow::{Context, Result};
use openletta::api::logging::init_tracing;
use openletta::api::ApiClient;
use openletta::commands::{help_text, parse_command, Command, DEFAULT_EXPORT_PATH};
use openletta::config::{Config, SessionState};
use openletta::runtime::mode::ModeControl;
use openletta::state::{Conversation, StreamUpdate};
use openletta::terminal;
use openletta::ui::{
    format_error, format_invocation, format_memory_blocks, format_turn, format_usage, Line, Style,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

enum Flow {
    Continue,
    Quit,
}

struct Session {
    config: Config,
    state: SessionState,
    conversation: Conversation,
}

impl Session {
    fn save_state(&mut self) {
        self.state.agent_id = Some(self.conversation.agent_id().to_string());
        self.state.conversation_id = self.conversation.conversation_id().map(str::to_string);
        self.state.mode = Some(self.conversation.mode().get());
        if let Err(error) = self.state.save(&self.config.state_path) {
            tracing::warn!(%error, "session state not saved");
        }
    }

    async fn replay(&mut self) -> Result<()> {
        match self
            .conversation
            .replay_history(self.config.history_limit)
            .await
        {
            Ok(_) => {
                let width = terminal::width();
                for turn in self.conversation.turns() {
                    terminal::print_lines(&format_turn(turn, width))?;
                }
            }
            Err(error) => terminal::print_lines(&[Line::new(
                Style::Error,
                format!("* History unavailable: {error}"),
            )])?,
        }
        Ok(())
    }

    async fn handle_command(&mut self, command: Command) -> Result<Flow> {
        let info = |text: String| Line::new(Style::Meta, text);
        match command {
            Command::Agent(Some(agent_id)) => {
                self.conversation.set_agent(agent_id);
                self.save_state();
                terminal::print_lines(&[info(format!(
                    "* Agent: {}",
                    self.conversation.agent_id()
                ))])?;
                self.replay().await?;
            }
            Command::Agent(None) => {
                terminal::print_lines(&[info(format!(
                    "* Agent: {}",
                    self.conversation.agent_id()
                ))])?;
            }
            Command::Session(Some(conversation_id)) => {
                self.conversation.set_conversation_id(Some(conversation_id));
                self.conversation.clear();
                self.save_state();
                terminal::print_lines(&[info(format!(
                    "* Session: {}",
                    self.conversation.conversation_id().unwrap_or("-")
                ))])?;
                self.replay().await?;
            }
            Command::Session(None) => {
                terminal::print_lines(&[info(format!(
                    "* Session: {}",
                    self.conversation.conversation_id().unwrap_or("-")
                ))])?;
            }
            Command::Mode(target) => {
                let mode = match target {
                    Some(mode) => {
                        self.conversation.mode().set(mode);
                        mode
                    }
                    None => self.conversation.mode().toggle(),
                };
                self.save_state();
                terminal::print_lines(&[info(format!("* Mode: {mode}"))])?;
            }
            Command::InvalidMode(value) => {
                terminal::print_lines(&[Line::new(
                    Style::Error,
                    format!("* Unknown mode '{value}': expected read-only or full-access"),
                )])?;
            }
            Command::History => self.replay().await?,
            Command::Memory => {
                let lines = match self.conversation.core_memory().await {
                    Ok(blocks) => format_memory_blocks(&blocks, terminal::width()),
                    Err(error) => vec![Line::new(
                        Style::Error,
                        format!("* Core memory unavailable: {error}"),
                    )],
                };
                terminal::print_lines(&lines)?;
            }
            Command::Export(path) => {
                let path = PathBuf::from(path.as_deref().unwrap_or(DEFAULT_EXPORT_PATH));
                let line = match self.conversation.export_json(&path) {
                    Ok(()) => info(format!("* Exported transcript to {}", path.display())),
                    Err(error) => Line::new(Style::Error, format!("* Export failed: {error:#}")),
                };
                terminal::print_lines(&[line])?;
            }
            Command::Clear => {
                self.conversation.clear();
                terminal::print_lines(&[info("* Cleared".to_string())])?;
            }
            Command::Config => {
                let client = self.conversation.client();
                let lines = vec![
                    info("* Config".to_string()),
                    info(format!("  base url:      {}", client.base_url())),
                    info(format!(
                        "  api key:       {}",
                        if self.config.api_key.is_some() { "set" } else { "not set" }
                    )),
                    info(format!("  agent:         {}", self.conversation.agent_id())),
                    info(format!(
                        "  session:       {}",
                        self.conversation.conversation_id().unwrap_or("-")
                    )),
                    info(format!("  mode:          {}", self.conversation.mode().get())),
                    info(format!("  history limit: {}", self.config.history_limit)),
                    info(format!("  state file:    {}", self.config.state_path.display())),
                ];
                terminal::print_lines(&lines)?;
            }
            Command::Help => {
                let lines: Vec<Line> = help_text()
                    .lines()
                    .map(|line| info(line.to_string()))
                    .collect();
                terminal::print_lines(&lines)?;
            }
            Command::Quit => return Ok(Flow::Quit),
            Command::Unknown(word) => {
                terminal::print_lines(&[Line::new(
                    Style::Error,
                    format!("* Unknown command {word}; /help lists commands"),
                )])?;
            }
        }
        Ok(Flow::Continue)
    }

    async fn exchange(&mut self, text: &str) -> Result<()> {
        let cancel = CancellationToken::new();
        let interrupt = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(render_updates(update_rx, terminal::width()));
        let outcome = self
            .conversation
            .send(text, &cancel, Some(&update_tx))
            .await
            .map(|turn| turn.usage.as_ref().and_then(format_usage));
        drop(update_tx);
        interrupt.abort();
        let _ = printer.await;

        match outcome {
            Ok(usage) => terminal::print_lines(&usage.into_iter().collect::<Vec<_>>())?,
            Err(error) => terminal::print_lines(&[format_error(&error)])?,
        }
        Ok(())
    }
}

async fn render_updates(mut updates: mpsc::UnboundedReceiver<StreamUpdate>, width: usize) {
    let mut mid_line = false;
    while let Some(update) = updates.recv().await {
        let lines = match update {
            StreamUpdate::Delta { delta, .. } => {
                if terminal::print_delta(&delta).is_err() {
                    return;
                }
                mid_line = !delta.ends_with('\n');
                continue;
            }
            StreamUpdate::Reasoning { content, .. } => vec![Line::new(
                Style::Reasoning,
                format!("~ {content}"),
            )],
            StreamUpdate::ToolRequested { invocation, .. }
            | StreamUpdate::ToolCompleted { invocation, .. } => {
                format_invocation(&invocation, width)
            }
            StreamUpdate::Usage { .. } => continue,
        };
        if mid_line {
            let _ = terminal::print_delta("\n");
            mid_line = false;
        }
        if terminal::print_lines(&lines).is_err() {
            return;
        }
    }
    if mid_line {
        let _ = terminal::print_delta("\n");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::load()?;
    config.validate()?;

    let state = SessionState::load(&config.state_path);
    let agent_id = config
        .agent_id
        .clone()
        .or_else(|| state.agent_id.clone())
        .context("no agent selected: set LETTA_AGENT_ID")?;
    let mode = ModeControl::new(config.initial_mode.or(state.mode).unwrap_or_default());

    let client = ApiClient::new(&config);
    let mut conversation = Conversation::new(client, agent_id, mode);
    if config.agent_id.is_none() || config.agent_id == state.agent_id {
        conversation.set_conversation_id(state.conversation_id.clone());
    }
    tracing::info!(
        agent_id = %conversation.agent_id(),
        base_url = %config.base_url,
        mode = %conversation.mode().get(),
        "session started"
    );

    let mut session = Session {
        config,
        state,
        conversation,
    };
    session.save_state();
    session.replay().await?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        terminal::print_prompt(session.conversation.mode().get())?;
        let line = tokio::select! {
            line = input.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        match parse_command(text) {
            Some(command) => {
                if let Flow::Quit = session.handle_command(command).await? {
                    break;
                }
            }
            None => session.exchange(text).await?,
        }
    }

    session.save_state();
    println!();
    Ok(())
}
