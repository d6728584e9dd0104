use crate::runtime::mode::Mode;

pub const DEFAULT_EXPORT_PATH: &str = "chat-export.json";

/// A slash command typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Agent(Option<String>),
    Session(Option<String>),
    /// `None` toggles the current mode.
    Mode(Option<Mode>),
    /// An argument that is not a mode name.
    InvalidMode(String),
    History,
    /// Show the agent's core memory blocks.
    Memory,
    Export(Option<String>),
    Clear,
    Config,
    Help,
    Quit,
    Unknown(String),
}

/// Parses `text` as a slash command. Anything not starting with `/` is a
/// message for the agent and yields `None`.
pub fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (trimmed, ""),
    };
    let argument = (!rest.is_empty()).then(|| rest.to_string());

    let command = match word.to_ascii_lowercase().as_str() {
        "/agent" => Command::Agent(argument),
        "/session" => Command::Session(argument),
        "/mode" => match argument {
            None => Command::Mode(None),
            Some(value) => match value.parse::<Mode>() {
                Ok(mode) => Command::Mode(Some(mode)),
                Err(_) => Command::InvalidMode(value),
            },
        },
        "/history" => Command::History,
        "/memory" => Command::Memory,
        "/export" => Command::Export(argument),
        "/clear" => Command::Clear,
        "/config" => Command::Config,
        "/help" | "/commands" => Command::Help,
        "/quit" | "/exit" | "/q" => Command::Quit,
        _ => Command::Unknown(word.to_string()),
    };
    Some(command)
}

pub fn help_text() -> &'static str {
    "\
Commands:
  /agent <id>        switch to a different agent
  /session <id>      switch to a different conversation
  /mode [mode]       set read-only or full-access; toggles without an argument
  /history           reload the transcript from the server
  /memory            show the agent's core memory
  /export [path]     write the transcript as JSON (default chat-export.json)
  /clear             clear the local transcript
  /config            show the current session configuration
  /help              show this help
  /quit              exit

Ctrl-C cancels a running response; press it again at the prompt to exit."
}
