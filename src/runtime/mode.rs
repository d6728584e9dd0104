use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;

/// Client-enforced operating mode for tool invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    ReadOnly,
    FullAccess,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
            Self::FullAccess => "full-access",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::ReadOnly => Self::FullAccess,
            Self::FullAccess => Self::ReadOnly,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "read-only" | "readonly" | "read_only" | "ro" | "plan" => Ok(Self::ReadOnly),
            "full-access" | "fullaccess" | "full_access" | "full" | "build" => {
                Ok(Self::FullAccess)
            }
            other => Err(format!(
                "unknown mode '{other}', expected read-only or full-access"
            )),
        }
    }
}

/// Shared getter/setter for the current [`Mode`].
///
/// Clones observe the same value. Readers take a fresh copy per decision, so a
/// change applies to the next tool request that gets normalized and never to
/// one already emitted.
#[derive(Clone)]
pub struct ModeControl {
    tx: std::sync::Arc<watch::Sender<Mode>>,
}

impl ModeControl {
    pub fn new(initial: Mode) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    pub fn get(&self) -> Mode {
        *self.tx.borrow()
    }

    pub fn set(&self, mode: Mode) {
        let previous = self.tx.send_replace(mode);
        if previous != mode {
            tracing::info!(from = %previous, to = %mode, "mode changed");
        }
    }

    /// Flips the mode and returns the new value.
    pub fn toggle(&self) -> Mode {
        let mut next = Mode::default();
        self.tx.send_modify(|mode| {
            *mode = mode.toggled();
            next = *mode;
        });
        tracing::info!(to = %next, "mode toggled");
        next
    }

    pub fn subscribe(&self) -> watch::Receiver<Mode> {
        self.tx.subscribe()
    }
}

impl Default for ModeControl {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parses_aliases() {
        assert_eq!("plan".parse::<Mode>(), Ok(Mode::ReadOnly));
        assert_eq!(" Read-Only ".parse::<Mode>(), Ok(Mode::ReadOnly));
        assert_eq!("BUILD".parse::<Mode>(), Ok(Mode::FullAccess));
        assert_eq!("full_access".parse::<Mode>(), Ok(Mode::FullAccess));
        assert!("yolo".parse::<Mode>().is_err());
    }

    #[test]
    fn test_mode_control_clones_share_state() {
        let control = ModeControl::new(Mode::ReadOnly);
        let other = control.clone();
        other.set(Mode::FullAccess);
        assert_eq!(control.get(), Mode::FullAccess);
        assert_eq!(control.toggle(), Mode::ReadOnly);
        assert_eq!(other.get(), Mode::ReadOnly);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let control = ModeControl::new(Mode::ReadOnly);
        let mut rx = control.subscribe();
        control.set(Mode::FullAccess);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Mode::FullAccess);
    }

    #[test]
    fn test_mode_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Mode::FullAccess).unwrap(),
            "\"full-access\""
        );
    }
}
