//! Confirmation prompts for interactive passes.

use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use tracing::warn;

/// Decides whether a single move may proceed.
pub trait Confirmer: Send + Sync {
    /// Returns `true` to move `name` into `category`.
    fn confirm(&self, name: &str, category: &str) -> bool;
}

/// Approves every move.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

impl Confirmer for AlwaysConfirm {
    fn confirm(&self, _name: &str, _category: &str) -> bool {
        true
    }
}

/// Declines every move.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverConfirm;

impl Confirmer for NeverConfirm {
    fn confirm(&self, _name: &str, _category: &str) -> bool {
        false
    }
}

/// Asks on the terminal, defaulting to yes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, name: &str, category: &str) -> bool {
        let answer = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Move '{}' to '{}' directory?", name, category))
            .default(true)
            .interact();

        match answer {
            Ok(answer) => answer,
            Err(e) => {
                // No usable terminal: treat as a decline so nothing moves.
                warn!(error = %e, file = name, "Confirmation prompt failed");
                false
            }
        }
    }
}
