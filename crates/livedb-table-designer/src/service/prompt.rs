//! User confirmation for edits with side effects

/// Asks the user to confirm side effects of an edit
pub trait PromptHandler: Send + Sync {
    /// A SET NULL rule was chosen for a foreign key whose columns include
    /// NOT NULL ones. Returning true removes NOT NULL from those columns;
    /// false reverts the rule change.
    fn confirm_remove_not_null(&self, table: &str, foreign_key: &str, columns: &[String]) -> bool;
}

/// Declines every prompt, reverting the edit that asked
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclinePrompt;

impl PromptHandler for DeclinePrompt {
    fn confirm_remove_not_null(&self, table: &str, foreign_key: &str, columns: &[String]) -> bool {
        tracing::debug!(
            table = %table,
            foreign_key = %foreign_key,
            columns = ?columns,
            "declined removing NOT NULL for SET NULL rule"
        );
        false
    }
}
