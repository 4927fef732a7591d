//! Collaborators of the table editing model
//!
//! Loading referenced tables from the server and asking the user to confirm
//! side effects both live outside the model.

mod live_source;
mod prompt;

pub use live_source::LiveObjectSource;
pub use prompt::{DeclinePrompt, PromptHandler};
