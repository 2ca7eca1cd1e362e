//! CLI commands module.

mod evaluate;
mod groups;
mod matching;
mod session;
mod transcribe;
mod util;

pub use evaluate::EvaluateCommand;
pub use groups::GroupsCommand;
pub use matching::MatchCommand;
pub use session::SessionCommand;
pub use transcribe::TranscribeCommand;

pub(crate) use util::*;
