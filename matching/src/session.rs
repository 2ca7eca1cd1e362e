use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::{Group, MatchOptions, MatchResult, Matcher, Recording, SessionError};

/// Where a [`Session`] is in the teach-then-recognize workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No word is being taught.
    Idle,
    /// Recordings are added to the most recently registered word.
    Registering,
    /// Recordings are matched against the registered words.
    Interpreting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Idle => "idle",
            SessionState::Registering => "registering",
            SessionState::Interpreting => "interpreting",
        })
    }
}

/// What [`Session::submit`] did with a recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Submission {
    /// Added to group `group`, which now has `size` recordings.
    Registered { group: String, size: usize },
    /// Matched against the registered groups.
    Matched(MatchResult),
}

/// An interactive session: register words, teach each with recordings, then
/// match new recordings against them.
///
/// A word registered without any recording is dropped as soon as the next
/// word is registered or interpretation starts.
pub struct Session {
    groups: Vec<Group>,
    state: SessionState,
    options: MatchOptions,
    matcher: Matcher,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_options(MatchOptions::default())
    }

    /// Creates a session matching with `options`. Ties always yield
    /// indecision.
    pub fn with_options(options: MatchOptions) -> Self {
        Self {
            groups: Vec::new(),
            state: SessionState::Idle,
            options: options.with_indecision(true),
            matcher: Matcher::new(),
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Forgets every word and returns to [`SessionState::Idle`].
    pub fn reset(&mut self) {
        self.groups.clear();
        self.state = SessionState::Idle;
        info!("session reset");
    }

    /// Starts teaching a new word. Returns the label of a previous word that
    /// was dropped for having no recordings.
    pub fn register_word(&mut self, label: impl Into<String>) -> Result<Option<String>, SessionError> {
        if self.state == SessionState::Interpreting {
            return Err(SessionError::NotReady("interpreting; start over to register words"));
        }
        let dropped = self.drop_empty_word();
        let group = Group::new(label);
        info!(word = group.identifier(), "registering word");
        self.groups.push(group);
        self.state = SessionState::Registering;
        Ok(dropped)
    }

    /// Switches to matching. Requires at least two words with recordings.
    /// Returns the label of a trailing word dropped for having none.
    pub fn interpret(&mut self) -> Result<Option<String>, SessionError> {
        if self.state == SessionState::Interpreting {
            return Err(SessionError::AlreadyInterpreting);
        }
        let usable = self.groups.len() - usize::from(self.has_empty_word());
        if usable < 2 {
            return Err(SessionError::NotEnoughWords { got: usable });
        }

        let dropped = self.drop_empty_word();
        self.state = SessionState::Interpreting;
        info!(
            words = ?self.groups.iter().map(|g| format!("{}: {}", g.identifier(), g.len())).collect::<Vec<_>>(),
            "interpreting"
        );
        Ok(dropped)
    }

    /// Adds `recording` to the word being taught, or matches it when
    /// interpreting.
    pub fn submit(&mut self, recording: Arc<Recording>) -> Result<Submission, SessionError> {
        match self.state {
            SessionState::Idle => Err(SessionError::NotReady("register a word first")),
            SessionState::Registering => {
                let Some(group) = self.groups.last_mut() else {
                    return Err(SessionError::NotReady("register a word first"));
                };
                group.add(recording);
                Ok(Submission::Registered {
                    group: group.identifier().to_string(),
                    size: group.len(),
                })
            }
            SessionState::Interpreting => {
                let result = self.matcher.match_recording(&recording, &self.groups, &self.options)?;
                info!(recording = recording.identifier(), verdict = %result.verdict, "matched");
                Ok(Submission::Matched(result))
            }
        }
    }

    fn has_empty_word(&self) -> bool {
        self.state == SessionState::Registering && self.groups.last().is_some_and(Group::is_empty)
    }

    fn drop_empty_word(&mut self) -> Option<String> {
        if !self.has_empty_word() {
            return None;
        }
        let group = self.groups.pop()?;
        info!(word = group.identifier(), "dropping word without recordings");
        Some(group.identifier().to_string())
    }
}
