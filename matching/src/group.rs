use std::fmt;
use std::slice;
use std::sync::Arc;

use rand::seq::index;
use rand::Rng;
use tracing::debug;

use crate::{MatchError, Recording};

/// A labelled, ordered collection of recordings.
///
/// Members are shared `Arc<Recording>` handles and are compared by pointer
/// identity, so one recording may belong to several groups. A group is not
/// internally synchronized; callers that mutate it from several threads
/// must wrap it themselves.
#[derive(Clone)]
pub struct Group {
    identifier: String,
    recordings: Vec<Arc<Recording>>,
}

impl Group {
    /// Creates an empty group.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            recordings: Vec::new(),
        }
    }

    /// Creates a group from initial members, skipping repeated handles.
    pub fn with_recordings<I>(identifier: impl Into<String>, recordings: I) -> Self
    where
        I: IntoIterator<Item = Arc<Recording>>,
    {
        let mut group = Self::new(identifier);
        for r in recordings {
            group.add(r);
        }
        group
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Appends `recording` unless it is already a member. Returns whether it
    /// was added.
    pub fn add(&mut self, recording: Arc<Recording>) -> bool {
        if self.contains(&recording) {
            return false;
        }
        self.recordings.push(recording);
        true
    }

    /// Removes `recording`, preserving the order of the others.
    pub fn remove(&mut self, recording: &Arc<Recording>) -> Result<Arc<Recording>, MatchError> {
        match self.position(recording) {
            Some(i) => Ok(self.recordings.remove(i)),
            None => Err(MatchError::NotFound {
                group: self.identifier.clone(),
                recording: recording.identifier().to_string(),
            }),
        }
    }

    pub fn contains(&self, recording: &Arc<Recording>) -> bool {
        self.position(recording).is_some()
    }

    fn position(&self, recording: &Arc<Recording>) -> Option<usize> {
        self.recordings.iter().position(|r| Arc::ptr_eq(r, recording))
    }

    /// Draws `k` distinct members uniformly at random without replacement.
    ///
    /// `k == len()` yields every member once, in random order.
    pub fn sample<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Result<Vec<Arc<Recording>>, MatchError> {
        if k > self.recordings.len() {
            return Err(MatchError::InsufficientSize {
                group: self.identifier.clone(),
                requested: k,
                available: self.recordings.len(),
            });
        }
        debug!(group = %self.identifier, k, size = self.recordings.len(), "sampling");
        Ok(index::sample(rng, self.recordings.len(), k)
            .into_iter()
            .map(|i| Arc::clone(&self.recordings[i]))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Arc<Recording>> {
        self.recordings.iter()
    }

    pub fn recordings(&self) -> &[Arc<Recording>] {
        &self.recordings
    }
}

impl<'a> IntoIterator for &'a Group {
    type Item = &'a Arc<Recording>;
    type IntoIter = slice::Iter<'a, Arc<Recording>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("identifier", &self.identifier)
            .field(
                "recordings",
                &self.recordings.iter().map(|r| r.identifier()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} recordings)", self.identifier, self.recordings.len())
    }
}
