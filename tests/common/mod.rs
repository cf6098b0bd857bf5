#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::error::Error as StdError;
use std::fmt;

use hypothesis_core::{Backend, ByteSource, Status};

/// Backend that hands out one session per scripted record, in order, and
/// keeps the first record seen for each failure label.
pub struct ScriptedBackend {
    scripts: VecDeque<Vec<u64>>,
    pub statuses: Vec<Status>,
    pub sessions_handed_out: usize,
    failing: BTreeMap<u64, Vec<u64>>,
    unsatisfiable: Option<bool>,
}

impl ScriptedBackend {
    pub fn new(scripts: Vec<Vec<u64>>) -> ScriptedBackend {
        ScriptedBackend {
            scripts: scripts.into(),
            statuses: Vec::new(),
            sessions_handed_out: 0,
            failing: BTreeMap::new(),
            unsatisfiable: None,
        }
    }

    pub fn with_unsatisfiable(mut self, unsatisfiable: bool) -> ScriptedBackend {
        self.unsatisfiable = Some(unsatisfiable);
        self
    }
}

impl Backend for ScriptedBackend {
    type Session = ByteSource;

    fn new_session(&mut self) -> Option<ByteSource> {
        let script = self.scripts.pop_front()?;
        self.sessions_handed_out += 1;
        Some(ByteSource::from_vec(script))
    }

    fn mark_finished(&mut self, session: ByteSource, status: Status) {
        if let Status::Interesting(label) = status {
            self.failing
                .entry(label)
                .or_insert_with(|| session.record().to_vec());
        }
        self.statuses.push(status);
    }

    fn count_failing_examples(&self) -> usize {
        self.failing.len()
    }

    fn failing_example_at(&mut self, i: usize) -> Option<ByteSource> {
        self.failing.values().nth(i).cloned().map(ByteSource::from_vec)
    }

    fn was_unsatisfiable(&self) -> bool {
        self.unsatisfiable.unwrap_or_else(|| {
            !self
                .statuses
                .iter()
                .any(|s| matches!(s, Status::Valid | Status::Interesting(_)))
        })
    }
}

#[derive(Debug)]
pub struct TooLarge(pub u64);

impl fmt::Display for TooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is too large", self.0)
    }
}

impl StdError for TooLarge {}

pub fn too_large(x: u64) -> Result<(), TooLarge> {
    if x >= 1000 {
        Err(TooLarge(x))
    } else {
        Ok(())
    }
}
