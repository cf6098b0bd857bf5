// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! The session protocol between the engine and a generation backend.
//!
//! The engine never decides what data to try. It asks the backend for
//! sessions until there are none left, reports how each one ended, and then
//! asks for the failing examples the backend settled on.

use crate::data::{DataSource, Status};

pub trait Backend {
    type Session: DataSource;

    /// The next session to run, or `None` once the backend is done.
    fn new_session(&mut self) -> Option<Self::Session>;

    /// Hands a finished session back with its outcome.
    fn mark_finished(&mut self, session: Self::Session, status: Status);

    fn finish_valid(&mut self, session: Self::Session) {
        self.mark_finished(session, Status::Valid)
    }

    fn finish_invalid(&mut self, session: Self::Session) {
        self.mark_finished(session, Status::Invalid)
    }

    fn finish_overflow(&mut self, session: Self::Session) {
        self.mark_finished(session, Status::Overflow)
    }

    /// `label` tells distinct failures apart.
    fn finish_interesting(&mut self, session: Self::Session, label: u64) {
        self.mark_finished(session, Status::Interesting(label))
    }

    /// Number of distinct failing examples found. Only meaningful once
    /// [`new_session`](Backend::new_session) has returned `None`.
    fn count_failing_examples(&self) -> usize;

    /// A fresh session replaying the `i`-th failing example.
    fn failing_example_at(&mut self, i: usize) -> Option<Self::Session>;

    /// A fresh session replaying the best failing example, if any.
    fn failing_example(&mut self) -> Option<Self::Session> {
        self.failing_example_at(0)
    }

    /// Whether the run ended without a single valid or interesting trial.
    fn was_unsatisfiable(&self) -> bool;
}
