// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of the engine currently running on this thread.
//!
//! At most one engine may be active per thread at any time. The slot is
//! claimed by [`World::enter`] and released when the returned guard drops,
//! which also happens while unwinding from a panic.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;

use crate::engine::Mode;
use crate::errors::{Error, Result};

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: RefCell<Option<ActiveEngine>> = RefCell::new(None);
}

/// Description of a running engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEngine {
    pub id: u64,
    pub name: String,
    pub mode: Mode,
}

pub struct World;

impl World {
    /// The engine running on this thread, if any.
    pub fn current_engine() -> Option<ActiveEngine> {
        CURRENT.with(|current| current.borrow().clone())
    }

    pub fn is_active() -> bool {
        CURRENT.with(|current| current.borrow().is_some())
    }

    /// Claims the slot for an engine called `name`.
    ///
    /// Fails with a usage error if another engine already holds it; the
    /// message depends on which kind of run attempted to nest.
    pub(crate) fn enter(name: &str, mode: Mode) -> Result<WorldGuard> {
        CURRENT.with(|current| {
            let mut current = current.borrow_mut();
            if let Some(active) = current.as_ref() {
                let message = match (mode, active.mode) {
                    (Mode::Find, Mode::Property) => "Cannot nest find inside Hypothesis tests",
                    _ => "Cannot nest hypothesis calls",
                };
                return Err(Error::Usage(message.to_string()));
            }
            let id = NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed);
            trace!("Engine {} ({}) entered world", id, name);
            *current = Some(ActiveEngine {
                id,
                name: name.to_string(),
                mode,
            });
            Ok(WorldGuard {
                id,
                _not_send: PhantomData,
            })
        })
    }
}

/// Releases the registry slot on drop.
#[derive(Debug)]
pub struct WorldGuard {
    id: u64,
    _not_send: PhantomData<*const ()>,
}

impl WorldGuard {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for WorldGuard {
    fn drop(&mut self) {
        // The thread local may already be gone during thread teardown.
        let _ = CURRENT.try_with(|current| {
            if let Ok(mut current) = current.try_borrow_mut() {
                if current.as_ref().map(|active| active.id) == Some(self.id) {
                    trace!("Engine {} left world", self.id);
                    *current = None;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_and_release() {
        assert!(!World::is_active());
        {
            let guard = World::enter("outer", Mode::Property).unwrap();
            let active = World::current_engine().unwrap();
            assert_eq!(active.id, guard.id());
            assert_eq!(active.name, "outer");
            assert_eq!(active.mode, Mode::Property);
        }
        assert!(World::current_engine().is_none());
    }

    #[test]
    fn test_nesting_is_rejected_without_disturbing_the_holder() {
        let guard = World::enter("outer", Mode::Property).unwrap();
        match World::enter("inner", Mode::Property) {
            Err(Error::Usage(message)) => assert_eq!(message, "Cannot nest hypothesis calls"),
            other => panic!("Expected usage error, got {:?}", other.map(|g| g.id())),
        }
        match World::enter("inner", Mode::Find) {
            Err(Error::Usage(message)) => {
                assert_eq!(message, "Cannot nest find inside Hypothesis tests")
            }
            other => panic!("Expected usage error, got {:?}", other.map(|g| g.id())),
        }
        assert_eq!(World::current_engine().unwrap().id, guard.id());
        drop(guard);
        assert!(!World::is_active());
    }

    #[test]
    fn test_slot_released_when_unwinding() {
        let result = std::panic::catch_unwind(|| {
            let _guard = World::enter("doomed", Mode::Find).unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!World::is_active());
    }

    #[test]
    fn test_registry_is_per_thread() {
        let _guard = World::enter("here", Mode::Property).unwrap();
        let other = std::thread::spawn(|| World::is_active()).join().unwrap();
        assert!(!other);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = World::enter("a", Mode::Property).unwrap().id();
        let b = World::enter("b", Mode::Property).unwrap().id();
        assert_ne!(a, b);
    }
}
