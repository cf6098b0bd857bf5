// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

// Catching panics raised by test bodies, along with where they were raised.
//
// `catch_unwind` hands back the payload only. A process-wide hook records
// the panic location for threads that are currently inside `catch` and stays
// quiet for them; every other panic goes to the hook that was installed
// before ours. If something replaces our hook, the next caught panic arrives
// without a location and the hook is installed again on top of the new one.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use log::warn;
use once_cell::sync::Lazy;

use crate::errors::{format_location, UserError};

thread_local! {
    static CAPTURING: Cell<usize> = Cell::new(0);
    static HOOK_SEEN: Cell<bool> = Cell::new(false);
    static LAST_LOCATION: RefCell<Option<String>> = RefCell::new(None);
}

static HOOK: Lazy<()> = Lazy::new(install_hook);

fn install_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let capturing = CAPTURING.try_with(|c| c.get() > 0).unwrap_or(false);
        if capturing {
            let location = info.location().map(format_location);
            let _ = HOOK_SEEN.try_with(|seen| seen.set(true));
            let _ = LAST_LOCATION.try_with(|last| *last.borrow_mut() = location);
        } else {
            previous(info);
        }
    }));
}

/// A panic caught while running a test body.
pub struct Panic {
    payload: Box<dyn Any + Send + 'static>,
    location: Option<String>,
}

impl Panic {
    pub fn message(&self) -> String {
        if let Some(s) = self.payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = self.payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        }
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn into_user_error(self) -> UserError {
        let error = UserError::new("panic", self.message());
        match self.location {
            Some(location) => error.with_origin(location),
            None => error,
        }
    }

    /// Continues unwinding with the original payload.
    pub fn resume(self) -> ! {
        panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for Panic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Panic")
            .field("message", &self.message())
            .field("location", &self.location)
            .finish()
    }
}

/// Runs `f`, turning a panic into a [`Panic`] value.
pub fn catch<R>(f: impl FnOnce() -> R) -> Result<R, Panic> {
    Lazy::force(&HOOK);
    CAPTURING.with(|c| c.set(c.get() + 1));
    HOOK_SEEN.with(|seen| seen.set(false));
    LAST_LOCATION.with(|last| last.borrow_mut().take());

    let result = panic::catch_unwind(AssertUnwindSafe(f));

    CAPTURING.with(|c| c.set(c.get() - 1));
    result.map_err(|payload| {
        if !HOOK_SEEN.with(|seen| seen.replace(false)) {
            warn!("Panic hook was replaced; reinstalling it to record panic locations");
            install_hook();
        }
        Panic {
            payload,
            location: LAST_LOCATION.with(|last| last.borrow_mut().take()),
        }
    })
}
