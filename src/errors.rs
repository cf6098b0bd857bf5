// This file is part of the Hypothesis Conjecture Rust implementation.
//
// Copyright (C) 2025 Hypothesis Contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Conditions that stop a trial or a whole test run.
//!
//! Two layers live here. [`Failure`] is what a test body hands back to the
//! engine when a single trial stops early; most of its variants are consumed
//! by the engine and never seen again. [`Error`] is what a run hands back to
//! its caller once every trial is done.

use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;

/// Returned by a data source once the current session's draw budget is spent.
///
/// This is a control signal, not an error: `?` inside a test body turns it
/// into [`Failure::Overflow`] and the engine reports the trial as an overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataOverflow;

impl fmt::Display for DataOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Test case exceeded its data budget")
    }
}

/// A failure raised by user code inside a test body.
///
/// `kind` plays the role of an exception class: the concrete type name of the
/// error that was converted, or `"panic"` for a caught panic. `origin` is the
/// source location it was raised from, when known. Together they identify a
/// distinct failure across trials.
#[derive(Debug)]
pub struct UserError {
    kind: &'static str,
    message: String,
    origin: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl UserError {
    pub fn new(kind: &'static str, message: impl Into<String>) -> UserError {
        UserError {
            kind,
            message: message.into(),
            origin: None,
            source: None,
        }
    }

    pub(crate) fn from_error<E>(error: E, origin: &'static Location<'static>) -> UserError
    where
        E: StdError + Send + Sync + 'static,
    {
        UserError {
            kind: std::any::type_name::<E>(),
            message: error.to_string(),
            origin: Some(format_location(origin)),
            source: Some(Box::new(error)),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> UserError {
        self.origin = Some(origin.into());
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// The original error value, if this failure was converted from one.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.as_ref().and_then(|e| e.downcast_ref::<E>())
    }

    pub(crate) fn key(&self) -> (&'static str, Option<String>) {
        (self.kind, self.origin.clone())
    }
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub(crate) fn format_location(location: &Location<'_>) -> String {
    format!("{}:{}:{}", location.file(), location.line(), location.column())
}

/// Why a single trial stopped before its body returned a value.
#[derive(Debug)]
pub enum Failure {
    /// An assumption did not hold; the trial is discarded.
    Reject,
    /// The trial ran out of data.
    Overflow,
    /// The test API was used outside of its contract.
    Usage(String),
    /// The test itself failed.
    Error(UserError),
}

impl Failure {
    pub fn usage(message: impl Into<String>) -> Failure {
        Failure::Usage(message.into())
    }

    /// A failure with no underlying error type, e.g. a plain assertion message.
    #[track_caller]
    pub fn fail(message: impl Into<String>) -> Failure {
        Failure::Error(UserError::new("failure", message).with_origin(format_location(Location::caller())))
    }

    // A nested run's usage error arrives here wrapped as a user error by `?`.
    pub(crate) fn escalate_usage(self) -> Failure {
        match self {
            Failure::Error(error) => match error.downcast_ref::<Error>() {
                Some(Error::Usage(message)) => Failure::Usage(message.clone()),
                _ => Failure::Error(error),
            },
            other => other,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Reject => write!(f, "Assumption failed"),
            Failure::Overflow => write!(f, "{}", DataOverflow),
            Failure::Usage(message) => write!(f, "Usage error: {}", message),
            Failure::Error(error) => write!(f, "{}", error),
        }
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    #[track_caller]
    fn from(error: E) -> Failure {
        Failure::Error(UserError::from_error(error, Location::caller()))
    }
}

impl From<DataOverflow> for Failure {
    fn from(_: DataOverflow) -> Failure {
        Failure::Overflow
    }
}

/// One top-level value drawn during the replay of a failing example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Given {
    /// The label passed to the draw, or `#n` for the n-th unlabelled draw.
    pub name: String,
    /// `Debug` rendering of the drawn value.
    pub value: String,
}

impl fmt::Display for Given {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Given {}: {}", self.name, self.value)
    }
}

/// A user failure annotated with the draws that produced it.
#[derive(Debug)]
pub struct FailureReport {
    error: UserError,
    givens: Vec<Given>,
}

impl FailureReport {
    pub fn new(error: UserError, givens: Vec<Given>) -> FailureReport {
        FailureReport { error, givens }
    }

    pub fn error(&self) -> &UserError {
        &self.error
    }

    pub fn givens(&self) -> &[Given] {
        &self.givens
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for given in &self.givens {
            writeln!(f, "{}", given)?;
        }
        write!(f, "{}", self.error)
    }
}

/// Every distinct failure found for a single test.
#[derive(Debug)]
pub struct MultipleFailures {
    reports: Vec<FailureReport>,
}

impl MultipleFailures {
    pub fn new(reports: Vec<FailureReport>) -> MultipleFailures {
        MultipleFailures { reports }
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn reports(&self) -> &[FailureReport] {
        &self.reports
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FailureReport> {
        self.reports.iter()
    }
}

impl fmt::Display for MultipleFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Test raised {} distinct errors:", self.reports.len())?;
        for report in &self.reports {
            write!(f, "\n\n{}", report)?;
        }
        Ok(())
    }
}

/// Errors that escape a test run
#[derive(Debug)]
pub enum Error {
    /// The caller broke the API contract (nested runs, invalid configuration).
    Usage(String),
    /// The backend could not find enough valid trials.
    Unsatisfiable { name: String },
    /// A find-mode run finished without a satisfying example.
    NoExampleFound,
    /// A find-mode body failed; propagated as-is.
    Test(UserError),
    /// The property failed; the report carries the minimal draws.
    Failed(FailureReport),
    /// The property failed in more than one distinct way.
    MultipleFailures(MultipleFailures),
    /// Failing examples stopped failing when replayed.
    Flaky { unreproduced: usize },
}

impl Error {
    /// Number of distinct test failures carried by this error.
    pub fn failure_count(&self) -> usize {
        match self {
            Error::Test(_) | Error::Failed(_) => 1,
            Error::MultipleFailures(failures) => failures.len(),
            _ => 0,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Usage(message) => write!(f, "Usage error: {}", message),
            Error::Unsatisfiable { name } => write!(f, "Unable to satisfy assumptions of {}", name),
            Error::NoExampleFound => write!(f, "Could not find any examples"),
            Error::Test(error) => write!(f, "{}", error),
            Error::Failed(report) => write!(f, "{}", report),
            Error::MultipleFailures(failures) => write!(f, "{}", failures),
            Error::Flaky { unreproduced } => write!(
                f,
                "{} failing example(s) did not fail when replayed; the test is flaky",
                unreproduced
            ),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let error = match self {
            Error::Test(error) => error,
            Error::Failed(report) => report.error(),
            _ => return None,
        };
        error.source_error().map(|source| source as &(dyn StdError + 'static))
    }
}

/// Result type for test runs
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom(u32);

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom {}", self.0)
        }
    }

    impl StdError for Boom {}

    fn raise(n: u32) -> std::result::Result<(), Failure> {
        let result: std::result::Result<(), Boom> = Err(Boom(n));
        result?;
        Ok(())
    }

    #[test]
    fn test_question_mark_captures_kind_and_origin() {
        match raise(3) {
            Err(Failure::Error(error)) => {
                assert!(error.kind().ends_with("Boom"));
                assert_eq!(error.message(), "boom 3");
                assert!(error.origin().is_some());
                assert_eq!(error.downcast_ref::<Boom>().unwrap().0, 3);
            }
            other => panic!("Expected a user error, got {:?}", other),
        }
    }

    #[test]
    fn test_same_raise_site_gives_same_key() {
        let a = match raise(1) {
            Err(Failure::Error(e)) => e.key(),
            _ => unreachable!(),
        };
        let b = match raise(2) {
            Err(Failure::Error(e)) => e.key(),
            _ => unreachable!(),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_overflow_converts_to_overflow_failure() {
        let failure: Failure = DataOverflow.into();
        assert!(matches!(failure, Failure::Overflow));
    }

    #[test]
    fn test_nested_usage_error_is_escalated() {
        fn nested() -> std::result::Result<(), Failure> {
            let inner: Result<()> = Err(Error::Usage("Cannot nest hypothesis calls".to_string()));
            inner?;
            Ok(())
        }
        match nested().unwrap_err().escalate_usage() {
            Failure::Usage(message) => assert_eq!(message, "Cannot nest hypothesis calls"),
            other => panic!("Expected usage failure, got {:?}", other),
        }
        assert!(matches!(
            raise(1).unwrap_err().escalate_usage(),
            Failure::Error(_)
        ));
    }

    #[test]
    fn test_report_lists_givens_before_error() {
        let report = FailureReport::new(
            UserError::new("failure", "x too large"),
            vec![
                Given { name: "x".to_string(), value: "1000".to_string() },
                Given { name: "#2".to_string(), value: "true".to_string() },
            ],
        );
        assert_eq!(report.to_string(), "Given x: 1000\nGiven #2: true\nx too large");
    }

    #[test]
    fn test_multiple_failures_display_counts_reports() {
        let failures = MultipleFailures::new(vec![
            FailureReport::new(UserError::new("a", "first"), Vec::new()),
            FailureReport::new(UserError::new("b", "second"), Vec::new()),
        ]);
        let error = Error::MultipleFailures(failures);
        assert_eq!(error.failure_count(), 2);
        let text = error.to_string();
        assert!(text.starts_with("Test raised 2 distinct errors:"));
        assert!(text.contains("first"));
        assert!(text.contains("second"));
    }

    #[test]
    fn test_error_source_exposes_original_error() {
        let error = match raise(7) {
            Err(Failure::Error(e)) => Error::Test(e),
            _ => unreachable!(),
        };
        let source = error.source().unwrap();
        assert_eq!(source.to_string(), "boom 7");
    }
}
