//! # Hypothesis core
//!
//! Test execution orchestration for property-based testing.
//!
//! A test body receives a [`TestCase`] and draws its inputs from
//! [`Provider`]s. The [`Engine`] runs the body once per session handed out by
//! a [`Backend`], reports each outcome back, and turns the failing examples
//! the backend settles on into a report: the values drawn, followed by the
//! error they caused.
//!
//! ```
//! use hypothesis_core::{hypothesis, bounded_integers, EngineConfig, Error, Failure};
//!
//! let result = hypothesis(EngineConfig::new("below 1000"), |tc| {
//!     let x = tc.draw_as("x", &bounded_integers(1_000_000))?;
//!     if x >= 1000 {
//!         return Err(Failure::fail(format!("{} is too large", x)));
//!     }
//!     Ok(())
//! });
//!
//! match result {
//!     Err(Error::Failed(report)) => assert_eq!(report.givens()[0].name, "x"),
//!     other => panic!("unexpected result: {:?}", other),
//! }
//! ```

pub mod backend;
pub mod config;
pub mod data;
pub mod distributions;
pub mod engine;
pub mod errors;
pub mod ints;
mod panics;
pub mod providers;
pub mod runner;
pub mod test_case;
pub mod world;

// Re-export core types for easy access
pub use backend::Backend;
pub use config::EngineConfig;
pub use data::{ByteSource, DataSource, Status, TestResult};
pub use distributions::{Coin, Repeat};
pub use engine::{find, hypothesis, Engine, Mode, RunStatistics};
pub use errors::{DataOverflow, Error, Failure, FailureReport, Given, MultipleFailures, Result, UserError};
pub use providers::{
    biased_booleans, booleans, bounded_integers, element_of, from_fn, integer_range, integers, just, vectors, Provider,
    ProviderExt,
};
pub use runner::{ConjectureRunner, ExitReason, RunnerStats};
pub use test_case::{Draws, TestCase};
pub use world::{ActiveEngine, World};
