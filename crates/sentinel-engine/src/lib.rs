//! Check registry, selection and dispatch
//!
//! This crate turns a validated configuration into executions:
//! - [`Registry`] maps check names to their category, iteration strategy
//!   and parameter schema
//! - [`selector::applies`] decides whether a definition covers a resource
//! - [`runner::run`] expands definitions into (check, resource) pairs and
//!   executes each one in isolation
//!
//! ```no_run
//! use sentinel_core::ConfigDocument;
//! use sentinel_dbt::ArtifactLoader;
//! use sentinel_engine::{runner, Artifacts, Registry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigDocument::from_file("dbt-sentinel.yml".as_ref())?;
//! let definitions = Registry::builtin().validate(&config)?;
//! let loader = ArtifactLoader::from_config(&config);
//! let artifacts = Artifacts::load(&loader, runner::requirements(&definitions))?;
//! let results = runner::run(&definitions, &artifacts.context());
//! # let _ = results;
//! # Ok(())
//! # }
//! ```

pub mod check;
pub mod context;
pub mod selector;
pub mod registry;
pub mod executor;
pub mod runner;
mod checks;

pub use check::{ensure, Check, CheckError, CheckOutcome, Target};
pub use context::{Artifacts, Context, Requirements};
pub use registry::{CheckDefinition, CheckKind, IterateOver, Registry, RegistryError};
pub use runner::{plan, run, Job, Plan};
