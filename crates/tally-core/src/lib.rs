//! tally-core: workflow states, filters and optimistic sync for tasks and
//! daily reports.
//!
//! # Conventions
//!
//! - **Errors**: library operations return [`error::TallyError`]; config
//!   loading uses `anyhow::Result`.
//! - **Logging**: `tracing` macros only; installing a subscriber is the
//!   binary's job.
//! - **State**: every flow mutates a [`view::SharedView`] through closures and
//!   never holds its lock across an `.await`.

pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod notify;
pub mod remark;
pub mod remote;
pub mod reports;
pub mod session;
pub mod sync;
pub mod tasks;
pub mod trash;
pub mod view;
pub mod workflow;

pub use error::{ErrorCode, TallyError};
pub use session::Session;
