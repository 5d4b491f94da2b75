//! Stack sampling sessions over an external capture library.
//!
//! A [`Registry`] maps profiler names to factories; a factory starts a
//! [`Session`] on one pid; each [`Session::snapshot`] fills the session's
//! buffer through the [`Bridge`], decodes it and hands the sample to a
//! [`Sink`] before returning. [`run::SamplingLoop`] paces snapshots for one
//! session.

pub mod args;
pub mod bridge;
pub mod buffer;
pub mod config;
pub mod error;
pub mod processes;
pub mod registry;
pub mod run;
pub mod session;
pub mod sink;

pub use bridge::Bridge;
pub use error::SpyError;
pub use registry::{Registry, RegistryBuilder};
pub use session::{InitParams, Session, SessionState, SnapshotOutcome};
pub use sink::Sink;
pub use stackspy_common::{LabelSet, Pid, SamplingMode, StackSample};
