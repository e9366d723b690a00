//! A persistent interactive shell session abstraction.
//!
//! A [`service::Service`] wraps one [`session::Session`], which owns one
//! [`pipeline::Pipeline`] framing commands over one [`transport::Transport`]
//! -- a local shell subprocess, an SSH connection, or a deterministic
//! replay fixture for tests. See each module for the grounding detail
//! ported from the upstream shell-runner design.

pub mod clean;
pub mod command;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod proctrack;
pub mod service;
pub mod session;
pub mod transport;
pub mod window;

pub use error::ShellError;
pub use options::Options;
pub use service::Service;
pub use session::{CommandResult, Session, TransportFactory};
