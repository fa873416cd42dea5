// src/exec/backend.rs

//! Execution backend abstraction.
//!
//! The service talks to one `Backend` value chosen at startup instead of
//! branching on "mock or real" at each call site. `Backend` is a closed enum
//! over the two strategies; both also implement `ExecutionBackend` directly
//! so they can be exercised on their own in tests.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::types::BackendKind;

use super::container::ContainerBackend;
use super::local::LocalBackend;
use super::{Execution, ExecutionRequest};

pub type StartFuture<'a> = Pin<Box<dyn Future<Output = Result<Execution>> + Send + 'a>>;

/// Capability shared by every execution strategy.
pub trait ExecutionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Start the unit described by `request`.
    ///
    /// Resolves as soon as the unit is running; it never waits for the unit
    /// to finish.
    fn start(&self, request: ExecutionRequest) -> StartFuture<'_>;
}

/// The backend serving this process.
#[derive(Debug)]
pub enum Backend {
    Local(LocalBackend),
    Container(ContainerBackend),
}

impl ExecutionBackend for Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Backend::Local(b) => b.kind(),
            Backend::Container(b) => b.kind(),
        }
    }

    fn start(&self, request: ExecutionRequest) -> StartFuture<'_> {
        match self {
            Backend::Local(b) => b.start(request),
            Backend::Container(b) => b.start(request),
        }
    }
}

impl From<LocalBackend> for Backend {
    fn from(b: LocalBackend) -> Self {
        Backend::Local(b)
    }
}

impl From<ContainerBackend> for Backend {
    fn from(b: ContainerBackend) -> Self {
        Backend::Container(b)
    }
}
