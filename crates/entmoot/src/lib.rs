//! # Entmoot
//!
//! A remote execution protocol layer for lazily built computation graphs.
//!
//! Callers embed values and computations in an [`Executor`], compose them
//! with calls, tuples and selections, and only pay for evaluation when they
//! ask for a payload with [`ExecutorValue::compute`]. An [`ExecutorService`]
//! exposes one executor to many concurrent callers through opaque
//! [`ValueRef`]s.
//!
//! ## Architecture
//!
//! - **Executors**: [`EagerExecutor`] evaluates in-process,
//!   [`TransformingExecutor`] rewrites computations before delegating, and
//!   [`RemoteExecutor`] forwards to a service over TCP
//! - **Service**: request dispatch over a concurrent [`ValueTable`]
//! - **Transport**: line-delimited JSON over TCP for end-to-end testing
//! - **Evaluator**: a tree-walking interpreter for [`Computation`] graphs
//!
//! ## Example
//!
//! ```
//! use entmoot::{DType, EagerExecutor, Executor, ExecutorValue, Payload};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let executor = EagerExecutor::new();
//! let ten = executor
//!     .create_value(Payload::from(10).into(), Some(DType::Int32.into()))
//!     .await
//!     .unwrap();
//! assert_eq!(ten.compute().await.unwrap(), Payload::from(10));
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod computation;
pub mod config;
pub mod environment;
pub mod error;
pub mod eval;
pub mod execution_context;
pub mod executor;
pub mod logging;
pub mod payload;
pub mod service;
pub mod table;
pub mod transport;
pub mod types;

// Re-export main types
pub use computation::{Computation, Intrinsic, Parameter};
pub use environment::{Binding, CallFrame, Environment};
pub use error::{EnvironmentError, ErrorKind, EvalError, ExecutorError, Result};
pub use eval::{EvalContext, Evaluate, RuntimeValue};
pub use execution_context::ExecutionContext;
pub use executor::{
    EagerExecutor, EagerValue, Executor, ExecutorValue, RawValue, RemoteExecutor, RemoteValue,
    TransformingExecutor,
};
pub use payload::Payload;
pub use service::{ExecutorService, Request, Response};
pub use table::{ValueRef, ValueTable};
pub use transport::ExecutorClient;
pub use types::{DType, Selection, TypeSignature};

/// Entmoot version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
