//! Server configuration

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::eval::{EvalContext, DEFAULT_MAX_CALL_DEPTH};

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:7878";

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,entmoot=debug";

/// Settings for an `entmoot-server` process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: SocketAddr,

    /// `tracing` filter directive
    pub log_filter: String,

    /// Evaluator call depth limit
    pub max_call_depth: usize,

    /// Emit one trace event per evaluated node
    pub trace_evaluation: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 7878)),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            trace_evaluation: false,
        }
    }
}

impl ServerConfig {
    /// Load from a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// The evaluation context these settings describe.
    pub fn eval_context(&self) -> EvalContext {
        EvalContext::with_max_call_depth(self.max_call_depth).with_trace(self.trace_evaluation)
    }
}
