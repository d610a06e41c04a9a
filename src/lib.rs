//! restep: a declarative HTTP test-case interpreter.
//!
//! Test cases are YAML or JSON documents describing a named
//! sequence of HTTP requests, expected responses and environment
//! propagation rules. The engine executes them against a live
//! endpoint in strict declaration order: the environment store
//! threads values between steps, the template engine substitutes
//! `{name}` placeholders into each step, and extraction rules let
//! later steps depend on earlier responses.

pub mod asserts;
pub mod environment;
pub mod expression;
pub mod loader;
pub mod model;
pub mod payload;
pub mod response;
pub mod runner;
pub mod session;
pub mod template;

pub use environment::*;
pub use model::*;
pub use runner::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
