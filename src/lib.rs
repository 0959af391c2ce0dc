#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod error;
mod executor;
mod node;
mod task;

pub use crate::error::{Fault, ResultError};
pub use crate::executor::Resolver;
pub use crate::node::{Output, State, Value};
pub use crate::task::Task;
