//! HTTP request handlers.

pub mod control;
pub mod dispatch;

pub use control::*;
pub use dispatch::*;
