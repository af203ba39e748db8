//! Request handlers.

pub mod analyze;
pub mod health;
pub mod status;

pub use analyze::*;
pub use health::*;
pub use status::*;
