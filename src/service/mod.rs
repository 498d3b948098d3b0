//! Session engine: lifecycle, read/send primitives and composite operations.

pub mod completion;
pub mod session;

pub use completion::Completion;
pub use session::{Origin, Session};
