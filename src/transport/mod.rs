//! Transport plumbing: chunked frame reads and writes, plus TCP helpers.

pub mod receiver;
pub mod sender;
pub mod tcp;

pub use receiver::FrameReceiver;
pub use sender::FrameSender;
