//! Domain models for mail entities

mod label;
mod message;

pub use label::{Label, LabelId, LabelMap};
pub use message::{AttachmentRef, Message, MessageBuilder, MessageId, ThreadId};
