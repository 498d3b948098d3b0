//! # Packet
//!
//! The typed message exchanged between peers.
//!
//! A [`Packet`] carries a [`Category`] used for dispatch and a [`Payload`].
//! The category is fixed at construction; there is no way to change it
//! afterwards, so a packet always describes itself the same way.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dispatch category of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Application traffic
    Data,
    /// Replies, including error reports produced by the session itself
    Response,
    /// Session bookkeeping (handshake); never delivered to listeners
    Management,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::Data => "data",
            Category::Response => "response",
            Category::Management => "management",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Packet content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Byte length of the content
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Binary(bytes.to_vec())
    }
}

/// An immutable, self-describing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    category: Category,
    payload: Payload,
}

impl Packet {
    pub fn new(category: Category, payload: impl Into<Payload>) -> Self {
        Self {
            category,
            payload: payload.into(),
        }
    }

    pub fn data(payload: impl Into<Payload>) -> Self {
        Self::new(Category::Data, payload)
    }

    pub fn response(payload: impl Into<Payload>) -> Self {
        Self::new(Category::Response, payload)
    }

    pub fn management(payload: impl Into<Payload>) -> Self {
        Self::new(Category::Management, payload)
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Text content, if the payload is text
    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    pub fn is_management(&self) -> bool {
        self.category == Category::Management
    }
}
