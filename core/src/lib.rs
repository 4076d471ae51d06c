// Core Mentora client functionality:
// - Backend client (request dispatch and response normalization)
// - Request/response data structures
// - Input validation
// - Session persistence and re-validation
// - Conversation state
// - Configuration loading
// - Shared error types

// Export client module - dispatcher for the Mentora backend
pub mod client;
pub use client::*;

// Export types module - Request/response data structures
pub mod types;
pub use types::*;

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;

pub mod validation;

// Network seam, swappable in tests
pub mod transport;
pub use transport::{HttpTransport, Transport, TransportResponse};

pub mod downloads;
pub use downloads::{DirectoryDownloads, DownloadSink};

pub mod session;
pub use session::{AuthSession, FileSessionStore, InMemorySessionStore, SessionStore, SessionStoreRef};

pub mod conversation;
pub use conversation::{Conversation, ConversationState, PendingRequest, SendRejection, Turn};
