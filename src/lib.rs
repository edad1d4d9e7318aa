pub mod chat;
pub mod collaborator;
pub mod constants;
pub mod conversation;
pub mod message;
pub mod render;
pub mod session;
pub mod transcript;
pub mod web_server;

pub use collaborator::{Collaborator, CollaboratorError, HttpCollaborator};
pub use conversation::{Conversation, ConversationEvent};
pub use message::{Message, Origin};
pub use transcript::Transcript;
