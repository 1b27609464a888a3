pub mod chats;
pub mod documents;
