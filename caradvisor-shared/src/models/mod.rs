pub mod car;
pub mod chat;
pub mod errors;
pub mod user;

pub use car::{Car, CarUpdate, NewCar, Page};
pub use chat::{
    ChatMessage, ChatReply, ChatRequest, ChatRole, ChatSessionSummary, StoredChatMessage,
};
pub use errors::ErrorResponse;
pub use user::{
    AuthResponse, LoginRequest, ProfileUpdateRequest, RegisterRequest, UserId, UserRecord,
};
