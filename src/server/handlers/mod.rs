pub mod chat;
pub mod games;
pub mod health;
pub mod rulebooks;
pub mod submissions;
pub mod users;
