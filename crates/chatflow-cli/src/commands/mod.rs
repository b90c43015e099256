pub mod chat;
pub mod validate;
