//! HTTP handlers

pub mod health;
pub mod response;
pub mod upload;

pub use response::{ApiResponse, MessageType, Metadata, Status};
