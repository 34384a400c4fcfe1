//! # chat-relay
//!
//! A single-endpoint server that relays a chat conversation to an LLM
//! completion service, streams the answer back to the caller chunk by
//! chunk, and persists the finished transcript.
//!
//! The request pipeline is strict: validate the body, authorize the caller
//! from session state, stream the completion, and upsert the transcript
//! once the stream has fully drained. Persistence failures never reach the
//! client; by then the streamed response has already been delivered.
//!
//! External capabilities (identity provider, completion service, chat
//! store) sit behind traits in [`auth`], [`completion`], and [`store`], with
//! REST-backed production implementations and lightweight in-process ones
//! for tests and credential-free local runs.

pub mod auth;
pub mod chat;
pub mod completion;
pub mod config;
pub mod error;
pub mod handler;
pub mod store;

pub use chat::{AuthenticatedUser, ChatMessage, ChatRecord, ChatRequest, ChatRole};
pub use config::AppConfig;
pub use error::ApiError;
pub use handler::AppState;
