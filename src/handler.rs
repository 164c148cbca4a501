//! The external message handler contract.
//!
//! The engine never interprets a finished message beyond framing; once a
//! DATA phase completes it hands the envelope to whatever `MessageHandler`
//! the caller supplied.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::smtp::parser::ParamValue;

/// A finished message's payload: raw bytes, or decoded text when the
/// session is configured with `decode_data`.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Bytes(&'a [u8]),
    Text(&'a str),
}

/// The payload of a finished message, handed to `process_message`.
///
/// `mail_options`/`rcpt_options` are only populated when the session isn't
/// decoding DATA to text (`Config::decode_data == false`).
pub struct MessageContext<'a> {
    pub peer: &'a str,
    pub mailfrom: &'a str,
    pub rcpttos: &'a [String],
    pub data: Payload<'a>,
    pub mail_options: Option<&'a HashMap<String, ParamValue>>,
    pub rcpt_options: Option<&'a HashMap<String, ParamValue>>,
}

/// Result type for handler operations: a plain `String` message rather than
/// a typed error, since the session only ever surfaces it as `500 Error: <message>`.
pub type HandlerResult<T> = Result<T, String>;

/// Consumes finished messages and, optionally, reports session-level exceptions.
///
/// Implementations plug in mail routing, queueing, storage, or whatever
/// external delivery mechanism the caller needs — none of that is this
/// engine's concern.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Called once a DATA phase completes successfully.
    ///
    /// Returning `Ok(Some(status))` replaces the session's default `250 OK`
    /// reply with `status`; `Ok(None)` keeps the default. Returning `Err`
    /// is caught by the session loop, turned into `500 Error: <message>`,
    /// and reported via `handle_exception`.
    async fn process_message(&self, ctx: MessageContext<'_>) -> HandlerResult<Option<String>>;

    /// Called when the line reader hits an incomplete read, or when a
    /// command handler raised an error during dispatch. Has no effect on
    /// the reply already sent; purely an observation hook (logging, metrics).
    async fn handle_exception(&self, _message: &str) {}
}

/// A reference `MessageHandler` that logs the envelope and accepts every
/// message. Used by the binary's default wiring and in doc examples.
#[derive(Debug, Default)]
pub struct ConsoleHandler;

#[async_trait]
impl MessageHandler for ConsoleHandler {
    async fn process_message(&self, ctx: MessageContext<'_>) -> HandlerResult<Option<String>> {
        let len = match ctx.data {
            Payload::Bytes(b) => b.len(),
            Payload::Text(s) => s.len(),
        };
        log::info!(
            "message from {} to {:?} ({} bytes)",
            ctx.mailfrom,
            ctx.rcpttos,
            len
        );
        Ok(None)
    }

    async fn handle_exception(&self, message: &str) {
        log::warn!("session exception: {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn console_handler_accepts_and_returns_default_status() {
        let handler = ConsoleHandler;
        let rcpts = vec!["b@test".to_string()];
        let ctx = MessageContext {
            peer: "127.0.0.1:1234",
            mailfrom: "a@test",
            rcpttos: &rcpts,
            data: Payload::Bytes(b"hello"),
            mail_options: None,
            rcpt_options: None,
        };
        let status = handler.process_message(ctx).await.unwrap();
        assert_eq!(status, None);
    }
}
