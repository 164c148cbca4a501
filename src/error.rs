//! Typed errors for the SMTP session layer.
//!
//! Command handlers classify failures by *kind* so the session loop can map
//! them to the right reply code. Everything above the session (the
//! acceptor, `main`/`lib`) stays on `anyhow::Result`.

use thiserror::Error;

/// An error raised while processing a single command or DATA payload.
///
/// Each variant corresponds to one of the error kinds a command handler can
/// hit; the session loop turns these into the matching SMTP reply.
#[derive(Debug, Error)]
pub enum SmtpError {
    /// Malformed command or address; reply `500`/`501`.
    #[error("{0}")]
    Syntax(String),

    /// Command issued out of the legal order (e.g. DATA before RCPT); reply `503`.
    #[error("{0}")]
    Sequence(String),

    /// Unrecognised or disallowed ESMTP parameter; reply `555` (or `501` for BODY/SMTPUTF8).
    #[error("{0}")]
    ParamRefused(String),

    /// DATA payload exceeded `data_size_limit`; reply `552`.
    #[error("message size exceeds fixed maximum message size")]
    SizeExceeded,

    /// The line reader hit EOF mid-line with a non-empty partial buffer.
    #[error("incomplete read: connection closed mid-line")]
    Incomplete,

    /// The external handler returned an error while processing a finished message.
    #[error("{0}")]
    Handler(String),
}

impl SmtpError {
    /// The reply line this error maps to, when it should be sent verbatim.
    ///
    /// `Incomplete` has no reply: the transport is already gone by the time
    /// it surfaces.
    pub fn reply(&self) -> Option<String> {
        match self {
            SmtpError::Syntax(msg) => Some(msg.clone()),
            SmtpError::Sequence(msg) => Some(msg.clone()),
            SmtpError::ParamRefused(msg) => Some(msg.clone()),
            SmtpError::SizeExceeded => Some("552 Error: Too much mail data".to_string()),
            SmtpError::Incomplete => None,
            SmtpError::Handler(msg) => Some(format!("500 Error: {}", msg)),
        }
    }
}
