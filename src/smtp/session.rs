//! The per-connection session state machine.
//!
//! `SmtpSession<R, W>` owns one client's command loop from the initial `220`
//! greeting through `QUIT` or connection loss. It is generic over the reader
//! and writer so it can be driven by a real `TcpStream` in production and by
//! in-memory buffers in tests.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::error::SmtpError;
use crate::handler::{MessageContext, MessageHandler, Payload};
use crate::smtp::parser::{
    decode_arg, get_addr, get_params, split_command, strip_command_keyword, DecodedArg,
    ParamValue, SplitCommand,
};
use crate::smtp::reader::{LineReadOutcome, LineReader};

/// Whether, and how, the client has greeted us.
///
/// `Ehlo` additionally switches the session into "extended" mode: per-verb
/// size limits apply and MAIL/RCPT accept ESMTP parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Greeting {
    None,
    Helo(String),
    Ehlo(String),
}

impl Greeting {
    fn is_greeted(&self) -> bool {
        !matches!(self, Greeting::None)
    }

    fn is_extended(&self) -> bool {
        matches!(self, Greeting::Ehlo(_))
    }
}

/// The envelope under construction: accumulated by MAIL/RCPT, consumed and
/// reset once DATA completes (or a RSET/HELO/EHLO arrives).
#[derive(Debug, Clone, Default)]
struct Envelope {
    mailfrom: Option<String>,
    rcpttos: Vec<String>,
    mail_params: HashMap<String, ParamValue>,
    rcpt_params: HashMap<String, ParamValue>,
    require_smtputf8: bool,
}

/// What a command handler tells the main loop to do next.
enum Dispatch {
    Continue,
    Quit,
}

/// One client connection's SMTP session.
pub struct SmtpSession<R, W> {
    reader: LineReader<R>,
    writer: W,
    config: Arc<Config>,
    handler: Arc<dyn MessageHandler>,
    peer: String,
    greeting: Greeting,
    envelope: Envelope,
    command_size_limits: HashMap<String, usize>,
}

impl<R, W> SmtpSession<R, W>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        reader: R,
        writer: W,
        config: Arc<Config>,
        handler: Arc<dyn MessageHandler>,
        peer: String,
    ) -> Self {
        SmtpSession {
            reader: LineReader::new(reader),
            writer,
            config,
            handler,
            peer,
            greeting: Greeting::None,
            envelope: Envelope::default(),
            command_size_limits: HashMap::new(),
        }
    }

    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await
    }

    /// Sends the reply an `SmtpError` maps to, if it has one.
    async fn reply_err(&mut self, err: SmtpError) -> std::io::Result<Dispatch> {
        if let Some(reply) = err.reply() {
            self.write_line(&reply).await?;
        }
        Ok(Dispatch::Continue)
    }

    /// Drives the session to completion: greeting, command loop, and (if
    /// reached) QUIT. Returns once the connection closes or the client quits.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let greeting = format!("220 {} {}", self.config.hostname, self.config.ident);
        self.write_line(&greeting).await?;

        loop {
            let raw = match self.reader.read_line().await? {
                LineReadOutcome::Eof => break,
                LineReadOutcome::Incomplete { partial } => {
                    if !partial.is_empty() {
                        self.handler
                            .handle_exception(&SmtpError::Incomplete.to_string())
                            .await;
                    }
                    break;
                }
                LineReadOutcome::Line(raw) => raw,
            };
            let raw_len = raw.len();
            let line = strip_crlf(&raw);
            if line.is_empty() {
                self.reply_err(SmtpError::Syntax("500 Error: bad syntax".to_string()))
                    .await?;
                continue;
            }

            match split_command(line) {
                SplitCommand::Empty => unreachable!("empty line handled above"),
                SplitCommand::NonAsciiVerb(bytes) => {
                    if raw_len > self.config.command_size_limit {
                        self.reply_err(SmtpError::Syntax("500 Error: line too long".to_string()))
                            .await?;
                        continue;
                    }
                    let verb = String::from_utf8_lossy(&bytes).to_uppercase();
                    self.reply_err(SmtpError::Syntax(format!(
                        "500 Error: command \"{}\" not recognized",
                        verb
                    )))
                    .await?;
                }
                SplitCommand::Ascii { verb, arg } => {
                    let limit = if self.greeting.is_extended() {
                        *self
                            .command_size_limits
                            .get(&verb)
                            .unwrap_or(&self.config.command_size_limit)
                    } else {
                        self.config.command_size_limit
                    };
                    if raw_len > limit {
                        self.reply_err(SmtpError::Syntax("500 Error: line too long".to_string()))
                            .await?;
                        continue;
                    }
                    match self.dispatch(&verb, arg).await? {
                        Dispatch::Continue => {}
                        Dispatch::Quit => break,
                    }
                }
            }
        }
        Ok(())
    }

    async fn dispatch(
        &mut self,
        verb: &str,
        arg: Option<Vec<u8>>,
    ) -> std::io::Result<Dispatch> {
        match verb {
            "HELO" => self.handle_helo(arg).await,
            "EHLO" => self.handle_ehlo(arg).await,
            "NOOP" => self.handle_noop(arg).await,
            "QUIT" => self.handle_quit(arg).await,
            "HELP" => self.handle_help(arg).await,
            "VRFY" => self.handle_vrfy(arg).await,
            "MAIL" => self.handle_mail(arg).await,
            "RCPT" => self.handle_rcpt(arg).await,
            "RSET" => self.handle_rset(arg).await,
            "DATA" => self.handle_data(arg).await,
            "EXPN" => self.handle_expn(arg).await,
            other => {
                self.reply_err(SmtpError::Syntax(format!(
                    "500 Error: command \"{}\" not recognized",
                    other
                )))
                .await
            }
        }
    }

    fn arg_text(&self, arg: Option<Vec<u8>>) -> DecodedArg {
        decode_arg(&arg.unwrap_or_default(), self.config.default_8bit_encoding)
    }

    async fn handle_helo(&mut self, arg: Option<Vec<u8>>) -> std::io::Result<Dispatch> {
        let bytes = arg.unwrap_or_default();
        if bytes.is_empty() {
            return self
                .reply_err(SmtpError::Syntax("501 Syntax: HELO hostname".to_string()))
                .await;
        }
        if self.greeting.is_greeted() {
            return self
                .reply_err(SmtpError::Sequence("503 Duplicate HELO/EHLO".to_string()))
                .await;
        }
        let name = String::from_utf8_lossy(&bytes).into_owned();
        self.envelope = Envelope::default();
        self.greeting = Greeting::Helo(name);
        self.write_line(&format!("250 {}", self.config.hostname)).await
            .map(|_| Dispatch::Continue)
    }

    async fn handle_ehlo(&mut self, arg: Option<Vec<u8>>) -> std::io::Result<Dispatch> {
        let bytes = arg.unwrap_or_default();
        if bytes.is_empty() {
            return self
                .reply_err(SmtpError::Syntax("501 Syntax: EHLO hostname".to_string()))
                .await;
        }
        if self.greeting.is_greeted() {
            return self
                .reply_err(SmtpError::Sequence("503 Duplicate HELO/EHLO".to_string()))
                .await;
        }
        let name = String::from_utf8_lossy(&bytes).into_owned();
        self.envelope = Envelope::default();
        self.greeting = Greeting::Ehlo(name);

        self.write_line(&format!("250-{}", self.config.hostname)).await?;
        if self.config.data_size_limit != 0 {
            self.write_line(&format!("250-SIZE {}", self.config.data_size_limit))
                .await?;
            let entry = self
                .command_size_limits
                .entry("MAIL".to_string())
                .or_insert(self.config.command_size_limit);
            *entry += 26;
        }
        if !self.config.decode_data {
            self.write_line("250-8BITMIME").await?;
        }
        if self.config.enable_smtputf8 {
            self.write_line("250-SMTPUTF8").await?;
            let entry = self
                .command_size_limits
                .entry("MAIL".to_string())
                .or_insert(self.config.command_size_limit);
            *entry += 10;
        }
        self.write_line("250 HELP").await?;
        Ok(Dispatch::Continue)
    }

    async fn handle_noop(&mut self, arg: Option<Vec<u8>>) -> std::io::Result<Dispatch> {
        if arg.map(|a| !a.is_empty()).unwrap_or(false) {
            return self
                .reply_err(SmtpError::Syntax("501 Syntax: NOOP".to_string()))
                .await;
        }
        self.write_line("250 OK").await?;
        Ok(Dispatch::Continue)
    }

    async fn handle_quit(&mut self, arg: Option<Vec<u8>>) -> std::io::Result<Dispatch> {
        if arg.map(|a| !a.is_empty()).unwrap_or(false) {
            return self
                .reply_err(SmtpError::Syntax("501 Syntax: QUIT".to_string()))
                .await;
        }
        self.write_line("221 Bye").await?;
        Ok(Dispatch::Quit)
    }

    async fn handle_help(&mut self, arg: Option<Vec<u8>>) -> std::io::Result<Dispatch> {
        let bytes = arg.unwrap_or_default();
        if bytes.is_empty() {
            self.write_line("250 Supported commands: EHLO HELO MAIL RCPT DATA RSET NOOP QUIT VRFY")
                .await?;
            return Ok(Dispatch::Continue);
        }
        let lc_arg = if bytes.is_ascii() {
            String::from_utf8(bytes).unwrap().to_uppercase()
        } else {
            String::new()
        };
        let reply = match lc_arg.as_str() {
            "EHLO" => "250 Syntax: EHLO hostname".to_string(),
            "HELO" => "250 Syntax: HELO hostname".to_string(),
            "MAIL" => {
                if self.greeting.is_extended() {
                    "250 Syntax: MAIL FROM: <address> [SP <mail-parameters>]".to_string()
                } else {
                    "250 Syntax: MAIL FROM: <address>".to_string()
                }
            }
            "RCPT" => {
                if self.greeting.is_extended() {
                    "250 Syntax: RCPT TO: <address> [SP <mail-parameters>]".to_string()
                } else {
                    "250 Syntax: RCPT TO: <address>".to_string()
                }
            }
            "DATA" => "250 Syntax: DATA".to_string(),
            "RSET" => "250 Syntax: RSET".to_string(),
            "NOOP" => "250 Syntax: NOOP".to_string(),
            "QUIT" => "250 Syntax: QUIT".to_string(),
            "VRFY" => "250 Syntax: VRFY <address>".to_string(),
            _ => "501 Supported commands: EHLO HELO MAIL RCPT DATA RSET NOOP QUIT VRFY".to_string(),
        };
        self.write_line(&reply).await?;
        Ok(Dispatch::Continue)
    }

    async fn handle_vrfy(&mut self, arg: Option<Vec<u8>>) -> std::io::Result<Dispatch> {
        let bytes = arg.unwrap_or_default();
        if bytes.is_empty() {
            return self
                .reply_err(SmtpError::Syntax("501 Syntax: VRFY <address>".to_string()))
                .await;
        }
        match self.arg_text(Some(bytes)) {
            DecodedArg::Bytes(raw) => {
                self.write_line(&format!(
                    "502 Could not VRFY {}",
                    String::from_utf8_lossy(&raw)
                ))
                .await?;
            }
            DecodedArg::Text(s) => {
                let (address, _rest) = get_addr(&s);
                if address.is_empty() {
                    self.write_line(&format!("502 Could not VRFY {}", s)).await?;
                } else {
                    self.write_line("252 Cannot VRFY user, but will accept message and attempt delivery")
                        .await?;
                }
            }
        }
        Ok(Dispatch::Continue)
    }

    async fn handle_mail(&mut self, arg: Option<Vec<u8>>) -> std::io::Result<Dispatch> {
        let extended = self.greeting.is_extended();
        let syntaxerr = if extended {
            "501 Syntax: MAIL FROM: <address> [SP <mail-parameters>]"
        } else {
            "501 Syntax: MAIL FROM: <address>"
        };
        if !self.greeting.is_greeted() {
            return self
                .reply_err(SmtpError::Sequence("503 Error: send HELO first".to_string()))
                .await;
        }

        let bytes = arg.unwrap_or_default();
        let text = match decode_arg(&bytes, self.config.default_8bit_encoding) {
            DecodedArg::Bytes(_) => {
                return self.reply_err(SmtpError::Syntax(syntaxerr.to_string())).await;
            }
            DecodedArg::Text(s) => s,
        };

        let rest = strip_command_keyword("FROM:", &text);
        let (address, params_str) = get_addr(rest);
        if address.is_empty() {
            return self.reply_err(SmtpError::Syntax(syntaxerr.to_string())).await;
        }
        if !extended && !params_str.is_empty() {
            return self.reply_err(SmtpError::Syntax(syntaxerr.to_string())).await;
        }
        if self.envelope.mailfrom.is_some() {
            return self
                .reply_err(SmtpError::Sequence(
                    "503 Error: nested MAIL command".to_string(),
                ))
                .await;
        }

        let upper_params = params_str.to_uppercase();
        let tokens: Vec<&str> = upper_params.split_whitespace().collect();
        let full_params = match get_params(&tokens) {
            Some(p) => p,
            None => {
                return self.reply_err(SmtpError::Syntax(syntaxerr.to_string())).await;
            }
        };
        let mut params = full_params.clone();
        let mut require_smtputf8 = false;

        if !self.config.decode_data {
            match params.remove("BODY") {
                None => {}
                Some(ParamValue::Value(v)) if v == "7BIT" || v == "8BITMIME" => {}
                _ => {
                    return self
                        .reply_err(SmtpError::ParamRefused(
                            "501 Error: BODY can only be one of 7BIT, 8BITMIME".to_string(),
                        ))
                        .await;
                }
            }
        }

        if self.config.enable_smtputf8 {
            match params.remove("SMTPUTF8") {
                None => {}
                Some(ParamValue::Flag) => require_smtputf8 = true,
                Some(ParamValue::Value(_)) => {
                    return self
                        .reply_err(SmtpError::ParamRefused(
                            "501 Error: SMTPUTF8 takes no arguments".to_string(),
                        ))
                        .await;
                }
            }
        }

        if let Some(size_param) = params.remove("SIZE") {
            match size_param {
                ParamValue::Value(v) if !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()) => {
                    let declared: u64 = v.parse().unwrap_or(u64::MAX);
                    if self.config.data_size_limit != 0
                        && declared > self.config.data_size_limit as u64
                    {
                        self.write_line("552 Error: message size exceeds fixed maximum message size")
                            .await?;
                        return Ok(Dispatch::Continue);
                    }
                }
                _ => {
                    return self.reply_err(SmtpError::Syntax(syntaxerr.to_string())).await;
                }
            }
        }

        if !params.is_empty() {
            return self
                .reply_err(SmtpError::ParamRefused(
                    "555 MAIL FROM parameters not recognized or not implemented".to_string(),
                ))
                .await;
        }

        self.envelope.mailfrom = Some(address);
        self.envelope.mail_params = full_params;
        self.envelope.require_smtputf8 = require_smtputf8;
        self.write_line("250 OK").await?;
        Ok(Dispatch::Continue)
    }

    async fn handle_rcpt(&mut self, arg: Option<Vec<u8>>) -> std::io::Result<Dispatch> {
        let extended = self.greeting.is_extended();
        let syntaxerr = if extended {
            "501 Syntax: RCPT TO: <address> [SP <mail-parameters>]"
        } else {
            "501 Syntax: RCPT TO: <address>"
        };
        if !self.greeting.is_greeted() {
            return self
                .reply_err(SmtpError::Sequence("503 Error: send HELO first".to_string()))
                .await;
        }
        if self.envelope.mailfrom.is_none() {
            return self
                .reply_err(SmtpError::Sequence(
                    "503 Error: need MAIL command".to_string(),
                ))
                .await;
        }

        let bytes = arg.unwrap_or_default();
        let text = match decode_arg(&bytes, self.config.default_8bit_encoding) {
            DecodedArg::Bytes(_) => {
                return self.reply_err(SmtpError::Syntax(syntaxerr.to_string())).await;
            }
            DecodedArg::Text(s) => s,
        };

        let rest = strip_command_keyword("TO:", &text);
        let (address, params_str) = get_addr(rest);
        if address.is_empty() {
            return self.reply_err(SmtpError::Syntax(syntaxerr.to_string())).await;
        }
        if !extended && !params_str.is_empty() {
            return self.reply_err(SmtpError::Syntax(syntaxerr.to_string())).await;
        }

        let upper_params = params_str.to_uppercase();
        let tokens: Vec<&str> = upper_params.split_whitespace().collect();
        let full_params = match get_params(&tokens) {
            Some(p) => p,
            None => {
                return self.reply_err(SmtpError::Syntax(syntaxerr.to_string())).await;
            }
        };
        if !full_params.is_empty() {
            return self
                .reply_err(SmtpError::ParamRefused(
                    "555 RCPT TO parameters not recognized or not implemented".to_string(),
                ))
                .await;
        }

        self.envelope.rcpttos.push(address);
        self.envelope.rcpt_params = full_params;
        self.write_line("250 OK").await?;
        Ok(Dispatch::Continue)
    }

    async fn handle_rset(&mut self, arg: Option<Vec<u8>>) -> std::io::Result<Dispatch> {
        if arg.map(|a| !a.is_empty()).unwrap_or(false) {
            return self
                .reply_err(SmtpError::Syntax("501 Syntax: RSET".to_string()))
                .await;
        }
        self.envelope = Envelope::default();
        self.write_line("250 OK").await?;
        Ok(Dispatch::Continue)
    }

    async fn handle_expn(&mut self, _arg: Option<Vec<u8>>) -> std::io::Result<Dispatch> {
        self.write_line("502 EXPN not implemented").await?;
        Ok(Dispatch::Continue)
    }

    async fn handle_data(&mut self, arg: Option<Vec<u8>>) -> std::io::Result<Dispatch> {
        if !self.greeting.is_greeted() {
            return self
                .reply_err(SmtpError::Sequence("503 Error: send HELO first".to_string()))
                .await;
        }
        if self.envelope.rcpttos.is_empty() {
            return self
                .reply_err(SmtpError::Sequence(
                    "503 Error: need RCPT command".to_string(),
                ))
                .await;
        }
        if arg.map(|a| !a.is_empty()).unwrap_or(false) {
            return self
                .reply_err(SmtpError::Syntax("501 Syntax: DATA".to_string()))
                .await;
        }

        self.write_line("354 End data with <CR><LF>.<CR><LF>").await?;

        let mut lines: Vec<Vec<u8>> = Vec::new();
        let mut num_bytes: usize = 0;
        let mut size_exceeded = false;

        loop {
            match self.reader.read_line().await? {
                LineReadOutcome::Eof => {
                    self.handler
                        .handle_exception("connection closed during DATA")
                        .await;
                    return Ok(Dispatch::Quit);
                }
                LineReadOutcome::Incomplete { .. } => {
                    self.handler
                        .handle_exception("incomplete read during DATA")
                        .await;
                    return Ok(Dispatch::Quit);
                }
                LineReadOutcome::Line(raw) => {
                    if raw == b".\r\n" {
                        break;
                    }
                    num_bytes += raw.len();
                    if self.config.data_size_limit != 0 && num_bytes > self.config.data_size_limit
                    {
                        size_exceeded = true;
                        continue;
                    }
                    lines.push(strip_crlf(&raw).to_vec());
                }
            }
        }

        if size_exceeded {
            self.write_line(&SmtpError::SizeExceeded.reply().expect("SizeExceeded always replies"))
                .await?;
            self.envelope = Envelope::default();
            return Ok(Dispatch::Continue);
        }

        for line in lines.iter_mut() {
            if line.first() == Some(&b'.') {
                line.remove(0);
            }
        }
        let joined = lines.join(&b'\n');

        let decoded_text;
        let payload = if self.config.decode_data {
            decoded_text = match decode_arg(&joined, self.config.default_8bit_encoding) {
                DecodedArg::Text(s) => s,
                DecodedArg::Bytes(_) => String::from_utf8_lossy(&joined).into_owned(),
            };
            Payload::Text(&decoded_text)
        } else {
            Payload::Bytes(&joined)
        };

        let mailfrom = self.envelope.mailfrom.clone().unwrap_or_default();
        let rcpttos = self.envelope.rcpttos.clone();
        let mail_options = if self.config.decode_data {
            None
        } else {
            Some(&self.envelope.mail_params)
        };
        let rcpt_options = if self.config.decode_data {
            None
        } else {
            Some(&self.envelope.rcpt_params)
        };

        let ctx = MessageContext {
            peer: &self.peer,
            mailfrom: &mailfrom,
            rcpttos: &rcpttos,
            data: payload,
            mail_options,
            rcpt_options,
        };

        match self.handler.process_message(ctx).await {
            Ok(status) => {
                self.envelope = Envelope::default();
                self.write_line(&status.unwrap_or_else(|| "250 OK".to_string())).await?;
            }
            Err(msg) => {
                let err = SmtpError::Handler(msg);
                self.handler.handle_exception(&err.to_string()).await;
                self.write_line(&err.reply().expect("Handler always replies"))
                    .await?;
            }
        }
        Ok(Dispatch::Continue)
    }
}

/// Strips a single trailing `\r\n` or `\n` from `line`.
fn strip_crlf(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    if end > 0 && line[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && line[end - 1] == b'\r' {
            end -= 1;
        }
    }
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ConsoleHandler;
    use tokio::io::BufReader;

    fn config() -> Arc<Config> {
        Arc::new(Config {
            bind_address: "0.0.0.0".into(),
            port: 2525,
            hostname: "mail.test".into(),
            ident: "mailbroker 0.1.0".into(),
            data_size_limit: 1024,
            enable_smtputf8: false,
            decode_data: false,
            default_8bit_encoding: crate::smtp::parser::Fallback8Bit::Latin1,
            command_size_limit: crate::config::COMMAND_SIZE_LIMIT,
        })
    }

    async fn drive(input: &str, cfg: Arc<Config>) -> String {
        let reader = BufReader::new(std::io::Cursor::new(input.as_bytes().to_vec()));
        let mut output = Vec::new();
        {
            let session = SmtpSession::new(
                reader,
                &mut output,
                cfg,
                Arc::new(ConsoleHandler),
                "127.0.0.1:9".to_string(),
            );
            session.run().await.unwrap();
        }
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn greets_then_handles_quit() {
        let out = drive("QUIT\r\n", config()).await;
        assert!(out.starts_with("220 mail.test"));
        assert!(out.contains("221 Bye"));
    }

    #[tokio::test]
    async fn rejects_command_before_helo() {
        let out = drive("MAIL FROM:<a@b>\r\nQUIT\r\n", config()).await;
        assert!(out.contains("503 Error: send HELO first"));
    }

    #[tokio::test]
    async fn duplicate_greeting_is_rejected() {
        let out = drive("HELO a\r\nHELO b\r\nQUIT\r\n", config()).await;
        assert!(out.contains("503 Duplicate HELO/EHLO"));
    }

    #[tokio::test]
    async fn ehlo_advertises_extensions() {
        let out = drive("EHLO a\r\nQUIT\r\n", config()).await;
        assert!(out.contains("250-mail.test"));
        assert!(out.contains("250-SIZE 1024"));
        assert!(out.contains("250-8BITMIME"));
        assert!(out.contains("250 HELP"));
    }

    #[tokio::test]
    async fn full_transaction_round_trips() {
        let out = drive(
            "HELO a\r\nMAIL FROM:<a@b>\r\nRCPT TO:<c@d>\r\nDATA\r\nhello\r\n.\r\nQUIT\r\n",
            config(),
        )
        .await;
        assert!(out.contains("354 End data"));
        assert!(out.contains("250 OK"));
    }

    #[tokio::test]
    async fn nested_mail_is_rejected() {
        let out = drive(
            "HELO a\r\nMAIL FROM:<a@b>\r\nMAIL FROM:<c@d>\r\nQUIT\r\n",
            config(),
        )
        .await;
        assert!(out.contains("503 Error: nested MAIL command"));
    }

    #[tokio::test]
    async fn rcpt_without_mail_is_rejected() {
        let out = drive("HELO a\r\nRCPT TO:<c@d>\r\nQUIT\r\n", config()).await;
        assert!(out.contains("503 Error: need MAIL command"));
    }

    #[tokio::test]
    async fn data_without_rcpt_is_rejected() {
        let out = drive("HELO a\r\nMAIL FROM:<a@b>\r\nDATA\r\nQUIT\r\n", config()).await;
        assert!(out.contains("503 Error: need RCPT command"));
    }

    #[tokio::test]
    async fn dot_stuffed_line_is_unstuffed() {
        let out = drive(
            "HELO a\r\nMAIL FROM:<a@b>\r\nRCPT TO:<c@d>\r\nDATA\r\n..stuffed\r\n.\r\nQUIT\r\n",
            config(),
        )
        .await;
        assert!(out.contains("250 OK"));
    }

    #[tokio::test]
    async fn oversized_data_is_rejected() {
        let big = "x".repeat(2000);
        let out = drive(
            &format!(
                "HELO a\r\nMAIL FROM:<a@b>\r\nRCPT TO:<c@d>\r\nDATA\r\n{}\r\n.\r\nQUIT\r\n",
                big
            ),
            config(),
        )
        .await;
        assert!(out.contains("552 Error: Too much mail data"));
    }

    #[tokio::test]
    async fn unknown_verb_is_rejected() {
        let out = drive("BOGUS\r\nQUIT\r\n", config()).await;
        assert!(out.contains("500 Error: command \"BOGUS\" not recognized"));
    }

    #[tokio::test]
    async fn empty_line_is_bad_syntax() {
        let out = drive("\r\nQUIT\r\n", config()).await;
        assert!(out.contains("500 Error: bad syntax"));
    }

    #[tokio::test]
    async fn vrfy_reports_cannot_verify() {
        let out = drive("VRFY a@b\r\nQUIT\r\n", config()).await;
        assert!(out.contains("252 Cannot VRFY user"));
    }

    #[tokio::test]
    async fn expn_is_not_implemented() {
        let out = drive("EXPN list\r\nQUIT\r\n", config()).await;
        assert!(out.contains("502 EXPN not implemented"));
    }

    #[tokio::test]
    async fn rset_clears_envelope() {
        let out = drive(
            "HELO a\r\nMAIL FROM:<a@b>\r\nRSET\r\nRCPT TO:<c@d>\r\nQUIT\r\n",
            config(),
        )
        .await;
        assert!(out.contains("503 Error: need MAIL command"));
    }
}
