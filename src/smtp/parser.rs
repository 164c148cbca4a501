//! Tokenizes a command line into a verb and raw argument bytes, and parses
//! the ESMTP address/parameter grammar (RFC 5321 addr-spec/angle-addr,
//! RFC 1869 `KEY=VALUE` mail parameters).
//!
//! Arguments stay as raw bytes until a command explicitly asks for text
//! (`decode_arg`) — bytes vs text duality.

use std::collections::HashMap;

/// A single ESMTP mail/rcpt parameter value: a bare flag (`NAME`) or a
/// `NAME=VALUE` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Flag,
    Value(String),
}

/// Result of splitting one command line into verb + argument.
#[derive(Debug, PartialEq, Eq)]
pub enum SplitCommand {
    /// The line was empty after stripping CRLF.
    Empty,
    /// The verb decoded as ASCII; `arg` is the left-stripped remainder, not yet decoded.
    Ascii { verb: String, arg: Option<Vec<u8>> },
    /// The verb token contained non-ASCII bytes and can never match a known command.
    NonAsciiVerb(Vec<u8>),
}

/// Splits a CRLF-stripped command line into its verb and argument: empty
/// line, first-space tokenization, uppercasing the verb, and left-stripping
/// (but not decoding) the argument.
pub fn split_command(line: &[u8]) -> SplitCommand {
    if line.is_empty() {
        return SplitCommand::Empty;
    }
    let (verb_bytes, arg_bytes) = match line.iter().position(|&b| b == b' ') {
        None => (line, None),
        Some(i) => (&line[..i], Some(&line[i + 1..])),
    };
    if !verb_bytes.is_ascii() {
        return SplitCommand::NonAsciiVerb(verb_bytes.to_vec());
    }
    let verb = String::from_utf8(verb_bytes.to_ascii_uppercase())
        .expect("ASCII bytes are always valid UTF-8");
    let arg = arg_bytes.map(|bytes| {
        let start = bytes
            .iter()
            .position(|&b| b != b' ' && b != b'\t')
            .unwrap_or(bytes.len());
        bytes[start..].to_vec()
    });
    SplitCommand::Ascii { verb, arg }
}

/// Strips a case-insensitive keyword prefix (e.g. `FROM:`) from `arg`,
/// returning the trimmed remainder. Returns an empty string if `arg`
/// doesn't start with `keyword`.
pub fn strip_command_keyword<'a>(keyword: &str, arg: &'a str) -> &'a str {
    if arg.len() >= keyword.len() && arg[..keyword.len()].eq_ignore_ascii_case(keyword) {
        arg[keyword.len()..].trim_start()
    } else {
        ""
    }
}

/// Parses an address argument into `(addr_spec, remainder)`.
///
/// Empty input yields `("", "")`; input starting (after leading whitespace)
/// with `<` is parsed as an angle-addr; everything else is parsed as a bare
/// addr-spec. This engine treats
/// addr-spec as an opaque token terminated by whitespace rather than
/// implementing the full RFC 5321 mailbox grammar (quoted local parts,
/// source routes) — out of proportion to a protocol engine that never
/// interprets the address beyond passing it to the handler.
pub fn get_addr(arg: &str) -> (String, String) {
    let trimmed = arg.trim_start();
    if trimmed.is_empty() {
        return (String::new(), String::new());
    }
    if trimmed.starts_with('<') {
        match trimmed.find('>') {
            Some(end) => {
                let address = trimmed[1..end].to_string();
                let rest = trimmed[end + 1..].trim_start().to_string();
                (address, rest)
            }
            None => (String::new(), trimmed.to_string()),
        }
    } else {
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let address = trimmed[..end].to_string();
        let rest = trimmed[end..].trim_start().to_string();
        (address, rest)
    }
}

/// Parses whitespace-delimited `NAME` / `NAME=VALUE` tokens per RFC 1869.
///
/// Returns `None` if any token's name is not alphanumeric, or if a token
/// has a trailing `=` with no value.
pub fn get_params(tokens: &[&str]) -> Option<HashMap<String, ParamValue>> {
    let mut result = HashMap::new();
    for token in tokens {
        let (name, eq_present, value) = match token.split_once('=') {
            Some((name, value)) => (name, true, value),
            None => (*token, false, ""),
        };
        if !is_alphanumeric(name) || (eq_present && value.is_empty()) {
            return None;
        }
        let param = if eq_present {
            ParamValue::Value(value.to_string())
        } else {
            ParamValue::Flag
        };
        result.insert(name.to_string(), param);
    }
    Some(result)
}

fn is_alphanumeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// A single-byte fallback text encoding, used when an argument's bytes
/// aren't valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback8Bit {
    Latin1,
}

impl Fallback8Bit {
    /// Decodes `bytes` using this encoding. Latin-1 maps every byte 0..=255
    /// directly to the Unicode scalar of the same value, so this can never fail.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Fallback8Bit::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// Outcome of decoding a raw argument: text if either UTF-8 or the
/// 8-bit fallback succeeded, otherwise the untouched bytes.
#[derive(Debug)]
pub enum DecodedArg {
    Text(String),
    Bytes(Vec<u8>),
}

/// Attempts UTF-8, then the configured 8-bit fallback, then gives up and
/// returns the raw bytes untouched.
pub fn decode_arg(bytes: &[u8], fallback: Fallback8Bit) -> DecodedArg {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return DecodedArg::Text(s.to_string());
    }
    match fallback.decode(bytes) {
        Some(s) => DecodedArg::Text(s),
        None => DecodedArg::Bytes(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"".as_slice(), SplitCommand::Empty)]
    #[case(b"QUIT".as_slice(), SplitCommand::Ascii { verb: "QUIT".into(), arg: None })]
    #[case(b"helo foo.test".as_slice(), SplitCommand::Ascii { verb: "HELO".into(), arg: Some(b"foo.test".to_vec()) })]
    #[case(b"MAIL   FROM:<a@b>".as_slice(), SplitCommand::Ascii { verb: "MAIL".into(), arg: Some(b"FROM:<a@b>".to_vec()) })]
    fn splits_commands(#[case] line: &[u8], #[case] expected: SplitCommand) {
        assert_eq!(split_command(line), expected);
    }

    #[test]
    fn non_ascii_verb_is_flagged() {
        let line = "\u{00e9}LO foo".as_bytes();
        let space = line.iter().position(|&b| b == b' ').unwrap();
        assert_eq!(
            split_command(line),
            SplitCommand::NonAsciiVerb(line[..space].to_vec())
        );
    }

    #[test]
    fn strips_keyword_case_insensitively() {
        assert_eq!(strip_command_keyword("FROM:", "from:<a@b>"), "<a@b>");
        assert_eq!(strip_command_keyword("FROM:", "TO:<a@b>"), "");
    }

    #[rstest]
    #[case("", ("", ""))]
    #[case("<a@b>", ("a@b", ""))]
    #[case("<a@b> SIZE=10", ("a@b", "SIZE=10"))]
    #[case("a@b", ("a@b", ""))]
    #[case("a@b SIZE=10", ("a@b", "SIZE=10"))]
    #[case("<a@b", ("", ""))]
    fn parses_addresses(#[case] input: &str, #[case] expected: (&str, &str)) {
        let (addr, rest) = get_addr(input);
        assert_eq!((addr.as_str(), rest.as_str()), expected);
    }

    #[test]
    fn params_parse_flags_and_values() {
        let tokens = ["SIZE=100", "SMTPUTF8"];
        let params = get_params(&tokens).unwrap();
        assert_eq!(params.get("SIZE"), Some(&ParamValue::Value("100".into())));
        assert_eq!(params.get("SMTPUTF8"), Some(&ParamValue::Flag));
    }

    #[test]
    fn params_reject_empty_value_after_equals() {
        assert_eq!(get_params(&["SIZE="]), None);
    }

    #[test]
    fn params_reject_non_alphanumeric_name() {
        assert_eq!(get_params(&["SIZE-X=1"]), None);
    }

    #[test]
    fn decode_arg_prefers_utf8() {
        match decode_arg("héllo".as_bytes(), Fallback8Bit::Latin1) {
            DecodedArg::Text(s) => assert_eq!(s, "héllo"),
            DecodedArg::Bytes(_) => panic!("expected text"),
        }
    }

    #[test]
    fn decode_arg_falls_back_to_latin1() {
        // 0xE9 alone is not valid UTF-8 but is 'é' in Latin-1.
        match decode_arg(&[0xE9], Fallback8Bit::Latin1) {
            DecodedArg::Text(s) => assert_eq!(s, "\u{00e9}"),
            DecodedArg::Bytes(_) => panic!("expected text"),
        }
    }
}
