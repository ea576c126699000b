//! Message model and body extraction.
//!
//! A raw RFC 5322 message is parsed once into a [`Message`]: a tree of [`Part`]s
//! whose payloads have their transfer encoding already removed. [`extract_body`]
//! then picks the part most likely to carry a passcode and returns it as text.
//!
//! ```
//! use otp_forwarder::parser::{extract_body, Message};
//!
//! let raw = b"Subject: Login\r\nContent-Type: text/html\r\n\r\n<p>Code <b>654321</b></p>";
//! let message = Message::parse(raw).unwrap();
//! assert_eq!(message.subject(), "Login");
//! assert_eq!(extract_body(&message), "Code 654321");
//! ```

use crate::error::{Error, Result};
use crate::html;
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};
use tracing::debug;

const TEXT_PLAIN: &str = "text/plain";
const TEXT_HTML: &str = "text/html";
const MESSAGE_RFC822: &str = "message/rfc822";
const DEFAULT_CHARSET: &str = "utf-8";

/// One node of a message's MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// MIME type, e.g. `text/plain`.
    pub content_type: String,
    /// Raw `Content-Disposition` header value, empty when absent.
    pub disposition: String,
    /// Declared charset, `utf-8` when absent.
    pub charset: String,
    /// Body bytes with the content transfer encoding removed.
    pub payload: Vec<u8>,
    /// Child parts; non-empty only for multipart containers.
    pub subparts: Vec<Part>,
}

impl Part {
    /// Creates a leaf part with the default charset and no disposition.
    #[must_use]
    pub fn new(content_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into().to_ascii_lowercase(),
            disposition: String::new(),
            charset: DEFAULT_CHARSET.to_string(),
            payload: payload.into(),
            subparts: Vec::new(),
        }
    }

    /// Creates a container part holding `subparts`.
    #[must_use]
    pub fn multipart(content_type: impl Into<String>, subparts: Vec<Part>) -> Self {
        Self {
            subparts,
            ..Self::new(content_type, Vec::new())
        }
    }

    /// Sets the raw disposition header value.
    #[must_use]
    pub fn with_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.disposition = disposition.into();
        self
    }

    /// Sets the charset label.
    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Returns `true` if this part has child parts.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        !self.subparts.is_empty()
    }

    /// Returns `true` if the disposition marks this part as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition.to_ascii_lowercase().contains("attachment")
    }

    fn has_type(&self, mime: &str) -> bool {
        self.content_type.eq_ignore_ascii_case(mime)
    }

    /// Decodes the payload with the declared charset.
    ///
    /// Malformed sequences become U+FFFD and unknown charset labels fall back to
    /// UTF-8, so this never fails.
    #[must_use]
    pub fn decode_text(&self) -> String {
        match encoding_rs::Encoding::for_label(self.charset.trim().as_bytes()) {
            Some(encoding) => encoding
                .decode_without_bom_handling(&self.payload)
                .0
                .into_owned(),
            None => {
                debug!(charset = %self.charset, "Unknown charset, decoding as UTF-8");
                String::from_utf8_lossy(&self.payload).into_owned()
            }
        }
    }

    /// Iterates over this part and all descendants, depth-first in document order.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    fn from_parsed(parsed: &ParsedMail<'_>) -> Self {
        let content_type = parsed.ctype.mimetype.to_ascii_lowercase();
        let mut subparts: Vec<Part> = parsed.subparts.iter().map(Part::from_parsed).collect();
        // Undecodable transfer encodings yield an empty body rather than an error
        let mut payload = if subparts.is_empty() {
            parsed.get_body_raw().unwrap_or_default()
        } else {
            Vec::new()
        };

        // An attached message is walked like any other container
        if subparts.is_empty() && content_type == MESSAGE_RFC822 {
            match parse_mail(&payload) {
                Ok(embedded) => subparts.push(Part::from_parsed(&embedded)),
                Err(e) => debug!(error = %e, "Embedded message does not parse, kept as a leaf"),
            }
            if !subparts.is_empty() {
                payload.clear();
            }
        }

        Self {
            content_type,
            disposition: parsed
                .headers
                .get_first_value("Content-Disposition")
                .unwrap_or_default(),
            charset: parsed
                .ctype
                .params
                .get("charset")
                .cloned()
                .unwrap_or_else(|| DEFAULT_CHARSET.to_string()),
            payload,
            subparts,
        }
    }
}

/// Depth-first iterator over a part tree, created by [`Part::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a Part>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.subparts.iter().rev());
        Some(part)
    }
}

/// A parsed email: its subject and its MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    subject: Option<String>,
    root: Part,
}

impl Message {
    /// Builds a message from an already assembled part tree.
    #[must_use]
    pub fn new(subject: Option<String>, root: Part) -> Self {
        Self { subject, root }
    }

    /// Parses raw message bytes as returned by an IMAP `BODY[]` fetch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParseEmail`] if the header block cannot be parsed.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let parsed = parse_mail(raw).map_err(|source| Error::ParseEmail { source })?;

        Ok(Self {
            subject: parsed.headers.get_first_value("Subject"),
            root: Part::from_parsed(&parsed),
        })
    }

    /// Returns the decoded subject, or `""` when the header is missing.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or_default()
    }

    /// Returns the root part.
    #[must_use]
    pub fn root(&self) -> &Part {
        &self.root
    }

    /// Returns `true` if the message has child parts.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.root.is_multipart()
    }
}

/// Extracts the human-readable body of `message`.
///
/// Multipart messages are searched depth-first, skipping attachments. The first
/// `text/plain` part wins over any `text/html` part, wherever they sit in the tree.
/// HTML is only used when no plain part exists, and is reduced to its text nodes.
/// A multipart message with neither yields `""`.
///
/// A single-part message is normalized when it is `text/html` and decoded as-is for
/// every other type.
#[must_use]
pub fn extract_body(message: &Message) -> String {
    let root = message.root();
    if !root.is_multipart() {
        return if root.has_type(TEXT_HTML) {
            html::to_plain_text(&root.decode_text())
        } else {
            root.decode_text()
        };
    }

    let mut plain = None;
    let mut markup = None;
    for part in root.walk() {
        if part.is_attachment() {
            continue;
        }
        if plain.is_none() && part.has_type(TEXT_PLAIN) {
            plain = Some(part);
        } else if markup.is_none() && part.has_type(TEXT_HTML) {
            markup = Some(part);
        }
    }

    match (plain, markup) {
        (Some(part), _) => part.decode_text(),
        (None, Some(part)) => html::to_plain_text(&part.decode_text()),
        (None, None) => {
            debug!("No text part outside attachments");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::find_otp;

    fn multipart(parts: Vec<Part>) -> Message {
        Message::new(
            Some("Test".into()),
            Part::multipart("multipart/mixed", parts),
        )
    }

    #[test]
    fn test_single_part_plain_is_identity() {
        let body = "Your verification code is 654321.\r\nThanks";
        let message = Message::new(None, Part::new("text/plain", body));
        assert_eq!(extract_body(&message), body);
    }

    #[test]
    fn test_single_part_unknown_type_is_plain() {
        let message = Message::new(None, Part::new("application/x-weird", "<b>raw</b>"));
        assert_eq!(extract_body(&message), "<b>raw</b>");
    }

    #[test]
    fn test_single_part_html_is_normalized() {
        let message = Message::new(None, Part::new("TEXT/HTML", "<p>Code <b>111222</b></p>"));
        assert_eq!(extract_body(&message), "Code 111222");
    }

    #[test]
    fn test_plain_preferred_regardless_of_order() {
        let html = Part::new("text/html", "<p>html 222222</p>");
        let plain = Part::new("text/plain", "plain 111111");

        let html_first = multipart(vec![html.clone(), plain.clone()]);
        let plain_first = multipart(vec![plain, html]);

        assert_eq!(extract_body(&html_first), "plain 111111");
        assert_eq!(extract_body(&plain_first), "plain 111111");
    }

    #[test]
    fn test_html_only_multipart() {
        let message = multipart(vec![Part::new(
            "text/html",
            "<p>Your code: <b>654321</b></p>",
        )]);
        assert_eq!(extract_body(&message), "Your code: 654321");
    }

    #[test]
    fn test_first_of_each_type_wins() {
        let message = multipart(vec![
            Part::new("text/html", "first html"),
            Part::new("text/html", "second html"),
            Part::new("image/png", vec![0x89, 0x50]),
        ]);
        assert_eq!(extract_body(&message), "first html");

        let message = multipart(vec![
            Part::new("text/plain", "first plain"),
            Part::new("text/plain", "second plain"),
        ]);
        assert_eq!(extract_body(&message), "first plain");
    }

    #[test]
    fn test_nested_multipart_is_flattened() {
        let alternative = Part::multipart(
            "multipart/alternative",
            vec![
                Part::new("text/html", "<i>nested html</i>"),
                Part::new("text/plain", "nested plain 424242"),
            ],
        );
        let message = multipart(vec![
            Part::new("text/html", "<b>outer html</b>"),
            alternative,
        ]);
        assert_eq!(extract_body(&message), "nested plain 424242");
    }

    #[test]
    fn test_attachments_are_skipped() {
        let message = multipart(vec![Part::new("text/plain", "from attachment 999999")
            .with_disposition("Attachment; filename=\"codes.txt\"")]);
        assert_eq!(extract_body(&message), "");

        let message = multipart(vec![
            Part::new("text/plain", "attached").with_disposition("attachment"),
            Part::new("text/html", "<p>inline body</p>").with_disposition("inline"),
        ]);
        assert_eq!(extract_body(&message), "inline body");
    }

    #[test]
    fn test_no_text_parts_yields_empty() {
        let message = multipart(vec![Part::new("image/png", vec![1, 2, 3])]);
        assert_eq!(extract_body(&message), "");
    }

    #[test]
    fn test_charset_is_honoured() {
        // "Código 123456" in ISO-8859-1
        let payload = b"C\xf3digo 123456".to_vec();
        let message = Message::new(None, Part::new("text/plain", payload).with_charset("iso-8859-1"));
        assert_eq!(extract_body(&message), "Código 123456");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let payload = b"code \xff\xfe 123456".to_vec();
        let message = Message::new(None, Part::new("text/plain", payload));
        assert_eq!(extract_body(&message), "code \u{fffd}\u{fffd} 123456");
    }

    #[test]
    fn test_unknown_charset_falls_back_to_utf8() {
        let payload = "caf\u{e9} 123456".as_bytes().to_vec();
        let message = Message::new(
            None,
            Part::new("text/plain", payload).with_charset("x-no-such-charset"),
        );
        assert_eq!(extract_body(&message), "caf\u{e9} 123456");
    }

    #[test]
    fn test_walk_order_is_depth_first() {
        let tree = Part::multipart(
            "multipart/mixed",
            vec![
                Part::multipart(
                    "multipart/alternative",
                    vec![Part::new("text/plain", "a"), Part::new("text/html", "b")],
                ),
                Part::new("image/png", "c"),
            ],
        );
        let types: Vec<&str> = tree.walk().map(|p| p.content_type.as_str()).collect();
        assert_eq!(
            types,
            [
                "multipart/mixed",
                "multipart/alternative",
                "text/plain",
                "text/html",
                "image/png"
            ]
        );
    }

    #[test]
    fn test_parse_simple_message() {
        let raw = b"From: bank@example.com\r\nTo: user@example.com\r\nSubject: Your code\r\n\r\nYour code is 123456.";
        let message = Message::parse(raw).unwrap();
        assert!(!message.is_multipart());
        assert_eq!(message.subject(), "Your code");
        assert_eq!(find_otp(&extract_body(&message)).unwrap(), "123456");
    }

    #[test]
    fn test_parse_rejects_lone_cr_after_headers() {
        let raw = b"From: bank@example.com\r\nSubject: Login\r\n\rCode 111111\r\n";
        let err = Message::parse(raw).unwrap_err();
        assert!(matches!(err, Error::ParseEmail { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_forwarded_message_is_walked() {
        let raw = "From: me@example.com\r\n\
                   Subject: Fwd: Login\r\n\
                   Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
                   \r\n\
                   --outer\r\n\
                   Content-Type: message/rfc822\r\n\
                   \r\n\
                   From: bank@example.com\r\n\
                   Subject: Login\r\n\
                   Content-Type: text/plain\r\n\
                   \r\n\
                   Your code is 246810.\r\n\
                   --outer--\r\n";
        let message = Message::parse(raw.as_bytes()).unwrap();

        let types: Vec<&str> = message
            .root()
            .walk()
            .map(|p| p.content_type.as_str())
            .collect();
        assert_eq!(types, ["multipart/mixed", "message/rfc822", "text/plain"]);
        assert_eq!(message.subject(), "Fwd: Login");
        assert_eq!(find_otp(&extract_body(&message)).unwrap(), "246810");
    }

    #[test]
    fn test_parse_missing_subject_is_empty() {
        let message = Message::parse(b"From: a@example.com\r\n\r\nbody").unwrap();
        assert_eq!(message.subject(), "");
    }

    #[test]
    fn test_parse_encoded_subject() {
        let raw = b"Subject: =?UTF-8?B?Q8OzZGlnbw==?=\r\n\r\nbody";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.subject(), "Código");
    }

    #[test]
    fn test_parse_multipart_with_attachment() {
        let raw = concat!(
            "Subject: Login\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "Content-Disposition: attachment; filename=\"old.txt\"\r\n",
            "\r\n",
            "old code 111111\r\n",
            "--outer\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "<p>Your code: <b>654321</b></p>\r\n",
            "--outer--\r\n",
        );
        let message = Message::parse(raw.as_bytes()).unwrap();

        assert!(message.is_multipart());
        assert_eq!(message.root().subparts.len(), 2);
        assert!(message.root().subparts[0].is_attachment());

        let body = extract_body(&message);
        assert!(body.contains("Your code: 654321"));
        assert!(!body.contains("111111"));
    }

    #[test]
    fn test_parse_base64_part() {
        let raw = concat!(
            "Content-Type: multipart/alternative; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain; charset=\"utf-8\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "Q29kZTogMzEzMzcz\r\n",
            "--b--\r\n",
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(extract_body(&message), "Code: 313373");
    }
}
