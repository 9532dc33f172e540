//! MIME message for the Gmail `messages.send` endpoint.
//!
//! Layout:
//! ```text
//! multipart/mixed
//! ├── multipart/alternative
//! │   ├── text/plain   (the memo, verbatim)
//! │   └── text/html    (the memo as a newsletter)
//! └── audio attachment
//! ```
//! Every leaf is base64 encoded, so the `=_` boundaries can never collide
//! with part content.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;

const MIXED_BOUNDARY: &str = "=_series_a_digest_mixed";
const ALT_BOUNDARY: &str = "=_series_a_digest_alt";
const LINE_WIDTH: usize = 76;
/// 45 bytes encode to 60 base64 chars, plus 12 for the `=?UTF-8?B?..?=` wrapper.
const ENCODED_WORD_BYTES: usize = 45;

pub struct Attachment<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

pub struct OutgoingMessage<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub text: &'a str,
    pub attachment: Option<Attachment<'a>>,
}

impl OutgoingMessage<'_> {
    /// RFC 5322 message with CRLF line endings.
    pub fn to_mime(&self) -> String {
        let mut out = String::new();
        push_line(&mut out, &format!("From: {}", self.from));
        push_line(&mut out, &format!("To: {}", self.to));
        push_line(&mut out, &format!("Subject: {}", encode_header(self.subject)));
        push_line(&mut out, "MIME-Version: 1.0");
        push_line(
            &mut out,
            &format!("Content-Type: multipart/mixed; boundary=\"{MIXED_BOUNDARY}\""),
        );
        push_line(&mut out, "");

        push_line(&mut out, &format!("--{MIXED_BOUNDARY}"));
        push_line(
            &mut out,
            &format!("Content-Type: multipart/alternative; boundary=\"{ALT_BOUNDARY}\""),
        );
        push_line(&mut out, "");

        push_line(&mut out, &format!("--{ALT_BOUNDARY}"));
        push_leaf(&mut out, "text/plain; charset=\"UTF-8\"", None, self.text.as_bytes());
        push_line(&mut out, &format!("--{ALT_BOUNDARY}"));
        push_leaf(
            &mut out,
            "text/html; charset=\"UTF-8\"",
            None,
            render_html(self.text).as_bytes(),
        );
        push_line(&mut out, &format!("--{ALT_BOUNDARY}--"));

        if let Some(attachment) = &self.attachment {
            push_line(&mut out, &format!("--{MIXED_BOUNDARY}"));
            push_leaf(
                &mut out,
                attachment.content_type,
                Some(attachment.file_name),
                attachment.bytes,
            );
        }
        push_line(&mut out, &format!("--{MIXED_BOUNDARY}--"));
        out
    }

    /// base64url form expected in the `raw` field.
    pub fn to_raw(&self) -> String {
        URL_SAFE.encode(self.to_mime())
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str("\r\n");
}

fn push_leaf(out: &mut String, content_type: &str, file_name: Option<&str>, body: &[u8]) {
    push_line(out, &format!("Content-Type: {content_type}"));
    push_line(out, "Content-Transfer-Encoding: base64");
    if let Some(name) = file_name {
        let name = name.replace('"', "");
        push_line(out, &format!("Content-Disposition: attachment; filename=\"{name}\""));
    }
    push_line(out, "");

    let encoded = STANDARD.encode(body);
    // base64 output is ASCII, so byte chunks are valid str slices
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        push_line(out, &String::from_utf8_lossy(chunk));
    }
}

/// RFC 2047 encoded-words for non-ASCII header values, folded so no word
/// exceeds 75 characters and no character is split across words.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_BYTES {
            words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
    }
    words.join("\r\n ")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Newsletter rendering of the memo.
pub fn render_html(text: &str) -> String {
    let body = escape_html(text)
        .replace("\n\n", "<br><br>")
        .replace('\n', "<br>");
    format!(
        "<html><body><h1>Series A Funding Newsletter</h1>\
         <div style=\"font-family: Arial, sans-serif; line-height: 1.6;\">{body}</div>\
         <p>Listen to the audio summary attached to this email.</p>\
         <p>Best regards,<br/>AI Newsletter Bot</p></body></html>"
    )
}
