//! Message encoding and decoding conventions.
//!
//! A single poll response carries chat text, system notices, and file-share
//! metadata as undifferentiated strings; the exact delimiter tokens below
//! are a wire contract with the service and must not drift. System lines
//! look like `[12:01] * bob has joined #general`; file shares look like
//! `[12:00] * alice shared a file: report.pdf (2.3 KB) - [Preview/Download: /api/download/42]`.

use shared::{
    domain::ChatEvent,
    protocol::{OutgoingPayload, PayloadKind},
};

const FILE_SHARE_TOKEN: &str = "shared a file: ";
const PREVIEW_TOKEN: &str = " - [Preview/Download: ";

/// Builds the request payload for an outgoing send.
///
/// Trimmed text starting with `/` is classified as a command; empty text
/// (post-trim) is a no-op and yields `None`, meaning nothing is sent.
pub fn encode_outgoing(text: &str, channel: &str) -> Option<OutgoingPayload> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let kind = if trimmed.starts_with('/') {
        PayloadKind::Command
    } else {
        PayloadKind::Message
    };
    Some(OutgoingPayload {
        kind,
        content: trimmed.to_string(),
        channel: channel.to_string(),
    })
}

/// Classifies one poll-delivered line.
///
/// Precedence: file-share notice, then system notice, then plain text.
/// A line that carries the file-share token but fails the detailed pattern
/// degrades to a system notice with the raw text; the event is never
/// dropped.
pub fn decode_incoming(raw: &str) -> ChatEvent {
    let body = strip_timestamp(raw);
    if !body.starts_with('*') {
        return ChatEvent::Plain {
            text: raw.to_string(),
        };
    }
    if body.contains(FILE_SHARE_TOKEN) {
        if let Some(event) = parse_file_share(body) {
            return event;
        }
    }
    ChatEvent::System {
        text: raw.to_string(),
    }
}

/// Skips a leading `[hh:mm]`-style bracketed timestamp, if present, so
/// classification sees the `*` marker that follows it.
fn strip_timestamp(raw: &str) -> &str {
    if let Some(rest) = raw.strip_prefix('[') {
        if let Some(close) = rest.find(']') {
            return rest[close + 1..].trim_start();
        }
    }
    raw
}

fn parse_file_share(body: &str) -> Option<ChatEvent> {
    // body: "* alice shared a file: report.pdf (2.3 KB) - [Preview/Download: /api/download/42]"
    let after_marker = body.strip_prefix('*')?.trim_start();
    let (_username, rest) = after_marker.split_once(FILE_SHARE_TOKEN)?;

    let path_start = rest.rfind(PREVIEW_TOKEN)?;
    let download_path = rest[path_start + PREVIEW_TOKEN.len()..].strip_suffix(']')?;

    // "report.pdf (2.3 KB)" — the size label is the last parenthesized
    // group so filenames containing " (" still parse.
    let meta = &rest[..path_start];
    let open = meta.rfind(" (")?;
    let filename = &meta[..open];
    let size_label = meta[open + 2..].strip_suffix(')')?;

    if filename.is_empty() || download_path.is_empty() {
        return None;
    }
    Some(ChatEvent::FileShare {
        filename: filename.to_string(),
        size_label: size_label.to_string(),
        download_path: download_path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_input_encodes_to_nothing() {
        assert_eq!(encode_outgoing("", "#general"), None);
        assert_eq!(encode_outgoing("   \t ", "#general"), None);
    }

    #[test]
    fn plain_text_encodes_as_message() {
        let payload = encode_outgoing("  hello world ", "#general").expect("payload");
        assert_eq!(payload.kind, PayloadKind::Message);
        assert_eq!(payload.content, "hello world");
        assert_eq!(payload.channel, "#general");
    }

    #[test]
    fn slash_prefix_encodes_as_command() {
        let payload = encode_outgoing("/join #rust", "#general").expect("payload");
        assert_eq!(payload.kind, PayloadKind::Command);
        assert_eq!(payload.content, "/join #rust");
    }

    #[test]
    fn decodes_file_share_notice() {
        let raw =
            "[12:00] * alice shared a file: report.pdf (2.3 KB) - [Preview/Download: /api/download/42]";
        match decode_incoming(raw) {
            ChatEvent::FileShare {
                filename,
                size_label,
                download_path,
            } => {
                assert_eq!(filename, "report.pdf");
                assert_eq!(size_label, "2.3 KB");
                assert_eq!(download_path, "/api/download/42");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn file_share_filename_may_contain_parentheses() {
        let raw = "[09:15] * bob shared a file: notes (final).txt (812.0B) - [Preview/Download: /api/download/7]";
        match decode_incoming(raw) {
            ChatEvent::FileShare {
                filename,
                size_label,
                ..
            } => {
                assert_eq!(filename, "notes (final).txt");
                assert_eq!(size_label, "812.0B");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_system_notice() {
        let raw = "[12:01] * bob joined #general";
        assert_eq!(
            decode_incoming(raw),
            ChatEvent::System {
                text: raw.to_string()
            }
        );
    }

    #[test]
    fn system_notice_without_timestamp_still_classifies() {
        let raw = "* server restarting soon";
        assert_eq!(
            decode_incoming(raw),
            ChatEvent::System {
                text: raw.to_string()
            }
        );
    }

    #[test]
    fn decodes_plain_message() {
        assert_eq!(
            decode_incoming("hello world"),
            ChatEvent::Plain {
                text: "hello world".to_string()
            }
        );
    }

    #[test]
    fn malformed_file_share_degrades_to_system_notice() {
        // Carries the token but the trailing download marker is missing.
        let raw = "[12:00] * alice shared a file: report.pdf";
        assert_eq!(
            decode_incoming(raw),
            ChatEvent::System {
                text: raw.to_string()
            }
        );
    }

    #[test]
    fn bracketed_plain_text_is_not_misread_as_system() {
        let raw = "[citation needed] that claim";
        assert_eq!(
            decode_incoming(raw),
            ChatEvent::Plain {
                text: raw.to_string()
            }
        );
    }
}
