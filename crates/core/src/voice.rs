//! Voice selection policy and markup stripping for spoken responses.
//!
//! The client reports the speech synthesis voices its platform offers; the
//! policy here picks one deterministically so the assistant sounds the same
//! across sessions on the same device. Responses are written in Markdown, so
//! everything that would be read aloud is flattened to plain text first.

use serde::{Deserialize, Serialize};

/// Utterance parameters applied to every spoken response.
pub const SPEECH_LANG: &str = "en-US";
pub const SPEECH_RATE: f32 = 1.0;
pub const SPEECH_PITCH: f32 = 0.9;
pub const SPEECH_VOLUME: f32 = 1.0;

/// Known high-quality voices, tried first in order of appearance in the
/// client's voice list.
pub const PREFERRED_VOICE_NAMES: [&str; 8] = [
    "Google US English Male",
    "Microsoft David Desktop - English (United States)",
    "Microsoft Mark - English (United States)",
    "Alex",
    "Daniel",
    "en-US-AriaNeural",
    "en-US-GuyNeural",
    "en-US-DavisNeural",
];

/// Given names that platforms commonly use for their male voices.
const GIVEN_NAME_HINTS: [&str; 6] = ["david", "mark", "alex", "daniel", "guy", "davis"];

/// A speech synthesis voice as reported by the client platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    pub name: String,
    pub lang: String,
}

/// Picks the voice to use from the platform's list.
///
/// Preference order: a known preferred voice, then any name containing a
/// gender keyword, then a known given name, then any English-locale voice,
/// then the first voice offered. Returns `None` only for an empty list.
pub fn select_voice(voices: &[VoiceDescriptor]) -> Option<&VoiceDescriptor> {
    if let Some(voice) = voices
        .iter()
        .find(|v| PREFERRED_VOICE_NAMES.iter().any(|p| v.name.contains(p)))
    {
        return Some(voice);
    }
    if let Some(voice) = voices
        .iter()
        .find(|v| v.name.to_lowercase().contains("male"))
    {
        return Some(voice);
    }
    if let Some(voice) = voices.iter().find(|v| {
        let name = v.name.to_lowercase();
        GIVEN_NAME_HINTS.iter().any(|hint| name.contains(hint))
    }) {
        return Some(voice);
    }
    if let Some(voice) = voices.iter().find(|v| v.lang.starts_with("en")) {
        return Some(voice);
    }
    voices.first()
}

/// Flattens Markdown to plain text suitable for speech synthesis.
///
/// Structural markers are removed while their content is kept: emphasis,
/// inline code, strikethrough, link labels, headings, blockquotes, and list
/// markers. Horizontal rules and code fence delimiters are dropped entirely,
/// and runs of three or more newlines collapse to two.
pub fn strip_markup(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if is_fence_delimiter(trimmed) || is_horizontal_rule(trimmed) {
            continue;
        }
        let without_block = strip_block_prefix(trimmed);
        lines.push(strip_inline(without_block));
    }

    let joined = lines.join("\n");
    collapse_blank_runs(&joined).trim().to_string()
}

fn is_fence_delimiter(line: &str) -> bool {
    line.starts_with("```") || line.starts_with("~~~")
}

fn is_horizontal_rule(line: &str) -> bool {
    let line = line.trim_end();
    line.len() >= 3
        && (line.chars().all(|c| c == '-')
            || line.chars().all(|c| c == '*')
            || line.chars().all(|c| c == '_'))
}

/// Removes heading, blockquote, and list markers from the start of a line.
fn strip_block_prefix(line: &str) -> &str {
    let mut rest = line;

    let hashes = rest.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) {
        if let Some(after) = rest[hashes..].strip_prefix(' ') {
            rest = after.trim_start();
        }
    }

    while let Some(after) = rest.strip_prefix("> ") {
        rest = after;
    }

    for marker in ["- ", "* ", "+ "] {
        if let Some(after) = rest.strip_prefix(marker) {
            return after;
        }
    }

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(after) = rest[digits..].strip_prefix(". ") {
            return after;
        }
    }

    rest
}

/// Removes paired inline markers, keeping their content, and rewrites links
/// to their labels. Unpaired markers are kept as literal text.
fn strip_inline(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '[' => {
                if let Some((label, next)) = parse_link(&chars, i) {
                    out.push_str(&strip_inline(&label));
                    i = next;
                } else {
                    out.push('[');
                    i += 1;
                }
            }
            '*' | '_' | '~' | '`' => {
                let marker = chars[i];
                let run = chars[i..].iter().take_while(|&&c| c == marker).count();
                // Only *, **, _, __, ~~ and ` count as emphasis markers.
                let is_marker = match marker {
                    '~' => run == 2,
                    '`' => run == 1,
                    _ => run <= 2,
                };
                if is_marker {
                    if let Some(close) = find_closing(&chars, i + run, marker, run) {
                        let inner: String = chars[i + run..close].iter().collect();
                        out.push_str(&strip_inline(&inner));
                        i = close + run;
                        continue;
                    }
                }
                for _ in 0..run {
                    out.push(marker);
                }
                i += run;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Parses `[label](url)` starting at `open`. Returns the label and the index
/// just past the closing parenthesis.
fn parse_link(chars: &[char], open: usize) -> Option<(String, usize)> {
    let close_bracket = chars[open + 1..].iter().position(|&c| c == ']')? + open + 1;
    if chars.get(close_bracket + 1) != Some(&'(') {
        return None;
    }
    let close_paren =
        chars[close_bracket + 2..].iter().position(|&c| c == ')')? + close_bracket + 2;
    let label: String = chars[open + 1..close_bracket].iter().collect();
    Some((label, close_paren + 1))
}

fn find_closing(chars: &[char], from: usize, marker: char, run: usize) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        if chars[i] == marker {
            let here = chars[i..].iter().take_while(|&&c| c == marker).count();
            if here >= run && i > from {
                return Some(i);
            }
            i += here;
        } else {
            i += 1;
        }
    }
    None
}

fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, lang: &str) -> VoiceDescriptor {
        VoiceDescriptor {
            name: name.to_string(),
            lang: lang.to_string(),
        }
    }

    #[test]
    fn test_select_voice_prefers_known_names() {
        let voices = vec![
            voice("Samantha", "en-US"),
            voice("Google US English Male", "en-US"),
            voice("Daniel", "en-GB"),
        ];
        assert_eq!(
            select_voice(&voices).unwrap().name,
            "Google US English Male"
        );
    }

    #[test]
    fn test_select_voice_falls_back_to_gender_keyword() {
        let voices = vec![voice("Samantha", "en-US"), voice("US Male Voice", "en-US")];
        assert_eq!(select_voice(&voices).unwrap().name, "US Male Voice");
    }

    #[test]
    fn test_select_voice_falls_back_to_given_names() {
        let voices = vec![voice("Samantha", "en-US"), voice("Microsoft Guy", "en-US")];
        assert_eq!(select_voice(&voices).unwrap().name, "Microsoft Guy");
    }

    #[test]
    fn test_select_voice_falls_back_to_english_locale() {
        let voices = vec![voice("Amelie", "fr-FR"), voice("Karen", "en-AU")];
        assert_eq!(select_voice(&voices).unwrap().name, "Karen");
    }

    #[test]
    fn test_select_voice_uses_first_as_last_resort() {
        let voices = vec![voice("Amelie", "fr-FR"), voice("Yuna", "ko-KR")];
        assert_eq!(select_voice(&voices).unwrap().name, "Amelie");
    }

    #[test]
    fn test_select_voice_empty_list() {
        assert!(select_voice(&[]).is_none());
    }

    #[test]
    fn test_strip_markup_headings_and_emphasis() {
        let input = "## Skills\n\nI know **Python** and *Rust* and `tokio`.";
        assert_eq!(
            strip_markup(input),
            "Skills\n\nI know Python and Rust and tokio."
        );
    }

    #[test]
    fn test_strip_markup_links_keep_labels() {
        let input = "See [my GitHub](https://github.com/ankits1802) for more.";
        assert_eq!(strip_markup(input), "See my GitHub for more.");
    }

    #[test]
    fn test_strip_markup_lists_and_blockquotes() {
        let input = "- First skill\n* Second skill\n1. Third skill\n> A note";
        assert_eq!(
            strip_markup(input),
            "First skill\nSecond skill\nThird skill\nA note"
        );
    }

    #[test]
    fn test_strip_markup_drops_rules_and_fences() {
        let input = "Before\n---\n```\nlet x = 1;\n```\nAfter";
        assert_eq!(strip_markup(input), "Before\nlet x = 1;\nAfter");
    }

    #[test]
    fn test_strip_markup_strikethrough_and_underscores() {
        let input = "~~old plan~~ __bold__ _italic_";
        assert_eq!(strip_markup(input), "old plan bold italic");
    }

    #[test]
    fn test_strip_markup_collapses_blank_runs() {
        let input = "One\n\n\n\nTwo";
        assert_eq!(strip_markup(input), "One\n\nTwo");
    }

    #[test]
    fn test_strip_markup_keeps_unpaired_markers() {
        let input = "2 * 3 equals 6";
        assert_eq!(strip_markup(input), "2 * 3 equals 6");
    }

    #[test]
    fn test_strip_markup_plain_text_unchanged() {
        let input = "Just a normal sentence.";
        assert_eq!(strip_markup(input), "Just a normal sentence.");
    }
}
