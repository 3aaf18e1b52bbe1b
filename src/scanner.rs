//! Top-level object boundary detection over a partially received buffer.
//!
//! The walk works on bytes: every structural character (`{`, `}`, `"`, `\`)
//! is ASCII and can never occur inside a multi-byte UTF-8 sequence, so byte
//! offsets reported here are always valid `str` boundaries.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Outcome of one scan attempt over the current buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanResult {
    /// One complete object spans `start..end` (`end` exclusive).
    Found { start: usize, end: usize },
    /// No complete object yet; wait for more data.
    Incomplete,
    /// The candidate starting before `skip_to` does not parse; resume there.
    Invalid { skip_to: usize },
}

/// [`ScanResult`] that also carries the parsed object on success.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Found {
        start: usize,
        end: usize,
        object: Map<String, Value>,
    },
    Incomplete,
    Invalid {
        skip_to: usize,
    },
}

impl ScanOutcome {
    pub fn result(&self) -> ScanResult {
        match self {
            Self::Found { start, end, .. } => ScanResult::Found {
                start: *start,
                end: *end,
            },
            Self::Incomplete => ScanResult::Incomplete,
            Self::Invalid { skip_to } => ScanResult::Invalid { skip_to: *skip_to },
        }
    }
}

/// Stateless scan of `buffer` from its first opening brace.
pub fn scan(buffer: &str) -> ScanResult {
    ObjectScanner::new().scan(buffer).result()
}

/// Offset of the first opening brace, where the next candidate object starts.
pub fn find_object_start(buffer: &str) -> Option<usize> {
    buffer.find('{')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Progress {
    start: usize,
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Progress {
    fn at(start: usize) -> Self {
        Self {
            start,
            pos: start,
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }
}

/// Object scanner that resumes where the previous `Incomplete` scan stopped.
///
/// Resuming is only valid while the buffer grows by appends. Call
/// [`ObjectScanner::reset`] after any prefix of the buffer is consumed.
#[derive(Debug, Default, Clone)]
pub struct ObjectScanner {
    progress: Option<Progress>,
}

impl ObjectScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.progress = None;
    }

    pub fn scan(&mut self, buffer: &str) -> ScanOutcome {
        let resumed = self
            .progress
            .take()
            .filter(|progress| progress.pos <= buffer.len());
        let mut progress = match resumed.or_else(|| find_object_start(buffer).map(Progress::at)) {
            Some(progress) => progress,
            None => return ScanOutcome::Incomplete,
        };

        let bytes = buffer.as_bytes();
        while progress.pos < bytes.len() {
            let byte = bytes[progress.pos];
            progress.pos += 1;

            if progress.in_string {
                if progress.escaped {
                    progress.escaped = false;
                } else if byte == b'\\' {
                    progress.escaped = true;
                } else if byte == b'"' {
                    progress.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => progress.in_string = true,
                b'{' => progress.depth += 1,
                b'}' => {
                    progress.depth = progress.depth.saturating_sub(1);
                    if progress.depth == 0 {
                        return parse_candidate(buffer, progress.start, progress.pos);
                    }
                }
                _ => {}
            }
        }

        self.progress = Some(progress);
        ScanOutcome::Incomplete
    }
}

fn parse_candidate(buffer: &str, start: usize, end: usize) -> ScanOutcome {
    match parse_json::<Map<String, Value>>(&buffer[start..end]) {
        Ok(object) => ScanOutcome::Found { start, end, object },
        Err(_) => ScanOutcome::Invalid { skip_to: start + 1 },
    }
}

/// Parses one JSON document with no nesting limit.
///
/// Escapes of unpaired UTF-16 surrogates cannot be held by a Rust string;
/// when they make the first attempt fail they are read as U+FFFD.
pub(crate) fn parse_json<T: DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    match parse_unbounded(text) {
        Ok(value) => Ok(value),
        Err(error) => match replace_lone_surrogates(text) {
            Some(repaired) => parse_unbounded(&repaired),
            None => Err(error),
        },
    }
}

fn parse_unbounded<T: DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;
    Ok(value)
}

fn replace_lone_surrogates(text: &str) -> Option<String> {
    const HIGH: std::ops::Range<u16> = 0xD800..0xDC00;
    const LOW: std::ops::Range<u16> = 0xDC00..0xE000;

    let bytes = text.as_bytes();
    let mut repaired = String::with_capacity(text.len());
    let mut copied = 0;
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] != b'\\' {
            pos += 1;
            continue;
        }
        let Some(unit) = escaped_unit(bytes, pos) else {
            pos += 2;
            continue;
        };
        let paired = HIGH.contains(&unit)
            && escaped_unit(bytes, pos + 6).is_some_and(|next| LOW.contains(&next));
        if paired {
            pos += 12;
            continue;
        }
        if !HIGH.contains(&unit) && !LOW.contains(&unit) {
            pos += 6;
            continue;
        }
        repaired.push_str(&text[copied..pos]);
        repaired.push_str("\\ufffd");
        pos += 6;
        copied = pos;
    }

    if copied == 0 {
        return None;
    }
    repaired.push_str(&text[copied..]);
    Some(repaired)
}

/// The code unit of a `\uXXXX` escape starting at `pos`.
fn escaped_unit(bytes: &[u8], pos: usize) -> Option<u16> {
    match bytes.get(pos..pos + 6)? {
        [b'\\', b'u', hex @ ..] => {
            let hex = std::str::from_utf8(hex).ok()?;
            if !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
                return None;
            }
            u16::from_str_radix(hex, 16).ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{replace_lone_surrogates, scan, ObjectScanner, ScanOutcome, ScanResult};

    #[test]
    fn empty_and_brace_free_buffers_are_incomplete() {
        assert_eq!(scan(""), ScanResult::Incomplete);
        assert_eq!(scan("   \n\t"), ScanResult::Incomplete);
        assert_eq!(scan("no objects here ]"), ScanResult::Incomplete);
    }

    #[test]
    fn finds_object_after_leading_noise() {
        let buffer = "noise {\"event\":\"a\"} tail";
        assert_eq!(scan(buffer), ScanResult::Found { start: 6, end: 19 });
    }

    #[test]
    fn braces_and_quotes_inside_strings_are_ignored() {
        let buffer = r#"{"event":"x","text":"a } { \" \\"}"#;
        assert_eq!(
            scan(buffer),
            ScanResult::Found {
                start: 0,
                end: buffer.len()
            }
        );
    }

    #[test]
    fn nested_objects_close_at_outer_brace() {
        let buffer = r#"{"event":"x","data":{"inner":{"deep":1}}}{"#;
        assert_eq!(
            scan(buffer),
            ScanResult::Found {
                start: 0,
                end: buffer.len() - 1
            }
        );
    }

    #[test]
    fn unterminated_object_is_incomplete() {
        assert_eq!(scan(r#"{"event":"x","val"#), ScanResult::Incomplete);
        assert_eq!(scan(r#"{"event":"x}"#), ScanResult::Incomplete);
    }

    #[test]
    fn balanced_but_unparseable_span_is_invalid() {
        assert_eq!(scan("xx{not json}"), ScanResult::Invalid { skip_to: 3 });
    }

    #[test]
    fn deeply_nested_record_is_one_object() {
        let depth = 300;
        let buffer = format!(
            r#"{{"event":"deep","v":{}1{}}}"#,
            r#"{"a":"#.repeat(depth),
            "}".repeat(depth)
        );
        match ObjectScanner::new().scan(&buffer) {
            ScanOutcome::Found { start, end, object } => {
                assert_eq!((start, end), (0, buffer.len()));
                assert_eq!(object["event"], "deep");
                let mut value = &object["v"];
                for _ in 0..depth {
                    value = &value["a"];
                }
                assert_eq!(value, 1);
            }
            other => panic!("expected the outer object, got {other:?}"),
        }
    }

    #[test]
    fn unpaired_surrogate_escapes_become_replacement_characters() {
        let buffer = r#"{"event":"outer","data":{"event":"inner"},"x":"\ud800","y":"a\udc00b","ok":"\ud83d\ude00"}"#;
        match ObjectScanner::new().scan(buffer) {
            ScanOutcome::Found { start, end, object } => {
                assert_eq!((start, end), (0, buffer.len()));
                assert_eq!(object["event"], "outer");
                assert_eq!(object["x"], "\u{fffd}");
                assert_eq!(object["y"], "a\u{fffd}b");
                assert_eq!(object["ok"], "\u{1f600}");
            }
            other => panic!("expected the outer object, got {other:?}"),
        }
    }

    #[test]
    fn escaped_backslash_before_u_is_not_a_surrogate_escape() {
        assert_eq!(replace_lone_surrogates(r#"{"p":"C:\\ud800"}"#), None);
        assert_eq!(
            replace_lone_surrogates(r#"{"p":"\\\ud800"}"#).as_deref(),
            Some(r#"{"p":"\\\ufffd"}"#)
        );
    }

    #[test]
    fn scanner_resumes_after_incomplete() {
        let mut scanner = ObjectScanner::new();
        let mut buffer = String::from(r#"{"event":"a","s":"}"#);
        assert_eq!(scanner.scan(&buffer), ScanOutcome::Incomplete);

        buffer.push_str(r#"\"{"}"#);
        match scanner.scan(&buffer) {
            ScanOutcome::Found { start, end, object } => {
                assert_eq!((start, end), (0, buffer.len()));
                assert_eq!(object["s"], "}\"{");
            }
            other => panic!("expected a complete object, got {other:?}"),
        }
    }

    #[test]
    fn escape_split_across_scans_is_remembered() {
        let mut scanner = ObjectScanner::new();
        let mut buffer = String::from(r#"{"event":"a\"#);
        assert_eq!(scanner.scan(&buffer), ScanOutcome::Incomplete);

        buffer.push_str(r#""b"}"#);
        assert!(matches!(
            scanner.scan(&buffer),
            ScanOutcome::Found { end, .. } if end == buffer.len()
        ));
    }
}
