//! Stream specifiers (`v`, `a:1`, `p:3:v`, `#0x101`, `m:language:eng`, ...).

use super::errors::{OptionError, OptionsResult};
use crate::models::{MediaType, StreamInfo};

/// Anything a stream specifier can be matched against.
pub trait StreamLike {
    fn media_type(&self) -> MediaType;

    /// Attached picture (excluded by `V`).
    fn attached_pic(&self) -> bool {
        false
    }

    /// Container stream id for `#ID` / `i:ID`.
    fn stream_id(&self) -> Option<i64> {
        None
    }

    fn in_program(&self, _program_id: i64) -> bool {
        false
    }

    fn tag(&self, _key: &str) -> Option<&str> {
        None
    }

    /// Codec parameters known well enough to use the stream.
    fn usable(&self) -> bool {
        true
    }
}

impl StreamLike for StreamInfo {
    fn media_type(&self) -> MediaType {
        self.media_type
    }

    fn attached_pic(&self) -> bool {
        self.attached_pic
    }

    fn stream_id(&self) -> Option<i64> {
        self.id
    }

    fn in_program(&self, program_id: i64) -> bool {
        self.program_ids.contains(&program_id)
    }

    fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    fn usable(&self) -> bool {
        if self.codec_name.as_deref().map_or(true, str::is_empty) {
            return false;
        }
        match self.media_type {
            MediaType::Video => self.width.unwrap_or(0) > 0 && self.height.unwrap_or(0) > 0,
            MediaType::Audio => {
                self.sample_rate.unwrap_or(0) > 0 && self.channels.unwrap_or(0) > 0
            }
            _ => true,
        }
    }
}

/// Parsed stream specifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSpecifier {
    types: Vec<MediaType>,
    no_attached_pic: bool,
    program: Option<i64>,
    stream_id: Option<i64>,
    metadata: Option<(String, Option<String>)>,
    usable: bool,
    index: Option<usize>,
}

fn invalid(spec: &str) -> OptionError {
    OptionError::invalid(format!("Invalid stream specifier: {}.", spec))
}

fn parse_integer(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    text.parse().ok()
}

impl StreamSpecifier {
    /// Parse a specifier; the empty string matches every stream.
    pub fn parse(spec: &str) -> OptionsResult<StreamSpecifier> {
        let mut parsed = StreamSpecifier::default();
        let mut rest = spec;

        while !rest.is_empty() {
            let first = rest.chars().next().unwrap_or_default();

            if first.is_ascii_digit() {
                let index = rest.parse::<usize>().map_err(|_| invalid(spec))?;
                parsed.index = Some(index);
                return Ok(parsed);
            }

            if let Some(media_type) = MediaType::from_specifier(first) {
                parsed.types.push(media_type);
                if first == 'V' {
                    parsed.no_attached_pic = true;
                }
                rest = &rest[1..];
                if !rest.is_empty() {
                    rest = rest.strip_prefix(':').ok_or_else(|| invalid(spec))?;
                }
                continue;
            }

            if let Some(after) = rest.strip_prefix("p:") {
                let (id, tail) = match after.split_once(':') {
                    Some((id, tail)) => (id, Some(tail)),
                    None => (after, None),
                };
                parsed.program = Some(parse_integer(id).ok_or_else(|| invalid(spec))?);
                match tail {
                    Some(tail) if !tail.is_empty() => rest = tail,
                    Some(_) => return Err(invalid(spec)),
                    None => return Ok(parsed),
                }
                continue;
            }

            if let Some(id) = rest.strip_prefix('#').or_else(|| rest.strip_prefix("i:")) {
                parsed.stream_id = Some(parse_integer(id).ok_or_else(|| invalid(spec))?);
                return Ok(parsed);
            }

            if let Some(meta) = rest.strip_prefix("m:") {
                let (key, value) = match meta.split_once(':') {
                    Some((k, v)) => (k.to_string(), Some(v.to_string())),
                    None => (meta.to_string(), None),
                };
                if key.is_empty() {
                    return Err(invalid(spec));
                }
                parsed.metadata = Some((key, value));
                return Ok(parsed);
            }

            if rest == "u" {
                parsed.usable = true;
                return Ok(parsed);
            }

            return Err(invalid(spec));
        }

        Ok(parsed)
    }

    fn matches_filters<S: StreamLike>(&self, stream: &S) -> bool {
        if self.types.iter().any(|t| *t != stream.media_type()) {
            return false;
        }
        if self.no_attached_pic && stream.attached_pic() {
            return false;
        }
        if let Some(program) = self.program {
            if !stream.in_program(program) {
                return false;
            }
        }
        if let Some(id) = self.stream_id {
            if stream.stream_id() != Some(id) {
                return false;
            }
        }
        if let Some((key, value)) = &self.metadata {
            match (stream.tag(key), value) {
                (None, _) => return false,
                (Some(actual), Some(expected)) if actual != expected => return false,
                _ => {}
            }
        }
        if self.usable && !stream.usable() {
            return false;
        }
        true
    }

    /// Whether `streams[index]` matches.
    ///
    /// A trailing index counts only the streams that pass the other filters.
    pub fn matches<S: StreamLike>(&self, streams: &[S], index: usize) -> bool {
        let Some(stream) = streams.get(index) else {
            return false;
        };
        if !self.matches_filters(stream) {
            return false;
        }
        match self.index {
            None => true,
            Some(wanted) => {
                streams[..index]
                    .iter()
                    .filter(|s| self.matches_filters(*s))
                    .count()
                    == wanted
            }
        }
    }

    /// Media type named by the specifier, if any.
    pub fn media_type(&self) -> Option<MediaType> {
        self.types.first().copied()
    }
}

/// Parse `spec` and test it against `streams[index]`.
pub fn check_stream_specifier<S: StreamLike>(
    streams: &[S],
    index: usize,
    spec: &str,
) -> OptionsResult<bool> {
    Ok(StreamSpecifier::parse(spec)?.matches(streams, index))
}
