//! Decoder for the folded trace a capture writes into the sample buffer.
//!
//! ```text
//! [{key=value,key=value}]frame;frame;frame[ weight]
//! frame = name[ - file:line]
//! ```
//!
//! Frames are root first. The weight defaults to 1. Trailing NUL and newline
//! bytes are ignored; a trace with nothing else decodes to an empty stack. Everything returned borrows from `blob[..declared_len]`.

use thiserror::Error;

use crate::{Frame, LabelSet, Location, StackSample};

const LOCATION_SEP: &str = " - ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("declared length {declared} exceeds the {available} bytes available")]
    LengthOutOfBounds { declared: usize, available: usize },

    #[error("trace is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },

    #[error("trace has labels but no frames")]
    NoFrames,

    #[error("frame {index} is empty")]
    EmptyFrame { index: usize },

    #[error("frame {index} has a malformed source location")]
    BadLocation { index: usize },

    #[error("weight `{0}` is out of range")]
    BadWeight(String),

    #[error("weight must be at least 1")]
    ZeroWeight,

    #[error("label block is missing its closing brace")]
    UnterminatedLabels,

    #[error("label entry {index} is malformed")]
    BadLabel { index: usize },

    #[error("label `{0}` appears more than once")]
    DuplicateLabel(String),
}

/// Decode the first `declared_len` bytes of `blob`.
pub fn decode(blob: &[u8], declared_len: usize) -> Result<StackSample<'_>, DecodeError> {
    let bytes = blob
        .get(..declared_len)
        .ok_or(DecodeError::LengthOutOfBounds { declared: declared_len, available: blob.len() })?;
    let text = core::str::from_utf8(bytes)
        .map_err(|e| DecodeError::InvalidUtf8 { valid_up_to: e.valid_up_to() })?;
    let text = text.trim_end_matches(|c| matches!(c, '\0' | '\n' | '\r'));
    if text.is_empty() {
        return Ok(StackSample { frames: Vec::new(), weight: 1, labels: None });
    }

    let (labels, rest) = split_labels(text)?;
    let (stack, weight) = split_weight(rest)?;
    if stack.is_empty() {
        return Err(DecodeError::NoFrames);
    }

    let frames = stack
        .split(';')
        .enumerate()
        .map(|(index, raw)| parse_frame(index, raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StackSample { frames, weight, labels })
}

fn split_labels(text: &str) -> Result<(Option<LabelSet>, &str), DecodeError> {
    let Some(body) = text.strip_prefix('{') else {
        return Ok((None, text));
    };
    let (inner, rest) = body.split_once('}').ok_or(DecodeError::UnterminatedLabels)?;
    if inner.is_empty() {
        return Ok((None, rest));
    }

    let mut labels = LabelSet::new();
    for (index, entry) in inner.split(',').enumerate() {
        let (key, value) = match entry.split_once('=') {
            Some((k, v)) if !k.is_empty() => (k, v),
            _ => return Err(DecodeError::BadLabel { index }),
        };
        if labels.insert(key, value).is_some() {
            return Err(DecodeError::DuplicateLabel(key.to_owned()));
        }
    }
    Ok((Some(labels), rest))
}

/// The weight is the token after the last space, when it is all digits.
fn split_weight(text: &str) -> Result<(&str, u64), DecodeError> {
    match text.rsplit_once(' ') {
        Some((stack, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
            let weight: u64 = tail.parse().map_err(|_| DecodeError::BadWeight(tail.to_owned()))?;
            if weight == 0 {
                return Err(DecodeError::ZeroWeight);
            }
            Ok((stack, weight))
        }
        _ => Ok((text, 1)),
    }
}

fn parse_frame(index: usize, raw: &str) -> Result<Frame<'_>, DecodeError> {
    let Some((name, location)) = raw.split_once(LOCATION_SEP) else {
        if raw.is_empty() {
            return Err(DecodeError::EmptyFrame { index });
        }
        return Ok(Frame { name: raw, location: None });
    };
    if name.is_empty() {
        return Err(DecodeError::EmptyFrame { index });
    }

    let (file, line) = location.rsplit_once(':').ok_or(DecodeError::BadLocation { index })?;
    if file.is_empty() {
        return Err(DecodeError::BadLocation { index });
    }
    let line = line.parse().map_err(|_| DecodeError::BadLocation { index })?;

    Ok(Frame { name, location: Some(Location { file, line }) })
}
