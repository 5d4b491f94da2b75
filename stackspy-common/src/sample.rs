use core::fmt;

use serde::Serialize;

use crate::LabelSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Location<'a> {
    pub file: &'a str,
    pub line: u32,
}

/// One entry of a captured stack, borrowed from the sample buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Frame<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location<'a>>,
}

impl fmt::Display for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} - {}:{}", self.name, loc.file, loc.line),
            None => f.write_str(self.name),
        }
    }
}

/// A decoded stack capture.
///
/// Frames borrow the session's sample buffer, which the next capture
/// overwrites; the lifetime keeps a sample from outliving the delivery call.
/// Use [`StackSample::folded`] to keep an owned copy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StackSample<'a> {
    /// root first, leaf last
    pub frames: Vec<Frame<'a>>,
    pub weight: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<LabelSet>,
}

impl<'a> StackSample<'a> {
    pub fn root(&self) -> Option<&Frame<'a>> {
        self.frames.first()
    }

    pub fn leaf(&self) -> Option<&Frame<'a>> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Frames joined with `;`, root first, without weight or labels
    pub fn folded(&self) -> String {
        let mut ret = String::new();
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                ret.push(';');
            }
            ret.push_str(&frame.to_string());
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folded() {
        let sample = StackSample {
            frames: vec![
                Frame { name: "<main>", location: Some(Location { file: "app.rb", line: 3 }) },
                Frame { name: "sleep", location: None },
            ],
            weight: 1,
            labels: None,
        };
        assert_eq!(sample.folded(), "<main> - app.rb:3;sleep");
        assert_eq!(sample.root().map(|f| f.name), Some("<main>"));
        assert_eq!(sample.leaf().map(|f| f.name), Some("sleep"));
        assert_eq!(sample.depth(), 2);
    }

    #[test]
    fn test_serialize_skips_empty() {
        let sample = StackSample {
            frames: vec![Frame { name: "a", location: None }],
            weight: 2,
            labels: None,
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, r#"{"frames":[{"name":"a"}],"weight":2}"#);
    }
}
