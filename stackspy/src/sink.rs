//! Destinations for decoded samples.
//!
//! A session calls its sink once per successful capture, synchronously, while
//! the sample still borrows the session's buffer. Sinks that need to keep
//! anything must copy it out (`StackSample::folded`, `to_owned`).

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use stackspy_common::{Frame, LabelSet, StackSample};

pub trait Sink {
    fn append(&mut self, labels: Option<&LabelSet>, sample: &StackSample<'_>, weight: u64) -> Result<()>;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn append(&mut self, labels: Option<&LabelSet>, sample: &StackSample<'_>, weight: u64) -> Result<()> {
        (**self).append(labels, sample, weight)
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn append(&mut self, labels: Option<&LabelSet>, sample: &StackSample<'_>, weight: u64) -> Result<()> {
        (**self).append(labels, sample, weight)
    }
}

/// Sink backed by a closure, see [`sink_fn`].
pub struct FnSink<F>(F);

impl<F> std::fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSink").finish_non_exhaustive()
    }
}

/// Wrap a closure as a [`Sink`].
pub fn sink_fn<F>(f: F) -> FnSink<F>
where
    F: FnMut(Option<&LabelSet>, &StackSample<'_>, u64) -> Result<()>,
{
    FnSink(f)
}

impl<F> Sink for FnSink<F>
where
    F: FnMut(Option<&LabelSet>, &StackSample<'_>, u64) -> Result<()>,
{
    fn append(&mut self, labels: Option<&LabelSet>, sample: &StackSample<'_>, weight: u64) -> Result<()> {
        (self.0)(labels, sample, weight)
    }
}

/// Writes collapsed stack lines: `[{k=v,...}]frame;frame;frame weight`
pub struct FoldedSink<W> {
    out: W,
}

impl<W: Write> FoldedSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for FoldedSink<W> {
    fn append(&mut self, labels: Option<&LabelSet>, sample: &StackSample<'_>, weight: u64) -> Result<()> {
        if let Some(labels) = labels {
            write!(self.out, "{labels}")?;
        }
        writeln!(self.out, "{} {}", sample.folded(), weight)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonRecord<'s, 'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<&'s LabelSet>,
    frames: &'s [Frame<'a>],
    weight: u64,
}

/// One JSON object per line
pub struct JsonLinesSink<W> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn append(&mut self, labels: Option<&LabelSet>, sample: &StackSample<'_>, weight: u64) -> Result<()> {
        let record = JsonRecord { labels, frames: &sample.frames, weight };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

/// Supplies a target's configured labels to samples that carry none.
/// Labels decoded from the trace win as a whole; the two sets are not mixed.
pub struct WithLabels<S> {
    inner: S,
    labels: LabelSet,
}

impl<S: Sink> WithLabels<S> {
    pub fn new(inner: S, labels: LabelSet) -> Self {
        Self { inner, labels }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Sink> Sink for WithLabels<S> {
    fn append(&mut self, labels: Option<&LabelSet>, sample: &StackSample<'_>, weight: u64) -> Result<()> {
        let fallback = (!self.labels.is_empty()).then_some(&self.labels);
        self.inner.append(labels.or(fallback), sample, weight)
    }
}
