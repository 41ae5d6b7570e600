//! Terminal rendering of pipeline events.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use crate::pipeline::{EventSink, PipelineEvent};

struct Streams<O, E> {
    out: O,
    err: E,
    /// Whether the current stream is a refinement, whose raw chunks may
    /// carry the inquiry marker and are printed only once classified.
    refining: bool,
    /// Whether the last byte written to `out` was a newline.
    at_line_start: bool,
}

/// Prints streamed documents to `out` and status lines to `err`.
///
/// `Error` events are not printed: the failing command returns the same
/// message to the binary, which reports it once.
pub struct TerminalSink<O: Write + Send, E: Write + Send> {
    streams: Mutex<Streams<O, E>>,
}

impl TerminalSink<std::io::Stdout, std::io::Stderr> {
    /// Sink over the process's stdout and stderr.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write + Send, E: Write + Send> TerminalSink<O, E> {
    /// Sink over the given writers.
    pub fn new(out: O, err: E) -> Self {
        Self { streams: Mutex::new(Streams { out, err, refining: false, at_line_start: true }) }
    }

    /// Returns the writers.
    pub fn into_parts(self) -> (O, E) {
        let streams = self.streams.into_inner().unwrap_or_else(PoisonError::into_inner);
        (streams.out, streams.err)
    }
}

impl<O: Write + Send, E: Write + Send> Streams<O, E> {
    fn print(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.at_line_start = text.ends_with('\n');
    }

    fn end_line(&mut self) {
        if !self.at_line_start {
            self.print("\n");
        }
    }

    fn status(&mut self, line: &str) {
        let _ = writeln!(self.err, "{line}");
    }
}

impl<O: Write + Send, E: Write + Send> EventSink for TerminalSink<O, E> {
    fn emit(&self, event: PipelineEvent) {
        let mut s = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        match event {
            PipelineEvent::StreamStart { stage, refine } => {
                s.refining = refine;
                if !refine {
                    s.status(&format!("Generating {stage}..."));
                }
            }
            PipelineEvent::StreamChunk { chunk, .. } => {
                if !s.refining {
                    s.print(&chunk);
                }
            }
            PipelineEvent::StreamDone { stage, content } => {
                if s.refining {
                    s.print(&content);
                    s.refining = false;
                }
                s.end_line();
                s.status(&format!("Saved {stage}."));
            }
            PipelineEvent::InquiryDone { answer, .. } => {
                s.refining = false;
                s.print(&answer);
                s.end_line();
            }
            PipelineEvent::ChatEntry { .. } => {}
            PipelineEvent::Error { message } => {
                tracing::debug!(%message, "pipeline error");
                s.end_line();
            }
            PipelineEvent::ProgressUpdated { progress } => {
                s.status(&format!(
                    "Progress: {}/{} tasks ({}%)",
                    progress.done,
                    progress.total,
                    progress.percent()
                ));
            }
            PipelineEvent::UsingCustomPrompt { stage } => {
                s.status(&format!("Using custom prompt for {stage}."));
            }
            PipelineEvent::Saved { stage } => s.status(&format!("Saved {stage}.")),
            PipelineEvent::SpecCreated { spec, .. } => s.status(&format!("Created spec \"{spec}\".")),
            PipelineEvent::SpecOpened { .. } => {}
            PipelineEvent::SpecDeleted { spec } => s.status(&format!("Deleted spec \"{spec}\".")),
            PipelineEvent::SpecRenamed { old, new } => {
                s.status(&format!("Renamed \"{old}\" to \"{new}\"."));
            }
            PipelineEvent::RequirementsFormatChanged { format } => {
                s.status(&format!("Requirements format set to {format}."));
            }
            PipelineEvent::PromptsScaffolded { spec } => {
                s.status(&format!("Prompts written to {spec}/_prompts/."));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;

    fn render(events: Vec<PipelineEvent>) -> (String, String) {
        let sink = TerminalSink::new(Vec::new(), Vec::new());
        for event in events {
            sink.emit(event);
        }
        let (out, err) = sink.into_parts();
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn generation_chunks_go_to_stdout_as_they_arrive() {
        let (out, err) = render(vec![
            PipelineEvent::StreamStart { stage: Stage::Design, refine: false },
            PipelineEvent::StreamChunk { stage: Stage::Design, chunk: "# Des".into() },
            PipelineEvent::StreamChunk { stage: Stage::Design, chunk: "ign".into() },
            PipelineEvent::StreamDone { stage: Stage::Design, content: "# Design".into() },
        ]);
        assert_eq!(out, "# Design\n");
        assert_eq!(err, "Generating design...\nSaved design.\n");
    }

    #[test]
    fn refinement_prints_only_the_classified_result() {
        let (out, _) = render(vec![
            PipelineEvent::StreamStart { stage: Stage::Design, refine: true },
            PipelineEvent::StreamChunk { stage: Stage::Design, chunk: "<!-- INQUIRY -->\nBecause".into() },
            PipelineEvent::InquiryDone { stage: Stage::Design, answer: "Because".into() },
        ]);
        assert_eq!(out, "Because\n");
    }

    #[test]
    fn errors_are_left_to_the_caller() {
        let (out, err) = render(vec![PipelineEvent::Error { message: "boom".into() }]);
        assert!(out.is_empty());
        assert!(err.is_empty());
    }
}
