//! Interactive refinement loop for `nspec session`.
//!
//! Each line is either a `:command` or free text. Free text is sent as a
//! refinement turn on the current stage, so questions get answered and
//! change requests rewrite the document. Failures are reported and the loop
//! keeps going; it ends on `:quit` or end of input.

use std::io::{BufRead, Write};

use crate::pipeline::Controller;
use crate::spec::render_checklist;
use crate::stage::Stage;

const HELP: &str = "\
Commands:
  :stage <name>   switch to requirements, design, tasks or verify
  :generate       regenerate the current stage
  :cascade        regenerate from the current stage through verify
  :toggle <id>    flip a task (ids are shown by :show on tasks)
  :show           print the current document
  :help           show this help
  :quit           leave the session
Anything else is sent as feedback or a question about the current document.";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Refinement text.
    Refine(String),
    /// Switch the current stage.
    Stage(Stage),
    /// Regenerate the current stage.
    Generate,
    /// Cascade from the current stage.
    Cascade,
    /// Toggle a task by id.
    Toggle(String),
    /// Print the current document.
    Show,
    /// Print help.
    Help,
    /// Leave.
    Quit,
    /// Blank line.
    Empty,
}

/// Parses one input line.
///
/// # Errors
///
/// Returns a message for an unknown command or a missing argument.
pub fn parse_action(line: &str) -> Result<SessionAction, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(SessionAction::Empty);
    }
    let Some(command) = line.strip_prefix(':') else {
        return Ok(SessionAction::Refine(line.to_string()));
    };
    let (name, arg) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
    let arg = arg.trim();
    match name {
        "stage" => arg.parse().map(SessionAction::Stage),
        "generate" | "gen" => Ok(SessionAction::Generate),
        "cascade" => Ok(SessionAction::Cascade),
        "toggle" if arg.is_empty() => Err("Usage: :toggle <task id>".to_string()),
        "toggle" => Ok(SessionAction::Toggle(arg.to_string())),
        "show" => Ok(SessionAction::Show),
        "help" | "?" => Ok(SessionAction::Help),
        "quit" | "q" | "exit" => Ok(SessionAction::Quit),
        other => Err(format!("Unknown command :{other}. Type :help for commands.")),
    }
}

/// State for the interactive session.
pub struct SessionLoop<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> SessionLoop<R, W> {
    /// Creates a loop reading commands from `reader` and writing prompts and
    /// messages to `writer`.
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Runs until `:quit` or end of input. The spec must already be open
    /// on `controller`.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading input or writing output fails.
    pub async fn run(mut self, controller: &Controller<'_>) -> Result<(), String> {
        let spec = controller.active_spec().unwrap_or_default();
        let mut stage = controller.active_stage();
        self.say(&format!("Session on \"{spec}\". Type :help for commands."))?;

        loop {
            write!(self.writer, "{stage}> ").map_err(|e| format!("write error: {e}"))?;
            self.writer.flush().map_err(|e| format!("write error: {e}"))?;

            let mut line = String::new();
            let read = self.reader.read_line(&mut line).map_err(|e| format!("read error: {e}"))?;
            if read == 0 {
                self.say("")?;
                break;
            }

            let action = match parse_action(&line) {
                Ok(action) => action,
                Err(message) => {
                    self.say(&message)?;
                    continue;
                }
            };

            let outcome = match action {
                SessionAction::Empty => Ok(()),
                SessionAction::Quit => break,
                SessionAction::Help => self.say(HELP),
                SessionAction::Stage(next) => {
                    stage = next;
                    Ok(())
                }
                SessionAction::Show => {
                    let text = match controller.content(stage) {
                        Some(doc) if stage == Stage::Tasks => {
                            render_checklist(&doc, controller.store().read_progress(&spec).as_ref())
                        }
                        Some(doc) => doc,
                        None => format!("No {stage} document yet."),
                    };
                    self.say(text.trim_end())
                }
                SessionAction::Generate => {
                    controller.generate_stage(stage).await.map(drop).map_err(|e| e.to_string())
                }
                SessionAction::Cascade => match controller.cascade(stage).await {
                    Ok(report) => report.halted.map_or(Ok(()), |e| Err(e.to_string())),
                    Err(e) => Err(e.to_string()),
                },
                SessionAction::Toggle(id) => match controller.toggle_task(&id) {
                    Ok(Some(_)) => Ok(()),
                    Ok(None) => Err("No tasks document yet.".to_string()),
                    Err(e) => Err(e.to_string()),
                },
                SessionAction::Refine(text) => match controller.refine(stage, &text).await {
                    Ok(Some(_)) => Ok(()),
                    Ok(None) => Err(format!("No {stage} document yet. Use :generate first.")),
                    Err(e) => Err(e.to_string()),
                },
            };
            if let Err(message) = outcome {
                self.say(&message)?;
            }
        }
        Ok(())
    }

    fn say(&mut self, text: &str) -> Result<(), String> {
        writeln!(self.writer, "{text}").map_err(|e| format!("write error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;

    use super::*;
    use crate::context::ServiceContext;
    use crate::pipeline::{CollectingSink, GenerationSettings};
    use crate::spec::{GenerationMode, SpecConfig};
    use crate::store::SpecStore;
    use crate::testing::{mem_context, ScriptedBackend, Step};

    #[test]
    fn parses_commands_and_free_text() {
        assert_eq!(parse_action("  "), Ok(SessionAction::Empty));
        assert_eq!(parse_action(":stage Tasks\n"), Ok(SessionAction::Stage(Stage::Tasks)));
        assert_eq!(parse_action(":toggle add_docs_1"), Ok(SessionAction::Toggle("add_docs_1".into())));
        assert_eq!(parse_action("why REST?"), Ok(SessionAction::Refine("why REST?".into())));
        assert_eq!(parse_action(":q"), Ok(SessionAction::Quit));
        assert!(parse_action(":toggle").is_err());
        assert!(parse_action(":stage review").is_err());
        assert!(parse_action(":bogus").unwrap_err().contains(":bogus"));
    }

    fn open_spec<'a>(ctx: &'a ServiceContext, sink: &'a CollectingSink) -> Controller<'a> {
        let store = SpecStore::new(ctx, Path::new("/ws/.specs"));
        store.create_spec("auth", &SpecConfig::new(GenerationMode::default(), ctx.clock.now())).unwrap();
        store.write_stage("auth", Stage::Design, "# Design\nUse JWT.\n").unwrap();
        let controller =
            Controller::new(ctx, store, sink, GenerationSettings { model: "m".into(), max_tokens: 10 });
        controller.open_spec("auth").unwrap();
        controller
    }

    #[tokio::test]
    async fn questions_and_revisions_run_until_quit() {
        let ctx = mem_context(ScriptedBackend::new(vec![
            Step::reply("<!-- INQUIRY -->\nStateless.\n"),
            Step::reply("# Design\nUse sessions.\n"),
        ]));
        let sink = CollectingSink::default();
        let controller = open_spec(&ctx, &sink);

        let input = Cursor::new("why JWT?\nswitch to sessions\n:show\n:quit\nnever read\n");
        let mut output = Vec::new();
        SessionLoop::new(input, &mut output).run(&controller).await.unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Session on \"auth\"."));
        assert!(output.contains("design> "));
        assert!(output.contains("# Design\nUse sessions."));
        assert_eq!(controller.history(Stage::Design).len(), 4);
    }

    #[tokio::test]
    async fn failures_are_reported_and_the_loop_continues() {
        let ctx = mem_context(ScriptedBackend::default());
        let sink = CollectingSink::default();
        let controller = open_spec(&ctx, &sink);

        let input = Cursor::new(":stage tasks\nadd a task\n:toggle x_0\n:nope\n");
        let mut output = Vec::new();
        SessionLoop::new(input, &mut output).run(&controller).await.unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("tasks> "));
        assert!(output.contains("No tasks document yet. Use :generate first."));
        assert!(output.contains("No tasks document yet.\n"));
        assert!(output.contains("Unknown command :nope"));
    }
}
