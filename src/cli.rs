//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::spec::{GenerationMode, RequirementsFormat};
use crate::stage::Stage;

/// Top-level CLI parser for `nspec`.
#[derive(Debug, Parser)]
#[command(
    name = "nspec",
    version,
    about = "Generate requirements, design, tasks and verification documents"
)]
pub struct Cli {
    /// Workspace root holding `nspec.toml` and the specs folder.
    #[arg(long, short = 'w', global = true, default_value = ".")]
    pub workspace: PathBuf,
    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a spec and generate its first stage.
    New {
        /// Display name; the folder name is derived from it.
        name: String,
        /// Feature description, or a Jira user story browse URL.
        description: Option<String>,
        /// Jira user story to use as the description.
        #[arg(long, conflicts_with = "description")]
        jira: Option<String>,
        /// How the spec enters the pipeline.
        #[arg(long, value_enum, default_value_t = GenerationMode::RequirementsFirst)]
        mode: GenerationMode,
        /// Ask for a shorter design document.
        #[arg(long)]
        light_design: bool,
    },
    /// Create a spec from a conversation transcript file (`-` for stdin).
    FromTranscript {
        /// Display name.
        name: String,
        /// Transcript file.
        file: PathBuf,
    },
    /// List specs in the workspace.
    List,
    /// Print a spec's documents.
    Show {
        /// Spec folder name.
        spec: String,
        /// Only this stage.
        #[arg(value_enum)]
        stage: Option<Stage>,
    },
    /// Regenerate one stage from its source.
    Generate {
        /// Spec folder name.
        spec: String,
        /// Stage to generate.
        #[arg(value_enum)]
        stage: Stage,
    },
    /// Generate the verification report.
    Verify {
        /// Spec folder name.
        spec: String,
    },
    /// Send feedback or a question about a stage document.
    Refine {
        /// Spec folder name.
        spec: String,
        /// Stage to refine.
        #[arg(value_enum)]
        stage: Stage,
        /// Feedback text.
        feedback: String,
    },
    /// Flip a task between done and not done.
    Toggle {
        /// Spec folder name.
        spec: String,
        /// Task id as shown by `tasks`.
        id: String,
    },
    /// Show the task checklist with ids and progress.
    Tasks {
        /// Spec folder name.
        spec: String,
    },
    /// Regenerate every stage from `from` through verify.
    Cascade {
        /// Spec folder name.
        spec: String,
        /// First stage to regenerate.
        #[arg(value_enum)]
        from: Stage,
    },
    /// Save edited content for a stage, read from a file or stdin.
    Save {
        /// Spec folder name.
        spec: String,
        /// Stage to overwrite.
        #[arg(value_enum)]
        stage: Stage,
        /// Content file; stdin when omitted.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Import a file into a stage.
    Import {
        /// Spec folder name.
        spec: String,
        /// Target stage.
        #[arg(value_enum)]
        stage: Stage,
        /// File to import.
        file: PathBuf,
        /// Convert the file into the stage format with the model.
        #[arg(long)]
        transform: bool,
    },
    /// Rename a spec folder.
    Rename {
        /// Current folder name.
        spec: String,
        /// New display name.
        new_name: String,
    },
    /// Delete a spec folder.
    Delete {
        /// Spec folder name.
        spec: String,
    },
    /// Set the requirements style of a spec.
    Format {
        /// Spec folder name.
        spec: String,
        /// New style.
        #[arg(value_enum)]
        format: RequirementsFormat,
    },
    /// Write the built-in prompts into `_prompts/` for editing.
    ScaffoldPrompts {
        /// Spec folder name.
        spec: String,
    },
    /// Interactive refinement session on one spec.
    Session {
        /// Spec folder name.
        spec: String,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use crate::spec::GenerationMode;
    use crate::stage::Stage;
    use clap::Parser;

    #[test]
    fn parses_new_with_mode() {
        let cli = Cli::parse_from(["nspec", "new", "Auth", "log in", "--mode", "design-first"]);
        match cli.command {
            Command::New { name, description, mode, jira, light_design } => {
                assert_eq!(name, "Auth");
                assert_eq!(description.as_deref(), Some("log in"));
                assert_eq!(mode, GenerationMode::DesignFirst);
                assert!(jira.is_none());
                assert!(!light_design);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn jira_conflicts_with_description() {
        let parsed = Cli::try_parse_from([
            "nspec",
            "new",
            "Auth",
            "desc",
            "--jira",
            "https://acme.atlassian.net/browse/A-1",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn parses_cascade_stage() {
        let cli = Cli::parse_from(["nspec", "-w", "/tmp/ws", "cascade", "auth", "design"]);
        assert_eq!(cli.workspace.to_str(), Some("/tmp/ws"));
        assert!(matches!(cli.command, Command::Cascade { from: Stage::Design, .. }));
    }

    #[test]
    fn rejects_unknown_stage() {
        assert!(Cli::try_parse_from(["nspec", "generate", "auth", "review"]).is_err());
    }
}
