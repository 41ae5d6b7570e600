//! Seed material from outside the workspace: Jira user stories and the MCP
//! configuration check that accompanies them.

pub mod jira;
pub mod mcp;

/// Why an import could not produce a feature description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    /// The link is not a Jira browse URL.
    #[error("Invalid Jira URL. Use a browse link, e.g. https://your-domain.atlassian.net/browse/PROJ-123")]
    InvalidUrl,
    /// The issue exists but is not a user story.
    #[error(
        "Only Jira user stories are supported. This issue is a \"{0}\". Use a Story/User Story or enter a description instead."
    )]
    NotAStory(String),
    /// The tracker request failed.
    #[error("{0}")]
    Fetch(String),
}
