//! Classification of refinement responses.

use crate::prompts::INQUIRY_SENTINEL;

/// Acknowledgement recorded in chat history after a revision.
pub const REVISION_ACK: &str = "✏️ Document updated.";

/// What a refinement turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refinement {
    /// An answer to a question; the document is untouched.
    Inquiry {
        /// The answer, sentinel removed and trimmed.
        answer: String,
    },
    /// A full replacement for the stage document.
    Revision {
        /// The new document.
        document: String,
    },
}

impl Refinement {
    /// Classifies a complete response.
    ///
    /// A response whose first non-blank text is an HTML comment reading
    /// `INQUIRY` (any case, any inner spacing) is an inquiry; anything else
    /// is a revision. Returns `None` for a response that is blank.
    #[must_use]
    pub fn classify(response: &str) -> Option<Self> {
        let trimmed = response.trim_start();
        if trimmed.trim_end().is_empty() {
            return None;
        }
        if let Some(rest) = strip_sentinel(trimmed) {
            return Some(Refinement::Inquiry { answer: rest.trim().to_string() });
        }
        Some(Refinement::Revision { document: response.to_string() })
    }
}

fn strip_sentinel(text: &str) -> Option<&str> {
    if let Some(rest) = text.strip_prefix(INQUIRY_SENTINEL) {
        return Some(rest);
    }
    let body = text.strip_prefix("<!--")?;
    let end = body.find("-->")?;
    body[..end].trim().eq_ignore_ascii_case("inquiry").then(|| &body[end + 3..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_marks_an_inquiry() {
        let refinement = Refinement::classify("\n  <!-- INQUIRY -->\nREST keeps clients simple.\n");
        assert_eq!(
            refinement,
            Some(Refinement::Inquiry { answer: "REST keeps clients simple.".into() })
        );
    }

    #[test]
    fn sentinel_tolerates_spacing_and_case() {
        for raw in ["<!--INQUIRY-->ok", "<!--   inquiry  -->ok", "<!-- Inquiry -->  ok  "] {
            assert_eq!(Refinement::classify(raw), Some(Refinement::Inquiry { answer: "ok".into() }));
        }
    }

    #[test]
    fn anything_else_is_a_revision_kept_verbatim() {
        let doc = "# Design\n\n<!-- INQUIRY --> appears later, which does not count\n";
        assert_eq!(Refinement::classify(doc), Some(Refinement::Revision { document: doc.into() }));

        let other_comment = "<!-- generated -->\n# Tasks\n";
        assert!(matches!(Refinement::classify(other_comment), Some(Refinement::Revision { .. })));
    }

    #[test]
    fn blank_response_is_rejected() {
        assert_eq!(Refinement::classify(""), None);
        assert_eq!(Refinement::classify(" \n\t "), None);
    }

    #[test]
    fn bare_sentinel_is_an_empty_answer() {
        assert_eq!(
            Refinement::classify("<!-- INQUIRY -->"),
            Some(Refinement::Inquiry { answer: String::new() })
        );
    }
}
