//! Health score extraction from a Verify document.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Spec Health Score[:\s]+(\d+)").expect("score pattern is valid")
});

static VERDICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Spec Health Score[^\n]*\n+([^\n]{10,120})").expect("verdict pattern is valid")
});

/// Coarse rating derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthBand {
    /// 90 and above.
    Excellent,
    /// 70 to 89.
    Good,
    /// 50 to 69.
    Fair,
    /// Below 50.
    Poor,
}

impl fmt::Display for HealthBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthBand::Excellent => "excellent",
            HealthBand::Good => "good",
            HealthBand::Fair => "fair",
            HealthBand::Poor => "poor",
        })
    }
}

/// Score reported by the verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthScore {
    /// Score out of 100.
    pub score: u32,
    /// Band for `score`.
    pub band: HealthBand,
    /// First line after the score heading, if it looks like a sentence.
    pub verdict: Option<String>,
}

/// Reads the `Spec Health Score: N` line from a Verify document.
#[must_use]
pub fn health_score(verify_doc: &str) -> Option<HealthScore> {
    let score: u32 = SCORE.captures(verify_doc)?[1].parse().ok()?;
    let band = match score {
        90.. => HealthBand::Excellent,
        70..=89 => HealthBand::Good,
        50..=69 => HealthBand::Fair,
        _ => HealthBand::Poor,
    };
    let verdict = VERDICT
        .captures(verify_doc)
        .map(|c| c[1].trim_start_matches('#').trim().to_string())
        .filter(|v| !v.is_empty());
    Some(HealthScore { score, band, verdict })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_score_and_verdict() {
        let doc = "# Verify\n\n## Spec Health Score: 84/100\n\nSolid spec with two coverage gaps.\n";
        let health = health_score(doc).unwrap();
        assert_eq!(health.score, 84);
        assert_eq!(health.band, HealthBand::Good);
        assert_eq!(health.verdict.as_deref(), Some("Solid spec with two coverage gaps."));
    }

    #[test]
    fn bands() {
        assert_eq!(health_score("Spec Health Score: 95").unwrap().band, HealthBand::Excellent);
        assert_eq!(health_score("spec health score 50").unwrap().band, HealthBand::Fair);
        assert_eq!(health_score("Spec Health Score: 12").unwrap().band, HealthBand::Poor);
    }

    #[test]
    fn none_without_score() {
        assert!(health_score("# Verify\nNo score here").is_none());
    }
}
