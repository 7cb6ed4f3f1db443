//! Failure classification by substring match on diagnostic text.

use serde::Serialize;

/// How a failed cycle is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Remote history could not be rebased automatically.
    Conflict,
    /// Remote unreachable; retried on the next trigger.
    Network,
    /// The version-control executable is missing.
    ToolMissing,
    Other,
}

impl FailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::Conflict => "conflict",
            FailureClass::Network => "network",
            FailureClass::ToolMissing => "tool_missing",
            FailureClass::Other => "other",
        }
    }
}

const CONFLICT_MARKERS: [&str; 3] = ["CONFLICT", "could not apply", "Failed to merge"];
const NETWORK_MARKERS: [&str; 2] = ["Could not resolve host", "unable to access"];
const TOOL_MISSING_MARKERS: [&str; 2] = ["command not found", "not found"];

/// First matching class, in table order: conflict, network, tool missing.
pub fn classify(text: &str) -> FailureClass {
    let table: [(&[&str], FailureClass); 3] = [
        (&CONFLICT_MARKERS, FailureClass::Conflict),
        (&NETWORK_MARKERS, FailureClass::Network),
        (&TOOL_MISSING_MARKERS, FailureClass::ToolMissing),
    ];
    table
        .iter()
        .find(|(markers, _)| markers.iter().any(|m| text.contains(m)))
        .map_or(FailureClass::Other, |(_, class)| *class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_markers() {
        assert_eq!(
            classify("CONFLICT (content): Merge conflict in inbox.md"),
            FailureClass::Conflict
        );
        assert_eq!(classify("error: could not apply 1a2b3c4..."), FailureClass::Conflict);
        assert_eq!(classify("Failed to merge in the changes."), FailureClass::Conflict);
    }

    #[test]
    fn network_markers() {
        assert_eq!(
            classify("ssh: Could not resolve host: github.com"),
            FailureClass::Network
        );
        assert_eq!(
            classify("fatal: unable to access 'https://example.com/repo.git/'"),
            FailureClass::Network
        );
    }

    #[test]
    fn tool_missing_and_fallback() {
        assert_eq!(classify("git: command not found"), FailureClass::ToolMissing);
        assert_eq!(classify("fatal: not a git repository"), FailureClass::Other);
        assert_eq!(classify(""), FailureClass::Other);
    }

    #[test]
    fn missing_remote_repository_counts_as_tool_missing() {
        let text = "remote: Repository not found.\n\
                    fatal: repository 'https://github.com/u/notes.git/' not found";
        assert_eq!(classify(text), FailureClass::ToolMissing);
    }

    #[test]
    fn network_wins_over_not_found() {
        let text = "fatal: unable to access 'https://example.com/x.git/': \
                    The requested URL returned error: 404 not found";
        assert_eq!(classify(text), FailureClass::Network);
    }

    #[test]
    fn first_match_wins() {
        let text = "fatal: unable to access remote\nCONFLICT (content): x";
        assert_eq!(classify(text), FailureClass::Conflict);
        let text = "Could not resolve host\ngit: command not found";
        assert_eq!(classify(text), FailureClass::Network);
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(classify("conflict in file"), FailureClass::Other);
    }
}
