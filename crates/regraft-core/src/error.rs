use std::fmt;

/// Machine-readable error codes for operator- and agent-friendly handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    PreconditionConflict,
    MapRecordConflict,
    LockContention,
    StoreIo,
    ObjectMissing,
    MalformedObject,
    PolicyFailure,
    MissingRootMapping,
    MissingParentMapping,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::PreconditionConflict => "E1001",
            Self::MapRecordConflict => "E1002",
            Self::LockContention => "E1003",
            Self::StoreIo => "E2001",
            Self::ObjectMissing => "E2002",
            Self::MalformedObject => "E2003",
            Self::PolicyFailure => "E3001",
            Self::MissingRootMapping => "E4001",
            Self::MissingParentMapping => "E4002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::PreconditionConflict => "Durable map location already populated",
            Self::MapRecordConflict => "Conflicting map record for the same root",
            Self::LockContention => "Map lock contention",
            Self::StoreIo => "Object store I/O failure",
            Self::ObjectMissing => "Object not found in store",
            Self::MalformedObject => "Malformed object payload",
            Self::PolicyFailure => "Rewrite policy hook failed",
            Self::MissingRootMapping => "Commit references an unmapped root",
            Self::MissingParentMapping => "Commit references an unmapped parent",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::PreconditionConflict => Some(
                "Remove the map directory from a previous run, or pass --resume to reuse it.",
            ),
            Self::MapRecordConflict => {
                Some("The map directory mixes records from different runs; clean it up and rerun.")
            }
            Self::LockContention => {
                Some("Another rewrite is running against this map directory; wait for it to finish.")
            }
            Self::StoreIo => Some("Check the repository path, disk space, and permissions."),
            Self::ObjectMissing => None,
            Self::MalformedObject => None,
            Self::PolicyFailure => None,
            Self::MissingRootMapping => {
                Some("Run the tree rewrite phase over refs that cover this commit first.")
            }
            Self::MissingParentMapping => {
                Some("Include the full ancestry of every ref in the rewrite.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::PreconditionConflict,
            ErrorCode::MapRecordConflict,
            ErrorCode::LockContention,
            ErrorCode::StoreIo,
            ErrorCode::ObjectMissing,
            ErrorCode::MalformedObject,
            ErrorCode::PolicyFailure,
            ErrorCode::MissingRootMapping,
            ErrorCode::MissingParentMapping,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::PreconditionConflict.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }
}
