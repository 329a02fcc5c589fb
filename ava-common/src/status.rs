//! Call status vocabulary
//!
//! Status is an open vocabulary. The engine only interprets the values
//! below; anything else is stored verbatim.

pub const QUEUED: &str = "queued";
pub const RINGING: &str = "ringing";
pub const IN_PROGRESS: &str = "in-progress";
pub const COMPLETED: &str = "completed";
pub const FAILED: &str = "failed";
pub const NO_ANSWER: &str = "no-answer";
pub const BUSY: &str = "busy";
pub const CANCELED: &str = "canceled";
pub const ERROR: &str = "error";
pub const ABANDONED: &str = "abandoned";
pub const UNKNOWN: &str = "unknown";

/// Statuses counted as "active now"
pub const ACTIVE: &[&str] = &[IN_PROGRESS, RINGING, QUEUED];

/// Statuses counted in a day's failure rate
pub const FAILURE_RATE: &[&str] = &[FAILED, NO_ANSWER, ERROR, ABANDONED];

/// Statuses that raise a `call_failed` anomaly
pub const FAILURE_ANOMALY: &[&str] = &[FAILED, ERROR, NO_ANSWER];

/// Statuses after which a call receives an end timestamp
pub const TERMINAL: &[&str] = &[COMPLETED, FAILED, BUSY, NO_ANSWER, CANCELED];

pub fn is_active(status: &str) -> bool {
    ACTIVE.contains(&status)
}

pub fn is_terminal(status: &str) -> bool {
    TERMINAL.contains(&status)
}

/// Fold spelling variants from upstream providers onto the canonical form.
///
/// Case and surrounding whitespace are ignored; unknown values pass through
/// lowercased. Blank input maps to `unknown`.
pub fn canonical_status(raw: &str) -> String {
    let folded = raw.trim().to_ascii_lowercase();
    let canonical = match folded.as_str() {
        "" => UNKNOWN,
        "ended" | "complete" | "completed" => COMPLETED,
        "in_progress" | "inprogress" | "in-progress" | "forwarding" => IN_PROGRESS,
        "no_answer" | "noanswer" | "no-answer" => NO_ANSWER,
        "cancelled" | "canceled" => CANCELED,
        other => return other.to_string(),
    };
    canonical.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_status_variants() {
        assert_eq!(canonical_status("ended"), "completed");
        assert_eq!(canonical_status(" In_Progress "), "in-progress");
        assert_eq!(canonical_status("forwarding"), "in-progress");
        assert_eq!(canonical_status("cancelled"), "canceled");
        assert_eq!(canonical_status("NO_ANSWER"), "no-answer");
        assert_eq!(canonical_status(""), "unknown");
    }

    #[test]
    fn test_unknown_values_pass_through() {
        assert_eq!(canonical_status("voicemail"), "voicemail");
        assert_eq!(canonical_status("Abandoned"), "abandoned");
    }

    #[test]
    fn test_sets() {
        assert!(is_active("ringing"));
        assert!(!is_active("completed"));
        assert!(is_terminal("busy"));
        assert!(!is_terminal("in-progress"));
    }
}
