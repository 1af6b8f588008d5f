//! Command sequence parsing
//!
//! Maps the raw command strings of a benchmark sequence onto driver
//! operations and the canonical keys under which durations and errors are
//! recorded.

/// One lifecycle command parsed from a benchmark sequence entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCommand {
    Run,
    Stop,
    Remove,
    Pause,
    Unpause,
    Wait,
    Metrics,
    ExecSync(Vec<String>),
}

impl LifecycleCommand {
    /// Parse one raw sequence entry.
    ///
    /// The first whitespace-separated token is the verb, matched
    /// case-insensitively against the accepted aliases; any remaining
    /// tokens are arguments, meaningful only for `execsync`. Returns
    /// `None` for unrecognized verbs and empty entries.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace();
        let verb = parts.next()?.to_ascii_lowercase();

        let command = match verb.as_str() {
            "run" | "start" => Self::Run,
            "stop" | "kill" => Self::Stop,
            "remove" | "erase" | "delete" => Self::Remove,
            "pause" => Self::Pause,
            "unpause" | "resume" => Self::Unpause,
            "wait" => Self::Wait,
            "metrics" | "stats" => Self::Metrics,
            "execsync" => Self::ExecSync(parts.map(str::to_string).collect()),
            _ => return None,
        };

        Some(command)
    }

    /// Canonical key under which this command's duration and errors are
    /// recorded, independent of the alias used in the sequence.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Stop => "stop",
            Self::Remove => "remove",
            Self::Pause => "pause",
            Self::Unpause => "resume",
            Self::Wait => "wait",
            Self::Metrics => "metrics",
            Self::ExecSync(_) => "execsync",
        }
    }
}
