use std::fmt;

/// Agent server address used when no endpoint is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:7777";

/// What a run is posted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    Agent(String),
    Team(String),
}

impl RunTarget {
    pub fn id(&self) -> &str {
        match self {
            Self::Agent(id) | Self::Team(id) => id,
        }
    }

    /// Collection segment of the run route.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Agent(_) => "agents",
            Self::Team(_) => "teams",
        }
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection(), self.id())
    }
}

/// Trim whitespace and trailing slashes; an empty base falls back to
/// [`DEFAULT_ENDPOINT`].
pub fn normalize_base_url(input: &str) -> String {
    let base = match input.trim() {
        "" => DEFAULT_ENDPOINT,
        trimmed => trimmed,
    };
    base.trim_end_matches('/').to_string()
}

/// Run route for `target`: `{base}/agents/{id}/runs` or `{base}/teams/{id}/runs`.
pub fn run_endpoint(base: &str, target: &RunTarget) -> String {
    format!(
        "{}/{}/{}/runs",
        normalize_base_url(base),
        target.collection(),
        target.id().trim().trim_matches('/'),
    )
}
