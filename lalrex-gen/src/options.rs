use smartstring::alias::String;

/// Knobs of [`build_with_options`](crate::build_with_options).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Start rule, overriding `%start` and the default `start`.
    pub start: Option<String>,
    /// Keep tokens of anonymous literals (`"("`, `","` ...) in trees.
    pub keep_all_tokens: bool,
    /// Resolve shift/reduce conflicts by shifting. When off they are errors.
    pub shift_over_reduce: bool,
    /// Resolve reduce/reduce conflicts by the earliest production. When off
    /// they are errors.
    pub earliest_reduce: bool,
    /// Log the full automaton report at `debug` level.
    pub debug: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            start: None,
            keep_all_tokens: true,
            shift_over_reduce: true,
            earliest_reduce: true,
            debug: false,
        }
    }
}

impl BuildOptions {
    /// Options with both conflict tie-breaks disabled.
    pub fn strict() -> Self {
        Self {
            shift_over_reduce: false,
            earliest_reduce: false,
            ..Self::default()
        }
    }

    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn with_keep_all_tokens(mut self, keep: bool) -> Self {
        self.keep_all_tokens = keep;
        self
    }
}
