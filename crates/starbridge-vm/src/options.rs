use serde::Deserialize;

/// Dialect and resource options, fixed when a thread is created
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Allow a function to appear twice on the call stack
    pub allow_recursion: bool,
    /// Allow a top-level name to be bound more than once
    pub allow_global_reassign: bool,
    /// Maximum guest call depth
    pub max_call_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allow_recursion: true,
            allow_global_reassign: true,
            max_call_depth: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let opts: Options = serde_json::from_str(r#"{"allow_recursion": false}"#).unwrap();
        assert!(!opts.allow_recursion);
        assert!(opts.allow_global_reassign);
        assert_eq!(opts.max_call_depth, 256);
    }
}
