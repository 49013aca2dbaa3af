//! Names for platform resources minted by the pipeline.
//!
//! Names read `{prefix}-{kind}-{unix_seconds}-{suffix}`: human-readable,
//! roughly time-ordered, and unique across invocations within the same second
//! thanks to a short random suffix.

use chrono::Utc;
use uuid::Uuid;

/// Platform limit on training job, model and endpoint config names.
pub const MAX_NAME_LEN: usize = 63;

const SUFFIX_LEN: usize = 8;

/// Prefix used when the configured one has no usable characters.
pub const FALLBACK_PREFIX: &str = "argon";

/// Generates unique resource names.
#[derive(Debug, Clone, Default)]
pub struct ResourceNamer {
    fixed_timestamp: Option<i64>,
}

impl ResourceNamer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A namer that always stamps `timestamp` instead of the current time.
    #[must_use]
    pub const fn at(timestamp: i64) -> Self {
        Self { fixed_timestamp: Some(timestamp) }
    }

    fn timestamp(&self) -> i64 {
        self.fixed_timestamp.unwrap_or_else(|| Utc::now().timestamp())
    }

    /// Mints a new name for a resource of `kind` (e.g. `train`, `model`).
    #[must_use]
    pub fn name(&self, prefix: &str, kind: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        let tail = format!("-{kind}-{}-{}", self.timestamp(), &suffix[..SUFFIX_LEN]);

        let mut head = sanitize(prefix);
        if head.is_empty() {
            head = FALLBACK_PREFIX.to_string();
        }
        let budget = MAX_NAME_LEN.saturating_sub(tail.len());
        if head.len() > budget {
            head.truncate(budget);
            while head.ends_with('-') {
                head.pop();
            }
        }
        format!("{head}{tail}")
    }
}

/// Whether `prefix` keeps at least one character after sanitizing.
#[must_use]
pub fn is_usable_prefix(prefix: &str) -> bool {
    prefix.chars().any(|c| c.is_ascii_alphanumeric())
}

/// Keeps alphanumerics and hyphens; anything else becomes a hyphen.
fn sanitize(prefix: &str) -> String {
    let cleaned: String =
        prefix.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' }).collect();
    cleaned.trim_matches('-').to_string()
}
