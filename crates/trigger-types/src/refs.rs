//! Git ref classification for push events

pub const BRANCH_PREFIX: &str = "refs/heads/";
pub const TAG_PREFIX: &str = "refs/tags/";

/// What a pushed ref points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
    /// Anything else: notes, pull refs, truncated or malformed strings.
    Other,
}

impl RefKind {
    pub fn of(raw_ref: &str) -> Self {
        if raw_ref.starts_with(BRANCH_PREFIX) {
            Self::Branch
        } else if raw_ref.starts_with(TAG_PREFIX) {
            Self::Tag
        } else {
            Self::Other
        }
    }
}

/// Whether a push to `raw_ref` should activate no triggers.
///
/// Branches are never ignored, tags only when `ignore_tags` is set, and
/// everything else always is.
pub fn should_ignore(raw_ref: &str, ignore_tags: bool) -> bool {
    match RefKind::of(raw_ref) {
        RefKind::Branch => false,
        RefKind::Tag => ignore_tags,
        RefKind::Other => true,
    }
}
