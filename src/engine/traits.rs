/// The "Hot Path" engine for checking hosts against the block list.
pub trait DomainMatcher: Send + Sync {
    /// Returns the matching rule if `host` is blocked, `None` if allowed.
    ///
    /// `host` must already be lowercase.
    fn check<'a>(&'a self, host: &str) -> Option<&'a str>;
}
