//! Router hooks the provider calls after auth changes.

pub trait Navigator: Send + Sync {
    /// Re-fetch server-rendered data for the current page so it reflects the
    /// new identity.
    fn refresh(&self);

    /// Client-side navigation to a same-origin path.
    fn push(&self, path: &str);
}
