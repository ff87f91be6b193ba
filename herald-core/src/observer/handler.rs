use std::fmt;

use crate::error::CoreResult;
use crate::observer::observable::Observable;

/// A capability invoked once per dispatch round.
///
/// Implementations may perform arbitrary side effects and may read the
/// round's state (or modify the subject's registry) through `subject`.
pub trait Handler: Send + Sync {
    /// Respond to the round currently being delivered by `subject`.
    fn respond_to(&self, subject: &Observable) -> CoreResult<()>;

    /// Handler name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Closure-backed [`Handler`].
pub struct FnHandler<F> {
    name: &'static str,
    respond: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Observable) -> CoreResult<()> + Send + Sync,
{
    pub fn new(name: &'static str, respond: F) -> Self {
        Self { name, respond }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Observable) -> CoreResult<()> + Send + Sync,
{
    fn respond_to(&self, subject: &Observable) -> CoreResult<()> {
        (self.respond)(subject)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}
