use std::fmt;
use std::sync::Arc;

use crate::error::CoreResult;

/// A deferred unit of execution bound to its target when constructed.
pub trait Command: Send + Sync {
    fn execute(&self) -> CoreResult<()>;

    /// Command name for diagnostics.
    fn name(&self) -> &'static str {
        "command"
    }
}

impl<C: Command + ?Sized> Command for Arc<C> {
    fn execute(&self) -> CoreResult<()> {
        (**self).execute()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<C: Command + ?Sized> Command for Box<C> {
    fn execute(&self) -> CoreResult<()> {
        (**self).execute()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Closure-backed [`Command`].
pub struct FnCommand<F> {
    name: &'static str,
    run: F,
}

impl<F> FnCommand<F>
where
    F: Fn() -> CoreResult<()> + Send + Sync,
{
    pub fn new(name: &'static str, run: F) -> Self {
        Self { name, run }
    }
}

impl<F> Command for FnCommand<F>
where
    F: Fn() -> CoreResult<()> + Send + Sync,
{
    fn execute(&self) -> CoreResult<()> {
        (self.run)()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl<F> fmt::Debug for FnCommand<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand").field("name", &self.name).finish()
    }
}
