//! MacroCommand: several commands dispatched as one
//!
//! Members run in construction order on the caller's thread. Execution is
//! fail-fast without rollback: the first failing member's error is returned
//! as the macro's own, later members are not attempted, and effects of the
//! members that already ran are kept.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::command::traits::Command;
use crate::error::CoreResult;

pub struct MacroCommand {
    commands: SmallVec<[Arc<dyn Command>; 4]>,
}

impl MacroCommand {
    /// The member list is fixed from here on. An empty macro executes as a
    /// no-op.
    pub fn new<I>(commands: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Command>>,
    {
        Self {
            commands: commands.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }
}

impl Command for MacroCommand {
    fn execute(&self) -> CoreResult<()> {
        let total: usize = self.commands.len();

        for (index, command) in self.commands.iter().enumerate() {
            trace!("Macro step {}/{}: {}", index + 1, total, command.name());

            if let Err(e) = command.execute() {
                warn!(
                    step = index + 1,
                    skipped = total - index - 1,
                    "Macro member {} failed: {}",
                    command.name(),
                    e
                );
                return Err(e);
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "macro"
    }
}

impl fmt::Debug for MacroCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self.commands.iter().map(|c| c.name()).collect();

        f.debug_struct("MacroCommand")
            .field("commands", &names)
            .finish()
    }
}
