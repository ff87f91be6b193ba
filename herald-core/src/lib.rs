//! # herald-core - event notification and command dispatch
//!
//! - `observer`: ordered handler registry with snapshot iteration, and the
//!   observable whose dispatch rounds fan out to it
//! - `command`: commands, fail-fast macro commands and the dispatcher
//! - `vendors`: concrete leaf actions wired up by the `herald` binary

pub mod error;

pub mod config;

pub mod logging;

pub mod observer {
    pub mod handler;
    pub use handler::{FnHandler, Handler};

    pub mod registry;
    pub use registry::{Registry, Snapshot};

    pub mod observable;
    pub use observable::{Event, Observable};
}

pub mod command {
    pub mod traits;
    pub use traits::{Command, FnCommand};

    pub mod macro_command;
    pub use macro_command::MacroCommand;

    pub mod dispatcher;
    pub use dispatcher::{DispatchOutcome, DispatchState, DispatchStats, Dispatcher, Invoker};
}

pub mod vendors {
    pub mod sink;
    pub use sink::{MemorySink, Sink, StdoutSink};

    pub mod accounts;
    pub use accounts::{
        UserLoggedIn, UserLoggedInCommand, UserLoggedOut, UserLoggedOutCommand, UserRegistered,
        UserRegisteredCommand,
    };

    pub mod notifiers;
    pub use notifiers::{LogNotifier, MailNotifier, SmsNotifier};
}

pub use config::{Config, DispatchConfig};
pub use error::{CoreError, CoreResult};
