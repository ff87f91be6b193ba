//! Account lifecycle actions and the commands bound to them
//!
//! - `UserLoggedIn`: security mail to the user plus a timestamped log entry
//! - `UserLoggedOut`: timestamped log entry
//! - `UserRegistered`: verification mail, admin mail, timestamped log entry

use std::sync::Arc;

use chrono::Local;
use tracing::info;

use crate::command::traits::Command;
use crate::error::CoreResult;
use crate::vendors::sink::Sink;

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub struct UserLoggedIn {
    sink: Arc<dyn Sink>,
}

impl UserLoggedIn {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }

    pub fn send_logged_in_mail(&self) -> CoreResult<()> {
        self.sink.deliver("Sending security information to user")
    }

    pub fn add_log(&self) -> CoreResult<()> {
        info!("user logged in");
        self.sink.deliver(&format!("User logged in at {}", timestamp()))
    }
}

pub struct UserLoggedOut {
    sink: Arc<dyn Sink>,
}

impl UserLoggedOut {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }

    pub fn add_log(&self) -> CoreResult<()> {
        info!("user logged out");
        self.sink.deliver(&format!("User logged out at {}", timestamp()))
    }
}

pub struct UserRegistered {
    sink: Arc<dyn Sink>,
}

impl UserRegistered {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }

    pub fn send_verification_mail(&self) -> CoreResult<()> {
        self.sink.deliver("Please verify your email address")
    }

    pub fn send_admin_email(&self) -> CoreResult<()> {
        self.sink.deliver("New user registered to the system")
    }

    pub fn add_log(&self) -> CoreResult<()> {
        info!("user registered");
        self.sink.deliver(&format!("New user registered at {}", timestamp()))
    }
}

pub struct UserLoggedInCommand {
    vendor: Arc<UserLoggedIn>,
}

impl UserLoggedInCommand {
    pub fn new(vendor: Arc<UserLoggedIn>) -> Self {
        Self { vendor }
    }
}

impl Command for UserLoggedInCommand {
    fn execute(&self) -> CoreResult<()> {
        self.vendor.send_logged_in_mail()?;
        self.vendor.add_log()
    }

    fn name(&self) -> &'static str {
        "user_logged_in"
    }
}

pub struct UserLoggedOutCommand {
    vendor: Arc<UserLoggedOut>,
}

impl UserLoggedOutCommand {
    pub fn new(vendor: Arc<UserLoggedOut>) -> Self {
        Self { vendor }
    }
}

impl Command for UserLoggedOutCommand {
    fn execute(&self) -> CoreResult<()> {
        self.vendor.add_log()
    }

    fn name(&self) -> &'static str {
        "user_logged_out"
    }
}

pub struct UserRegisteredCommand {
    vendor: Arc<UserRegistered>,
}

impl UserRegisteredCommand {
    pub fn new(vendor: Arc<UserRegistered>) -> Self {
        Self { vendor }
    }
}

impl Command for UserRegisteredCommand {
    fn execute(&self) -> CoreResult<()> {
        self.vendor.send_verification_mail()?;
        self.vendor.send_admin_email()?;
        self.vendor.add_log()
    }

    fn name(&self) -> &'static str {
        "user_registered"
    }
}
