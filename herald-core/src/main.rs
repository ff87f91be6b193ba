//! src/main.rs
//! Wires the vendor actions into an observable and a dispatcher and runs the
//! breach and account scenarios once.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use herald_core::{
    command::{Command, Invoker, MacroCommand},
    config::Config,
    logging::init_logging_with_config,
    observer::{Handler, Observable},
    vendors::{
        MailNotifier, Sink, SmsNotifier, StdoutSink, UserLoggedIn, UserLoggedInCommand,
        UserLoggedOut, UserLoggedOutCommand, UserRegistered, UserRegisteredCommand,
    },
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config: Config = Config::load()
        .await
        .context("Failed to load configuration")?;

    let _log_guard = init_logging_with_config(config.logging.clone())
        .await
        .context("Failed to initialize logging")?;

    info!("Starting herald demo");

    let sink: Arc<dyn Sink> = Arc::new(StdoutSink);

    run_breach(&config, Arc::clone(&sink))?;
    run_accounts(&config, sink)?;

    info!("Demo exited cleanly");
    Ok(())
}

fn run_breach(config: &Config, sink: Arc<dyn Sink>) -> Result<()> {
    let subject = Observable::with_config(
        "Security breach at headquarters",
        config.dispatch.clone(),
    );

    let email: Arc<dyn Handler> = Arc::new(MailNotifier::new(Arc::clone(&sink)));
    let sms: Arc<dyn Handler> = Arc::new(SmsNotifier::new(Arc::clone(&sink)));

    subject.add_handler(email);
    subject.add_handler(Arc::clone(&sms));

    subject.trigger().context("Breach round failed")?;

    sink.deliver("---------- AFTER REMOVING SmsNotifier FROM THE LIST ----------")?;
    subject.remove_handler(&sms);

    subject.trigger().context("Breach round failed")?;
    Ok(())
}

fn run_accounts(config: &Config, sink: Arc<dyn Sink>) -> Result<()> {
    let registered: Arc<dyn Command> = Arc::new(UserRegisteredCommand::new(Arc::new(
        UserRegistered::new(Arc::clone(&sink)),
    )));
    let logged_in: Arc<dyn Command> = Arc::new(UserLoggedInCommand::new(Arc::new(
        UserLoggedIn::new(Arc::clone(&sink)),
    )));
    let logged_out: Arc<dyn Command> = Arc::new(UserLoggedOutCommand::new(Arc::new(
        UserLoggedOut::new(Arc::clone(&sink)),
    )));

    sink.deliver("----------------------- WITH MACRO COMMAND -----------------------")?;
    let macro_command: Arc<dyn Command> = Arc::new(MacroCommand::new([registered, logged_in]));
    Invoker::with_config(macro_command, config.dispatch.clone())
        .dispatch()
        .context("Macro command failed")?;

    sink.deliver("----------------------- WITHOUT MACRO COMMAND -----------------------")?;
    Invoker::with_config(logged_out, config.dispatch.clone())
        .dispatch()
        .context("Logout command failed")?;

    Ok(())
}
