//! `agentrelay ask`: answer one question and exit.

use super::{load_assistant, progress};

pub async fn run(message: &str, show_report: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (config, mut assistant) = load_assistant(true)?;
    let colored = config.ui.colored;
    let printer = progress::spawn(assistant.events(), colored);

    let outcome = assistant.ask(message).await;
    printer.abort();

    match outcome {
        Ok(answer) => {
            println!("{answer}");
            if show_report {
                println!();
                println!("{}", assistant.render_report(colored));
            }
            Ok(())
        }
        Err(e) => {
            // The partial call tree explains how far the request got.
            eprintln!("{}", assistant.render_report(colored));
            Err(e.into())
        }
    }
}
