//! `agentrelay chat`: interactive conversation.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use super::{load_assistant, progress};

const HELP: &str = "  Commands:
    exit, quit       leave the chat
    clear            start a new conversation
    toggle_reports   show or hide the tool report after each answer
    reports          show the full system report
    help             show this help";

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Exit,
    Clear,
    Help,
    ToggleReports,
    Reports,
    Empty,
    Question(&'a str),
}

pub fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "" => Input::Empty,
        "exit" | "quit" => Input::Exit,
        "clear" => Input::Clear,
        "help" => Input::Help,
        "toggle_reports" => Input::ToggleReports,
        "reports" => Input::Reports,
        _ => Input::Question(line),
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (config, mut assistant) = load_assistant(true)?;
    let colored = config.ui.colored;
    let mut show_reports = config.ui.show_tool_reports;
    let printer = progress::spawn(assistant.events(), colored);

    println!();
    println!("  agentrelay: interactive mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {}", assistant.runtime().tools.names().join(", "));
    println!("  Agents:    {}", assistant.runtime().agents.names().join(", "));
    println!();
    println!("  Type your message and press Enter. Type 'help' for commands.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Help => println!("{HELP}\n"),
            Input::Clear => {
                assistant.clear();
                println!("  Conversation cleared.\n");
            }
            Input::ToggleReports => {
                show_reports = !show_reports;
                let state = if show_reports { "on" } else { "off" };
                println!("  Tool reports {state}.\n");
            }
            Input::Reports => println!("{}\n", assistant.system_report(colored)),
            Input::Question(question) => {
                match assistant.ask(question).await {
                    Ok(answer) => {
                        println!();
                        for line in answer.lines() {
                            println!("  Assistant > {line}");
                        }
                        println!();
                    }
                    Err(e) => eprintln!("  [Error] {e}\n"),
                }
                if show_reports {
                    println!("{}", assistant.render_report(colored));
                    println!("  {}\n", assistant.context_usage());
                }
            }
        }
    }

    printer.abort();
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
