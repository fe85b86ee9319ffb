use std::io::Write;

use tokio::io::AsyncBufReadExt;

use prattle_config::PrattleConfig;
use prattle_core::Role;

/// A line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Exit,
    Reset,
    History,
    Empty,
    Message(&'a str),
}

impl<'a> ReplCommand<'a> {
    fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => ReplCommand::Empty,
            "exit" | "quit" | "/exit" | "/quit" => ReplCommand::Exit,
            "/reset" => ReplCommand::Reset,
            "/history" => ReplCommand::History,
            text => ReplCommand::Message(text),
        }
    }
}

pub(super) async fn cmd_chat(
    config: PrattleConfig,
    channel: String,
    show_stage: bool,
) -> prattle_core::Result<()> {
    println!("💬 Prattle Interactive Chat (channel: {channel})");
    println!("   Type 'exit' or Ctrl+C to quit");
    println!("   Type '/reset' to forget this channel");
    println!("   Type '/history' to show the conversation");
    println!();

    let responder = super::build_responder(config)?;

    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();

    loop {
        eprint!("\x1b[36myou>\x1b[0m ");
        std::io::stderr().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => {
                println!("👋 Goodbye!");
                break;
            }
            ReplCommand::Reset => match responder.reset(&channel).await {
                Ok(()) => println!("\x1b[90m🧹 channel reset\x1b[0m"),
                Err(e) => println!("\x1b[31m❌ {e}\x1b[0m"),
            },
            ReplCommand::History => match responder.history(&channel).await {
                Ok(history) => {
                    for record in history {
                        let label = match record.role {
                            Role::System => "\x1b[90msystem\x1b[0m",
                            Role::User => "\x1b[36myou\x1b[0m",
                            Role::Assistant => "\x1b[32mprattle\x1b[0m",
                        };
                        println!("{label}: {}", record.content);
                    }
                }
                Err(e) => println!("\x1b[31m❌ {e}\x1b[0m"),
            },
            ReplCommand::Message(text) => {
                let reply = responder.respond(&channel, text, None).await;
                eprint!("\x1b[32mprattle>\x1b[0m ");
                println!("{}", reply.text);
                if show_stage {
                    eprintln!("\x1b[90m   [{}]\x1b[0m", reply.stage);
                }
            }
        }
        println!();
    }

    Ok(())
}
