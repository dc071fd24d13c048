use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scout_core::{
    AgentLoop, CalculatorTool, Config, MemoryStore, OpenAiChatModel, Role, ToolRegistry,
    WeatherTool, WebSearchTool,
};

const HELP: &str = "Commands: /stats, /history, /clear, /tools, /quit";

/// REPL input after trimming
enum Command<'a> {
    Stats,
    History,
    Clear,
    Tools,
    Quit,
    Unknown(&'a str),
    Query(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    match line {
        "/stats" => Command::Stats,
        "/history" => Command::History,
        "/clear" => Command::Clear,
        "/tools" => Command::Tools,
        "/quit" | "/exit" => Command::Quit,
        other if other.starts_with('/') => Command::Unknown(other),
        query => Command::Query(query),
    }
}

fn build_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WebSearchTool::new()?))?;
    registry.register(Arc::new(CalculatorTool))?;
    registry.register(Arc::new(WeatherTool::new()?))?;
    Ok(registry)
}

fn print_history(memory: &MemoryStore) {
    if memory.is_empty() {
        println!("(no history)");
        return;
    }
    for turn in memory.history() {
        let stamp = turn.timestamp.format("%Y-%m-%d %H:%M:%S");
        match turn.role {
            Role::User => println!("[{}] You: {}", stamp, turn.content),
            Role::Assistant if turn.tools_used.is_empty() => {
                println!("[{}] Scout: {}", stamp, turn.content)
            }
            Role::Assistant => println!(
                "[{}] Scout ({}): {}",
                stamp,
                turn.tools_used.join(", "),
                turn.content
            ),
        }
    }
}

/// Run one turn; Ctrl-C cancels it
async fn run_query(agent: &mut AgentLoop, query: &str) {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let outcome = agent.run_turn_with_cancel(query, &cancel).await;
    watcher.abort();

    if !outcome.tools_used.is_empty() {
        println!("[tools: {}]", outcome.tools_used.join(", "));
    }
    println!("Scout: {}\n", outcome.answer);
}

fn prompt() {
    print!("You: ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with answers
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "scout=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Scout starting up...");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Configuration loaded");
    info!("  API: {}", config.openai_api_url);
    info!("  Model: {}", config.openai_model);
    info!("  Memory: {}", config.memory_file.display());

    let api_key = config
        .openai_api_key
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let model = OpenAiChatModel::new(&config.openai_api_url, api_key, &config.openai_model)?;
    let registry = build_registry()?;
    info!("Registered {} tools", registry.len());

    let memory = MemoryStore::open(&config.memory_file);
    let mut agent = AgentLoop::new(Arc::new(model), registry, memory, config.agent_config());

    println!("Scout is ready. {}", HELP);
    println!("{} turns in memory.\n", agent.memory().len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt();

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                info!("Shutting down...");
                break;
            }
        };

        let Some(line) = line else {
            println!();
            break;
        };

        match parse_command(line.trim()) {
            Command::Query("") => continue,
            Command::Query(query) => run_query(&mut agent, query).await,
            Command::Stats => {
                println!("{}", agent.memory().stats());
                if let Some(at) = agent.memory().last_updated() {
                    println!("Last updated: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
                println!();
            }
            Command::History => print_history(agent.memory()),
            Command::Clear => match agent.memory_mut().clear() {
                Ok(()) => println!("Memory cleared.\n"),
                Err(e) => error!("Failed to clear memory: {}", e),
            },
            Command::Tools => println!("{}", agent.registry().describe()),
            Command::Quit => break,
            Command::Unknown(cmd) => {
                warn!("Unknown command: {}", cmd);
                println!("{}\n", HELP);
            }
        }
    }

    info!("Goodbye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert!(matches!(parse_command("/stats"), Command::Stats));
        assert!(matches!(parse_command("/exit"), Command::Quit));
        assert!(matches!(parse_command("/nope"), Command::Unknown("/nope")));
        assert!(matches!(
            parse_command("what is 2+2"),
            Command::Query("what is 2+2")
        ));
    }

    #[test]
    fn test_build_registry() {
        let registry = build_registry().unwrap();
        let names: Vec<String> = registry.list().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["web_search", "calculator", "get_weather"]);
    }
}
