use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use parley_core::{agent, config, tools};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
mod init;

const RESET_COMMAND: &str = "/reset";

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "parley - a tool-calling assistant for local and remote models", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file interactively
    Init,
    /// Talk to the assistant
    Chat {
        #[arg(short, long)]
        message: Option<String>,
    },
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parley")
        .join("config.yaml")
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "parley_core=debug,parley=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_delta(delta: &str) {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(delta.as_bytes());
    let _ = stdout.flush();
}

fn print_error(e: &dyn std::fmt::Display) {
    eprintln!("{} {}", style("Error:").red().bold(), style(e).red());
}

async fn ask(assistant: &mut agent::Assistant, text: &str) {
    match assistant.send_request(text, print_delta).await {
        Ok(_) => println!(),
        Err(e) => {
            println!();
            print_error(&e);
            if e.is_tool_call_failure() {
                eprintln!("{}", style("The tool call was discarded; your question is kept.").dim());
            }
        }
    }
}

async fn chat(config_path: &Path, message: Option<String>) -> Result<()> {
    let config = config::Config::load_or_init(config_path)?;

    let registry = Arc::new(tools::register_tools(&config.tools).await);
    let mut assistant = agent::create_assistant(&config, registry)?;
    assistant.setup().await?;

    if let Some(msg) = message {
        ask(&mut assistant, &msg).await;
        return Ok(());
    }

    println!("{}", style("Parley").cyan().bold());
    println!("{}", style("Type your message (/reset to start over, Ctrl+C or Ctrl+D to exit)").dim());
    println!();

    let mut rl = DefaultEditor::new().context("Failed to start line editor")?;
    loop {
        match rl.readline(&format!("{} ", style("You:").green().bold())) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                if line == RESET_COMMAND {
                    let dropped = assistant.reset();
                    println!("{}", style(format!("Conversation cleared ({dropped} messages).")).dim());
                    continue;
                }
                ask(&mut assistant, line).await;
                println!();
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("{}", style("Goodbye!").cyan());
                break;
            }
            Err(e) => {
                print_error(&e);
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.unwrap_or_else(default_config_path);

    let command = cli.command.unwrap_or_else(|| {
        if config_path.exists() {
            Commands::Chat { message: None }
        } else {
            Commands::Init
        }
    });

    match command {
        Commands::Init => {
            let new_config = init::run_init().map_err(|e| {
                print_error(&e);
                anyhow::anyhow!("Initialization failed: {}", e)
            })?;
            config::save_config(&new_config, &config_path)?;
            init::print_done(&config_path);
        }
        Commands::Chat { message } => {
            if let Err(e) = chat(&config_path, message).await {
                print_error(&format!("{e:#}"));
                return Err(e);
            }
        }
    }

    Ok(())
}
