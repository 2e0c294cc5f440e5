use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use parley_core::config::{
    API_KEY_PLACEHOLDER, AssistantsConfig, Config, DEFAULT_OLLAMA_ENDPOINT, DEFAULT_OLLAMA_MODEL,
    DEFAULT_OPENAI_ENDPOINT, OllamaConfig, OpenAIConfig, ToolsConfig,
};
use parley_core::providers::AVAILABLE_PROVIDERS;
use std::path::Path;

const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "gpt-4.1-mini"];

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn setup_provider() -> Result<String> {
    let selection = Select::new()
        .with_prompt("Which backend should answer you?")
        .items(AVAILABLE_PROVIDERS)
        .default(0)
        .interact()
        .context("Failed to select provider")?;

    Ok(AVAILABLE_PROVIDERS[selection].to_string())
}

fn setup_ollama() -> Result<OllamaConfig> {
    let model: String = Input::new()
        .with_prompt("Model")
        .default(DEFAULT_OLLAMA_MODEL.to_string())
        .interact_text()
        .context("Failed to read model")?;

    let endpoint: String = Input::new()
        .with_prompt("Ollama endpoint")
        .default(DEFAULT_OLLAMA_ENDPOINT.to_string())
        .interact_text()
        .context("Failed to read endpoint")?;

    Ok(OllamaConfig { model, endpoint })
}

fn setup_openai() -> Result<OpenAIConfig> {
    let selection = Select::new()
        .with_prompt("Select your model")
        .items(OPENAI_MODELS)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    let endpoint: String = Input::new()
        .with_prompt("API endpoint")
        .default(DEFAULT_OPENAI_ENDPOINT.to_string())
        .interact_text()
        .context("Failed to read endpoint")?;

    let api_key: String = Input::new()
        .with_prompt("OpenAI API key (leave empty to use OPENAI_API_KEY)")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read API key")?;

    let api_key = if api_key.trim().is_empty() {
        API_KEY_PLACEHOLDER.to_string()
    } else {
        api_key.trim().to_string()
    };

    Ok(OpenAIConfig {
        model: OPENAI_MODELS[selection].to_string(),
        api_key,
        endpoint,
        ..Default::default()
    })
}

fn toggle(prompt: &str, default: bool) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .with_context(|| format!("Failed to read answer to '{prompt}'"))
}

fn setup_tools() -> Result<ToolsConfig> {
    let defaults = ToolsConfig::default();
    Ok(ToolsConfig {
        browser: toggle("Enable web browsing?", defaults.browser)?,
        weather: toggle("Enable weather lookups?", defaults.weather)?,
        open_app: toggle("Enable opening apps (macOS only)?", defaults.open_app)?,
        cmd: toggle("Enable running terminal commands?", defaults.cmd)?,
    })
}

pub fn run_init() -> Result<Config> {
    println!();
    println!("  {}", style("Welcome to Parley!").white().bold());
    println!(
        "  {}",
        style("This wizard writes the configuration used by `parley chat`.").dim()
    );

    print_step(1, 3, "Backend");
    let provider = setup_provider()?;

    print_step(2, 3, "Model");
    let mut assistants = AssistantsConfig {
        provider: provider.clone(),
        ..Default::default()
    };
    match provider.as_str() {
        "openai" => assistants.openai = setup_openai()?,
        _ => assistants.ollama = setup_ollama()?,
    }

    print_step(3, 3, "Tools");
    let tools = setup_tools()?;

    Ok(Config {
        assistants,
        tools,
        ..Default::default()
    })
}

pub fn print_done(path: &Path) {
    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(path.display()).cyan()
    );
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("parley chat").cyan().bold()
    );
    println!();
}
