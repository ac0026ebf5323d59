//! Init command implementation
//!
//! Scaffolds a commented `delve.toml`, a `.env.example` listing the
//! credentials it references, and a `.gitignore`.

use super::output::Output;
use super::InitProvider;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of the init operation
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// delve.toml already exists and --force was not given
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// LLM provider to configure
    pub provider: InitProvider,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing Delve");

    let base_path = &config.path;
    if !base_path.exists() {
        if let Err(e) = fs::create_dir_all(base_path) {
            output.error(&format!("Failed to create {}: {}", base_path.display(), e));
            return InitResult::Error(e.to_string());
        }
    }

    let config_path = base_path.join("delve.toml");
    if config_path.exists() && !config.force {
        output.warning("delve.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating configuration files");

    if let Err(e) = write_file(&config_path, &generate_delve_toml(config.provider), true) {
        output.error(&format!("Failed to create delve.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "delve.toml");

    let env_example_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_example_path, &generate_env_example(config.provider), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    // Never overwrite an existing .gitignore
    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if let Err(e) = write_file(&gitignore_path, GITIGNORE, false) {
            output.warning(&format!("Failed to create .gitignore: {}", e));
        } else {
            output.created("file", ".gitignore");
        }
    }

    output.complete("Delve initialized successfully!");

    output.header("Next Steps");
    output.newline();
    output.info("1. Set up environment variables:");
    output.command("cp .env.example .env");
    output.command("# Edit .env and set the API keys it lists");
    output.newline();

    if config.provider == InitProvider::Ollama {
        output.info("2. Start Ollama (if not running) and pull the model:");
        output.command("ollama serve");
        output.command(&format!("ollama pull {}", OLLAMA_MODEL));
        output.newline();
    }

    output.info("Ask a question:");
    output.command("delve ask \"What changed in the latest Rust release?\"");
    output.newline();
    output.info("Or start the HTTP API:");
    output.command("delve serve");

    output.hint("OpenAPI document available at /api/openapi.json");

    InitResult::Success
}

const OLLAMA_MODEL: &str = "qwen2.5:7b";

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_delve_toml(provider: InitProvider) -> String {
    let (provider_section, model) = match provider {
        InitProvider::OpenAI => (
            r#"[llm_provider]
type = "openai"
api_base = "https://api.openai.com/v1"
api_key_env = "OPENAI_API_KEY"
timeout_secs = 120
"#
            .to_string(),
            "gpt-4o",
        ),
        InitProvider::Ollama => (
            r#"[llm_provider]
type = "ollama"
base_url = "http://localhost:11434"
timeout_secs = 300
"#
            .to_string(),
            OLLAMA_MODEL,
        ),
    };

    format!(
        r#"# Delve Configuration
# ===================
# Generated by: delve init
#
# Credentials are never stored here; each provider names the environment
# variable that holds its key.
#
# Hot Reloading: `delve serve` watches this file. New runs use the new
# values; runs already in flight keep the snapshot they started with.

[server]
host = "127.0.0.1"
port = 3000
log_level = "info"

# =============================================================================
# LLM Provider
# =============================================================================
{provider_section}
# =============================================================================
# Search Provider
# =============================================================================
[search_provider]
type = "tavily"
api_base = "https://api.tavily.com"
api_key_env = "TAVILY_API_KEY"
timeout_secs = 30

# Keyless alternative:
# [search_provider]
# type = "duckduckgo"

# =============================================================================
# Research Defaults
# =============================================================================
# Any field below can be overridden per run by name, e.g.
#   delve ask --set max_results=3 --set follow_up_strategy=reflection "..."

[defaults.model]
query_generator_model = "{model}"
reflection_model = "{model}"
answer_model = "{model}"

[defaults.research]
initial_query_count = 3
max_research_loops = 2
max_follow_up_queries = 3
# "trailing_queries" re-searches the latest queries; "reflection" searches
# the follow-ups the reflection step proposes and stops when it is satisfied
follow_up_strategy = "trailing_queries"
# "fail_fast" aborts the run on a search error; "degrade" treats it as no results
batch_failure_policy = "fail_fast"

[defaults.llm]
query_generation_temperature = 1.0
reflection_temperature = 1.0
answer_generation_temperature = 0.0
max_retries = 2

[defaults.search]
max_results = 5
depth = "advanced"
include_images = false

[defaults.citation]
title_max_length = 50
"#
    )
}

fn generate_env_example(provider: InitProvider) -> String {
    let llm_key = match provider {
        InitProvider::OpenAI => "# REQUIRED: OpenAI API key\nOPENAI_API_KEY=sk-...\n",
        InitProvider::Ollama => "# Ollama needs no API key\n",
    };

    format!(
        r#"# Delve Environment Variables
# ===========================
# Copy this file to .env and fill in the values.

{llm_key}
# REQUIRED for the tavily search provider
TAVILY_API_KEY=tvly-...

# Optional: Logging level (trace, debug, info, warn, error)
RUST_LOG=info,delve=debug
"#
    )
}

const GITIGNORE: &str = r#"# Environment
.env
.env.local

# Rust
/target/
"#;
