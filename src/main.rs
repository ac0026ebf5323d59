use anyhow::Context;
use delve::{
    api::routes::create_router,
    cli::{
        ask,
        init::{self, InitConfig, InitResult},
        output::Output,
        Cli, Commands, LogFormat,
    },
    research::RunRequest,
    AppState, ConfigManager, DelveConfig, ResearchCoordinator,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Init {
            path,
            force,
            provider,
        } => match init::run(
            InitConfig {
                path,
                force,
                provider,
            },
            &output,
        ) {
            InitResult::Success | InitResult::AlreadyExists => Ok(()),
            InitResult::Error(e) => Err(anyhow::anyhow!(e)),
        },
        Commands::Config { full, validate } => show_config(&cli.config, full, validate, &output),
        Commands::Ask {
            question,
            queries,
            max_loops,
            reasoning_model,
            overrides,
            json,
        } => {
            let request = ask::parse_overrides(&overrides).map(|overrides| RunRequest {
                requested_query_count: queries,
                max_loops,
                reasoning_model,
                overrides,
                ..RunRequest::question(question)
            });
            match request {
                Ok(request) => {
                    run_ask(
                        &cli.config,
                        request,
                        json,
                        cli.verbose,
                        cli.log_format,
                        &output,
                    )
                    .await
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Serve => serve(&cli.config, cli.verbose, cli.log_format).await,
    };

    if let Err(e) = result {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initialize the global subscriber. `RUST_LOG` wins over the config's
/// `log_level`; `--verbose` forces debug.
fn init_tracing(log_level: &str, verbose: bool, format: LogFormat) {
    let default_directive = if verbose { "debug" } else { log_level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn run_ask(
    config_path: &Path,
    request: RunRequest,
    json: bool,
    verbose: bool,
    log_format: LogFormat,
    output: &Output,
) -> anyhow::Result<()> {
    let config = DelveConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    init_tracing(&config.server.log_level, verbose, log_format);

    let coordinator = ResearchCoordinator::from_config(&config)?;
    let run = coordinator.run(&config.defaults, request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ask::run_json(&run))?);
    } else {
        ask::print_run(output, &run);
    }
    Ok(())
}

async fn serve(config_path: &Path, verbose: bool, log_format: LogFormat) -> anyhow::Result<()> {
    let config_manager = Arc::new(
        ConfigManager::new(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?,
    );
    let config = config_manager.config();
    init_tracing(&config.server.log_level, verbose, log_format);

    // Backends are bound at startup; a reload only changes the research defaults
    let coordinator = Arc::new(ResearchCoordinator::from_config(&config)?);
    config_manager.start_watching()?;

    let state = AppState {
        config_manager: Arc::clone(&config_manager),
        coordinator,
    };

    let app = create_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Delve listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    config_manager.stop_watching();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed
        std::future::pending::<()>().await;
    }
}

fn show_config(path: &Path, full: bool, validate: bool, output: &Output) -> anyhow::Result<()> {
    let config = DelveConfig::read(path).with_context(|| format!("reading {}", path.display()))?;

    output.header("Configuration");
    output.kv("file", &path.display().to_string());
    output.kv("server", &config.bind_addr());
    output.kv("llm provider", config.llm_provider.name());
    output.kv("search provider", config.search_provider.name());

    let defaults = &config.defaults;
    output.subheader("Research defaults");
    output.kv("query generator", &defaults.model.query_generator_model);
    output.kv("reflection", &defaults.model.reflection_model);
    output.kv("answer", &defaults.model.answer_model);
    output.kv(
        "initial queries",
        &defaults.research.initial_query_count.to_string(),
    );
    output.kv(
        "max research loops",
        &defaults.research.max_research_loops.to_string(),
    );
    output.kv(
        "follow-up strategy",
        &format!("{:?}", defaults.research.follow_up_strategy),
    );
    output.kv(
        "batch failure policy",
        &format!("{:?}", defaults.research.batch_failure_policy),
    );

    if full {
        output.subheader("Full configuration");
        output.body(&toml::to_string_pretty(&config)?);
    }

    if validate {
        output.newline();
        config.validate()?;
        output.success("Configuration is valid");
    } else {
        let overridable: Vec<String> = defaults
            .override_keys()
            .into_iter()
            .map(|(section, key)| format!("{}.{}", section, key))
            .collect();
        output.hint(&format!("Per-run override keys: {}", overridable.join(", ")));
    }

    Ok(())
}
