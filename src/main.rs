use anyhow::Context;
use clap::{Parser, Subcommand};
use llm_bridge::{build_router, AppState, BridgeConfig, Converter, MessageFormat};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "llm-bridge",
    about = "Convert chat requests and responses between LLM provider formats",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP conversion service (default)
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Convert a single JSON payload and print the result
    Convert {
        /// Source format (anthropic, openai, google, aws, generic)
        #[arg(long)]
        from: String,

        /// Target format
        #[arg(long)]
        to: String,

        /// Treat the payload as a response instead of a request
        #[arg(long)]
        response: bool,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,

        /// Input file; reads stdin when omitted
        input: Option<PathBuf>,
    },
    /// List supported formats
    Formats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llm_bridge=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in llm_bridge::config::config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let config = BridgeConfig::find_and_load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(config, port).await,
        Command::Convert {
            from,
            to,
            response,
            pretty,
            input,
        } => convert(config, &from, &to, response, pretty, input),
        Command::Formats => {
            for info in MessageFormat::all() {
                if info.aliases.is_empty() {
                    println!("{:<10} {}", info.name, info.description);
                } else {
                    println!(
                        "{:<10} {} (aliases: {})",
                        info.name,
                        info.description,
                        info.aliases.join(", ")
                    );
                }
            }
            Ok(())
        }
    }
}

async fn serve(mut config: BridgeConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.port = port;
    }

    info!("llm-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("  Port:             {}", config.port);
    info!("  Schema checks:    {}", config.converter.validate_schemas);
    info!(
        "  OpenAI tools:     {}",
        if config.converter.openai.native_tools { "native" } else { "described in system prompt" }
    );

    let port = config.port;
    let state = Arc::new(AppState::new(config));

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn convert(
    config: BridgeConfig,
    from: &str,
    to: &str,
    response: bool,
    pretty: bool,
    input: Option<PathBuf>,
) -> anyhow::Result<()> {
    let from = MessageFormat::from_name(from)
        .with_context(|| format!("unknown source format: {}", from))?;
    let to = MessageFormat::from_name(to).with_context(|| format!("unknown target format: {}", to))?;

    let data = match input {
        Some(path) => std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    let converter = Converter::new(config.converter);
    let out = if response {
        converter.convert_response(&data, from, to)?
    } else {
        converter.convert_request(&data, from, to)?
    };

    if pretty {
        let value: serde_json::Value = serde_json::from_slice(&out)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", String::from_utf8_lossy(&out));
    }

    Ok(())
}
