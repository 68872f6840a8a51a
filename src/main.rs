use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use teamhub_cli::mention::ReferenceSource;
use teamhub_cli::transport::cli::{self, AttachmentArgs};
use teamhub_cli::{transport, Config, WorkspaceStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "teamhub")]
#[command(author, about = "Teamhub - talk to several AI models in one chat", long_about = None)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), env!("TEAMHUB_VERSION_SUFFIX")))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding workspace.json (default: platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP proxy and channel API
    Serve {
        /// Port to listen on (default from config: 8787)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Send a message; every @mentioned model replies in order
    Send {
        /// Message text, e.g. "@gpt-4o @claude-3-5-sonnet-20241022 compare these"
        text: String,

        /// Channel to post in (default: current channel)
        #[arg(short, long)]
        channel: Option<String>,

        /// Attach the text of a web page
        #[arg(long, conflicts_with_all = ["file", "image"])]
        url: Option<String>,

        /// Attach a text file (images are detected by extension)
        #[arg(long, conflicts_with = "image")]
        file: Option<PathBuf>,

        /// Attach an image
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// List models you can mention
    Models {
        /// Include models whose provider has no API key
        #[arg(long)]
        all: bool,
    },

    /// List everything mentionable, optionally filtered
    Mentions {
        filter: Option<String>,
    },

    /// Manage provider API keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Manage channels
    Channel {
        #[command(subcommand)]
        action: ChannelAction,
    },

    /// Manage imported references (mentionable context)
    Reference {
        #[command(subcommand)]
        action: ReferenceAction,
    },

    /// Manage custom OpenAI-compatible endpoints
    Custom {
        #[command(subcommand)]
        action: CustomAction,
    },

    /// Manage assistants imported from OpenAI
    Assistants {
        #[command(subcommand)]
        action: AssistantsAction,
    },

    /// Show configuration, or write a default config file
    Config {
        #[arg(long)]
        init: bool,
    },

    /// Backup, restore or wipe all data
    Data {
        #[command(subcommand)]
        action: DataAction,
    },
}

#[derive(Subcommand)]
enum KeysAction {
    /// Store an API key (provider id like `openai`, or its key name)
    Set { provider: String, key: String },
    /// Remove an API key
    Remove { provider: String },
    /// Show which providers are online
    List,
}

#[derive(Subcommand)]
enum ChannelAction {
    /// Create a channel
    New { name: String },
    /// List channels
    List,
    /// Make a channel the current one
    Switch { id: String },
    /// Delete every message in a channel
    Clear { id: Option<String> },
    /// Print a channel transcript
    Show {
        id: Option<String>,
        /// Only the last N messages
        #[arg(short = 'n', long)]
        last: Option<usize>,
    },
    /// Export a channel as markdown
    Export {
        id: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ReferenceAction {
    /// Import text that can be mentioned as context
    Add {
        name: String,
        /// Where the text came from (getnote, notebooklm, other)
        #[arg(short, long, default_value = "other")]
        source: String,
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Remove a reference by mention
    Remove { mention: String },
    /// List references
    List,
}

#[derive(Subcommand)]
enum CustomAction {
    /// Register an OpenAI-compatible chat completions endpoint
    Add {
        name: String,
        endpoint: String,
        /// Model id sent to the endpoint (default: "default")
        #[arg(short, long)]
        model: Option<String>,
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Remove a custom endpoint by mention
    Remove { mention: String },
    /// List custom endpoints
    List,
}

#[derive(Subcommand)]
enum AssistantsAction {
    /// Fetch assistants from the OpenAI account (replaces the stored list)
    Import,
    /// List imported assistants
    List,
}

#[derive(Subcommand)]
enum DataAction {
    /// Write a JSON backup (API keys are not included)
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Restore a JSON backup
    Import { input: PathBuf },
    /// Delete all data, including API keys
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "teamhub=debug,teamhub_cli=debug"
    } else {
        "teamhub=info,teamhub_cli=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable config: {:#}", e);
        Config::default()
    });
    let data_dir = cli.data_dir.unwrap_or_else(WorkspaceStore::default_dir);
    let data_dir = data_dir.as_path();

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            tracing::info!(
                "Starting HTTP server on {}:{}",
                config.server.host,
                config.server.port
            );
            transport::run_http_server(config, data_dir.to_path_buf()).await?;
        }
        Commands::Send {
            text,
            channel,
            url,
            file,
            image,
        } => {
            let attachments = AttachmentArgs { url, file, image };
            cli::run_send(&config, data_dir, &text, channel.as_deref(), attachments).await?;
        }
        Commands::Models { all } => cli::run_models(&config, data_dir, all)?,
        Commands::Mentions { filter } => cli::run_mentions(&config, data_dir, filter.as_deref())?,
        Commands::Keys { action } => match action {
            KeysAction::Set { provider, key } => cli::run_keys_set(&config, data_dir, &provider, &key)?,
            KeysAction::Remove { provider } => cli::run_keys_remove(&config, data_dir, &provider)?,
            KeysAction::List => cli::run_keys_list(&config, data_dir)?,
        },
        Commands::Channel { action } => match action {
            ChannelAction::New { name } => cli::run_channel_new(&config, data_dir, &name)?,
            ChannelAction::List => cli::run_channel_list(&config, data_dir)?,
            ChannelAction::Switch { id } => cli::run_channel_switch(&config, data_dir, &id)?,
            ChannelAction::Clear { id } => cli::run_channel_clear(&config, data_dir, id.as_deref())?,
            ChannelAction::Show { id, last } => {
                cli::run_channel_show(&config, data_dir, id.as_deref(), last)?
            }
            ChannelAction::Export { id, output } => {
                cli::run_channel_export(&config, data_dir, id.as_deref(), output.as_deref())?
            }
        },
        Commands::Reference { action } => match action {
            ReferenceAction::Add {
                name,
                source,
                content,
                file,
            } => {
                let source: ReferenceSource = source.parse().unwrap_or_default();
                cli::run_reference_add(&config, data_dir, &name, source, content, file.as_deref())?
            }
            ReferenceAction::Remove { mention } => {
                cli::run_reference_remove(&config, data_dir, &mention)?
            }
            ReferenceAction::List => cli::run_reference_list(&config, data_dir)?,
        },
        Commands::Custom { action } => match action {
            CustomAction::Add {
                name,
                endpoint,
                model,
                key,
            } => cli::run_custom_add(&config, data_dir, &name, &endpoint, model, key)?,
            CustomAction::Remove { mention } => cli::run_custom_remove(&config, data_dir, &mention)?,
            CustomAction::List => cli::run_custom_list(&config, data_dir)?,
        },
        Commands::Assistants { action } => match action {
            AssistantsAction::Import => cli::run_assistants_import(&config, data_dir).await?,
            AssistantsAction::List => cli::run_assistants_list(&config, data_dir)?,
        },
        Commands::Config { init } => cli::run_config(&config, init)?,
        Commands::Data { action } => match action {
            DataAction::Export { output } => {
                cli::run_data_export(&config, data_dir, output.as_deref())?
            }
            DataAction::Import { input } => cli::run_data_import(&config, data_dir, &input)?,
            DataAction::Clear { yes } => cli::run_data_clear(&config, data_dir, yes)?,
        },
    }

    Ok(())
}
