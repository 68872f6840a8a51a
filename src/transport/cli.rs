//! Terminal commands over a persisted workspace

use crate::catalog::ProviderRegistry;
use crate::config::Config;
use crate::conversation::Attachment;
use crate::dispatch::{DispatchObserver, Dispatcher, SendReport, TargetState};
use crate::fetch::fetch_url_text;
use crate::llm::{AdapterRegistry, ReqwestTransport, Role};
use crate::mention::{Assistant, DispatchTarget, MentionResolver, ReferenceSource};
use crate::storage::{channel_markdown, Backup, WorkspaceStore};
use crate::workspace::{CredentialStore, TranscriptStore};
use anyhow::{bail, Context, Result};
use base64::Engine;
use chrono::Local;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];

/// Attachment flags of `send`
#[derive(Debug, Default)]
pub struct AttachmentArgs {
    pub url: Option<String>,
    pub file: Option<PathBuf>,
    pub image: Option<PathBuf>,
}

fn open_dispatcher(config: &Config, data_dir: &Path) -> Result<Dispatcher> {
    let store = WorkspaceStore::new(data_dir)?;
    let workspace = store
        .load()
        .with_context(|| format!("Failed to load workspace from {}", store.path().display()))?;
    let adapters = AdapterRegistry::with_defaults(config, Arc::new(ReqwestTransport::new()));
    Ok(Dispatcher::new(workspace, Arc::new(adapters), config.dispatch.clone()).with_store(store))
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

struct ConsoleObserver;

impl DispatchObserver for ConsoleObserver {
    fn on_pending(&self, target: &DispatchTarget) {
        eprintln!("{} @{} is thinking...", "…".dimmed(), target.mention);
    }

    fn on_complete(&self, target: &DispatchTarget, state: &TargetState) {
        match state {
            TargetState::Failed { .. } => eprintln!("{} @{} failed", "✗".red(), target.mention),
            _ => eprintln!("{} @{} replied", "✓".green(), target.mention),
        }
    }
}

fn guess_mime(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "json" => "application/json",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(mime.to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn image_attachment(path: &Path) -> Result<Attachment> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    let mime = guess_mime(path).unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(Attachment::Image {
        name: file_name(path),
        data: format!(
            "data:{};base64,{}",
            mime,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ),
    })
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

async fn load_attachment(
    dispatcher: &Dispatcher,
    config: &Config,
    args: AttachmentArgs,
) -> Result<Option<Attachment>> {
    if let Some(url) = args.url {
        eprintln!("{}", format!("Fetching {}...", url).yellow());
        let transport = dispatcher.adapters().transport().clone();
        let content = fetch_url_text(transport.as_ref(), &url, &config.fetch).await?;
        return Ok(Some(Attachment::Url {
            url: url.trim().to_string(),
            content,
        }));
    }
    if let Some(path) = args.image {
        return image_attachment(&path).map(Some);
    }
    if let Some(path) = args.file {
        if is_image(&path) {
            return image_attachment(&path).map(Some);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {} as text", path.display()))?;
        return Ok(Some(Attachment::File {
            name: file_name(&path),
            mime: guess_mime(&path),
            content: Some(content),
        }));
    }
    Ok(None)
}

/// Display name of a reply's model, with its provider when known
fn author_label(dispatcher: &Dispatcher, model: Option<&str>) -> String {
    let name = dispatcher.workspace().display_name(dispatcher.registry(), model);
    match model.and_then(|m| dispatcher.registry().provider_for_model(m)) {
        Some(provider) => format!("{} · {}", name, provider.name),
        None => name,
    }
}

fn print_report(dispatcher: &Dispatcher, report: &SendReport) {
    let workspace = dispatcher.workspace();
    let transcript = workspace.read(&report.channel_id);

    for outcome in &report.outcomes {
        let Some(reply) = transcript.iter().find(|m| m.id == outcome.message_id) else {
            continue;
        };
        let header = format!("### {}", author_label(dispatcher, reply.model.as_deref()));
        match outcome.state {
            TargetState::Failed { .. } => println!("\n{}", header.bold().red()),
            _ => println!("\n{}", header.bold().cyan()),
        }
        println!("{}", reply.content);
    }

    if let Some(context) = &report.context {
        eprintln!("{} @{}", "Context:".bold(), context);
    }
    if let Some(hint) = &report.hint {
        eprintln!("{}", hint.yellow());
    }
}

/// Send a message to a channel and print the replies
pub async fn run_send(
    config: &Config,
    data_dir: &Path,
    text: &str,
    channel: Option<&str>,
    attachments: AttachmentArgs,
) -> Result<()> {
    let mut dispatcher = open_dispatcher(config, data_dir)?;
    let channel = channel
        .map(|c| c.trim_start_matches('#').to_string())
        .unwrap_or_else(|| dispatcher.workspace().current_channel().to_string());

    let attachment = load_attachment(&dispatcher, config, attachments).await?;
    let report = dispatcher
        .send_observed(&channel, text, attachment, &ConsoleObserver)
        .await?;

    print_report(&dispatcher, &report);
    if report.failures() > 0 {
        tracing::debug!("{} of {} targets failed", report.failures(), report.outcomes.len());
    }
    if let Some(err) = &report.persist_error {
        bail!("Replies were not saved: {}", err);
    }
    Ok(())
}

/// List catalog models, usable ones only unless `all`
pub fn run_models(config: &Config, data_dir: &Path, all: bool) -> Result<()> {
    let dispatcher = open_dispatcher(config, data_dir)?;
    let registry = dispatcher.registry();
    let workspace = dispatcher.workspace();

    #[derive(Tabled)]
    struct ModelRow {
        #[tabled(rename = "Mention")]
        mention: String,
        #[tabled(rename = "Model")]
        name: String,
        #[tabled(rename = "Provider")]
        provider: String,
        #[tabled(rename = "Tag")]
        tag: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let models = if all {
        registry.list_all()
    } else {
        registry.list_usable(&workspace.credentials)
    };
    if models.is_empty() {
        println!("{}", "No models available. Add an API key with `teamhub keys set`.".yellow());
        return Ok(());
    }

    let rows: Vec<ModelRow> = models
        .into_iter()
        .map(|m| ModelRow {
            mention: format!("@{}", m.mention()),
            name: m.model.name.to_string(),
            provider: m.provider.name.to_string(),
            tag: m.model.tag.unwrap_or("").to_string(),
            status: if registry.is_usable(m.provider, &workspace.credentials) {
                "online".green().to_string()
            } else {
                "offline".dimmed().to_string()
            },
        })
        .collect();
    print_table(rows);
    Ok(())
}

fn key_name_for(registry: &ProviderRegistry, provider: &str) -> Result<&'static str> {
    registry
        .providers()
        .iter()
        .find(|p| p.id == provider || p.key_name == provider)
        .map(|p| p.key_name)
        .with_context(|| {
            let known: Vec<&str> = registry.providers().iter().map(|p| p.id).collect();
            format!("Unknown provider '{}'. Known: {}", provider, known.join(", "))
        })
}

pub fn run_keys_set(config: &Config, data_dir: &Path, provider: &str, key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        bail!("API key is empty; use `teamhub keys remove {}` to delete it", provider);
    }
    let mut dispatcher = open_dispatcher(config, data_dir)?;
    let key_name = key_name_for(dispatcher.registry(), provider)?;
    dispatcher.update(|ws, _| ws.credentials.set(key_name, key))?;
    println!("{} API key saved for {}", "✓".green(), provider.bold());
    Ok(())
}

pub fn run_keys_remove(config: &Config, data_dir: &Path, provider: &str) -> Result<()> {
    let mut dispatcher = open_dispatcher(config, data_dir)?;
    let key_name = key_name_for(dispatcher.registry(), provider)?;
    if dispatcher.update(|ws, _| ws.credentials.delete(key_name))? {
        println!("{} API key removed for {}", "✓".green(), provider.bold());
    } else {
        println!("No API key stored for {}", provider);
    }
    Ok(())
}

/// Provider online/offline status
pub fn run_keys_list(config: &Config, data_dir: &Path) -> Result<()> {
    let dispatcher = open_dispatcher(config, data_dir)?;
    let registry = dispatcher.registry();
    let credentials = &dispatcher.workspace().credentials;

    #[derive(Tabled)]
    struct ProviderRow {
        #[tabled(rename = "Provider")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Models")]
        models: usize,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<ProviderRow> = registry
        .providers()
        .iter()
        .map(|p| ProviderRow {
            id: p.id.to_string(),
            name: p.name.to_string(),
            models: p.models.len(),
            status: if registry.is_usable(p, credentials) {
                "online".green().to_string()
            } else {
                "offline".dimmed().to_string()
            },
        })
        .collect();
    print_table(rows);
    Ok(())
}

pub fn run_channel_new(config: &Config, data_dir: &Path, name: &str) -> Result<()> {
    let mut dispatcher = open_dispatcher(config, data_dir)?;
    let id = dispatcher.update(|ws, _| ws.create_channel(name).map(|c| c.id.clone()))??;
    println!("{} Channel #{} created", "✓".green(), id.bold());
    Ok(())
}

pub fn run_channel_list(config: &Config, data_dir: &Path) -> Result<()> {
    let dispatcher = open_dispatcher(config, data_dir)?;
    let workspace = dispatcher.workspace();

    #[derive(Tabled)]
    struct ChannelRow {
        #[tabled(rename = "")]
        current: String,
        #[tabled(rename = "Channel")]
        id: String,
        #[tabled(rename = "Description")]
        desc: String,
        #[tabled(rename = "Messages")]
        messages: usize,
    }

    let rows: Vec<ChannelRow> = workspace
        .channels()
        .iter()
        .map(|c| ChannelRow {
            current: if c.id == workspace.current_channel() {
                "*".to_string()
            } else {
                String::new()
            },
            id: format!("#{}", c.id),
            desc: c.desc.clone(),
            messages: c.messages.len(),
        })
        .collect();
    print_table(rows);
    Ok(())
}

pub fn run_channel_switch(config: &Config, data_dir: &Path, id: &str) -> Result<()> {
    let mut dispatcher = open_dispatcher(config, data_dir)?;
    let id = id.trim_start_matches('#');
    dispatcher.update(|ws, _| ws.switch_channel(id))??;
    println!("{} Now in #{}", "✓".green(), id.bold());
    Ok(())
}

pub fn run_channel_clear(config: &Config, data_dir: &Path, id: Option<&str>) -> Result<()> {
    let mut dispatcher = open_dispatcher(config, data_dir)?;
    let id = id
        .map(|c| c.trim_start_matches('#').to_string())
        .unwrap_or_else(|| dispatcher.workspace().current_channel().to_string());
    dispatcher.update(|ws, _| ws.clear(&id))??;
    println!("{} Cleared #{}", "✓".green(), id.bold());
    Ok(())
}

/// Print a channel transcript
pub fn run_channel_show(
    config: &Config,
    data_dir: &Path,
    id: Option<&str>,
    last: Option<usize>,
) -> Result<()> {
    let dispatcher = open_dispatcher(config, data_dir)?;
    let workspace = dispatcher.workspace();
    let id = id
        .map(|c| c.trim_start_matches('#'))
        .unwrap_or_else(|| workspace.current_channel());
    let Some(channel) = workspace.channel(id) else {
        bail!("Channel not found: {}", id);
    };

    let skip = last
        .map(|n| channel.messages.len().saturating_sub(n))
        .unwrap_or(0);
    println!("{}", format!("#{}", channel.id).bold().cyan());
    for msg in channel.messages.iter().skip(skip) {
        let time = msg.timestamp.with_timezone(&Local).format("%H:%M");
        match msg.role {
            Role::User => println!("\n{} {}", "You".bold(), time.to_string().dimmed()),
            _ => println!(
                "\n{} {}",
                author_label(&dispatcher, msg.model.as_deref()).bold().cyan(),
                time.to_string().dimmed()
            ),
        }
        if let Some(context) = &msg.context {
            println!("{}", format!("[context: {}]", context.name).dimmed());
        }
        if let Some(attachment) = &msg.attachment {
            println!("{}", format!("[attachment: {}]", attachment.label()).dimmed());
        }
        println!("{}", msg.content);
    }
    Ok(())
}

/// Write a channel as markdown to `output`, or stdout
pub fn run_channel_export(
    config: &Config,
    data_dir: &Path,
    id: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let dispatcher = open_dispatcher(config, data_dir)?;
    let workspace = dispatcher.workspace();
    let id = id
        .map(|c| c.trim_start_matches('#'))
        .unwrap_or_else(|| workspace.current_channel());
    let markdown = channel_markdown(workspace, dispatcher.registry(), id)?;

    match output {
        Some(path) => {
            std::fs::write(path, markdown)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Exported #{} to {}", "✓".green(), id, path.display());
        }
        None => print!("{}", markdown),
    }
    Ok(())
}

pub fn run_reference_add(
    config: &Config,
    data_dir: &Path,
    name: &str,
    source: ReferenceSource,
    content: Option<String>,
    file: Option<&Path>,
) -> Result<()> {
    let content = match (content, file) {
        (Some(content), _) => content,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => bail!("Provide the reference text with --content or --file"),
    };

    let mut dispatcher = open_dispatcher(config, data_dir)?;
    let mention = dispatcher.update(|ws, registry| {
        ws.add_reference(registry, name, source, &content)
            .map(|r| r.mention.clone())
    })??;
    println!("{} Reference imported; mention it with @{}", "✓".green(), mention.bold());
    Ok(())
}

pub fn run_reference_remove(config: &Config, data_dir: &Path, mention: &str) -> Result<()> {
    let mut dispatcher = open_dispatcher(config, data_dir)?;
    let removed = dispatcher.update(|ws, _| ws.remove_reference(mention))??;
    println!("{} Removed reference {}", "✓".green(), removed.name.bold());
    Ok(())
}

pub fn run_reference_list(config: &Config, data_dir: &Path) -> Result<()> {
    let dispatcher = open_dispatcher(config, data_dir)?;

    #[derive(Tabled)]
    struct ReferenceRow {
        #[tabled(rename = "Mention")]
        mention: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Source")]
        source: String,
        #[tabled(rename = "Chars")]
        chars: usize,
    }

    let rows: Vec<ReferenceRow> = dispatcher
        .workspace()
        .references
        .iter()
        .map(|r| ReferenceRow {
            mention: format!("@{}", r.mention),
            name: r.name.clone(),
            source: r.source.to_string(),
            chars: r.content.chars().count(),
        })
        .collect();
    if rows.is_empty() {
        println!("No imported references");
        return Ok(());
    }
    print_table(rows);
    Ok(())
}

pub fn run_custom_add(
    config: &Config,
    data_dir: &Path,
    name: &str,
    endpoint: &str,
    model: Option<String>,
    key: Option<String>,
) -> Result<()> {
    let mut dispatcher = open_dispatcher(config, data_dir)?;
    let mention = dispatcher.update(|ws, registry| {
        ws.add_custom_endpoint(registry, name, endpoint, model, key)
            .map(|c| c.mention.clone())
    })??;
    println!("{} Custom model added; call it with @{}", "✓".green(), mention.bold());
    Ok(())
}

pub fn run_custom_remove(config: &Config, data_dir: &Path, mention: &str) -> Result<()> {
    let mut dispatcher = open_dispatcher(config, data_dir)?;
    let removed = dispatcher.update(|ws, _| ws.remove_custom_endpoint(mention))??;
    println!("{} Removed custom model {}", "✓".green(), removed.name.bold());
    Ok(())
}

pub fn run_custom_list(config: &Config, data_dir: &Path) -> Result<()> {
    let dispatcher = open_dispatcher(config, data_dir)?;

    #[derive(Tabled)]
    struct CustomRow {
        #[tabled(rename = "Mention")]
        mention: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Endpoint")]
        endpoint: String,
        #[tabled(rename = "Model")]
        model: String,
        #[tabled(rename = "Key")]
        key: String,
    }

    let rows: Vec<CustomRow> = dispatcher
        .workspace()
        .custom_endpoints
        .iter()
        .map(|c| CustomRow {
            mention: format!("@{}", c.mention),
            name: c.name.clone(),
            endpoint: c.endpoint.clone(),
            model: c.model_id().to_string(),
            key: if c.api_key.is_some() { "set" } else { "-" }.to_string(),
        })
        .collect();
    if rows.is_empty() {
        println!("No custom models");
        return Ok(());
    }
    print_table(rows);
    Ok(())
}

/// Replace stored assistants with the account's current listing
pub async fn run_assistants_import(config: &Config, data_dir: &Path) -> Result<()> {
    let mut dispatcher = open_dispatcher(config, data_dir)?;
    let key_name = key_name_for(dispatcher.registry(), "openai")?;
    let Some(key) = dispatcher.workspace().credentials.get(key_name) else {
        bail!("Configure an OpenAI API key first: teamhub keys set openai <KEY>");
    };

    eprintln!("{}", "Fetching assistants...".yellow());
    let listing = dispatcher.adapters().list_assistants(&key).await?;
    let assistants = Assistant::from_listing(&listing);
    if assistants.is_empty() {
        println!("No assistants found");
        return Ok(());
    }

    let count = assistants.len();
    dispatcher.update(|ws, registry| ws.replace_assistants(registry, assistants))?;
    println!("{} Imported {} assistants", "✓".green(), count);
    Ok(())
}

/// Everything mentionable right now, optionally filtered
pub fn run_mentions(config: &Config, data_dir: &Path, filter: Option<&str>) -> Result<()> {
    let dispatcher = open_dispatcher(config, data_dir)?;
    let resolver = MentionResolver::new(dispatcher.registry(), dispatcher.workspace());

    #[derive(Tabled)]
    struct MentionRow {
        #[tabled(rename = "Mention")]
        mention: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Kind")]
        kind: String,
    }

    let rows: Vec<MentionRow> = resolver
        .suggest(filter.unwrap_or(""))
        .into_iter()
        .map(|m| MentionRow {
            mention: format!("@{}", m.mention()),
            name: m.name().to_string(),
            kind: m.kind().to_string(),
        })
        .collect();
    if rows.is_empty() {
        println!("Nothing to mention yet");
        return Ok(());
    }
    print_table(rows);
    Ok(())
}

pub fn run_assistants_list(config: &Config, data_dir: &Path) -> Result<()> {
    let dispatcher = open_dispatcher(config, data_dir)?;

    #[derive(Tabled)]
    struct AssistantRow {
        #[tabled(rename = "Mention")]
        mention: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Model")]
        model: String,
    }

    let rows: Vec<AssistantRow> = dispatcher
        .workspace()
        .assistants
        .iter()
        .map(|a| AssistantRow {
            mention: format!("@{}", a.mention),
            name: a.name.clone(),
            model: a.model.clone().unwrap_or_default(),
        })
        .collect();
    if rows.is_empty() {
        println!("No assistants imported");
        return Ok(());
    }
    print_table(rows);
    Ok(())
}

/// Show the config file location and effective settings
pub fn run_config(config: &Config, init: bool) -> Result<()> {
    let path = Config::config_path()?;
    if init {
        if path.exists() {
            bail!("Config already exists at {}", path.display());
        }
        Config::default().save()?;
        println!("{} Wrote default config to {}", "✓".green(), path.display());
        return Ok(());
    }

    println!("{} {}", "Config file:".bold(), path.display());
    if !path.exists() {
        println!("{}", "(not present; using defaults)".dimmed());
    }
    println!();
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Write a JSON backup to `output`, or stdout
pub fn run_data_export(config: &Config, data_dir: &Path, output: Option<&Path>) -> Result<()> {
    let dispatcher = open_dispatcher(config, data_dir)?;
    let json = serde_json::to_string_pretty(&Backup::from_workspace(dispatcher.workspace()))?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Data exported to {}", "✓".green(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub fn run_data_import(config: &Config, data_dir: &Path, input: &Path) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let backup: Backup =
        serde_json::from_str(&content).context("Import failed: not a valid backup file")?;

    let mut dispatcher = open_dispatcher(config, data_dir)?;
    dispatcher.update(|ws, _| {
        backup.apply_to(ws);
        ws.repair();
    })?;
    println!("{} Data imported", "✓".green());
    Ok(())
}

pub fn run_data_clear(config: &Config, data_dir: &Path, yes: bool) -> Result<()> {
    if !yes {
        bail!("This deletes all keys, channels and messages; rerun with --yes to confirm");
    }
    let mut dispatcher = open_dispatcher(config, data_dir)?;
    dispatcher.update(|ws, _| ws.clear_all())?;
    println!("{} All data cleared", "✓".green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime(Path::new("notes.MD")).as_deref(), Some("text/markdown"));
        assert_eq!(guess_mime(Path::new("a.png")).as_deref(), Some("image/png"));
        assert_eq!(guess_mime(Path::new("Makefile")), None);
    }

    #[test]
    fn test_image_attachment_is_data_url() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("dot.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let Attachment::Image { name, data } = image_attachment(&path).unwrap() else {
            panic!("expected image");
        };
        assert_eq!(name, "dot.png");
        assert_eq!(data, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_key_name_for_accepts_id_or_key_name() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(key_name_for(&registry, "claude").unwrap(), "claudeKey");
        assert_eq!(key_name_for(&registry, "geminiKey").unwrap(), "geminiKey");
        assert!(key_name_for(&registry, "nope").is_err());
    }
}
