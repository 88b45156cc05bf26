use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::api::ChatClient;
use crate::config::{Command, Config, StorageMode};
use crate::models::{Conversation, ConversationPatch};
use crate::services::export::export_to_markdown;
use crate::services::{AppSettings, ChatPipeline, ConversationManager, Database, SettingsService};
use crate::storage::{ConversationStore, LocalStore, RemoteStore};
use crate::ui::table_view::render_table;
use crate::ui::{render_conversation_list, render_message, TableLayout, TerminalView, Theme};

const HELP: &str = "\
Commands:
  /new [title]         start a new conversation
  /list                list conversations
  /switch <n|id>       switch to a conversation
  /history             print the current conversation
  /rename <title>      rename the current conversation
  /pin, /unpin         pin or unpin the current conversation
  /delete [n|id]       delete a conversation (default: current)
  /page <n>            show page n of the last table
  /export [path]       export the current conversation to Markdown
  /settings [key val]  show or change a setting
  /clear               delete every conversation
  /help                show this help
  /quit                leave
Anything else is sent as a question. Ctrl-C stops a running answer.";

#[derive(Debug, Clone, PartialEq, Eq)]
enum SlashCommand {
    New(Option<String>),
    List,
    Switch(String),
    History,
    Rename(String),
    Pin(bool),
    Delete(Option<String>),
    Page(usize),
    Export(Option<String>),
    Settings(Option<(String, Option<String>)>),
    Clear,
    Help,
    Quit,
}

impl SlashCommand {
    /// Parse the text after the leading `/`.
    fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (name, rest) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (input, ""),
        };
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        let command = match name.to_ascii_lowercase().as_str() {
            "new" => Self::New(arg),
            "list" | "ls" => Self::List,
            "switch" | "open" => {
                Self::Switch(arg.ok_or_else(|| anyhow!("Usage: /switch <n|id>"))?)
            }
            "history" | "show" => Self::History,
            "rename" => Self::Rename(arg.ok_or_else(|| anyhow!("Usage: /rename <title>"))?),
            "pin" => Self::Pin(true),
            "unpin" => Self::Pin(false),
            "delete" | "rm" => Self::Delete(arg),
            "page" => {
                let page = rest
                    .parse()
                    .map_err(|_| anyhow!("Usage: /page <number>"))?;
                Self::Page(page)
            }
            "export" => Self::Export(arg),
            "settings" | "set" => Self::Settings(arg.map(|a| {
                match a.split_once(char::is_whitespace) {
                    Some((key, value)) => (key.to_string(), Some(value.trim().to_string())),
                    None => (a, None),
                }
            })),
            "clear" => Self::Clear,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => bail!("Unknown command: /{} (try /help)", other),
        };
        Ok(command)
    }
}

/// Find a conversation by exact id, 1-based list position, or unique id prefix.
fn resolve_conversation(conversations: &[Conversation], key: &str) -> Option<String> {
    if let Some(c) = conversations.iter().find(|c| c.id == key) {
        return Some(c.id.clone());
    }
    if let Ok(n) = key.parse::<usize>() {
        if n >= 1 && n <= conversations.len() {
            return Some(conversations[n - 1].id.clone());
        }
    }
    let mut matches = conversations.iter().filter(|c| c.id.starts_with(key));
    match (matches.next(), matches.next()) {
        (Some(c), None) => Some(c.id.clone()),
        _ => None,
    }
}

pub struct App {
    db: Database,
    manager: ConversationManager,
    pipeline: ChatPipeline,
    theme: Theme,
}

impl App {
    pub async fn init(config: &Config) -> Result<Self> {
        let db = Database::open(&config.db_path).await?;
        let store: Arc<dyn ConversationStore> = match config.storage {
            StorageMode::Local => Arc::new(LocalStore::new(db.clone())),
            StorageMode::Remote => Arc::new(RemoteStore::new(
                config.api_url.clone(),
                config.request_timeout,
            )?),
        };
        let backend = Arc::new(ChatClient::new(&config.api_url, config.request_timeout)?);
        let settings = SettingsService::load(&db).await;

        tracing::info!(
            "Using {:?} storage, backend {}, database {}",
            config.storage,
            backend.chat_url(),
            config.db_path.display()
        );

        Ok(Self {
            db,
            manager: ConversationManager::new(store),
            pipeline: ChatPipeline::new(backend, settings),
            theme: Theme::detect(),
        })
    }

    fn table_layout(&self, page: usize) -> TableLayout {
        let settings = self.pipeline.settings();
        TableLayout {
            page,
            page_size: settings.table_page_size,
            group_by_date: settings.group_tables_by_date,
        }
    }

    async fn open(&mut self, key: &str) -> Result<()> {
        // Unmatched keys are tried as full ids against the store.
        let id = resolve_conversation(self.manager.conversations(), key)
            .unwrap_or_else(|| key.to_string());
        self.manager.switch_conversation(&id).await
    }

    fn resolve(&self, key: &str) -> Result<String> {
        resolve_conversation(self.manager.conversations(), key)
            .ok_or_else(|| anyhow!("No conversation matches {:?}", key))
    }

    pub async fn run(mut self, command: Command) -> Result<()> {
        // Interactive chat resumes the most recent conversation; one-shot
        // commands start with nothing selected.
        match &command {
            Command::Chat { .. } => self.manager.load().await,
            _ => self.manager.refresh().await,
        }

        match command {
            Command::Chat { conversation } => {
                if let Some(key) = conversation {
                    self.open(&key).await?;
                }
                self.repl().await
            }
            Command::Ask {
                question,
                conversation,
            } => {
                if let Some(key) = conversation {
                    self.open(&key).await?;
                }
                self.ask(&question.join(" ")).await
            }
            Command::List => {
                self.print_list();
                Ok(())
            }
            Command::Show { id } => {
                self.open(&id).await?;
                self.print_history();
                Ok(())
            }
            Command::New { title } => {
                let title = title.join(" ");
                let conversation = self
                    .manager
                    .create_conversation((!title.is_empty()).then_some(title.as_str()))
                    .await;
                println!("{}", conversation.id);
                Ok(())
            }
            Command::Rename { id, title } => {
                let id = self.resolve(&id)?;
                let patch = ConversationPatch {
                    title: Some(title.join(" ")),
                    ..Default::default()
                };
                self.manager.update_conversation(&id, patch).await
            }
            Command::Pin { id } => self.set_pinned(&id, true).await,
            Command::Unpin { id } => self.set_pinned(&id, false).await,
            Command::Delete { id } => {
                let id = self.resolve(&id)?;
                self.manager.delete_conversation(&id).await
            }
            Command::Clear => {
                self.manager.clear_all().await;
                Ok(())
            }
            Command::Export { id, output } => {
                self.open(&id).await?;
                let markdown = self.export_current()?;
                match output {
                    Some(path) => std::fs::write(&path, markdown)
                        .with_context(|| format!("Failed to write {}", path.display())),
                    None => {
                        print!("{}", markdown);
                        Ok(())
                    }
                }
            }
            Command::Settings { key, value } => {
                self.settings(key.map(|k| (k, value))).await
            }
        }
    }

    async fn set_pinned(&mut self, key: &str, pinned: bool) -> Result<()> {
        let id = self.resolve(key)?;
        let patch = ConversationPatch {
            is_pinned: Some(pinned),
            ..Default::default()
        };
        self.manager.update_conversation(&id, patch).await
    }

    fn export_current(&self) -> Result<String> {
        let conversation = self
            .manager
            .current()
            .ok_or_else(|| anyhow!("No conversation selected"))?;
        Ok(export_to_markdown(conversation, self.manager.messages()))
    }

    fn print_list(&self) {
        println!(
            "{}",
            render_conversation_list(
                self.manager.conversations(),
                self.manager.current_id(),
                &Utc::now(),
                self.theme
            )
        );
    }

    fn print_history(&self) {
        let layout = self.table_layout(1);
        let rendered: Vec<String> = self
            .manager
            .messages()
            .iter()
            .map(|m| render_message(m, layout, self.theme))
            .collect();
        if rendered.is_empty() {
            println!("{}", self.theme.dim("(no messages)"));
        } else {
            println!("{}", rendered.join("\n\n"));
        }
    }

    async fn settings(&mut self, change: Option<(String, Option<String>)>) -> Result<()> {
        let mut settings: AppSettings = self.pipeline.settings().clone();
        match change {
            None => {
                for (key, value) in settings.entries() {
                    println!("{} = {}", key, value);
                }
            }
            Some((key, None)) => {
                let (_, value) = settings
                    .entries()
                    .into_iter()
                    .find(|(k, _)| *k == key)
                    .ok_or_else(|| anyhow!("Unknown setting: {}", key))?;
                println!("{}", value);
            }
            Some((key, Some(value))) => {
                settings.set(&key, &value)?;
                SettingsService::save(&self.db, &settings).await?;
                self.pipeline.set_settings(settings);
            }
        }
        Ok(())
    }

    /// Send one question and stream the answer to stdout. Ctrl-C stops the
    /// answer without leaving the program.
    async fn ask(&mut self, text: &str) -> Result<()> {
        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let mut view = TerminalView::new(std::io::stdout(), self.theme, self.table_layout(1));
        let result = self
            .pipeline
            .send_message(&mut self.manager, text, cancel, |update| {
                if let Err(e) = view.handle(update) {
                    tracing::warn!("Failed to write output: {}", e);
                }
            })
            .await;
        watcher.abort();
        result.map(|_| ())
    }

    fn prompt(&self) -> Result<()> {
        let title = self
            .manager
            .current()
            .map(|c| c.title.clone())
            .unwrap_or_else(|| "new chat".to_string());
        let mut stdout = std::io::stdout();
        write!(stdout, "{} ", self.theme.cyan(&format!("[{}]>", title)))?;
        stdout.flush()?;
        Ok(())
    }

    async fn repl(&mut self) -> Result<()> {
        println!("{}", self.theme.dim("Ask a question, or /help for commands."));
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            self.prompt()?;
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            };
            let Some(line) = line else {
                println!();
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let outcome = match line.strip_prefix('/') {
                Some(command) => match SlashCommand::parse(command) {
                    Ok(SlashCommand::Quit) => break,
                    Ok(command) => self.slash_command(command).await,
                    Err(e) => Err(e),
                },
                None => self.ask(line).await,
            };
            if let Err(e) = outcome {
                eprintln!("{}", self.theme.red(&format!("Error: {}", e)));
            }
        }
        Ok(())
    }

    async fn slash_command(&mut self, command: SlashCommand) -> Result<()> {
        match command {
            SlashCommand::New(title) => {
                let conversation = self.manager.create_conversation(title.as_deref()).await;
                println!("Started {:?}", conversation.title);
            }
            SlashCommand::List => {
                self.manager.refresh().await;
                self.print_list();
            }
            SlashCommand::Switch(key) => {
                self.open(&key).await?;
                self.print_history();
            }
            SlashCommand::History => self.print_history(),
            SlashCommand::Rename(title) => {
                let id = self.current_id()?;
                let patch = ConversationPatch {
                    title: Some(title),
                    ..Default::default()
                };
                self.manager.update_conversation(&id, patch).await?;
            }
            SlashCommand::Pin(pinned) => {
                let id = self.current_id()?;
                self.set_pinned(&id, pinned).await?;
            }
            SlashCommand::Delete(key) => {
                let id = match key {
                    Some(key) => self.resolve(&key)?,
                    None => self.current_id()?,
                };
                self.manager.delete_conversation(&id).await?;
                match self.manager.current() {
                    Some(c) => println!("Deleted. Now in {:?}", c.title),
                    None => println!("Deleted."),
                }
            }
            SlashCommand::Page(page) => {
                let table = self
                    .manager
                    .messages()
                    .iter()
                    .rev()
                    .find_map(|m| m.table.as_ref())
                    .ok_or_else(|| anyhow!("No table in this conversation"))?;
                println!("{}", render_table(table, self.table_layout(page), self.theme));
            }
            SlashCommand::Export(path) => {
                let markdown = self.export_current()?;
                match path {
                    Some(path) => {
                        std::fs::write(&path, markdown)
                            .with_context(|| format!("Failed to write {}", path))?;
                        println!("Exported to {}", path);
                    }
                    None => print!("{}", markdown),
                }
            }
            SlashCommand::Settings(change) => self.settings(change).await?,
            SlashCommand::Clear => {
                self.manager.clear_all().await;
                println!("All conversations deleted.");
            }
            SlashCommand::Help => println!("{}", HELP),
            SlashCommand::Quit => {}
        }
        Ok(())
    }

    fn current_id(&self) -> Result<String> {
        self.manager
            .current_id()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("No conversation selected"))
    }
}
