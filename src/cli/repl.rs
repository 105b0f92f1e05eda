//! REPL implementation
//!
//! This module implements the interactive loop for SQL Chat: the
//! configuration prompts, the chat input and the live display of the
//! agent's progress.

use crate::agent::{AgentEvent, ProgressSink};
use crate::cli::command_menu;
use crate::cli::commands::{self, format_error, Command, CommandType, COMMANDS};
use crate::config::{ConfigurationForm, DatabaseMode, RemoteConnection, API_KEY_ENV};
use crate::error::{Result, SqlChatError};
use crate::session::{ChatMessage, ChatRole, InteractionLoop, SessionFactory};
use crossterm::style::Stylize;
use rustyline::completion::Completer;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::Context;
use rustyline::Helper;
use rustyline::{ColorMode, CompletionType, Config, Editor};
use std::borrow::Cow;
use std::io::Write;
use std::sync::Arc;

/// Line editor helper: completes slash commands and masks secrets
#[derive(Default)]
struct SqlChatHelper {
    masking: bool,
}

impl Completer for SqlChatHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &Context<'_>,
    ) -> std::result::Result<(usize, Vec<String>), ReadlineError> {
        if self.masking || !line.starts_with('/') {
            return Ok((0, vec![]));
        }

        let matches: Vec<String> = COMMANDS
            .iter()
            .map(|cmd| cmd.name)
            .filter(|name| name.starts_with(line))
            .map(|name| name.to_string())
            .collect();
        Ok((0, matches))
    }
}

impl Hinter for SqlChatHelper {
    type Hint = String;
}

impl Highlighter for SqlChatHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if self.masking {
            Cow::Owned("*".repeat(line.chars().count()))
        } else {
            Cow::Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        self.masking
    }
}

impl Validator for SqlChatHelper {}

impl Helper for SqlChatHelper {}

/// Prints agent progress to the terminal as it happens
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn on_event(&self, event: AgentEvent) {
        let mut out = std::io::stdout();
        let _ = match event {
            AgentEvent::StepStarted { iteration } if iteration > 0 => writeln!(out),
            AgentEvent::StepStarted { .. } => Ok(()),
            AgentEvent::Token(text) => write!(out, "{}", text.dark_grey()),
            AgentEvent::ToolStarted { tool, input } => {
                writeln!(out, "\n{} {}", format!("▶ {}", tool).cyan().bold(), input)
            }
            AgentEvent::ToolFinished { output, .. } => {
                writeln!(out, "{}", output.trim_end().dark_grey())
            }
            AgentEvent::InvalidOutput { observation } => {
                writeln!(out, "\n{}", observation.yellow())
            }
            AgentEvent::Finished { .. } => writeln!(out),
        };
        let _ = out.flush();
    }
}

/// SQL Chat REPL
pub struct Repl {
    /// The rustyline editor
    editor: Editor<SqlChatHelper, DefaultHistory>,
    /// Whether the REPL should continue running
    running: bool,
    /// Session state machine
    session: InteractionLoop,
    /// Last values entered at the configuration prompts
    form: ConfigurationForm,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(factory: Arc<dyn SessionFactory>) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .auto_add_history(false)
            .build();

        let mut editor = Editor::<SqlChatHelper, DefaultHistory>::with_config(config)
            .map_err(|e| {
                SqlChatError::Io(std::io::Error::other(format!(
                    "Failed to initialize editor: {}",
                    e
                )))
            })?;

        editor.set_helper(Some(SqlChatHelper::default()));
        editor.set_color_mode(ColorMode::Forced);

        Ok(Self {
            editor,
            running: true,
            session: InteractionLoop::new(factory),
            form: ConfigurationForm::default(),
        })
    }

    /// Run the REPL loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        while self.running {
            if !self.session.is_ready() {
                self.configure().await?;
                continue;
            }

            self.session.await_input();
            match self.editor.readline("> ") {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    if line == "/" {
                        self.run_command_menu().await;
                        continue;
                    }

                    let _ = self.editor.add_history_entry(line);
                    self.dispatch(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    self.running = false;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    self.running = false;
                }
            }
        }

        Ok(())
    }

    /// Collect the configuration and build the session
    ///
    /// Invalid input is reported and the caller asks again; end of input
    /// stops the REPL.
    async fn configure(&mut self) -> Result<()> {
        let mode = match command_menu::show_mode_selector(self.form.mode) {
            Ok(Some(mode)) => mode,
            Ok(None) => self.form.mode,
            Err(e) => {
                tracing::debug!(error = %e, "mode selector unavailable, falling back to prompt");
                match self.prompt_mode()? {
                    Some(mode) => mode,
                    None => return Ok(()),
                }
            }
        };
        self.form.mode = mode;
        println!("{} {}", "Database:".bold(), mode.label());

        if mode == DatabaseMode::Remote {
            let previous = self.form.remote.clone();
            let fields = [
                ("Database Host", previous.host, false),
                ("Database User", previous.user, false),
                ("Database Password", String::new(), true),
                ("Database Name", previous.database, false),
            ];
            let mut values = Vec::with_capacity(fields.len());
            for (label, initial, masked) in fields {
                match self.prompt(label, &initial, masked)? {
                    Some(value) => values.push(value),
                    None => return Ok(()),
                }
            }
            if let [host, user, password, database] = values.as_slice() {
                self.form.remote = RemoteConnection::new(host, user, password, database);
            }
        }

        let label = format!("Groq API Key (empty uses {})", API_KEY_ENV);
        let api_key = match self.prompt(&label, "", true)? {
            Some(key) => key,
            None => return Ok(()),
        };
        self.form.api_key = Some(api_key).filter(|key| !key.is_empty());

        println!("{}", "Connecting...".dark_grey());
        match self.session.configure(self.form.clone()).await {
            Ok(()) => {
                if let Some(database) = self.session.database() {
                    println!("{} {}", "✓ Connected to".green(), database);
                }
                println!("Type / for commands, /help for more information.");
                println!();
                self.render_log();
            }
            Err(e) => {
                println!("{}", format_error(&e).red());
                println!();
            }
        }
        Ok(())
    }

    /// Text fallback for the mode selector
    fn prompt_mode(&mut self) -> Result<Option<DatabaseMode>> {
        println!("Choose the database you want to chat with:");
        for (index, mode) in DatabaseMode::ALL.iter().enumerate() {
            println!("  {}. {}", index + 1, mode.label());
        }

        loop {
            let Some(answer) = self.prompt("Mode [1/2]", "1", false)? else {
                return Ok(None);
            };
            match answer.parse::<DatabaseMode>() {
                Ok(mode) => return Ok(Some(mode)),
                Err(e) => println!("{}", format_error(&e)),
            }
        }
    }

    /// Read one configuration value; `None` means the user wants out
    fn prompt(&mut self, label: &str, initial: &str, masked: bool) -> Result<Option<String>> {
        if let Some(helper) = self.editor.helper_mut() {
            helper.masking = masked;
        }

        let prompt = format!("{}: ", label);
        let line = self.editor.readline_with_initial(&prompt, (initial, ""));

        if let Some(helper) = self.editor.helper_mut() {
            helper.masking = false;
        }

        match line {
            Ok(value) => Ok(Some(value.trim().to_string())),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!();
                self.running = false;
                Ok(None)
            }
            Err(err) => Err(SqlChatError::Io(std::io::Error::other(err.to_string()))),
        }
    }

    /// Show the "/" menu and act on the choice
    async fn run_command_menu(&mut self) {
        match command_menu::show_command_menu() {
            Ok(Some(cmd)) if cmd == "/" => match self.editor.readline_with_initial("> ", ("/", "")) {
                Ok(input) => {
                    let input = input.trim();
                    if !input.is_empty() {
                        let _ = self.editor.add_history_entry(input);
                        self.dispatch(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => println!("^C"),
                Err(ReadlineError::Eof) => {
                    println!();
                    self.running = false;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    self.running = false;
                }
            },
            Ok(Some(cmd)) => self.dispatch(&cmd).await,
            Ok(None) => println!(),
            Err(e) => println!("Error showing menu: {}", e),
        }
    }

    /// Parse a line and act on it
    async fn dispatch(&mut self, line: &str) {
        match Command::parse(line) {
            Ok(command) => self.handle_command(command).await,
            Err(e) => println!("{}", format_error(&e)),
        }
    }

    /// Handle a command
    async fn handle_command(&mut self, command: Command) {
        match command.command_type {
            CommandType::Clear => {
                self.session.reset();
                println!("{}", "✓ Message history cleared".green());
                self.render_log();
            }
            CommandType::Config => {
                self.session.reconfigure();
            }
            CommandType::Help => {
                println!("{}", commands::help_text());
            }
            CommandType::Quit => {
                println!("Goodbye!");
                self.running = false;
            }
            CommandType::Query { text } => {
                print_message_line(ChatRole::User, &text);
                match self.session.submit(&text, &ConsoleSink).await {
                    Ok(reply) => print_message(reply),
                    Err(e) => println!("{}", format_error(&e)),
                }
            }
        }
    }

    /// Print every message in the log
    fn render_log(&self) {
        for message in self.session.log().messages() {
            print_message(message);
        }
    }

    /// Print welcome banner
    fn print_welcome(&self) {
        println!();
        println!("{}", " 🦜 SQL Chat: Chat with SQL DB".cyan().bold());
        println!(
            " Ask questions about your database in plain language. v{}",
            env!("CARGO_PKG_VERSION")
        );
        println!();
    }
}

fn print_message(message: &ChatMessage) {
    print_message_line(message.role(), message.content());
}

fn print_message_line(role: ChatRole, content: &str) {
    match role {
        ChatRole::Assistant => println!("{} {}", "assistant ›".green().bold(), content),
        ChatRole::User => println!("{} {}", "you ›".blue().bold(), content),
    }
}
