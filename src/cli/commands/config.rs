//! Config command - manage configuration.
//!
//! Reads and writes `~/.shepherd/config.yaml`. The file is loaded fresh on
//! each call so changes made from the shell apply to the next command.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::io::{self, IsTerminal};

use crate::app::App;
use crate::config::{mask_secret, Config, ConfigKey};
use crate::provider::langfuse::{PUBLIC_KEY_ENV, SECRET_KEY_ENV};
use crate::provider::{Provider, API_KEY_ENV};

/// Arguments for the config command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    shepherd config init                          Prompt for API key and endpoint\n    \
    shepherd config init --api-key <KEY>          Non-interactive setup\n    \
    shepherd config init --provider langfuse      Prompt for Langfuse keys\n    \
    shepherd config show                          Show current configuration\n    \
    shepherd config get aiobs.endpoint            Read one value\n    \
    shepherd config set cli.output_format json    Change a value")]
pub struct Args {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Create or update the config file
    Init(InitArgs),
    /// Show current configuration
    Show,
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
}

/// Arguments for `config init`.
#[derive(clap::Args, Debug, Default)]
pub struct InitArgs {
    /// Default provider: aiobs or langfuse
    #[arg(long)]
    pub provider: Option<String>,

    /// AIOBS API key (prompted with hidden input when omitted)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// AIOBS API endpoint
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Langfuse public key (prompted when omitted and the provider is langfuse)
    #[arg(long, value_name = "KEY")]
    pub public_key: Option<String>,

    /// Langfuse secret key (prompted with hidden input when omitted)
    #[arg(long, value_name = "KEY")]
    pub secret_key: Option<String>,

    /// Langfuse host
    #[arg(long, value_name = "URL")]
    pub host: Option<String>,
}

/// Executes the config command.
pub fn run(app: &mut App, args: Args) -> Result<()> {
    match args.command {
        ConfigCommand::Init(args) => init(app, &args),
        ConfigCommand::Show => show(app),
        ConfigCommand::Get { key } => get(app, &key),
        ConfigCommand::Set { key, value } => set(app, &key, &value),
    }
}

/// Writes a config file with the selected provider's credentials.
///
/// Credentials for the selected provider are prompted for when not passed
/// as flags. Flags for the other provider are stored as given.
pub fn init(app: &mut App, args: &InitArgs) -> Result<()> {
    let mut config = app.config()?;

    if let Some(provider) = &args.provider {
        config.set("default_provider", provider)?;
    }
    let provider = config.provider()?;

    let flags = [
        ("aiobs.endpoint", &args.endpoint),
        ("langfuse.host", &args.host),
        ("aiobs.api_key", &args.api_key),
        ("langfuse.public_key", &args.public_key),
        ("langfuse.secret_key", &args.secret_key),
    ];
    for (key, value) in flags {
        if let Some(value) = value {
            config.set(key, value)?;
        }
    }

    match provider {
        Provider::Aiobs if args.api_key.is_none() => {
            let key = prompt(app, "AIOBS API key", "--api-key", true)?;
            config.set("aiobs.api_key", &key)?;
        }
        Provider::Langfuse => {
            if args.public_key.is_none() {
                let key = prompt(app, "Langfuse public key", "--public-key", false)?;
                config.set("langfuse.public_key", &key)?;
            }
            if args.secret_key.is_none() {
                let key = prompt(app, "Langfuse secret key", "--secret-key", true)?;
                config.set("langfuse.secret_key", &key)?;
            }
        }
        Provider::Aiobs => {}
    }

    let path = app.config_path().to_path_buf();
    config
        .save_to(&path)
        .context("Failed to save configuration")?;

    let out = app.out();
    writeln!(out, "{}", "Configuration saved.".green())?;
    writeln!(out, "  {}  {}", "Config:  ".dimmed(), path.display())?;
    writeln!(out, "  {}  {}", "Provider:".dimmed(), provider)?;
    match provider {
        Provider::Aiobs => {
            let key = config.aiobs.api_key.as_deref().unwrap_or_default();
            writeln!(out, "  {}  {}", "Endpoint:".dimmed(), config.aiobs.endpoint)?;
            writeln!(out, "  {}  {}", "API key: ".dimmed(), mask_secret(key))?;
        }
        Provider::Langfuse => {
            let public = config.langfuse.public_key.as_deref().unwrap_or_default();
            let secret = config.langfuse.secret_key.as_deref().unwrap_or_default();
            writeln!(out, "  {}  {}", "Host:    ".dimmed(), config.langfuse.host)?;
            writeln!(out, "  {}  {}", "Public:  ".dimmed(), public)?;
            writeln!(out, "  {}  {}", "Secret:  ".dimmed(), mask_secret(secret))?;
        }
    }
    Ok(())
}

/// Prompts for one credential. Hidden input for secrets.
fn prompt(app: &mut App, label: &str, flag: &str, hidden: bool) -> Result<String> {
    if !io::stdin().is_terminal() {
        bail!("No {label} given. Pass {flag} or run 'shepherd config init' in a terminal.");
    }

    let out = app.out();
    if hidden {
        write!(out, "{label} (hidden input): ")?;
    } else {
        write!(out, "{label}: ")?;
    }
    out.flush()?;

    let value = if hidden {
        rpassword::read_password().with_context(|| format!("Failed to read {label}"))?
    } else {
        let mut line = String::new();
        io::stdin()
            .read_line(&mut line)
            .with_context(|| format!("Failed to read {label}"))?;
        line
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        bail!("No {label} entered.");
    }
    Ok(value)
}

/// Prints the effective configuration with secrets masked.
pub fn show(app: &mut App) -> Result<()> {
    let config = app.config()?;
    let path = app.config_path().to_path_buf();
    let from_env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    let env_key = from_env(API_KEY_ENV);
    let env_public = from_env(PUBLIC_KEY_ENV);
    let env_secret = from_env(SECRET_KEY_ENV);

    let out = app.out();
    writeln!(out, "{}", "Shepherd Configuration".bold())?;
    writeln!(out)?;
    writeln!(out, "  {}  {}", "Config file:".dimmed(), path.display())?;
    writeln!(out, "  {}  {}", "Provider:   ".dimmed(), config.default_provider)?;
    writeln!(out, "  {}  {}", "Output:     ".dimmed(), config.cli.output_format)?;
    writeln!(out)?;
    writeln!(out, "{}", "aiobs:".bold())?;
    writeln!(out, "  {}  {}", "Endpoint:   ".dimmed(), config.aiobs.endpoint)?;
    writeln!(out, "  {}  {}s", "Timeout:    ".dimmed(), config.aiobs.timeout_secs)?;

    let key_display = match (&env_key, &config.aiobs.api_key) {
        (Some(key), _) => format!("{} (from {API_KEY_ENV})", mask_secret(key)),
        (None, Some(key)) => mask_secret(key),
        (None, None) => "(not set)".yellow().to_string(),
    };
    writeln!(out, "  {}  {}", "API key:    ".dimmed(), key_display)?;

    writeln!(out)?;
    writeln!(out, "{}", "langfuse:".bold())?;
    let host = config
        .get("langfuse.host")
        .unwrap_or_else(|_| config.langfuse.host.clone());
    writeln!(out, "  {}  {}", "Host:       ".dimmed(), host)?;
    let public_display = match (&env_public, &config.langfuse.public_key) {
        (Some(key), _) => format!("{key} (from {PUBLIC_KEY_ENV})"),
        (None, Some(key)) => key.clone(),
        (None, None) => "(not set)".yellow().to_string(),
    };
    writeln!(out, "  {}  {}", "Public key: ".dimmed(), public_display)?;
    let secret_display = match (&env_secret, &config.langfuse.secret_key) {
        (Some(key), _) => format!("{} (from {SECRET_KEY_ENV})", mask_secret(key)),
        (None, Some(key)) => mask_secret(key),
        (None, None) => "(not set)".yellow().to_string(),
    };
    writeln!(out, "  {}  {}", "Secret key: ".dimmed(), secret_display)?;
    Ok(())
}

/// Prints one configuration value.
pub fn get(app: &mut App, key: &str) -> Result<()> {
    let value = app.config()?.get(key)?;
    writeln!(app.out(), "{value}")?;
    Ok(())
}

/// Validates and saves one configuration value.
pub fn set(app: &mut App, key: &str, value: &str) -> Result<()> {
    let mut config: Config = app.config()?;
    let key = config.set(key, value)?;
    config
        .save_to(app.config_path())
        .context("Failed to save configuration")?;

    tracing::info!("Set {key}");
    writeln!(app.out(), "{} {key} = {}", "Set".green(), display_value(key, value))?;
    Ok(())
}

fn display_value(key: ConfigKey, value: &str) -> String {
    if key.is_secret() {
        mask_secret(value.trim())
    } else {
        value.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    fn app_in(dir: &std::path::Path) -> (App, SharedBuffer) {
        colored::control::set_override(false);
        let buffer = SharedBuffer::default();
        let app = App::with_output(dir.join("config.yaml"), Box::new(buffer.clone()));
        (app, buffer)
    }

    #[test]
    fn test_set_then_get() {
        let dir = tempdir().unwrap();
        let (mut app, buffer) = app_in(dir.path());

        set(&mut app, "endpoint", "http://localhost:9000").unwrap();
        get(&mut app, "aiobs.endpoint").unwrap();

        let text = buffer.text();
        assert!(text.contains("Set aiobs.endpoint = http://localhost:9000"));
        assert!(text.ends_with("http://localhost:9000\n"));
    }

    #[test]
    fn test_get_missing_key_fails() {
        let dir = tempdir().unwrap();
        let (mut app, _) = app_in(dir.path());
        let err = get(&mut app, "missing_key").unwrap_err();
        assert!(err.to_string().contains("Unknown config key 'missing_key'"));
    }

    #[test]
    fn test_init_with_flags_writes_file() {
        let dir = tempdir().unwrap();
        let (mut app, buffer) = app_in(dir.path());

        let args = InitArgs {
            api_key: Some("sk-test-abcd".to_string()),
            endpoint: Some("http://localhost:9000/".to_string()),
            ..Default::default()
        };
        init(&mut app, &args).unwrap();

        let config = Config::load_from(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config.aiobs.api_key.as_deref(), Some("sk-test-abcd"));
        assert_eq!(config.aiobs.endpoint, "http://localhost:9000");
        assert!(buffer.text().contains("...abcd"));
        assert!(!buffer.text().contains("sk-test-abcd"));
    }

    #[test]
    fn test_init_langfuse_with_flags() {
        let dir = tempdir().unwrap();
        let (mut app, buffer) = app_in(dir.path());

        let args = InitArgs {
            provider: Some("langfuse".to_string()),
            public_key: Some("pk-lf-abc".to_string()),
            secret_key: Some("sk-lf-secret-7777".to_string()),
            host: Some("http://localhost:3000".to_string()),
            ..Default::default()
        };
        init(&mut app, &args).unwrap();

        let config = Config::load_from(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config.default_provider, "langfuse");
        assert_eq!(config.langfuse.public_key.as_deref(), Some("pk-lf-abc"));
        assert_eq!(config.langfuse.secret_key.as_deref(), Some("sk-lf-secret-7777"));
        assert_eq!(config.langfuse.host, "http://localhost:3000");
        assert!(config.aiobs.api_key.is_none());

        let text = buffer.text();
        assert!(text.contains("...7777"));
        assert!(!text.contains("sk-lf-secret-7777"));
    }

    #[test]
    fn test_init_rejects_unknown_provider() {
        let dir = tempdir().unwrap();
        let (mut app, _) = app_in(dir.path());
        let args = InitArgs {
            provider: Some("otel".to_string()),
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        assert!(init(&mut app, &args).is_err());
        assert!(!dir.path().join("config.yaml").exists());
    }

    #[test]
    fn test_set_secret_is_masked() {
        let dir = tempdir().unwrap();
        let (mut app, buffer) = app_in(dir.path());
        set(&mut app, "secret_key", "sk-lf-hidden-5555").unwrap();

        let text = buffer.text();
        assert!(text.contains("Set langfuse.secret_key = ...5555"));
        assert!(!text.contains("sk-lf-hidden-5555"));
    }

    #[test]
    fn test_show_masks_key() {
        let dir = tempdir().unwrap();
        let (mut app, buffer) = app_in(dir.path());
        set(&mut app, "api_key", "sk-secret-9876").unwrap();

        show(&mut app).unwrap();
        let text = buffer.text();
        assert!(text.contains("Provider"));
        assert!(text.contains("aiobs"));
        assert!(!text.contains("sk-secret-9876"));
    }

    #[test]
    fn test_display_value_masks_secrets() {
        assert_eq!(display_value(ConfigKey::ApiKey, "sk-123456"), "...3456");
        assert_eq!(display_value(ConfigKey::LangfuseSecretKey, "sk-lf-98765"), "...8765");
        assert_eq!(display_value(ConfigKey::Endpoint, " http://x "), "http://x");
    }
}
