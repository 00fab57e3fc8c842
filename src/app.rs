//! Command execution context.
//!
//! `App` carries what every handler needs: where the config lives, how to
//! reach the providers, and where output goes. The one-shot CLI and
//! the shell build one `App` and pass it to the same handlers.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crate::config::{Config, ConfigError};
use crate::provider::langfuse::{LangfuseClient, TraceProvider};
use crate::provider::{AiobsClient, Provider, SessionProvider};

/// Shared state for command handlers.
pub struct App {
    config_path: PathBuf,
    provider: Option<Rc<dyn SessionProvider>>,
    traces: Option<Rc<dyn TraceProvider>>,
    out: Box<dyn Write>,
}

impl App {
    /// Creates an app using the default config location and stdout.
    pub fn new() -> Result<Self> {
        let config_path = Config::config_path()?;
        Ok(Self::with_output(config_path, Box::new(std::io::stdout())))
    }

    /// Creates an app with an explicit config path and output sink.
    pub fn with_output(config_path: PathBuf, out: Box<dyn Write>) -> Self {
        Self {
            config_path,
            provider: None,
            traces: None,
            out,
        }
    }

    /// Uses the given provider instead of building an HTTP client from the
    /// config.
    pub fn with_provider(mut self, provider: Rc<dyn SessionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Uses the given Langfuse provider instead of building a client from
    /// the config.
    pub fn with_trace_provider(mut self, traces: Rc<dyn TraceProvider>) -> Self {
        self.traces = Some(traces);
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Loads the config file fresh, so `config set` in the shell takes
    /// effect on the next command.
    pub fn config(&self) -> Result<Config, ConfigError> {
        Config::load_from(&self.config_path)
    }

    /// The configured default provider, which routes the top-level
    /// `sessions` and `traces` commands.
    pub fn default_provider(&self) -> Result<Provider, ConfigError> {
        self.config()?.provider()
    }

    /// Returns the AIOBS provider, building an `AiobsClient` from the
    /// current config when none was injected.
    pub fn session_provider(&self) -> Result<Rc<dyn SessionProvider>> {
        if let Some(provider) = &self.provider {
            return Ok(Rc::clone(provider));
        }

        let config = self.config()?;
        let api_key = config.api_key()?;
        let client = AiobsClient::new(
            &config.aiobs.endpoint,
            &api_key,
            Duration::from_secs(config.aiobs.timeout_secs),
        )
        .context("Failed to create AIOBS client")?;

        tracing::debug!("Using AIOBS endpoint {}", client.endpoint());
        Ok(Rc::new(client))
    }

    /// Returns the Langfuse provider, building a `LangfuseClient` from the
    /// current config when none was injected.
    pub fn trace_provider(&self) -> Result<Rc<dyn TraceProvider>> {
        if let Some(traces) = &self.traces {
            return Ok(Rc::clone(traces));
        }

        let config = self.config()?;
        let creds = config.langfuse_credentials()?;
        let client = LangfuseClient::new(
            &creds.host,
            &creds.public_key,
            &creds.secret_key,
            Duration::from_secs(config.langfuse.timeout_secs),
        )
        .context("Failed to create Langfuse client")?;

        tracing::debug!("Using Langfuse host {}", client.host());
        Ok(Rc::new(client))
    }

    /// Output sink for command results.
    pub fn out(&mut self) -> &mut dyn Write {
        self.out.as_mut()
    }
}
