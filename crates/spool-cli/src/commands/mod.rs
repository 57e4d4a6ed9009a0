//! Command implementations and dispatch logic.
//!
//! Each command is an async function that takes a `CommandContext`, resolves
//! the layered configuration it needs and drives one registry operation.

use std::collections::HashMap;

use camino::Utf8PathBuf;
use spool_config::{ConfigLayering, ConfigLoader, ConfigSource, SpoolToml};
use spool_core::error::{SpoolError, SpoolResult};
use spool_registry::{RegistryClient, RegistryConfig, RetryConfig};
use tracing::{debug, info};

pub mod deprecate;
pub mod dist_tag;
pub mod publish;
pub mod star;
pub mod unpublish;
pub mod view;
pub mod whoami;


use crate::{output::OutputHandler, Cli, Commands, DistTagCommand};

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: Utf8PathBuf,
    pub output: OutputHandler,
    /// Global flags, applied above every other configuration layer
    overrides: HashMap<String, String>,
}

impl CommandContext {
    /// Create a new command context
    pub fn new(cli: &Cli) -> SpoolResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| SpoolError::io("Failed to get current directory".to_string(), e))?;
        let cwd = Utf8PathBuf::try_from(cwd).map_err(|e| SpoolError::ConfigValidation {
            field: "cwd".to_string(),
            reason: format!("Working directory is not valid UTF-8: {}", e),
        })?;

        let mut overrides = HashMap::new();
        if let Some(registry) = &cli.registry {
            overrides.insert("registry".to_string(), registry.clone());
        }
        if let Some(token) = &cli.token {
            overrides.insert("token".to_string(), token.clone());
        }
        if let Some(retries) = cli.retries {
            overrides.insert("retries".to_string(), retries.to_string());
        }

        Ok(Self {
            cwd,
            output: OutputHandler::new(cli.no_color),
            overrides,
        })
    }

    /// Resolve configuration from the global file, the project file, an
    /// optional package layer, the environment and command-line flags
    pub async fn load_config(
        &self,
        package_layer: Option<(SpoolToml, ConfigSource)>,
        local_overrides: HashMap<String, String>,
    ) -> SpoolResult<SpoolToml> {
        let loader = ConfigLoader::new(self.cwd.clone());
        let mut layering = ConfigLayering::new();

        if let Some((config, source)) = loader.load_global_config().await? {
            layering = layering.with_layer(config, source);
        }
        if let Some((config, source)) = loader.load_project_config().await? {
            layering = layering.with_layer(config, source);
        }
        if let Some((config, source)) = package_layer {
            layering = layering.with_layer(config, source);
        }

        let mut overrides = local_overrides;
        overrides.extend(self.overrides.clone());

        let layering = layering
            .with_env_overrides(ConfigLayering::collect_env_overrides())
            .with_cli_overrides(overrides);
        debug!(sources = ?layering.sources(), "resolving configuration");
        layering.resolve()
    }

    /// Configuration without a package layer or command-specific flags
    pub async fn default_config(&self) -> SpoolResult<SpoolToml> {
        self.load_config(None, HashMap::new()).await
    }
}

/// Client settings for a resolved configuration
pub fn registry_config(config: &SpoolToml) -> RegistryConfig {
    let retry = config.retry_settings();
    let mut registry = RegistryConfig {
        registry: config.registry_url().to_string(),
        retry: RetryConfig {
            max_retries: retry.retries,
            initial_delay: retry.min_timeout,
            max_delay: retry.max_timeout,
            multiplier: retry.factor,
        },
        timeout: config.timeout(),
        max_sockets: config.max_sockets(),
        always_auth: config.always_auth(),
        ..RegistryConfig::default()
    };
    if let Some(user_agent) = &config.network.user_agent {
        registry.user_agent = user_agent.clone();
    }
    registry
}

/// Build a registry client for a resolved configuration
pub fn client(config: &SpoolToml) -> SpoolResult<RegistryClient> {
    RegistryClient::with_config(registry_config(config))
}

/// Split `name@version` into its parts; the leading `@` of a scope is not a
/// separator
pub fn split_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.rfind('@') {
        Some(index) if index > 0 => {
            let (name, rest) = spec.split_at(index);
            (name, Some(&rest[1..]).filter(|v| !v.is_empty()))
        },
        _ => (spec, None),
    }
}

/// Split a spec that must carry a version or range
pub fn require_version<'a>(spec: &'a str, what: &str) -> SpoolResult<(&'a str, &'a str)> {
    match split_spec(spec) {
        (name, Some(version)) => Ok((name, version)),
        (name, None) => Err(SpoolError::InvalidRequest {
            message: format!("expected <name>@<{}>, got '{}'", what, name),
        }),
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> SpoolResult<()> {
    match command {
        Commands::Publish {
            tarball,
            dir,
            tag,
            access,
        } => {
            info!("Publishing {} from {}", tarball, dir);
            publish::execute(tarball, dir, tag, access, ctx).await
        },
        Commands::Unpublish { spec } => {
            info!("Unpublishing {}", spec);
            unpublish::execute(&spec, ctx).await
        },
        Commands::DistTag { action } => match action {
            DistTagCommand::Add { spec, tag } => dist_tag::add(&spec, &tag, ctx).await,
            DistTagCommand::Rm { name, tag } => dist_tag::remove(&name, &tag, ctx).await,
            DistTagCommand::Ls { name } => dist_tag::list(&name, ctx).await,
        },
        Commands::Star { name } => star::execute(&name, true, ctx).await,
        Commands::Unstar { name } => star::execute(&name, false, ctx).await,
        Commands::Deprecate { spec, message } => {
            info!("Deprecating {}", spec);
            deprecate::execute(&spec, &message, ctx).await
        },
        Commands::View { name, json } => view::execute(&name, json, ctx).await,
        Commands::Whoami => whoami::execute(ctx).await,
    }
}
