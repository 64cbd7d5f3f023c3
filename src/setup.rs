// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use inquire::validator::Validation;
use inquire::{Confirm, Password, Text};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::catalog::{CatalogClient, Session};
use crate::config::Config;
use crate::error::NimbusError;
use crate::storage::SessionStore;

/// Credentials supplied on the command line; missing ones are prompted for.
#[derive(Debug, Clone, Default)]
pub struct LoginArgs {
    pub server_code: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn validate_api_base(input: &str) -> Validation {
    if input.is_empty() {
        Validation::Invalid("Backend URL is required".into())
    } else if !input.starts_with("http://") && !input.starts_with("https://") {
        Validation::Invalid("URL must start with http:// or https://".into())
    } else {
        Validation::Valid
    }
}

fn prompt_required(label: &str, preset: Option<String>) -> Result<String> {
    if let Some(value) = preset.filter(|v| !v.is_empty()) {
        return Ok(value);
    }

    let field = label.trim_end_matches(':').to_string();
    let value = Text::new(label)
        .with_validator(move |input: &str| {
            if input.trim().is_empty() {
                Ok(Validation::Invalid(format!("{} is required", field).into()))
            } else {
                Ok(Validation::Valid)
            }
        })
        .prompt()?;
    Ok(value.trim().to_string())
}

async fn prompt_backend(config: &mut Config, config_path: &Path) -> Result<()> {
    println!("\n🚀 Welcome to Nimbus! Let's connect to your TV service.\n");

    let api_base = Text::new("Backend URL:")
        .with_help_message("e.g., https://tv.example.com")
        .with_validator(|input: &str| Ok(validate_api_base(input)))
        .prompt()?;

    config.backend.api_base = api_base.trim_end_matches('/').to_string();
    save_config(config, config_path)
}

/// Prompts for anything missing, verifies the credentials and stores the session.
pub async fn interactive_login(
    config: &mut Config,
    config_path: &Path,
    args: LoginArgs,
) -> Result<Session> {
    if config.needs_setup() {
        prompt_backend(config, config_path).await?;
    }

    println!("\n📝 Sign in");
    println!("━━━━━━━━━");

    let server_code = prompt_required("Server code:", args.server_code)?;
    let username = prompt_required("Username:", args.username)?;
    let password = match args.password.filter(|p| !p.is_empty()) {
        Some(password) => password,
        None => Password::new("Password:")
            .without_confirmation()
            .prompt()?,
    };

    let session = Session {
        server_code,
        username,
        password,
    };

    println!("\nVerifying credentials...");
    match verify_session(config, &session).await {
        Ok(()) => println!("✅ Signed in as {}", session.username),
        Err(e @ (NimbusError::InvalidCredentials | NimbusError::RateLimited)) => {
            anyhow::bail!("{}", e);
        }
        Err(e) => {
            println!("⚠️  Warning: Could not verify credentials: {}", e);
            let keep = Confirm::new("Save the session anyway?")
                .with_default(false)
                .prompt()?;
            if !keep {
                anyhow::bail!("Login cancelled");
            }
        }
    }

    let store = SessionStore::open_default()?;
    store.save(&session).context("Failed to store session")?;
    debug!("Session stored for {}", session.scope_key());

    Ok(session)
}

async fn verify_session(config: &Config, session: &Session) -> Result<(), NimbusError> {
    let client = CatalogClient::new(&config.backend, session.clone())?;
    match tokio::time::timeout(Duration::from_secs(10), client.authenticate()).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => Err(NimbusError::Network("Connection timeout".to_string())),
    }
}

fn save_config(config: &Config, config_path: &Path) -> Result<()> {
    Config::ensure_config_dir()?;

    if config_path.exists() {
        let backup_path = config_path.with_extension("toml.backup");
        std::fs::copy(config_path, &backup_path)?;
        println!(
            "ℹ️  Existing config backed up to: {}",
            backup_path.display()
        );
    }

    config.save(config_path)?;
    println!("💾 Configuration saved to: {}", config_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_validation() {
        assert!(matches!(validate_api_base(""), Validation::Invalid(_)));
        assert!(matches!(
            validate_api_base("tv.example.com"),
            Validation::Invalid(_)
        ));
        assert!(matches!(
            validate_api_base("https://tv.example.com"),
            Validation::Valid
        ));
    }

    #[test]
    fn test_preset_values_skip_prompt() {
        let value = prompt_required("Username:", Some("alice".to_string())).unwrap();
        assert_eq!(value, "alice");
    }
}
