use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::client::ApiClient;
use crate::methods::{Me, RawRequest, Versions};
use crate::settings::{Settings, SettingsResolver, SettingsSource};

/// Reads the INI file, or only the environment when the file is absent and
/// an env prefix is set.
pub fn resolve_settings(
    config_path: &Path,
    section: Option<&str>,
    env_prefix: &str,
) -> Result<Settings> {
    let resolver = SettingsResolver::new().with_env_prefix(env_prefix);
    let source = if config_path.exists() || env_prefix.is_empty() {
        SettingsSource::ini_file(config_path, section)
    } else {
        tracing::debug!(
            "{:?} not found, reading settings from {}_* variables",
            config_path,
            env_prefix
        );
        SettingsSource::Values(HashMap::new())
    };

    resolver
        .resolve(&source)
        .with_context(|| format!("Failed to load settings from {:?}", config_path))
}

pub fn handle_show_config(settings: &Settings, show_secrets: bool) -> Result<()> {
    let secret = if show_secrets {
        settings.client_secret.clone()
    } else {
        mask(&settings.client_secret)
    };

    println!("base_url:      {}", settings.base_url);
    println!("api_version:   {}", settings.api_version);
    println!("client_id:     {}", settings.client_id);
    println!("client_secret: {}", secret);
    println!("timeout:       {}s", settings.timeout.as_secs());
    println!("verify_ssl:    {}", settings.verify_ssl);
    Ok(())
}

pub async fn handle_login(client: &ApiClient, revoke: bool) -> Result<()> {
    let credential = client
        .session()
        .login()
        .await
        .context("Authentication failed")?;

    println!("✓ Authenticated against {}", client.settings().base_url);
    println!("  token type: {}", credential.token_type);
    println!("  expires at: {}", credential.expires_at);

    if revoke {
        client
            .session()
            .logout()
            .await
            .context("Failed to end the session")?;
        println!("✓ Session revoked");
    }
    Ok(())
}

pub async fn handle_versions(client: &ApiClient) -> Result<()> {
    let versions = client.call_ok(&Versions).await?;

    if let Some(release) = &versions.looker_release_version {
        println!("Release: {}", release);
    }
    for version in &versions.supported_versions {
        println!(
            "{:<8} {}",
            version.version.as_deref().unwrap_or("?"),
            version.status.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub async fn handle_me(
    client: &ApiClient,
    fields: Option<String>,
    as_user: Option<String>,
) -> Result<()> {
    if let Some(user_id) = &as_user {
        client
            .session()
            .login_as(user_id)
            .await
            .with_context(|| format!("Failed to act as user {}", user_id))?;
    }

    let user = client.call_ok(&Me { fields }).await;

    if as_user.is_some() {
        client
            .session()
            .logout()
            .await
            .context("Failed to end the sudo session")?;
    }
    println!("{}", serde_json::to_string_pretty(&user?)?);
    Ok(())
}

pub async fn handle_get(client: &ApiClient, path: String, query: Vec<String>) -> Result<()> {
    let mut request = RawRequest::get(path);
    request.query = parse_query(&query)?;

    let value = client.call_ok(&request).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub fn parse_query(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Query parameter {:?} is not key=value", pair))?;
            Ok((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}
