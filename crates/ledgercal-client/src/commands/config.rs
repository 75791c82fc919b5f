//! Configuration commands.

use super::Context;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::secret;

/// Prints the effective configuration; literal tokens are masked.
pub fn dump(ctx: &Context) -> ClientResult<()> {
    println!("# config.toml ({})", ClientConfig::default_path().display());
    println!("{}", render(&ctx.config)?);
    Ok(())
}

pub fn render(config: &ClientConfig) -> ClientResult<String> {
    let mut shown = config.clone();
    if let Some(token) = &shown.google.access_token
        && !secret::is_reference(token)
    {
        shown.google.access_token = Some("********".to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| ClientError::config(format!("failed to serialize config: {e}")))
}

pub fn path(ctx: &Context) -> ClientResult<()> {
    println!("config:   {}", ClientConfig::default_path().display());
    println!("database: {}", ctx.database_path.display());
    println!("socket:   {}", ctx.socket_path.display());
    Ok(())
}
