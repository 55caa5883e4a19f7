use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Result;
use tokio::fs;
use tracing::{debug, info};

use crate::cache::token_record::TokenRecord;
use crate::config::store::{MirrorConfig, MirrorFormat, DEFAULT_MIRROR_VARIABLE};
use crate::helpers::file::write_atomic;

/// Secondary, read-only copy of the current access token.
///
/// Written after every successful store save. Nothing in the agent reads it
/// back, so a stale or missing mirror never affects which token is served.
#[derive(Debug, Clone)]
pub struct TokenMirror {
    path: PathBuf,
    format: MirrorFormat,
    variable: String,
}

impl TokenMirror {
    pub fn new(config: &MirrorConfig) -> Self {
        Self {
            path: PathBuf::from(&config.path),
            format: config.format,
            variable: config
                .variable
                .clone()
                .unwrap_or_else(|| DEFAULT_MIRROR_VARIABLE.to_owned()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub async fn write(&self, record: &TokenRecord) -> Result<()> {
        let content = match self.format {
            MirrorFormat::Raw => record.access_token.clone(),
            MirrorFormat::Env => {
                let existing = match fs::read_to_string(&self.path).await {
                    Ok(content) => content,
                    Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
                    Err(err) => return Err(err.into()),
                };
                upsert_env_line(&existing, &self.variable, &record.access_token)
            }
        };

        write_atomic(&self.path, content.as_bytes()).await?;
        debug!("token mirror updated, path '{}'", self.path.display());
        Ok(())
    }

    /// Remove the mirrored token on shutdown.
    pub async fn cleanup(&self) -> Result<()> {
        match self.format {
            MirrorFormat::Raw => match fs::remove_file(&self.path).await {
                Ok(_) => info!("deleted token mirror: {}", self.path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("token mirror not found, nothing to delete: {}", self.path.display());
                }
                Err(e) => return Err(e.into()),
            },
            MirrorFormat::Env => {
                let existing = match fs::read_to_string(&self.path).await {
                    Ok(content) => content,
                    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
                    Err(e) => return Err(e.into()),
                };
                let kept = remove_env_line(&existing, &self.variable);
                write_atomic(&self.path, kept.as_bytes()).await?;
                info!("removed '{}' from token mirror {}", self.variable, self.path.display());
            }
        }
        Ok(())
    }
}

fn is_assignment_of(line: &str, variable: &str) -> bool {
    line.trim_start()
        .strip_prefix(variable)
        .map(|rest| rest.trim_start().starts_with('='))
        .unwrap_or(false)
}

fn upsert_env_line(existing: &str, variable: &str, value: &str) -> String {
    let assignment = format!("{variable}={value}");
    let mut replaced = false;
    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| {
            if is_assignment_of(line, variable) {
                replaced = true;
                assignment.clone()
            } else {
                line.to_owned()
            }
        })
        .collect();
    if !replaced {
        lines.push(assignment);
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn remove_env_line(existing: &str, variable: &str) -> String {
    let kept: Vec<&str> = existing
        .lines()
        .filter(|line| !is_assignment_of(line, variable))
        .collect();
    if kept.is_empty() {
        return String::new();
    }
    let mut out = kept.join("\n");
    out.push('\n');
    out
}
