use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::model_client::{DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATIVE_MODEL};

/// Application configuration loaded from environment variables.
/// Fails at startup if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub data_folder: PathBuf,
    pub tmp_folder: PathBuf,
    pub github_owner: String,
    pub github_repo: String,
    pub branch_name: String,
    pub embedding_model: String,
    pub generative_model: String,
    pub corpus_languages: Vec<String>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let repository = var_or("TECHGUIDE_GITHUB", "alura/techguide");
        let (github_owner, github_repo) = parse_repository(&repository)
            .with_context(|| format!("TECHGUIDE_GITHUB must be 'owner/repo', got '{repository}'"))?;

        Ok(Config {
            api_key: require(&lookup, "API_KEY")?,
            data_folder: PathBuf::from(var_or("DATA_FOLDER", "data")),
            tmp_folder: PathBuf::from(var_or("TMP_FOLDER", "tmp")),
            github_owner,
            github_repo,
            branch_name: var_or("BRANCH_NAME", "main"),
            embedding_model: var_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            generative_model: var_or("GENERATIVE_MODEL", DEFAULT_GENERATIVE_MODEL),
            corpus_languages: parse_languages(&var_or("CORPUS_LANGUAGES", "pt_BR"))
                .context("CORPUS_LANGUAGES must name at least one language")?,
            rust_log: var_or("RUST_LOG", "info"),
        })
    }

    pub fn techguide_github(&self) -> String {
        format!("{}/{}", self.github_owner, self.github_repo)
    }

    pub fn cards_file(&self) -> PathBuf {
        self.data_folder.join("cards.json")
    }

    pub fn cards_embeddings_file(&self) -> PathBuf {
        self.data_folder.join("cards_embedding.json")
    }

    pub fn guides_file(&self) -> PathBuf {
        self.data_folder.join("guides.json")
    }

    pub fn guides_embeddings_file(&self) -> PathBuf {
        self.data_folder.join("guides_embedding.json")
    }
}

fn require<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("Required environment variable '{key}' is not set"),
    }
}

/// Splits `owner/repo`. Both parts must be non-empty and there must be
/// exactly one slash.
fn parse_repository(value: &str) -> Result<(String, String)> {
    let Some((owner, repo)) = value.trim().split_once('/') else {
        bail!("missing '/'");
    };
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        bail!("expected exactly one owner and one repository name");
    }
    Ok((owner.to_string(), repo.to_string()))
}

fn parse_languages(value: &str) -> Result<Vec<String>> {
    let languages: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if languages.is_empty() {
        bail!("no languages in '{value}'");
    }
    Ok(languages)
}
