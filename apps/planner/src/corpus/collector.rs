//! Collector — downloads the guide repository and produces the catalog files.
//!
//! Every step is skipped when its output already exists, unless forced.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{error, info, warn};

use crate::catalog::cards::CardDefinition;
use crate::catalog::paths::{LayerEmbeddings, LayerKind, PathDefinition};
use crate::catalog::{read_json, write_json};
use crate::config::Config;
use crate::corpus::embedding::{card_embedding_text, embed_with_retry, layer_embedding_text};
use crate::corpus::{CorpusError, SourceError};
use crate::model_client::ModelService;

const CARDS_SOURCE: &str = "_data/cards";
const GUIDES_SOURCE: &str = "_data/guides";

/// Raw source records keyed by file id.
type SourceTable = IndexMap<String, serde_yaml::Value>;

pub struct Collector<'a> {
    model: &'a dyn ModelService,
    url: String,
    tmp_folder: PathBuf,
    download_folder: PathBuf,
    languages: Vec<String>,
    cards_file: PathBuf,
    cards_embeddings_file: PathBuf,
    guides_file: PathBuf,
    guides_embeddings_file: PathBuf,
}

impl<'a> Collector<'a> {
    pub fn new(model: &'a dyn ModelService, config: &Config) -> Self {
        let branch = &config.branch_name;
        Self {
            model,
            url: format!(
                "https://github.com/{}/archive/refs/heads/{branch}.zip",
                config.techguide_github()
            ),
            tmp_folder: config.tmp_folder.clone(),
            download_folder: config
                .tmp_folder
                .join(format!("{}-{branch}", config.github_repo)),
            languages: config.corpus_languages.clone(),
            cards_file: config.cards_file(),
            cards_embeddings_file: config.cards_embeddings_file(),
            guides_file: config.guides_file(),
            guides_embeddings_file: config.guides_embeddings_file(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn download_folder(&self) -> &Path {
        &self.download_folder
    }

    /// Runs every step in order: download, conversion, then embedding.
    pub async fn run_all(&self, force: bool) -> Result<(), CorpusError> {
        self.download_repo(force).await?;
        self.collect_guides(force)?;
        self.collect_cards(force)?;
        self.embed_cards(force).await?;
        self.embed_guides(force).await?;
        info!("Corpus ready");
        Ok(())
    }

    /// Downloads the branch archive and extracts it into the tmp folder.
    pub async fn download_repo(&self, force: bool) -> Result<(), CorpusError> {
        if !force && self.download_folder.exists() {
            warn!(
                "Folder {} already exists. Skipping download.",
                self.download_folder.display()
            );
            return Ok(());
        }

        create_dir(&self.tmp_folder)?;

        info!("Downloading {}", self.url);
        let download_err = |source| CorpusError::Download {
            url: self.url.clone(),
            source,
        };
        let response = reqwest::get(&self.url).await.map_err(download_err)?;
        if !response.status().is_success() {
            return Err(CorpusError::DownloadStatus {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(download_err)?;

        // Download to temp file
        let temp_dir = tempfile::tempdir().map_err(|source| CorpusError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
        let archive = temp_dir.path().join("repository.zip");
        tokio::fs::write(&archive, &bytes)
            .await
            .map_err(|source| CorpusError::Io {
                path: archive.clone(),
                source,
            })?;

        extract_zip(&archive, &self.tmp_folder).await?;

        if !self.download_folder.exists() {
            return Err(CorpusError::Extract(format!(
                "archive did not contain {}",
                self.download_folder.display()
            )));
        }
        info!("Extracted into {}", self.download_folder.display());
        Ok(())
    }

    /// Converts the guide YAML sources of every configured language into
    /// `guides.json`.
    pub fn collect_guides(&self, force: bool) -> Result<(), CorpusError> {
        self.collect(GUIDES_SOURCE, "guide", &self.guides_file, force)
    }

    /// Converts the card YAML sources of every configured language into
    /// `cards.json`.
    pub fn collect_cards(&self, force: bool) -> Result<(), CorpusError> {
        self.collect(CARDS_SOURCE, "card", &self.cards_file, force)
    }

    fn collect(
        &self,
        source: &str,
        what: &str,
        destination: &Path,
        force: bool,
    ) -> Result<(), CorpusError> {
        if !force && destination.exists() {
            warn!(
                "File {} already exists. Skipping {what} collection.",
                destination.display()
            );
            return Ok(());
        }

        let mut table = SourceTable::new();
        for language in &self.languages {
            let folder = self.download_folder.join(source).join(language);
            if !folder.is_dir() {
                warn!("No {what} sources for language {language} in {}", folder.display());
                continue;
            }

            info!("Processing {what}s for language {language}");
            for file in source_files(&folder)? {
                match read_source(&file) {
                    Ok(value) => {
                        let Some(id) = file_id(&file) else { continue };
                        info!("Processing {what} {id}");
                        table.insert(id, value);
                    }
                    Err(e @ SourceError::Yaml { .. }) => {
                        error!("Error processing {what}: {e}");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        write_json(destination, &table)?;
        info!("Wrote {} {what}s to {}", table.len(), destination.display());
        Ok(())
    }

    /// Embeds every card of `cards.json` into `cards_embedding.json`.
    pub async fn embed_cards(&self, force: bool) -> Result<(), CorpusError> {
        if !force && self.cards_embeddings_file.exists() {
            warn!(
                "File {} already exists. Skipping card embedding.",
                self.cards_embeddings_file.display()
            );
            return Ok(());
        }

        let cards: IndexMap<String, CardDefinition> = read_json(&self.cards_file)?;

        let mut embeddings = IndexMap::with_capacity(cards.len());
        for (id, card) in &cards {
            info!("Embedding card {id}");
            let embedding = embed_with_retry(self.model, &card_embedding_text(card)).await?;
            embeddings.insert(id.clone(), embedding);
        }

        write_json(&self.cards_embeddings_file, &embeddings)?;
        info!("Embedded {} cards", embeddings.len());
        Ok(())
    }

    /// Embeds every expertise and collaboration layer of `guides.json` into
    /// `guides_embedding.json`, one vector per layer in layer order.
    pub async fn embed_guides(&self, force: bool) -> Result<(), CorpusError> {
        if !force && self.guides_embeddings_file.exists() {
            warn!(
                "File {} already exists. Skipping guide embedding.",
                self.guides_embeddings_file.display()
            );
            return Ok(());
        }

        let cards: IndexMap<String, CardDefinition> = read_json(&self.cards_file)?;
        let guides: IndexMap<String, PathDefinition> = read_json(&self.guides_file)?;

        let mut embeddings = IndexMap::with_capacity(guides.len());
        for (id, guide) in &guides {
            info!("Embedding guide {id}");
            let mut layers = LayerEmbeddings::default();
            for kind in LayerKind::ALL {
                let mut vectors = Vec::with_capacity(guide.layers(kind).len());
                for layer in guide.layers(kind) {
                    let text = layer_embedding_text(layer, &cards);
                    vectors.push(embed_with_retry(self.model, &text).await?);
                }
                match kind {
                    LayerKind::Expertise => layers.expertise = vectors,
                    LayerKind::Collaboration => layers.collaboration = vectors,
                }
            }
            embeddings.insert(id.clone(), layers);
        }

        write_json(&self.guides_embeddings_file, &embeddings)?;
        info!("Embedded {} guides", embeddings.len());
        Ok(())
    }
}

/// Runs `unzip -o <archive> -d <target>`.
async fn extract_zip(archive: &Path, target: &Path) -> Result<(), CorpusError> {
    let output = tokio::process::Command::new("unzip")
        .arg("-o")
        .arg("-q")
        .arg(archive)
        .arg("-d")
        .arg(target)
        .output()
        .await
        .map_err(|e| CorpusError::Extract(format!("failed to run unzip: {e}")))?;

    if !output.status.success() {
        return Err(CorpusError::Extract(format!(
            "unzip exited with code {}: {}",
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), CorpusError> {
    fs::create_dir_all(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Regular files of `folder`, sorted by file name.
fn source_files(folder: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let io_err = |source| SourceError::Io {
        path: folder.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(folder).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_source(path: &Path) -> Result<serde_yaml::Value, SourceError> {
    let raw = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| SourceError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

/// File name without its final extension.
fn file_id(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::cards::CardCatalog;
    use crate::catalog::paths::PathCatalog;
    use crate::config::tests::config_in;
    use crate::model_client::stub::StubModel;
    use tempfile::TempDir;

    const GIT_CARD: &str = "name: Git\nkey-objectives:\n  - Criar commits\n  - Resolver conflitos\n";
    const SQL_CARD: &str = "name: SQL\nshort-description: bancos relacionais\n";
    const BACKEND_GUIDE: &str = r#"
name: Back-end
tags: [java, node]
expertise:
  - name: Fundamentos
    cards:
      - git:
        priority: 1
      - sql:
        priority: "2"
collaboration:
  - name: Nuvem
    cards:
      - ghost:
"#;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// A tmp folder that already holds an extracted repository.
    fn extracted(dir: &TempDir) -> Config {
        let config = config_in(dir.path());
        let repo = config.tmp_folder.join("techguide-main");
        write(&repo.join("_data/cards/pt_BR/git.yaml"), GIT_CARD);
        write(&repo.join("_data/cards/pt_BR/sql.yaml"), SQL_CARD);
        write(&repo.join("_data/cards/pt_BR/broken.yaml"), "name: [unclosed\n");
        write(&repo.join("_data/cards/en_US/git.yaml"), "name: Git (en)\n");
        write(&repo.join("_data/guides/pt_BR/back-end.yaml"), BACKEND_GUIDE);
        config
    }

    #[test]
    fn test_url_and_download_folder() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.branch_name = "develop".to_string();
        let model = StubModel::new(&[1.0]);

        let collector = Collector::new(&model, &config);
        assert_eq!(
            collector.url(),
            "https://github.com/alura/techguide/archive/refs/heads/develop.zip"
        );
        assert_eq!(
            collector.download_folder(),
            config.tmp_folder.join("techguide-develop")
        );
    }

    #[tokio::test]
    async fn test_existing_download_is_skipped() {
        let dir = TempDir::new().unwrap();
        let config = extracted(&dir);
        let model = StubModel::new(&[1.0]);

        // Must return before any network access
        Collector::new(&model, &config)
            .download_repo(false)
            .await
            .unwrap();
    }

    #[test]
    fn test_collect_cards_sorted_and_skips_malformed() {
        let dir = TempDir::new().unwrap();
        let config = extracted(&dir);
        let model = StubModel::new(&[1.0]);

        Collector::new(&model, &config).collect_cards(false).unwrap();

        let cards: IndexMap<String, CardDefinition> = read_json(&config.cards_file()).unwrap();
        let ids: Vec<&str> = cards.keys().map(String::as_str).collect();
        assert_eq!(ids, ["git", "sql"], "pt_BR only, broken.yaml skipped");
        assert_eq!(cards["git"].key_objectives(), ["Criar commits", "Resolver conflitos"]);
        assert_eq!(cards["sql"].short_description(), "bancos relacionais");
    }

    #[test]
    fn test_collect_merges_languages() {
        let dir = TempDir::new().unwrap();
        let mut config = extracted(&dir);
        config.corpus_languages = vec!["pt_BR".to_string(), "en_US".to_string()];
        let model = StubModel::new(&[1.0]);

        Collector::new(&model, &config).collect_cards(false).unwrap();

        let cards: IndexMap<String, CardDefinition> = read_json(&config.cards_file()).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards["git"].name(), "Git (en)");
    }

    #[test]
    fn test_collect_skips_existing_output_unless_forced() {
        let dir = TempDir::new().unwrap();
        let config = extracted(&dir);
        write(&config.guides_file(), "{}");
        let model = StubModel::new(&[1.0]);
        let collector = Collector::new(&model, &config);

        collector.collect_guides(false).unwrap();
        assert_eq!(fs::read_to_string(config.guides_file()).unwrap(), "{}");

        collector.collect_guides(true).unwrap();
        let guides: IndexMap<String, PathDefinition> = read_json(&config.guides_file()).unwrap();
        let guide = &guides["back-end"];
        assert_eq!(guide.name(), "Back-end");
        assert_eq!(guide.layers(LayerKind::Expertise)[0].cards()[1].priority, Some(2));
    }

    #[tokio::test]
    async fn test_full_build_produces_loadable_catalogs() {
        let dir = TempDir::new().unwrap();
        let config = extracted(&dir);
        let model = StubModel::new(&[0.0, 1.0])
            .with_embedding("Git\nCriar commits\nResolver conflitos", &[1.0, 0.0])
            .with_embedding("SQL", &[0.6, 0.8]);

        Collector::new(&model, &config).run_all(false).await.unwrap();

        let cards =
            CardCatalog::load(&config.cards_file(), &config.cards_embeddings_file()).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards.get("git").unwrap().embedding, [1.0, 0.0]);
        assert_eq!(cards.get("sql").unwrap().embedding, [0.6, 0.8]);

        let paths =
            PathCatalog::load(&config.guides_file(), &config.guides_embeddings_file()).unwrap();
        assert_eq!(paths.expertise().len(), 1);
        assert_eq!(paths.collaboration().len(), 1);

        // Two cards plus one expertise and one collaboration layer
        let calls = model.embed_calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 4);
        assert_eq!(
            calls[2],
            "Git\nCriar commits\nResolver conflitos\nSQL",
            "layer text joins its known cards"
        );
        assert_eq!(calls[3], "Nuvem", "layer without known cards falls back to its name");
    }

    #[tokio::test]
    async fn test_embedding_skips_existing_output() {
        let dir = TempDir::new().unwrap();
        let config = extracted(&dir);
        write(&config.cards_embeddings_file(), "{}");
        let model = StubModel::new(&[1.0]);

        Collector::new(&model, &config).embed_cards(false).await.unwrap();
        assert_eq!(model.embed_count(), 0);
    }
}
