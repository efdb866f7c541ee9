use anyhow::{Context as AnyhowContext, Result};
use codedocs_search::RetrieverConfig;
use codedocs_vector_store::{EmbeddingConfig, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of `codedocs.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub retriever: RetrieverConfig,
    pub indexer: IndexerSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerSection {
    /// Concurrent embedding workers
    pub workers: usize,
}

impl Default for IndexerSection {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl AppConfig {
    /// Read `path`, or fall back to defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                toml::from_str::<Self>(&raw)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.reconcile();
        config.validate()?;
        Ok(config)
    }

    /// The embedding model decides the vector width the store must accept
    fn reconcile(&mut self) {
        if self.store.dimension != self.embedding.dimensions {
            log::warn!(
                "store.dimension {} differs from embedding.dimensions {}; using {}",
                self.store.dimension,
                self.embedding.dimensions,
                self.embedding.dimensions
            );
            self.store.dimension = self.embedding.dimensions;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.store.validate().context("Invalid [store] section")?;
        self.embedding
            .validate()
            .context("Invalid [embedding] section")?;
        self.retriever
            .validate()
            .context("Invalid [retriever] section")?;
        anyhow::ensure!(self.indexer.workers > 0, "indexer.workers must be positive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codedocs_search::QueryType;

    #[test]
    fn sections_are_optional() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("codedocs.toml");
        std::fs::write(
            &path,
            r#"
[embedding]
model = "all-minilm"
dimensions = 384

[retriever]
default_query_type = "semantic"
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.store.dimension, 384);
        assert_eq!(config.retriever.default_query_type, QueryType::Semantic);
        assert_eq!(config.indexer.workers, 4);
    }

    #[test]
    fn invalid_embedding_section_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("codedocs.toml");
        std::fs::write(&path, "[embedding]\nmodel = \"all-minilm\"\ndimensions = 4096\n").unwrap();

        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("[embedding]"));
    }
}
