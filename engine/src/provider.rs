//! Storage provider classification.

use std::path::{Path, PathBuf};

use crate::model::ProviderType;

/// Classifies paths as internal or external storage by mount root.
#[derive(Debug, Clone, Default)]
pub struct ProviderResolver {
    external_roots: Vec<PathBuf>,
}

impl ProviderResolver {
    pub fn new(external_roots: Vec<PathBuf>) -> Self {
        ProviderResolver { external_roots }
    }

    pub fn resolve(&self, path: &Path) -> ProviderType {
        if self.external_roots.iter().any(|root| path.starts_with(root)) {
            ProviderType::ExternalMemory
        } else {
            ProviderType::InternalMemory
        }
    }
}
