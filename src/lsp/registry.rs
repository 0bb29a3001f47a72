//! Ordered set of language backends.

use std::sync::Arc;

use crate::errors::RegistryError;
use crate::language::Language;

use super::backend::LanguageBackend;

/// Backends in registration order, at most one per language.
///
/// Registration order is the order multi-target results are concatenated in.
#[derive(Debug, Default, Clone)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn LanguageBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend for its language.
    pub fn register(&mut self, backend: Arc<dyn LanguageBackend>) -> Result<(), RegistryError> {
        let language = backend.language();
        if self.get(language).is_some() {
            return Err(RegistryError::DuplicateLanguage { language });
        }
        tracing::debug!(%language, "registered backend");
        self.backends.push(backend);
        Ok(())
    }

    pub fn get(&self, language: Language) -> Option<&Arc<dyn LanguageBackend>> {
        self.backends.iter().find(|b| b.language() == language)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn LanguageBackend>> {
        self.backends.iter()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::test_support::FakeBackend;

    #[test]
    fn rejects_second_backend_for_language() {
        let mut registry = BackendRegistry::new();
        registry
            .register(Arc::new(FakeBackend::new(Language::Css)))
            .unwrap();
        let err = registry
            .register(Arc::new(FakeBackend::new(Language::Css)))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateLanguage {
                language: Language::Css
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn keeps_registration_order() {
        let mut registry = BackendRegistry::new();
        for language in [Language::JavaScript, Language::Html, Language::Css] {
            registry.register(Arc::new(FakeBackend::new(language))).unwrap();
        }
        let order: Vec<_> = registry.iter().map(|b| b.language()).collect();
        assert_eq!(
            order,
            vec![Language::JavaScript, Language::Html, Language::Css]
        );
        assert!(registry.get(Language::TypeScript).is_none());
    }
}
