//! Registry of analyzer capabilities.
//!
//! The set of analyzers is fixed at construction; new capabilities are added
//! by implementing [`Analyzer`] and including them when the registry is
//! built. There is no dynamic registration at runtime.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Result, bail};

use super::capability::Analyzer;

/// Immutable mapping from analyzer name to implementation.
///
/// Iteration order is registration order, which fixes the task layout of
/// every job created against this registry.
#[derive(Clone)]
pub struct AnalyzerRegistry {
    analyzers: Arc<Vec<Arc<dyn Analyzer>>>,
}

impl AnalyzerRegistry {
    /// Build a registry from a set of capability implementations.
    ///
    /// # Errors
    ///
    /// Fails when the set is empty or two analyzers share a name.
    pub fn new(analyzers: Vec<Arc<dyn Analyzer>>) -> Result<Self> {
        if analyzers.is_empty() {
            bail!("analyzer registry cannot be empty");
        }
        let mut seen = HashSet::new();
        for analyzer in &analyzers {
            if !seen.insert(analyzer.name().to_string()) {
                bail!("duplicate analyzer name: {}", analyzer.name());
            }
        }
        Ok(Self {
            analyzers: Arc::new(analyzers),
        })
    }

    /// Look up an analyzer by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Analyzer>> {
        self.analyzers.iter().find(|a| a.name() == name)
    }

    /// All registered analyzers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Analyzer>> {
        self.analyzers.iter()
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.analyzers.iter().map(|a| a.name().to_string()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::capability::AnalyzerError;
    use crate::analyzer::payload::{AnalyzerPayload, SeoAudit};
    use crate::urlnorm::NormalizedUrl;
    use async_trait::async_trait;

    struct NamedStub(&'static str);

    #[async_trait]
    impl Analyzer for NamedStub {
        fn name(&self) -> &str {
            self.0
        }

        async fn analyze(&self, _url: &NormalizedUrl) -> Result<AnalyzerPayload, AnalyzerError> {
            Ok(AnalyzerPayload::Seo(SeoAudit::from_checks(true, true, true)))
        }
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(AnalyzerRegistry::new(Vec::new()).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = AnalyzerRegistry::new(vec![
            Arc::new(NamedStub("seo")) as Arc<dyn Analyzer>,
            Arc::new(NamedStub("seo")) as Arc<dyn Analyzer>,
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_lookup_and_order() {
        let registry = AnalyzerRegistry::new(vec![
            Arc::new(NamedStub("seo")) as Arc<dyn Analyzer>,
            Arc::new(NamedStub("accessibility")) as Arc<dyn Analyzer>,
        ])
        .expect("registry should build from distinct names");

        assert_eq!(registry.len(), 2);
        assert!(registry.get("seo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["seo", "accessibility"]);
    }
}
