//! Analyzer registry keyed by analyzer name

use std::collections::HashMap;
use std::sync::Arc;

use super::Analyzer;
use crate::error::AnalysisError;

/// Registry of constructed analyzers
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: HashMap<String, Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an analyzer under its own name, replacing any previous entry
    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) {
        let name = analyzer.name().to_string();
        self.analyzers.insert(name, analyzer);
    }

    /// Remove an analyzer by name
    pub fn unregister(&mut self, name: &str) -> Result<Arc<dyn Analyzer>, AnalysisError> {
        self.analyzers
            .remove(name)
            .ok_or_else(|| AnalysisError::NotFound(name.to_string()))
    }

    /// Get an analyzer by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Analyzer>, AnalysisError> {
        self.analyzers
            .get(name)
            .cloned()
            .ok_or_else(|| AnalysisError::NotFound(name.to_string()))
    }

    /// Check if an analyzer is registered
    pub fn contains(&self, name: &str) -> bool {
        self.analyzers.contains_key(name)
    }

    /// Registered names, sorted for stable output
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.analyzers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }
}

impl std::fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("analyzers", &self.names())
            .finish()
    }
}
