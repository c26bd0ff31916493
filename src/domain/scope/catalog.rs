//! Scope catalog and selection helpers
//!
//! Scopes are a fixed catalog supplied at startup; the lifecycle manager
//! only reads it to validate and display scope selections.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A single catalog entry: a named permission unit grouped into a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiScope {
    /// Unique scope identifier, e.g. "reports:read"
    pub scope: String,
    /// Grouping key used for bulk selection in clients
    pub category: String,
    /// Human-readable description
    pub description: String,
}

impl ApiScope {
    pub fn new(
        scope: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            category: category.into(),
            description: description.into(),
        }
    }
}

/// Immutable catalog of every scope an API key can be granted
#[derive(Debug, Clone)]
pub struct ScopeCatalog {
    scopes: Vec<ApiScope>,
    index: HashMap<String, usize>,
}

impl ScopeCatalog {
    /// Build a catalog from entries. Later duplicates of a scope id are ignored.
    pub fn new(scopes: Vec<ApiScope>) -> Self {
        let mut index = HashMap::new();
        let mut deduped = Vec::new();

        for scope in scopes {
            if !index.contains_key(&scope.scope) {
                index.insert(scope.scope.clone(), deduped.len());
                deduped.push(scope);
            }
        }

        Self {
            scopes: deduped,
            index,
        }
    }

    /// The scopes shipped with the platform
    pub fn builtin() -> &'static Self {
        static BUILTIN: Lazy<ScopeCatalog> = Lazy::new(|| {
            ScopeCatalog::new(vec![
                ApiScope::new(
                    "dashboards:read",
                    "dashboards",
                    "View dashboards and their layouts",
                ),
                ApiScope::new(
                    "dashboards:write",
                    "dashboards",
                    "Create and modify dashboards",
                ),
                ApiScope::new("reports:read", "reports", "View saved reports"),
                ApiScope::new("reports:export", "reports", "Export report results"),
                ApiScope::new(
                    "datasources:read",
                    "datasources",
                    "View data source connections and schemas",
                ),
                ApiScope::new(
                    "datasources:write",
                    "datasources",
                    "Create and modify data source connections",
                ),
                ApiScope::new(
                    "queries:execute",
                    "queries",
                    "Run ad-hoc queries against connected sources",
                ),
                ApiScope::new("admin:keys", "admin", "Manage API keys"),
                ApiScope::new("admin:settings", "admin", "Manage workspace settings"),
            ])
        });

        &BUILTIN
    }

    /// Check if a scope id exists in the catalog
    pub fn contains(&self, scope: &str) -> bool {
        self.index.contains_key(scope)
    }

    /// Look up a catalog entry by scope id
    pub fn get(&self, scope: &str) -> Option<&ApiScope> {
        self.index.get(scope).map(|&i| &self.scopes[i])
    }

    /// All entries, in catalog order
    pub fn all(&self) -> &[ApiScope] {
        &self.scopes
    }

    /// Entries grouped by category, categories and scopes alphabetically ordered
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&ApiScope>> {
        let mut grouped: BTreeMap<&str, Vec<&ApiScope>> = BTreeMap::new();

        for scope in &self.scopes {
            grouped.entry(&scope.category).or_default().push(scope);
        }

        for scopes in grouped.values_mut() {
            scopes.sort_by(|a, b| a.scope.cmp(&b.scope));
        }

        grouped
    }

    /// Scope ids belonging to a category
    pub fn scopes_in_category(&self, category: &str) -> BTreeSet<String> {
        self.scopes
            .iter()
            .filter(|s| s.category == category)
            .map(|s| s.scope.clone())
            .collect()
    }
}

/// "Select all in category" toggle, as pure set algebra.
///
/// If every scope in the category is already selected the whole category
/// is deselected; otherwise the category is unioned into the selection.
/// Applying the toggle twice returns the input selection (involution).
pub fn toggle_category(
    selected: &BTreeSet<String>,
    catalog: &ScopeCatalog,
    category: &str,
) -> BTreeSet<String> {
    let category_scopes = catalog.scopes_in_category(category);

    if category_scopes.is_empty() {
        return selected.clone();
    }

    let all_selected = category_scopes.iter().all(|s| selected.contains(s));

    if all_selected {
        selected.difference(&category_scopes).cloned().collect()
    } else {
        selected.union(&category_scopes).cloned().collect()
    }
}
