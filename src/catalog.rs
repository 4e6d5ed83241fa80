//! Tool catalog
//!
//! Fetched once from the backend's `/get_tools`, grouped by category, and
//! filtered with fuzzy search for the palette.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

/// A tool the agent understands. Identity is `(category, name)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub category: String,
    pub name: String,
    pub data: Value,
}

/// A titled group of tools
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub key: String,
    pub title: String,
    pub tools: Vec<Tool>,
}

/// Position of a tool inside the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolRef {
    pub category: usize,
    pub tool: usize,
}

#[derive(Debug, Default, Clone)]
pub struct ToolCatalog {
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    tools: Vec<RawTool>,
}

#[derive(Debug, Deserialize)]
struct RawTool {
    name: String,
    #[serde(default)]
    data: Value,
}

impl ToolCatalog {
    /// Build from the `/get_tools` payload: `{ key: {title, tools: [{name, data}]} }`.
    ///
    /// Categories keep the payload's key order. A repeated tool name inside
    /// one category is dropped, first occurrence wins.
    pub fn from_json(payload: &Value) -> Result<Self, serde_json::Error> {
        let mut categories = Vec::new();

        let Some(map) = payload.as_object() else {
            return Ok(Self::default());
        };

        for (key, raw) in map {
            let raw: RawCategory = serde_json::from_value(raw.clone())?;
            let mut seen = HashSet::new();
            let mut tools = Vec::with_capacity(raw.tools.len());

            for t in raw.tools {
                if !seen.insert(t.name.clone()) {
                    tracing::warn!(category = %key, tool = %t.name, "duplicate tool name in catalog, skipped");
                    continue;
                }
                tools.push(Tool {
                    category: key.clone(),
                    name: t.name,
                    data: t.data,
                });
            }

            categories.push(Category {
                key: key.clone(),
                title: raw.title.unwrap_or_else(|| key.clone()),
                tools,
            });
        }

        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(|c| c.tools.is_empty())
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.tools.len()).sum()
    }

    pub fn get(&self, r: ToolRef) -> Option<&Tool> {
        self.categories.get(r.category)?.tools.get(r.tool)
    }

    pub fn find(&self, category: &str, name: &str) -> Option<&Tool> {
        self.categories
            .iter()
            .find(|c| c.key == category)?
            .tools
            .iter()
            .find(|t| t.name == name)
    }

    /// All tools in catalog order
    pub fn all(&self) -> Vec<ToolRef> {
        self.categories
            .iter()
            .enumerate()
            .flat_map(|(ci, c)| (0..c.tools.len()).map(move |ti| ToolRef { category: ci, tool: ti }))
            .collect()
    }

    /// Tools matching `filter`, best match first. Empty filter keeps catalog order.
    pub fn filter(&self, filter: &str) -> Vec<ToolRef> {
        if filter.is_empty() {
            return self.all();
        }

        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<_> = self
            .all()
            .into_iter()
            .filter_map(|r| {
                let tool = self.get(r)?;
                let title = &self.categories[r.category].title;
                let haystack = format!("{} {}", tool.name, title);
                matcher.fuzzy_match(&haystack, filter).map(|score| (r, score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.into_iter().map(|(r, _)| r).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "web": {
                "title": "Web",
                "tools": [
                    {"name": "Fetch page", "data": {"url": "x.com", "method": "GET"}},
                    {"name": "Search", "data": {"q": ""}}
                ]
            },
            "messages": {
                "title": "Messages",
                "tools": [
                    {"name": "Unread", "data": {"method": "get_unread_messages"}},
                    {"name": "Unread", "data": {"method": "duplicate"}}
                ]
            }
        })
    }

    #[test]
    fn test_parse_keeps_payload_order() {
        let cat = ToolCatalog::from_json(&sample()).unwrap();
        let keys: Vec<_> = cat.categories().iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["web", "messages"]);
        assert_eq!(cat.categories()[0].title, "Web");
    }

    #[test]
    fn test_duplicate_names_dropped_within_category() {
        let cat = ToolCatalog::from_json(&sample()).unwrap();
        assert_eq!(cat.len(), 3);
        let unread = cat.find("messages", "Unread").unwrap();
        assert_eq!(unread.data["method"], "get_unread_messages");
    }

    #[test]
    fn test_missing_title_falls_back_to_key() {
        let cat = ToolCatalog::from_json(&json!({"fs": {"tools": [{"name": "ls"}]}})).unwrap();
        assert_eq!(cat.categories()[0].title, "fs");
        assert_eq!(cat.find("fs", "ls").unwrap().data, Value::Null);
    }

    #[test]
    fn test_filter_fuzzy() {
        let cat = ToolCatalog::from_json(&sample()).unwrap();
        let hits = cat.filter("srch");
        assert_eq!(cat.get(hits[0]).unwrap().name, "Search");
        assert_eq!(cat.filter("").len(), 3);
        assert!(cat.filter("zzzz").is_empty());
    }

    #[test]
    fn test_non_object_payload_is_empty() {
        let cat = ToolCatalog::from_json(&json!([])).unwrap();
        assert!(cat.is_empty());
    }
}
