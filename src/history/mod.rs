//! Search, view and action history
//!
//! Each list is kept newest first, capped at `max-items` and written through
//! to the key-value store after every change.

use crate::model::Video;
use crate::storage::{keys, load_json, store_json, SharedStorage, StorageResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::PoisonError;

/// How a search was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Keyword,
    Url,
    Channel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub query: String,
    #[serde(default)]
    pub kind: SearchKind,
    /// Results returned by the latest run of this query
    #[serde(default)]
    pub results: usize,
    /// Times this query was run
    #[serde(default = "one")]
    pub count: u64,
    pub timestamp: DateTime<Utc>,
}

fn one() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEntry {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub url: String,
    #[serde(default)]
    pub duration: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub action: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// A query and how often it was searched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCount {
    pub query: String,
    pub count: u64,
}

/// Persistent history of searches, viewed videos and user actions
pub struct HistoryLog {
    max_items: usize,
    storage: Option<SharedStorage>,
    searches: Vec<SearchEntry>,
    views: Vec<ViewEntry>,
    actions: Vec<ActionEntry>,
}

impl HistoryLog {
    /// Creates an empty log without persistence
    pub fn in_memory(max_items: usize) -> Self {
        Self {
            max_items,
            storage: None,
            searches: Vec::new(),
            views: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Loads the persisted lists; an unreadable list starts empty
    pub fn load(storage: SharedStorage, max_items: usize) -> Self {
        let (searches, views, actions) = {
            let guard = storage.lock().unwrap_or_else(PoisonError::into_inner);
            (
                load_list(&*guard, keys::SEARCH_HISTORY),
                load_list(&*guard, keys::VIEW_HISTORY),
                load_list(&*guard, keys::ACTION_HISTORY),
            )
        };

        let mut log = Self {
            max_items,
            storage: Some(storage),
            searches,
            views,
            actions,
        };
        log.searches.truncate(max_items);
        log.views.truncate(max_items);
        log.actions.truncate(max_items);
        log
    }

    fn persist<T: Serialize>(&self, key: &str, list: &[T]) -> StorageResult<()> {
        match &self.storage {
            Some(storage) => {
                let mut guard = storage.lock().unwrap_or_else(PoisonError::into_inner);
                store_json(&mut *guard, key, list)
            }
            None => Ok(()),
        }
    }

    /// Records a search; repeating a query moves it to the front and bumps its count
    pub fn record_search(
        &mut self,
        query: &str,
        kind: SearchKind,
        results: usize,
    ) -> StorageResult<()> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(());
        }

        let count = match self
            .searches
            .iter()
            .position(|e| e.query.eq_ignore_ascii_case(query))
        {
            Some(i) => self.searches.remove(i).count + 1,
            None => 1,
        };
        self.searches.insert(
            0,
            SearchEntry {
                query: query.to_string(),
                kind,
                results,
                count,
                timestamp: Utc::now(),
            },
        );
        self.searches.truncate(self.max_items);
        self.persist(keys::SEARCH_HISTORY, &self.searches)
    }

    /// Records a viewed video; viewing it again moves it to the front
    pub fn record_view(&mut self, video: &Video) -> StorageResult<()> {
        self.views.retain(|e| e.video_id != video.id);
        self.views.insert(
            0,
            ViewEntry {
                video_id: video.id.clone(),
                title: video.title.clone(),
                channel: video.channel.clone(),
                url: video.url.clone(),
                duration: video.duration.clone(),
                timestamp: Utc::now(),
            },
        );
        self.views.truncate(self.max_items);
        self.persist(keys::VIEW_HISTORY, &self.views)
    }

    pub fn record_action(&mut self, action: &str, details: serde_json::Value) -> StorageResult<()> {
        self.actions.insert(
            0,
            ActionEntry {
                action: action.to_string(),
                details,
                timestamp: Utc::now(),
            },
        );
        self.actions.truncate(self.max_items);
        self.persist(keys::ACTION_HISTORY, &self.actions)
    }

    pub fn searches(&self) -> &[SearchEntry] {
        &self.searches
    }

    pub fn views(&self) -> &[ViewEntry] {
        &self.views
    }

    pub fn actions(&self) -> &[ActionEntry] {
        &self.actions
    }

    /// Past queries matching `prefix`
    ///
    /// With an empty prefix the most recent queries are returned. Otherwise
    /// queries starting with the prefix come first, then queries containing it.
    pub fn suggestions(&self, prefix: &str, limit: usize) -> Vec<String> {
        let needle = prefix.trim().to_lowercase();
        if needle.is_empty() {
            return self
                .searches
                .iter()
                .take(limit)
                .map(|e| e.query.clone())
                .collect();
        }

        let (starts, contains): (Vec<&SearchEntry>, Vec<&SearchEntry>) = self
            .searches
            .iter()
            .filter(|e| e.query.to_lowercase().contains(&needle))
            .partition(|e| e.query.to_lowercase().starts_with(&needle));

        starts
            .into_iter()
            .chain(contains)
            .take(limit)
            .map(|e| e.query.clone())
            .collect()
    }

    /// Most repeated queries searched within the last `days` days
    pub fn top_searches(&self, days: i64, limit: usize) -> Vec<QueryCount> {
        let cutoff = Utc::now() - Duration::days(days);
        let mut top: Vec<QueryCount> = self
            .searches
            .iter()
            .filter(|e| e.timestamp > cutoff)
            .map(|e| QueryCount {
                query: e.query.clone(),
                count: e.count,
            })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count));
        top.truncate(limit);
        top
    }

    /// Channels appearing most often in the view history
    pub fn top_channels(&self, limit: usize) -> Vec<(String, u64)> {
        let mut order: Vec<(String, u64)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for view in &self.views {
            match index.get(view.channel.as_str()) {
                Some(&i) => order[i].1 += 1,
                None => {
                    index.insert(view.channel.as_str(), order.len());
                    order.push((view.channel.clone(), 1));
                }
            }
        }
        order.sort_by(|a, b| b.1.cmp(&a.1));
        order.truncate(limit);
        order
    }

    /// Empties every list
    pub fn clear(&mut self) -> StorageResult<()> {
        self.searches.clear();
        self.views.clear();
        self.actions.clear();
        self.persist(keys::SEARCH_HISTORY, &self.searches)?;
        self.persist(keys::VIEW_HISTORY, &self.views)?;
        self.persist(keys::ACTION_HISTORY, &self.actions)
    }
}

fn load_list<T: serde::de::DeserializeOwned>(
    storage: &dyn crate::storage::Storage,
    key: &str,
) -> Vec<T> {
    match load_json(storage, key) {
        Ok(Some(list)) => list,
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!("History '{}' is unreadable, starting empty: {}", key, e);
            Vec::new()
        }
    }
}
