use crate::api::Story;
use std::collections::HashSet;

/// Every story the client knows about, newest first, at most one entry per id.
///
/// The home feed renders straight from this cache. A full reload is the only
/// refresh unit; there is no paging.
#[derive(Debug, Clone, Default)]
pub struct StoryCache {
    stories: Vec<Story>,
}

impl StoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache with a freshly fetched list, keeping the server's
    /// order. Later duplicates of an id are dropped.
    pub fn replace_all(&mut self, stories: Vec<Story>) {
        let mut seen = HashSet::with_capacity(stories.len());
        self.stories = stories
            .into_iter()
            .filter(|story| seen.insert(story.story_id.clone()))
            .collect();
        tracing::debug!(count = self.stories.len(), "Story cache replaced");
    }

    /// Insert a newly submitted story at the front.
    pub fn prepend(&mut self, story: Story) {
        self.stories.retain(|s| s.story_id != story.story_id);
        self.stories.insert(0, story);
    }

    pub fn remove(&mut self, story_id: &str) -> Option<Story> {
        let index = self.stories.iter().position(|s| s.story_id == story_id)?;
        Some(self.stories.remove(index))
    }

    pub fn by_id(&self, story_id: &str) -> Option<&Story> {
        self.stories.iter().find(|s| s.story_id == story_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Story> {
        self.stories.iter()
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    pub(crate) fn story(id: &str) -> Story {
        Story {
            story_id: id.to_string(),
            title: format!("Title {id}"),
            author: "Author".to_string(),
            url: format!("https://www.example.com/{id}"),
            username: "poster".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn ids(cache: &StoryCache) -> Vec<&str> {
        cache.iter().map(|s| s.story_id.as_str()).collect()
    }

    #[test]
    fn test_replace_all_keeps_server_order() {
        let mut cache = StoryCache::new();
        cache.replace_all(vec![story("c"), story("b"), story("a")]);
        assert_eq!(ids(&cache), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_replace_all_drops_duplicates() {
        let mut cache = StoryCache::new();
        cache.replace_all(vec![story("a"), story("b"), story("a")]);
        assert_eq!(ids(&cache), vec!["a", "b"]);
    }

    #[test]
    fn test_prepend_puts_story_first() {
        let mut cache = StoryCache::new();
        cache.replace_all(vec![story("b"), story("a")]);
        cache.prepend(story("new"));
        assert_eq!(ids(&cache), vec!["new", "b", "a"]);
    }

    #[test]
    fn test_prepend_existing_id_moves_it() {
        let mut cache = StoryCache::new();
        cache.replace_all(vec![story("b"), story("a")]);
        cache.prepend(story("a"));
        assert_eq!(ids(&cache), vec!["a", "b"]);
    }

    #[test]
    fn test_remove_and_lookup() {
        let mut cache = StoryCache::new();
        cache.replace_all(vec![story("b"), story("a")]);

        assert!(cache.by_id("a").is_some());
        let removed = cache.remove("a").unwrap();
        assert_eq!(removed.story_id, "a");
        assert!(cache.by_id("a").is_none());
        assert!(cache.remove("a").is_none());
        assert_eq!(cache.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_cache_never_holds_duplicate_ids(
            initial in proptest::collection::vec("[a-e]", 0..12),
            prepends in proptest::collection::vec("[a-h]", 0..8),
        ) {
            let mut cache = StoryCache::new();
            cache.replace_all(initial.iter().map(|id| story(id)).collect());
            for id in &prepends {
                cache.prepend(story(id));
            }

            let mut seen = HashSet::new();
            for s in cache.iter() {
                prop_assert!(seen.insert(s.story_id.clone()));
            }
            if let Some(last) = prepends.last() {
                prop_assert_eq!(
                    cache.iter().next().map(|s| s.story_id.as_str()),
                    Some(last.as_str())
                );
            }
        }
    }
}
