//! Refresh gate
//!
//! Decides whether a refresh cycle may run for an item and whether it is a
//! full (replace-all) refresh. The gate is a pure function of the item and
//! the context; it never errors and never mutates.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::Item;

/// What asked for the refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshTrigger {
    /// File system reported a newer modification time
    DateModifiedChanged,
    /// Periodic background refresh
    Scheduled,
    /// Library scan discovered or revisited the item
    LibraryScan,
    /// User or API request
    Explicit,
}

/// Inputs to the refresh decision beyond the item itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshContext {
    pub trigger: RefreshTrigger,
    /// Only local metadata may be used; disables full replacement
    pub allow_local_metadata_only: bool,
    /// Local metadata already exists for the item
    pub has_local_metadata: bool,
    /// Caller requests every unlocked field be replaced
    pub replace_all_metadata: bool,
}

impl RefreshContext {
    pub fn new(trigger: RefreshTrigger) -> Self {
        Self {
            trigger,
            allow_local_metadata_only: false,
            has_local_metadata: false,
            replace_all_metadata: false,
        }
    }

    pub fn explicit() -> Self {
        Self::new(RefreshTrigger::Explicit)
    }

    pub fn scheduled() -> Self {
        Self::new(RefreshTrigger::Scheduled)
    }

    pub fn with_replace_all(mut self) -> Self {
        self.replace_all_metadata = true;
        self
    }

    pub fn with_local_metadata(mut self, has_local_metadata: bool) -> Self {
        self.has_local_metadata = has_local_metadata;
        self
    }

    pub fn local_only(mut self) -> Self {
        self.allow_local_metadata_only = true;
        self
    }

    fn replace_all(&self) -> bool {
        self.replace_all_metadata && !self.allow_local_metadata_only
    }
}

/// Gate verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshDecision {
    pub proceed: bool,
    /// Replace-all refresh: explicit clears are honoured
    pub force_full: bool,
}

impl RefreshDecision {
    pub fn skip() -> Self {
        Self {
            proceed: false,
            force_full: false,
        }
    }

    pub fn proceed(force_full: bool) -> Self {
        Self {
            proceed: true,
            force_full,
        }
    }
}

/// Refresh gate
pub struct RefreshGate;

impl RefreshGate {
    /// Decide whether a refresh may run
    ///
    /// Checks in order: item lock, item-supplied `requires_refresh`, explicit
    /// trigger, date-modified policy of the variant, local-metadata stop.
    pub fn should_refresh(item: &Item, ctx: &RefreshContext) -> RefreshDecision {
        if item.is_locked {
            debug!(item_id = %item.id, "Refresh skipped: item locked");
            return RefreshDecision::skip();
        }

        if item.requires_refresh() {
            debug!(item_id = %item.id, trigger = ?ctx.trigger, "Item requires full refresh");
            return RefreshDecision::proceed(true);
        }

        if ctx.trigger == RefreshTrigger::Explicit {
            return RefreshDecision::proceed(ctx.replace_all());
        }

        let policy = item.policy();

        if ctx.trigger == RefreshTrigger::DateModifiedChanged
            && !policy.enable_refresh_on_date_modified_change()
        {
            debug!(
                item_id = %item.id,
                kind = policy.kind_name(),
                "Refresh skipped: date-modified refresh disabled for kind"
            );
            return RefreshDecision::skip();
        }

        if policy.stop_refresh_if_local_metadata_found() && ctx.has_local_metadata {
            debug!(item_id = %item.id, "Refresh skipped: local metadata present");
            return RefreshDecision::skip();
        }

        RefreshDecision::proceed(ctx.replace_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EpisodeInfo, ItemKind, SourceType};
    use std::path::PathBuf;

    /// Library movie that does not require refresh on its own
    fn settled_movie() -> Item {
        Item::new(
            ItemKind::movie(),
            "Ran",
            Some(PathBuf::from("/media/movies/ran.mkv")),
            SourceType::Library,
        )
        .with_provider_id("tmdb", "11645")
    }

    fn series() -> Item {
        Item::new(
            ItemKind::series(),
            "Twin Peaks",
            Some(PathBuf::from("/tv/Twin Peaks")),
            SourceType::Library,
        )
        .with_provider_id("tvdb", "70533")
    }

    #[test]
    fn test_locked_item_never_proceeds() {
        let mut item = settled_movie();
        item.is_locked = true;
        item.set_name("");

        for ctx in [
            RefreshContext::explicit().with_replace_all(),
            RefreshContext::scheduled(),
            RefreshContext::new(RefreshTrigger::DateModifiedChanged),
        ] {
            assert_eq!(RefreshGate::should_refresh(&item, &ctx), RefreshDecision::skip());
        }
    }

    #[test]
    fn test_requires_refresh_forces_full() {
        let item = Item::new(
            ItemKind::movie(),
            "Ran",
            Some(PathBuf::from("/media/movies/ran.mkv")),
            SourceType::Library,
        );
        let ctx = RefreshContext::scheduled().with_local_metadata(true);
        assert_eq!(RefreshGate::should_refresh(&item, &ctx), RefreshDecision::proceed(true));
    }

    #[test]
    fn test_episode_without_index_forces_full() {
        let item = Item::new(
            ItemKind::Episode(EpisodeInfo {
                series_name: Some("Show".into()),
                season_number: Some(1),
                index_number: None,
            }),
            "Pilot",
            Some(PathBuf::from("/tv/Show/pilot.mkv")),
            SourceType::Library,
        )
        .with_provider_id("tvdb", "1");
        let decision = RefreshGate::should_refresh(&item, &RefreshContext::scheduled());
        assert!(decision.proceed && decision.force_full);
    }

    #[test]
    fn test_explicit_replace_all() {
        let item = settled_movie();

        let decision =
            RefreshGate::should_refresh(&item, &RefreshContext::explicit().with_replace_all());
        assert_eq!(decision, RefreshDecision::proceed(true));

        let decision = RefreshGate::should_refresh(
            &item,
            &RefreshContext::explicit().with_replace_all().local_only(),
        );
        assert_eq!(decision, RefreshDecision::proceed(false));

        let decision = RefreshGate::should_refresh(&item, &RefreshContext::explicit());
        assert_eq!(decision, RefreshDecision::proceed(false));
    }

    #[test]
    fn test_explicit_overrides_local_metadata_stop() {
        let item = settled_movie();
        let ctx = RefreshContext::explicit().with_local_metadata(true);
        assert!(RefreshGate::should_refresh(&item, &ctx).proceed);
    }

    #[test]
    fn test_date_modified_respects_variant_policy() {
        let ctx = RefreshContext::new(RefreshTrigger::DateModifiedChanged);
        assert!(!RefreshGate::should_refresh(&series(), &ctx).proceed);
        assert!(RefreshGate::should_refresh(&settled_movie(), &ctx).proceed);
    }

    #[test]
    fn test_local_metadata_stops_scheduled_refresh() {
        let ctx = RefreshContext::new(RefreshTrigger::LibraryScan).with_local_metadata(true);
        assert!(!RefreshGate::should_refresh(&settled_movie(), &ctx).proceed);

        // Folders never stop on local metadata
        let folder = Item::new(
            ItemKind::folder(),
            "Extras",
            Some(PathBuf::from("/media/extras")),
            SourceType::Library,
        );
        assert!(RefreshGate::should_refresh(&folder, &ctx).proceed);
    }

    #[test]
    fn test_scheduled_replace_all_honours_local_only() {
        let item = settled_movie();
        let decision =
            RefreshGate::should_refresh(&item, &RefreshContext::scheduled().with_replace_all());
        assert_eq!(decision, RefreshDecision::proceed(true));

        let decision = RefreshGate::should_refresh(
            &item,
            &RefreshContext::scheduled().with_replace_all().local_only(),
        );
        assert_eq!(decision, RefreshDecision::proceed(false));
    }
}
