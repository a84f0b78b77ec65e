//! Inherited attribute resolution
//!
//! An item's effective parental rating and tags combine its own values with
//! those of every ancestor. The result is cached on the item and recomputed
//! only after invalidation.

use uuid::Uuid;

use crate::error::Result;
use crate::models::Item;
use crate::persistence::AncestorProvider;

/// Effective attributes after inheritance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InheritedAttributes {
    /// Maximum rating over the item and its ancestors
    pub parental_rating_value: Option<i32>,
    /// Own tags, then ancestors' tags nearest first, first occurrence kept
    pub tags: Vec<String>,
}

/// Rating and tags of one ancestor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorInfo {
    pub id: Uuid,
    pub parental_rating_value: Option<i32>,
    pub tags: Vec<String>,
}

impl AncestorInfo {
    pub fn from_item(item: &Item) -> Self {
        Self {
            id: item.id,
            parental_rating_value: item.parental_rating_value(),
            tags: item.tags().to_vec(),
        }
    }
}

/// Combine own values with ancestors ordered nearest first
pub fn combine(
    own_rating: Option<i32>,
    own_tags: &[String],
    ancestors: &[AncestorInfo],
) -> InheritedAttributes {
    let parental_rating_value = ancestors
        .iter()
        .map(|a| a.parental_rating_value)
        .fold(own_rating, |max, rating| max.max(rating));

    let mut tags: Vec<String> = Vec::new();
    let chain = std::iter::once(own_tags).chain(ancestors.iter().map(|a| a.tags.as_slice()));
    for tag in chain.flatten() {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }

    InheritedAttributes {
        parental_rating_value,
        tags,
    }
}

pub struct InheritedAttributeResolver;

impl InheritedAttributeResolver {
    /// Effective attributes of `item`, from cache when valid
    pub async fn resolve(
        item: &mut Item,
        ancestors: &dyn AncestorProvider,
    ) -> Result<InheritedAttributes> {
        if let Some(cached) = item.cached_inherited() {
            return Ok(cached.clone());
        }

        let chain = ancestors.ancestors(item).await?;
        let resolved = combine(item.parental_rating_value(), item.tags(), &chain);
        tracing::trace!(
            item_id = %item.id,
            ancestors = chain.len(),
            "Resolved inherited attributes"
        );

        item.inherited_cache().set(resolved.clone());
        Ok(resolved)
    }
}
