//! Favorite and tag annotations
//!
//! Annotations live in a side-table keyed by item id. They are written by a
//! separate feature and only read here for presentation and the working set.

use serde::{Deserialize, Serialize};

use super::newtypes::ItemId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    item_id: ItemId,
    /// Ordering rank among favorites; `None` when not a favorite
    favorite_rank: Option<i64>,
    /// Opaque tag payload
    tag_data: Option<Vec<u8>>,
}

impl Annotation {
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            favorite_rank: None,
            tag_data: None,
        }
    }

    pub fn with_favorite_rank(mut self, rank: i64) -> Self {
        self.favorite_rank = Some(rank);
        self
    }

    pub fn with_tag_data(mut self, data: Vec<u8>) -> Self {
        self.tag_data = Some(data);
        self
    }

    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    pub fn favorite_rank(&self) -> Option<i64> {
        self.favorite_rank
    }

    pub fn tag_data(&self) -> Option<&[u8]> {
        self.tag_data.as_deref()
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite_rank.is_some()
    }
}
