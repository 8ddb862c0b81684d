// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod unify;

pub use unify::{Source, unify};

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::feed::{Enclosure, FeedEntry};
use crate::video::{Format, VideoHandle};

/// Name used when a source record has neither title nor id
pub const PLACEHOLDER_NAME: &str = "untitled";

/// One synchronized unit, normalized from any source kind
#[derive(Debug, Clone)]
pub struct Item {
    /// Source-provided identifier, possibly empty or repeated
    pub uid: String,
    /// Deduplication and path naming key
    pub name: String,
    pub authors: String,
    pub feed_name: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    /// Governs freshness; falls back to the published time during unification
    pub updated: Option<DateTime<Utc>>,
    pub media: Vec<Media>,
    /// The record this item was built from
    pub raw: RawRecord,
}

/// Downloadable artifact attached to an item
#[derive(Debug, Clone)]
pub enum Media {
    Enclosure(Enclosure),
    Video {
        video: Arc<VideoHandle>,
        format: Format,
    },
}

/// Original source record kept alongside the normalized item
#[derive(Debug, Clone)]
pub enum RawRecord {
    Entry(Box<FeedEntry>),
    Video(Arc<VideoHandle>),
}

impl Item {
    /// Freshness timestamp as written to the `updated` sentinel file
    pub fn freshness(&self) -> String {
        self.updated
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Pick a non-empty display name, falling back to the uid
pub(crate) fn item_name(title: Option<&str>, uid: &str) -> String {
    title
        .filter(|t| !t.trim().is_empty())
        .or(Some(uid).filter(|u| !u.trim().is_empty()))
        .unwrap_or(PLACEHOLDER_NAME)
        .to_string()
}

/// Sort items oldest first, then by name and feed; ties keep their order
pub fn sort_items(items: &mut [Item]) {
    items.sort_by(|a, b| {
        a.updated
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            .cmp(&b.updated.unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.feed_name.cmp(&b.feed_name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_item(name: &str, updated: Option<DateTime<Utc>>) -> Item {
        Item {
            uid: String::new(),
            name: name.to_string(),
            authors: String::new(),
            feed_name: "Feed".to_string(),
            description: String::new(),
            published: None,
            updated,
            media: vec![],
            raw: RawRecord::Entry(Box::default()),
        }
    }

    #[test]
    fn freshness_is_rfc3339_utc() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap();
        assert_eq!(
            make_item("a", Some(at)).freshness(),
            "2024-01-15T12:30:00Z"
        );
    }

    #[test]
    fn freshness_without_timestamp_is_epoch() {
        assert_eq!(make_item("a", None).freshness(), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn name_falls_back_to_uid_then_placeholder() {
        assert_eq!(item_name(Some("Title"), "uid"), "Title");
        assert_eq!(item_name(Some("  "), "uid"), "uid");
        assert_eq!(item_name(None, "uid"), "uid");
        assert_eq!(item_name(None, ""), PLACEHOLDER_NAME);
    }

    #[test]
    fn sort_orders_by_time_then_name() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut items = vec![
            make_item("b", Some(late)),
            make_item("z", Some(early)),
            make_item("a", Some(late)),
            make_item("undated", None),
        ];
        sort_items(&mut items);

        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["undated", "z", "a", "b"]);
    }

    #[test]
    fn sort_is_stable_for_full_ties() {
        let mut items = vec![make_item("same", None), make_item("same", None)];
        items[0].uid = "first".to_string();
        items[1].uid = "second".to_string();
        sort_items(&mut items);
        assert_eq!(items[0].uid, "first");
    }
}
