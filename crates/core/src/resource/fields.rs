//! Upstream field name ↔ local column mapping.
//!
//! Dotted upstream names (`image.thumb_url`, `volume.id`) address fields of a
//! nested object in the upstream JSON; locally they are flattened into one
//! column each.

/// Column holding a whole upstream object as JSON text, for snapshots that
/// keep records unflattened. Not addressable by `filter` or `sort`.
pub const DATA_COLUMN: &str = "data";

/// Storage affinity of a mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text,
}

impl FieldKind {
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Integer => "INTEGER",
            FieldKind::Text => "TEXT",
        }
    }
}

/// One upstream field and the local column holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    pub api: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldMap {
    /// Top-level upstream key this field lives under.
    pub fn top_level(&self) -> &'static str {
        self.api.split('.').next().unwrap_or(self.api)
    }
}

const fn int(api: &'static str, column: &'static str) -> FieldMap {
    FieldMap { api, column, kind: FieldKind::Integer }
}

const fn text(api: &'static str, column: &'static str) -> FieldMap {
    FieldMap { api, column, kind: FieldKind::Text }
}

/// Fields every resource type carries. `id` must stay first.
pub(crate) static COMMON: &[FieldMap] = &[
    int("id", "id"),
    text("name", "name"),
    text("aliases", "aliases"),
    text("deck", "deck"),
    text("description", "description"),
    text("api_detail_url", "api_detail_url"),
    text("site_detail_url", "site_detail_url"),
    text("date_added", "date_added"),
    text("date_last_updated", "date_last_updated"),
    text("image.icon_url", "image_icon_url"),
    text("image.medium_url", "image_medium_url"),
    text("image.screen_url", "image_screen_url"),
    text("image.screen_large_url", "image_screen_large_url"),
    text("image.small_url", "image_small_url"),
    text("image.super_url", "image_super_url"),
    text("image.thumb_url", "image_thumb_url"),
    text("image.tiny_url", "image_tiny_url"),
    text("image.original_url", "image_original_url"),
];

pub(crate) static ISSUE: &[FieldMap] = &[
    text("issue_number", "issue_number"),
    text("cover_date", "cover_date"),
    text("store_date", "store_date"),
    int("volume.id", "volume_id"),
    text("volume.name", "volume_name"),
];

pub(crate) static VOLUME: &[FieldMap] = &[
    text("start_year", "start_year"),
    int("count_of_issues", "count_of_issues"),
    int("publisher.id", "publisher_id"),
    text("publisher.name", "publisher_name"),
    int("first_issue.id", "first_issue_id"),
    text("first_issue.issue_number", "first_issue_number"),
    int("last_issue.id", "last_issue_id"),
    text("last_issue.issue_number", "last_issue_number"),
];

pub(crate) static CHARACTER: &[FieldMap] = &[
    text("real_name", "real_name"),
    text("birth", "birth"),
    int("gender", "gender"),
    int("count_of_issue_appearances", "count_of_issue_appearances"),
    int("publisher.id", "publisher_id"),
    text("publisher.name", "publisher_name"),
    int("origin.id", "origin_id"),
    text("origin.name", "origin_name"),
    int("first_appeared_in_issue.id", "first_appeared_in_issue_id"),
];

/// Concepts, objects and locations share the same shape.
pub(crate) static APPEARING: &[FieldMap] = &[
    text("start_year", "start_year"),
    int("count_of_issue_appearances", "count_of_issue_appearances"),
    int("first_appeared_in_issue.id", "first_appeared_in_issue_id"),
];

pub(crate) static PERSON: &[FieldMap] = &[
    text("birth", "birth"),
    text("country", "country"),
    text("hometown", "hometown"),
    text("email", "email"),
    text("website", "website"),
    int("gender", "gender"),
    int("count_of_issue_appearances", "count_of_issue_appearances"),
];

pub(crate) static STORY_ARC: &[FieldMap] = &[
    int("count_of_issue_appearances", "count_of_issue_appearances"),
    int("publisher.id", "publisher_id"),
    text("publisher.name", "publisher_name"),
    int("first_appeared_in_issue.id", "first_appeared_in_issue_id"),
];

pub(crate) static TEAM: &[FieldMap] = &[
    int("count_of_team_members", "count_of_team_members"),
    int("count_of_issue_appearances", "count_of_issue_appearances"),
    int("publisher.id", "publisher_id"),
    text("publisher.name", "publisher_name"),
    int("first_appeared_in_issue.id", "first_appeared_in_issue_id"),
];

pub(crate) static VIDEO: &[FieldMap] = &[
    int("length_seconds", "length_seconds"),
    text("publish_date", "publish_date"),
    text("url", "url"),
    text("user", "user"),
];

pub(crate) static PUBLISHER: &[FieldMap] = &[
    text("location_address", "location_address"),
    text("location_city", "location_city"),
    text("location_state", "location_state"),
];

pub(crate) static SERIES: &[FieldMap] = &[
    text("start_year", "start_year"),
    int("count_of_episodes", "count_of_episodes"),
    int("publisher.id", "publisher_id"),
    text("publisher.name", "publisher_name"),
];

pub(crate) static EPISODE: &[FieldMap] = &[
    text("episode_number", "episode_number"),
    text("air_date", "air_date"),
    int("series.id", "series_id"),
    text("series.name", "series_name"),
];
