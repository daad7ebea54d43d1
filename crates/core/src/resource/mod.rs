//! Resource types and the static tables that describe them.
//!
//! Everything that differs between resource types (path segments, id
//! prefixes, local table names, upstream field names and their column
//! counterparts) lives in [`RESOURCES`]. Code that touches a resource type
//! looks its [`ResourceSpec`] up instead of branching on the variant.

mod fields;
mod parse;
mod query;

pub use fields::{DATA_COLUMN, FieldKind, FieldMap};
pub use parse::{ResourceKey, ResourceRequest, parse_request};
pub use query::QueryParams;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain categories exposed by the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Issue,
    Volume,
    Character,
    Concept,
    Object,
    Origin,
    Person,
    Power,
    StoryArc,
    Team,
    Location,
    Video,
    Publisher,
    Series,
    Episode,
    VideoType,
    VideoCategory,
}

/// Static description of one resource type.
#[derive(Debug)]
pub struct ResourceSpec {
    pub kind: ResourceType,
    /// Path segment for detail requests (`/api/{singular}/...`).
    pub singular: &'static str,
    /// Path segment for list requests (`/api/{plural}`).
    pub plural: &'static str,
    /// Upstream id prefix (`4000` in `4000-12345`), if the type uses one.
    pub prefix: Option<&'static str>,
    /// Local table populated by the importer.
    pub table: &'static str,
    /// Type-specific fields, on top of [`fields::COMMON`].
    pub extra: &'static [FieldMap],
}

pub static RESOURCES: &[ResourceSpec] = &[
    ResourceSpec {
        kind: ResourceType::Issue,
        singular: "issue",
        plural: "issues",
        prefix: Some("4000"),
        table: "cv_issue",
        extra: fields::ISSUE,
    },
    ResourceSpec {
        kind: ResourceType::Volume,
        singular: "volume",
        plural: "volumes",
        prefix: Some("4050"),
        table: "cv_volume",
        extra: fields::VOLUME,
    },
    ResourceSpec {
        kind: ResourceType::Character,
        singular: "character",
        plural: "characters",
        prefix: Some("4005"),
        table: "cv_character",
        extra: fields::CHARACTER,
    },
    ResourceSpec {
        kind: ResourceType::Concept,
        singular: "concept",
        plural: "concepts",
        prefix: Some("4015"),
        table: "cv_concept",
        extra: fields::APPEARING,
    },
    ResourceSpec {
        kind: ResourceType::Object,
        singular: "object",
        plural: "objects",
        prefix: Some("4020"),
        table: "cv_object",
        extra: fields::APPEARING,
    },
    ResourceSpec {
        kind: ResourceType::Origin,
        singular: "origin",
        plural: "origins",
        prefix: Some("4025"),
        table: "cv_origin",
        extra: &[],
    },
    ResourceSpec {
        kind: ResourceType::Person,
        singular: "person",
        plural: "people",
        prefix: Some("4040"),
        table: "cv_person",
        extra: fields::PERSON,
    },
    ResourceSpec {
        kind: ResourceType::Power,
        singular: "power",
        plural: "powers",
        prefix: Some("4027"),
        table: "cv_power",
        extra: &[],
    },
    ResourceSpec {
        kind: ResourceType::StoryArc,
        singular: "story_arc",
        plural: "story_arcs",
        prefix: Some("4045"),
        table: "cv_story_arc",
        extra: fields::STORY_ARC,
    },
    ResourceSpec {
        kind: ResourceType::Team,
        singular: "team",
        plural: "teams",
        prefix: Some("4060"),
        table: "cv_team",
        extra: fields::TEAM,
    },
    ResourceSpec {
        kind: ResourceType::Location,
        singular: "location",
        plural: "locations",
        prefix: Some("4023"),
        table: "cv_location",
        extra: fields::APPEARING,
    },
    ResourceSpec {
        kind: ResourceType::Video,
        singular: "video",
        plural: "videos",
        prefix: Some("2300"),
        table: "cv_video",
        extra: fields::VIDEO,
    },
    ResourceSpec {
        kind: ResourceType::Publisher,
        singular: "publisher",
        plural: "publishers",
        prefix: Some("4010"),
        table: "cv_publisher",
        extra: fields::PUBLISHER,
    },
    ResourceSpec {
        kind: ResourceType::Series,
        singular: "series",
        plural: "series",
        prefix: Some("4070"),
        table: "cv_series",
        extra: fields::SERIES,
    },
    ResourceSpec {
        kind: ResourceType::Episode,
        singular: "episode",
        plural: "episodes",
        prefix: Some("4075"),
        table: "cv_episode",
        extra: fields::EPISODE,
    },
    ResourceSpec {
        kind: ResourceType::VideoType,
        singular: "video_type",
        plural: "video_types",
        prefix: None,
        table: "cv_video_type",
        extra: &[],
    },
    ResourceSpec {
        kind: ResourceType::VideoCategory,
        singular: "video_category",
        plural: "video_categories",
        prefix: None,
        table: "cv_video_category",
        extra: &[],
    },
];

impl ResourceType {
    /// Every supported type, in table order.
    pub fn all() -> impl Iterator<Item = ResourceType> {
        RESOURCES.iter().map(|spec| spec.kind)
    }

    /// The static description of this type.
    pub fn spec(self) -> &'static ResourceSpec {
        RESOURCES
            .iter()
            .find(|spec| spec.kind == self)
            .unwrap_or_else(|| unreachable!("every ResourceType has a RESOURCES entry"))
    }

    /// Canonical name, as stored in the cache table's `resource_type` column.
    pub fn as_str(self) -> &'static str {
        self.spec().singular
    }

    pub fn from_singular(segment: &str) -> Option<Self> {
        RESOURCES.iter().find(|spec| spec.singular == segment).map(|spec| spec.kind)
    }

    pub fn from_plural(segment: &str) -> Option<Self> {
        RESOURCES.iter().find(|spec| spec.plural == segment).map(|spec| spec.kind)
    }

    /// Match a snapshot table name (`cv_issue`) to its type.
    pub fn from_table(table: &str) -> Option<Self> {
        RESOURCES.iter().find(|spec| spec.table == table).map(|spec| spec.kind)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = crate::Error;

    /// Accepts singular or plural path segments.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_singular(s)
            .or_else(|| Self::from_plural(s))
            .ok_or_else(|| crate::Error::UnrecognizedResource(s.to_string()))
    }
}

impl ResourceSpec {
    /// All mapped fields: the common set followed by the type-specific extras.
    pub fn fields(&self) -> impl Iterator<Item = &'static FieldMap> + Clone {
        fields::COMMON.iter().chain(self.extra.iter())
    }

    /// Resolve an upstream field name to its mapping.
    ///
    /// A bare name such as `volume` also resolves to the `volume.id` mapping,
    /// matching how the upstream API filters on associated resources.
    pub fn field(&self, api_name: &str) -> Option<&'static FieldMap> {
        self.fields().find(|f| f.api == api_name).or_else(|| {
            self.fields()
                .find(|f| f.api.strip_suffix(".id").is_some_and(|parent| parent == api_name))
        })
    }
}
