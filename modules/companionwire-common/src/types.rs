use serde::{Deserialize, Serialize};

// --- Enums ---

/// Where a raw signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    Media,
    Product,
    Social,
    Regulatory,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Media => write!(f, "MEDIA"),
            SourceKind::Product => write!(f, "PRODUCT"),
            SourceKind::Social => write!(f, "SOCIAL"),
            SourceKind::Regulatory => write!(f, "REGULATORY"),
        }
    }
}

impl SourceKind {
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "PRODUCT" => Self::Product,
            "SOCIAL" => Self::Social,
            "REGULATORY" => Self::Regulatory,
            _ => Self::Media,
        }
    }
}

/// Editorial category assigned by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    ProductUpdate,
    MonetizationChange,
    SafetyYouthRisk,
    NsfwContentPolicy,
    CulturalTrend,
    RegulatoryLegal,
    BusinessFunding,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::ProductUpdate,
        Category::MonetizationChange,
        Category::SafetyYouthRisk,
        Category::NsfwContentPolicy,
        Category::CulturalTrend,
        Category::RegulatoryLegal,
        Category::BusinessFunding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ProductUpdate => "PRODUCT_UPDATE",
            Category::MonetizationChange => "MONETIZATION_CHANGE",
            Category::SafetyYouthRisk => "SAFETY_YOUTH_RISK",
            Category::NsfwContentPolicy => "NSFW_CONTENT_POLICY",
            Category::CulturalTrend => "CULTURAL_TREND",
            Category::RegulatoryLegal => "REGULATORY_LEGAL",
            Category::BusinessFunding => "BUSINESS_FUNDING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRODUCT_UPDATE" => Some(Category::ProductUpdate),
            "MONETIZATION_CHANGE" => Some(Category::MonetizationChange),
            "SAFETY_YOUTH_RISK" => Some(Category::SafetyYouthRisk),
            "NSFW_CONTENT_POLICY" => Some(Category::NsfwContentPolicy),
            "CULTURAL_TREND" => Some(Category::CulturalTrend),
            "REGULATORY_LEGAL" => Some(Category::RegulatoryLegal),
            "BUSINESS_FUNDING" => Some(Category::BusinessFunding),
            _ => None,
        }
    }

    /// Ranking weight. Safety and regulation stories outrank the rest.
    pub fn weight(&self) -> f64 {
        match self {
            Category::SafetyYouthRisk | Category::RegulatoryLegal => 1.5,
            _ => 1.0,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a signal through normalization.
/// Created `Pending`; transitions once to a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestStatus {
    Pending,
    Accepted,
    Rejected,
    Failed,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Pending => "PENDING",
            IngestStatus::Accepted => "ACCEPTED",
            IngestStatus::Rejected => "REJECTED",
            IngestStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A cluster is `Active` while its newest signal is inside the configured
/// window; the sweep demotes the rest to `Stale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterStatus {
    Active,
    Stale,
}

impl ClusterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterStatus::Active => "ACTIVE",
            ClusterStatus::Stale => "STALE",
        }
    }
}

impl std::fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit status of one ingest cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Feed time window for the cluster query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    Day,
    #[default]
    Week,
    Month,
}

impl Window {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(Window::Day),
            "7d" => Some(Window::Week),
            "30d" => Some(Window::Month),
            _ => None,
        }
    }

    pub fn hours(&self) -> i64 {
        match self {
            Window::Day => 24,
            Window::Week => 24 * 7,
            Window::Month => 24 * 30,
        }
    }
}

// --- Entities extracted by the normalizer ---

/// Named entities pulled out of one news item. Each list is deduplicated
/// and order-preserving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityBundle {
    pub platforms: Vec<String>,
    pub companies: Vec<String>,
    pub people: Vec<String>,
    pub topics: Vec<String>,
}

/// Slugify a platform name: lowercase, whitespace runs collapsed to hyphens.
pub fn platform_slug(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_wire_strings_round_trip() {
        for c in Category::ALL {
            assert_eq!(Category::parse(c.as_str()), Some(c));
        }
        assert_eq!(Category::parse("SPORTS"), None);
    }

    #[test]
    fn category_weight_boosts_safety_and_regulatory() {
        assert_eq!(Category::SafetyYouthRisk.weight(), 1.5);
        assert_eq!(Category::RegulatoryLegal.weight(), 1.5);
        assert_eq!(Category::ProductUpdate.weight(), 1.0);
        assert_eq!(Category::CulturalTrend.weight(), 1.0);
    }

    #[test]
    fn source_kind_loose_parse_defaults_to_media() {
        assert_eq!(SourceKind::from_str_loose("product"), SourceKind::Product);
        assert_eq!(SourceKind::from_str_loose("REGULATORY"), SourceKind::Regulatory);
        assert_eq!(SourceKind::from_str_loose("whatever"), SourceKind::Media);
    }

    #[test]
    fn window_parse() {
        assert_eq!(Window::parse("24h"), Some(Window::Day));
        assert_eq!(Window::parse("7d"), Some(Window::Week));
        assert_eq!(Window::parse("30d"), Some(Window::Month));
        assert_eq!(Window::parse("90d"), None);
        assert_eq!(Window::default().hours(), 168);
    }

    #[test]
    fn platform_slug_collapses_whitespace() {
        assert_eq!(platform_slug("Character AI"), "character-ai");
        assert_eq!(platform_slug("  Replika  "), "replika");
        assert_eq!(platform_slug("Talkie:  Soulful AI"), "talkie:-soulful-ai");
    }
}
