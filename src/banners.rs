use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::BannerError;

pub type BannerId = usize;
pub type PlacementId = usize;

/// Smallest weight a banner may carry
pub const MIN_WEIGHT: u8 = 1;
/// Largest weight a banner may carry. A banner with weight 10 shows ten times as often as one with weight 1.
pub const MAX_WEIGHT: u8 = 10;
pub const DEFAULT_WEIGHT: u8 = 5;

/// Where a click on the banner opens its target url
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UrlTarget {
    /// Current page
    #[default]
    #[serde(rename = "_self")]
    SELF,
    /// Blank page
    #[serde(rename = "_blank")]
    BLANK,
}

impl UrlTarget {
    /// HTML `target` attribute value
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlTarget::SELF => "_self",
            UrlTarget::BLANK => "_blank",
        }
    }
}

/// Advertising campaign grouping banners together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub campaign_id: usize,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A named slot on a page where banners are displayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub place_id: PlacementId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub width: Option<u16>,
    #[serde(default)]
    pub height: Option<u16>,
}

impl Place {
    pub fn new(place_id: PlacementId, name: &str, slug: &str) -> Self {
        Self {
            place_id,
            name: name.to_string(),
            slug: slug.to_string(),
            width: None,
            height: None,
        }
    }

    /// Display size hint, unknown dimensions rendered as `X`
    pub fn size_str(&self) -> String {
        match (self.width, self.height) {
            (Some(width), Some(height)) => format!("{}x{}", width, height),
            (Some(width), None) => format!("{}xX", width),
            (None, Some(height)) => format!("Xx{}", height),
            (None, None) => String::new(),
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.size_str();
        if size.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, size)
        }
    }
}

fn default_weight() -> u8 {
    DEFAULT_WEIGHT
}

fn deserialize_weight<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let weight = u8::deserialize(deserializer)?;
    validate_weight(weight).map_err(serde::de::Error::custom)?;
    Ok(weight)
}

fn default_active() -> bool {
    true
}

/// A banner together with its display quotas, schedule and counters.
///
/// Counters (`views`, `clicks`) are owned by the storage layer; selection only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    pub banner_id: BannerId,
    #[serde(default)]
    pub campaign_id: Option<usize>,
    pub name: String,
    #[serde(default)]
    pub alt: String,
    pub url: String,
    #[serde(default)]
    pub url_target: UrlTarget,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub file_hover: Option<String>,

    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub clicks: u64,
    /// 0 means unlimited
    #[serde(default)]
    pub max_views: u64,
    /// 0 means unlimited
    #[serde(default)]
    pub max_clicks: u64,

    /// Kept private so every banner carries a weight in `MIN_WEIGHT..=MAX_WEIGHT`
    #[serde(default = "default_weight", deserialize_with = "deserialize_weight")]
    weight: u8,

    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finish_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,

    #[serde(default)]
    pub placements: BTreeSet<PlacementId>,
}

impl Banner {
    /// Create an active, unscheduled, unlimited banner
    ///
    /// # Arguments
    /// * `banner_id` - Unique banner identity
    /// * `name` - Human readable name
    /// * `url` - Click target
    /// * `weight` - Relative display frequency in `1..=10`
    pub fn new(banner_id: BannerId, name: &str, url: &str, weight: u8) -> Result<Self, BannerError> {
        validate_weight(weight)?;
        Ok(Self {
            banner_id,
            campaign_id: None,
            name: name.to_string(),
            alt: String::new(),
            url: url.to_string(),
            url_target: UrlTarget::SELF,
            file: String::new(),
            file_hover: None,
            views: 0,
            clicks: 0,
            max_views: 0,
            max_clicks: 0,
            weight,
            start_at: None,
            finish_at: None,
            is_active: true,
            placements: BTreeSet::new(),
        })
    }

    pub fn weight(&self) -> u8 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: u8) -> Result<(), BannerError> {
        validate_weight(weight)?;
        self.weight = weight;
        Ok(())
    }

    /// Assign the banner to a place
    pub fn place_on(mut self, place_id: PlacementId) -> Self {
        self.placements.insert(place_id);
        self
    }

    pub fn is_swf(&self) -> bool {
        self.file.to_lowercase().ends_with("swf")
    }

    /// Views against quota, e.g. `"3 / 10"`, or just `"3"` when unlimited
    pub fn views_str(&self) -> String {
        quota_str(self.views, self.max_views)
    }

    /// Clicks against quota, e.g. `"1 / 5"`, or just `"1"` when unlimited
    pub fn clicks_str(&self) -> String {
        quota_str(self.clicks, self.max_clicks)
    }
}

fn quota_str(count: u64, max: u64) -> String {
    if max > 0 {
        format!("{} / {}", count, max)
    } else {
        format!("{}", count)
    }
}

/// Check that a weight lies in `MIN_WEIGHT..=MAX_WEIGHT`
pub fn validate_weight(weight: u8) -> Result<(), BannerError> {
    if (MIN_WEIGHT..=MAX_WEIGHT).contains(&weight) {
        Ok(())
    } else {
        Err(BannerError::WeightOutOfRange { weight })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_banner_defaults() {
        let banner = Banner::new(3, "Spring sale", "https://example.com/spring", 7).unwrap();
        assert!(banner.is_active);
        assert_eq!(banner.weight(), 7);
        assert_eq!(banner.max_views, 0);
        assert_eq!(banner.url_target, UrlTarget::SELF);
        assert!(banner.placements.is_empty());
    }

    #[test]
    fn test_weight_out_of_range() {
        assert_eq!(
            Banner::new(0, "Zero", "https://example.com", 0).unwrap_err(),
            BannerError::WeightOutOfRange { weight: 0 }
        );
        assert!(Banner::new(0, "Eleven", "https://example.com", 11).is_err());
        assert!(Banner::new(0, "Ten", "https://example.com", 10).is_ok());
        assert!(Banner::new(0, "One", "https://example.com", 1).is_ok());
    }

    #[test]
    fn test_place_size_str() {
        let mut place = Place::new(0, "Sidebar", "sidebar");
        assert_eq!(place.size_str(), "");
        assert_eq!(place.to_string(), "Sidebar");

        place.width = Some(240);
        assert_eq!(place.size_str(), "240xX");

        place.height = Some(400);
        assert_eq!(place.size_str(), "240x400");
        assert_eq!(place.to_string(), "Sidebar (240x400)");

        place.width = None;
        assert_eq!(place.size_str(), "Xx400");
    }

    #[test]
    fn test_quota_strings() {
        let mut banner = Banner::new(1, "Header", "https://example.com", 5).unwrap();
        banner.views = 3;
        banner.clicks = 1;
        assert_eq!(banner.views_str(), "3");
        assert_eq!(banner.clicks_str(), "1");

        banner.max_views = 10;
        banner.max_clicks = 5;
        assert_eq!(banner.views_str(), "3 / 10");
        assert_eq!(banner.clicks_str(), "1 / 5");
    }

    #[test]
    fn test_is_swf() {
        let mut banner = Banner::new(1, "Flash", "https://example.com", 5).unwrap();
        banner.file = "uploads/banners/promo.SWF".to_string();
        assert!(banner.is_swf());
        banner.file = "uploads/banners/promo.png".to_string();
        assert!(!banner.is_swf());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let banner: Banner = serde_json::from_str(
            r#"{"banner_id": 4, "name": "Footer", "url": "https://example.com", "placements": [1, 2]}"#,
        )
        .unwrap();
        assert_eq!(banner.weight(), DEFAULT_WEIGHT);
        assert!(banner.is_active);
        assert_eq!(banner.views, 0);
        assert!(banner.placements.contains(&2));
    }

    #[test]
    fn test_set_weight_keeps_range() {
        let mut banner = Banner::new(0, "Header", "https://example.com", 5).unwrap();
        assert_eq!(banner.set_weight(0), Err(BannerError::WeightOutOfRange { weight: 0 }));
        assert_eq!(banner.set_weight(200), Err(BannerError::WeightOutOfRange { weight: 200 }));
        assert_eq!(banner.weight(), 5);
        banner.set_weight(10).unwrap();
        assert_eq!(banner.weight(), 10);
    }

    #[test]
    fn test_deserialize_rejects_weight_out_of_range() {
        for weight in [0, 11, 200] {
            let json = format!(
                r#"{{"banner_id": 0, "name": "Zero", "url": "https://example.com", "weight": {}, "placements": [1]}}"#,
                weight
            );
            let err = serde_json::from_str::<Banner>(&json).unwrap_err();
            assert!(err.to_string().contains("outside of allowed range"), "{}", err);
        }
        let json = r#"{"banner_id": 0, "name": "Ten", "url": "https://example.com", "weight": 10}"#;
        assert_eq!(serde_json::from_str::<Banner>(json).unwrap().weight(), 10);
    }

    #[test]
    fn test_url_target_serialized_as_html_target() {
        assert_eq!(serde_json::to_string(&UrlTarget::BLANK).unwrap(), "\"_blank\"");
        let target: UrlTarget = serde_json::from_str("\"_self\"").unwrap();
        assert_eq!(target, UrlTarget::SELF);
        assert_eq!(UrlTarget::BLANK.as_str(), "_blank");
    }
}
