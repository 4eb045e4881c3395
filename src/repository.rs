use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::banners::{Banner, BannerId, Place, PlacementId};
use crate::errors::RepositoryError;
use crate::snapshot::Snapshot;

/// Stored user agents are cut to this many characters
pub const MAX_USER_AGENT_LEN: usize = 1000;

/// How a click request names the place the banner was shown in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceRef {
    Id(PlacementId),
    Slug(String),
}

/// Requester metadata accompanying a click
#[derive(Debug, Clone, PartialEq)]
pub struct ClickRequest {
    pub place: Option<PlaceRef>,
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub user_id: Option<u64>,
    pub at: DateTime<Utc>,
}

impl ClickRequest {
    /// Anonymous click with no metadata besides its time
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            place: None,
            ip: None,
            user_agent: None,
            referrer: None,
            user_id: None,
            at,
        }
    }
}

/// Audit record of a single click
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Click {
    pub banner_id: BannerId,
    /// `None` when the request named no place or an unknown one
    pub place_id: Option<PlacementId>,
    pub user_id: Option<u64>,
    pub datetime: DateTime<Utc>,
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Storage collaborator of the rotator.
///
/// Implementations own the counters and must apply increments atomically with respect to each
/// other; selection only ever sees the snapshot returned by [`BannerRepository::banners_for_place`].
pub trait BannerRepository {
    fn place(&self, place_id: PlacementId) -> Option<&Place>;

    fn place_by_slug(&self, slug: &str) -> Option<&Place>;

    /// Current copy of the banners that may be shown at `place_id`
    fn banners_for_place(&self, place_id: PlacementId) -> Vec<Banner>;

    fn record_view(&mut self, banner_id: BannerId) -> Result<(), RepositoryError>;

    /// Increment the click counter and store an audit record
    fn record_click(&mut self, banner_id: BannerId, request: ClickRequest) -> Result<Click, RepositoryError>;
}

/// Repository keeping everything in memory, seeded from a snapshot
pub struct MemoryRepository {
    snapshot: Snapshot,
    clicks: Vec<Click>,
}

impl MemoryRepository {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            clicks: Vec::new(),
        }
    }

    pub fn banner(&self, banner_id: BannerId) -> Option<&Banner> {
        self.snapshot.banners.iter().find(|b| b.banner_id == banner_id)
    }

    pub fn banners(&self) -> &[Banner] {
        &self.snapshot.banners
    }

    pub fn places(&self) -> &[Place] {
        &self.snapshot.places
    }

    pub fn clicks(&self) -> &[Click] {
        &self.clicks
    }

    fn banner_mut(&mut self, banner_id: BannerId) -> Result<&mut Banner, RepositoryError> {
        self.snapshot
            .banners
            .iter_mut()
            .find(|b| b.banner_id == banner_id)
            .ok_or(RepositoryError::UnknownBanner { banner_id })
    }

    fn resolve_place(&self, place: Option<&PlaceRef>) -> Option<PlacementId> {
        match place? {
            PlaceRef::Id(place_id) => self.place(*place_id).map(|p| p.place_id),
            PlaceRef::Slug(slug) => self.place_by_slug(slug).map(|p| p.place_id),
        }
    }
}

impl BannerRepository for MemoryRepository {
    fn place(&self, place_id: PlacementId) -> Option<&Place> {
        self.snapshot.places.iter().find(|p| p.place_id == place_id)
    }

    fn place_by_slug(&self, slug: &str) -> Option<&Place> {
        self.snapshot.places.iter().find(|p| p.slug == slug)
    }

    fn banners_for_place(&self, place_id: PlacementId) -> Vec<Banner> {
        // Cheap narrowing only, the rotator re-checks every eligibility rule
        self.snapshot
            .banners
            .iter()
            .filter(|b| b.is_active && b.placements.contains(&place_id))
            .cloned()
            .collect()
    }

    fn record_view(&mut self, banner_id: BannerId) -> Result<(), RepositoryError> {
        let banner = self.banner_mut(banner_id)?;
        banner.views = banner.views.saturating_add(1);
        Ok(())
    }

    fn record_click(&mut self, banner_id: BannerId, request: ClickRequest) -> Result<Click, RepositoryError> {
        let place_id = self.resolve_place(request.place.as_ref());
        let banner = self.banner_mut(banner_id)?;
        banner.clicks = banner.clicks.saturating_add(1);

        let click = Click {
            banner_id,
            place_id,
            user_id: request.user_id,
            datetime: request.at,
            ip: request.ip,
            user_agent: request
                .user_agent
                .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect()),
            referrer: request.referrer,
        };
        self.clicks.push(click.clone());
        Ok(click)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn repository() -> MemoryRepository {
        let mut inactive = Banner::new(2, "Paused", "https://example.com/paused", 5).unwrap().place_on(0);
        inactive.is_active = false;
        MemoryRepository::new(Snapshot {
            campaigns: Vec::new(),
            places: vec![Place::new(0, "Header", "header"), Place::new(1, "Footer", "footer")],
            banners: vec![
                Banner::new(0, "Header ad", "https://example.com/a", 5).unwrap().place_on(0),
                Banner::new(1, "Footer ad", "https://example.com/b", 5).unwrap().place_on(1),
                inactive,
            ],
        })
    }

    fn click_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_banners_for_place_narrows_by_place_and_activity() {
        let repo = repository();
        let ids: Vec<_> = repo.banners_for_place(0).iter().map(|b| b.banner_id).collect();
        assert_eq!(ids, vec![0]);
        assert!(repo.banners_for_place(5).is_empty());
    }

    #[test]
    fn test_place_lookup() {
        let repo = repository();
        assert_eq!(repo.place_by_slug("footer").map(|p| p.place_id), Some(1));
        assert!(repo.place_by_slug("sidebar").is_none());
        assert_eq!(repo.place(0).map(|p| p.slug.as_str()), Some("header"));
    }

    #[test]
    fn test_record_view() {
        let mut repo = repository();
        repo.record_view(0).unwrap();
        repo.record_view(0).unwrap();
        assert_eq!(repo.banner(0).unwrap().views, 2);
        assert_eq!(repo.banner(0).unwrap().clicks, 0);
        assert_eq!(repo.record_view(99), Err(RepositoryError::UnknownBanner { banner_id: 99 }));
    }

    #[test]
    fn test_record_click_stores_audit_entry() {
        let mut repo = repository();
        let request = ClickRequest {
            place: Some(PlaceRef::Slug("header".to_string())),
            ip: Some("192.0.2.7".parse().unwrap()),
            user_agent: Some("Mozilla/5.0".to_string()),
            referrer: Some("https://news.example.com/".to_string()),
            user_id: Some(12),
            at: click_time(),
        };
        let click = repo.record_click(0, request).unwrap();

        assert_eq!(click.place_id, Some(0));
        assert_eq!(click.user_id, Some(12));
        assert_eq!(click.datetime, click_time());
        assert_eq!(repo.banner(0).unwrap().clicks, 1);
        assert_eq!(repo.banner(0).unwrap().views, 0);
        assert_eq!(repo.clicks(), &[click]);
    }

    #[test]
    fn test_record_click_unknown_place_is_kept_without_place() {
        let mut repo = repository();
        let mut request = ClickRequest::at(click_time());
        request.place = Some(PlaceRef::Id(42));
        let click = repo.record_click(1, request).unwrap();
        assert_eq!(click.place_id, None);
        assert_eq!(repo.banner(1).unwrap().clicks, 1);
    }

    #[test]
    fn test_record_click_truncates_user_agent() {
        let mut repo = repository();
        let mut request = ClickRequest::at(click_time());
        request.user_agent = Some("x".repeat(MAX_USER_AGENT_LEN + 250));
        let click = repo.record_click(0, request).unwrap();
        assert_eq!(click.user_agent.unwrap().len(), MAX_USER_AGENT_LEN);
    }

    #[test]
    fn test_record_click_unknown_banner() {
        let mut repo = repository();
        let result = repo.record_click(7, ClickRequest::at(click_time()));
        assert_eq!(result, Err(RepositoryError::UnknownBanner { banner_id: 7 }));
        assert!(repo.clicks().is_empty());
    }
}
