use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::banners::{Banner, Campaign, Place};
use crate::errors::SnapshotError;

/// A consistent copy of campaigns, places and banners
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub banners: Vec<Banner>,
}

impl Snapshot {
    /// Read and validate a JSON snapshot file
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check that ids are unique and every reference points at something in the snapshot
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let place_ids: HashSet<_> = self.places.iter().map(|p| p.place_id).collect();
        let campaign_ids: HashSet<_> = self.campaigns.iter().map(|c| c.campaign_id).collect();
        let mut banner_ids = HashSet::with_capacity(self.banners.len());

        for banner in &self.banners {
            if !banner_ids.insert(banner.banner_id) {
                return Err(SnapshotError::DuplicateBanner { banner_id: banner.banner_id });
            }
            if let Some(&place_id) = banner.placements.iter().find(|id| !place_ids.contains(id)) {
                return Err(SnapshotError::DanglingPlace { banner_id: banner.banner_id, place_id });
            }
            if let Some(campaign_id) = banner.campaign_id {
                if !campaign_ids.contains(&campaign_id) {
                    return Err(SnapshotError::DanglingCampaign { banner_id: banner.banner_id, campaign_id });
                }
            }
        }
        Ok(())
    }
}
