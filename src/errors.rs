use crate::banners::{BannerId, PlacementId};

/// Outcome of a selection request that found nothing to show.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("no eligible banner for place {place_id}")]
    NoEligibleBanner { place_id: PlacementId },
}

/// Banner construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BannerError {
    #[error("banner weight {weight} outside of allowed range 1..=10")]
    WeightOutOfRange { weight: u8 },
}

/// Errors raised by a banner repository.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("unknown banner {banner_id}")]
    UnknownBanner { banner_id: BannerId },

    #[error("unknown place '{slug}'")]
    UnknownPlace { slug: String },
}

/// Errors raised while loading a banner snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("banner {banner_id} is assigned to unknown place {place_id}")]
    DanglingPlace { banner_id: BannerId, place_id: PlacementId },

    #[error("banner {banner_id} references unknown campaign {campaign_id}")]
    DanglingCampaign { banner_id: BannerId, campaign_id: usize },

    #[error("banner id {banner_id} appears more than once")]
    DuplicateBanner { banner_id: BannerId },
}

/// Errors raised while serving a banner for a place
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Selection(#[from] SelectionError),
}
