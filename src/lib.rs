//! Weighted banner rotation.
//!
//! Given a snapshot of banners assigned to a place, [`rotator::select_banner`] filters out
//! everything not eligible right now (inactive, outside its display window, over its view or
//! click quota) and draws a single winner with probability proportional to its weight.
//!
//! Storage of banners and counters lives behind [`repository::BannerRepository`]; the
//! selection itself never mutates anything.

pub mod banners;
pub mod eligibility;
pub mod errors;
pub mod logger;
pub mod repository;
pub mod rotation;
pub mod rotator;
pub mod selector;
pub mod snapshot;
pub mod utils;

pub use banners::{Banner, BannerId, Campaign, Place, PlacementId, UrlTarget};
pub use errors::{BannerError, RepositoryError, SelectionError, ServeError, SnapshotError};
pub use rotator::{select_banner, select_banner_traced, BannerRotator, SelectionTrace};
pub use selector::{pick, FixedDraws, RandomSource};
