//! Domain records: flyers, advertisements and their supporting types.

pub mod ad;
pub mod flyer;

pub use ad::{AdMetrics, AdPosition, Advertisement};
pub use flyer::{FieldError, Flyer, FlyerCategory, FlyerSource, StoreLocation, UserLocation};
