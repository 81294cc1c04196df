//! Domain module - product records, identity and session envelope
//!
//! Everything here is synchronous and free of I/O.

pub mod dedup;
pub mod identity;
pub mod product;
pub mod product_url;
pub mod raw_listing;
pub mod session;

pub use dedup::{DedupEngine, IngestOutcome, IngestStats};
pub use identity::{DedupKey, assign_product_id};
pub use product::{
    Availability, Measurement, NormalizedProduct, PriceInfo, UNKNOWN_BRAND, URL_SENTINEL,
    UnitMeasurement,
};
pub use product_url::CanonicalUrl;
pub use raw_listing::RawListingRecord;
pub use session::{FILE_VERSION, ScrapeSession, SessionDocument};
