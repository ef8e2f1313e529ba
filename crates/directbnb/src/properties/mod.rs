//! Property listings imported from Airbnb and edited by their owners.

pub mod domain;
pub mod import;
pub mod repository;
pub mod router;
pub mod scrape;
pub mod service;


pub use domain::{Property, PropertyContent, PropertyId, PropertySummary};
pub use import::ScrapedListing;
pub use repository::PropertyRepository;
pub use router::{properties_router, PropertiesState};
pub use scrape::{
    BackgroundScrapes, HttpListingScraper, ListingScraper, ScrapeError, ScrapeJob, ScrapeRequest,
    ScrapeScheduler,
};
pub use service::{Page, PropertyError, PropertyService, PAGE_SIZE};
