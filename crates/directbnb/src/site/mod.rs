//! Themes, color schemes and the websites customers configure with them.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    get_domain, ColorScheme, ColorSchemeId, Theme, ThemeColor, ThemeId, Website, WebsiteId,
};
pub use repository::SiteRepository;
pub use router::{site_router, SiteState};
pub use service::{
    ColorSchemeInput, SiteError, SiteService, ThemeInput, WebsiteConfiguration, WebsiteInput,
};
