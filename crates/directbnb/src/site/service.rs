use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::domain::{
    get_domain, parse_theme_colors, ColorScheme, ColorSchemeId, Theme, ThemeId, Website,
    WebsiteId,
};
use super::repository::SiteRepository;
use crate::access::Principal;
use crate::config::SiteConfig;
use crate::properties::{ScrapeError, ScrapeRequest, ScrapeScheduler};
use crate::repository::RepositoryError;
use crate::validation::FieldErrors;

static THEME_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static COLOR_SCHEME_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static WEBSITE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThemeInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preview_link: Option<String>,
    #[serde(default)]
    pub icon_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColorSchemeInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub internal_name: Option<String>,
    #[serde(default)]
    pub theme_colors: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebsiteInput {
    #[serde(default)]
    pub theme: Option<ThemeId>,
    #[serde(default)]
    pub color_scheme: Option<ColorSchemeId>,
    #[serde(default)]
    pub airbnb_listing_url: Option<String>,
    #[serde(default)]
    pub booking_listing_url: Option<String>,
    #[serde(default)]
    pub domain_name: Option<String>,
}

/// Website with its theme and color scheme expanded.
#[derive(Debug, Clone, Serialize)]
pub struct WebsiteConfiguration {
    #[serde(flatten)]
    pub website: Website,
    pub theme_detail: Option<Theme>,
    pub color_scheme_detail: Option<ColorScheme>,
}

pub struct SiteService {
    repository: Arc<dyn SiteRepository>,
    site: SiteConfig,
    scraper: Arc<dyn ScrapeScheduler>,
}

impl SiteService {
    pub fn new(
        repository: Arc<dyn SiteRepository>,
        site: SiteConfig,
        scraper: Arc<dyn ScrapeScheduler>,
    ) -> Self {
        Self {
            repository,
            site,
            scraper,
        }
    }

    pub fn themes(&self) -> Result<Vec<Theme>, SiteError> {
        let mut themes = self.repository.themes()?;
        themes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(themes)
    }

    pub fn theme(&self, id: ThemeId) -> Result<Theme, SiteError> {
        self.repository.theme(id)?.ok_or(SiteError::NotFound)
    }

    pub fn theme_exists(&self, id: ThemeId) -> Result<bool, SiteError> {
        Ok(self.repository.theme(id)?.is_some())
    }

    pub fn create_theme(&self, input: ThemeInput) -> Result<Theme, SiteError> {
        let name = check_name(input.name.as_deref(), 255)
            .map_err(|message| FieldErrors::single("name", message))?;
        let now = Utc::now();
        let preview_link = non_blank(input.preview_link).unwrap_or_else(|| {
            format!(
                "{}_preview.{}",
                name.to_lowercase(),
                get_domain(self.site.site_url.as_str())
            )
        });
        let theme = Theme {
            id: ThemeId(THEME_SEQUENCE.fetch_add(1, Ordering::Relaxed)),
            name,
            preview_link: Some(preview_link),
            icon_name: non_blank(input.icon_name),
            created_at: now,
            updated_at: now,
        };
        let stored = self
            .repository
            .insert_theme(theme)
            .map_err(|err| duplicate_name(err, "theme choices"))?;
        info!(theme_id = %stored.id, name = %stored.name, "theme created");
        Ok(stored)
    }

    pub fn update_theme(&self, id: ThemeId, input: ThemeInput) -> Result<Theme, SiteError> {
        let mut theme = self.theme(id)?;
        if let Some(name) = input.name.as_deref() {
            theme.name = check_name(Some(name), 255)
                .map_err(|message| FieldErrors::single("name", message))?;
        }
        if input.preview_link.is_some() {
            theme.preview_link = non_blank(input.preview_link);
        }
        if input.icon_name.is_some() {
            theme.icon_name = non_blank(input.icon_name);
        }
        theme.updated_at = Utc::now();
        self.repository
            .update_theme(theme.clone())
            .map_err(|err| duplicate_name(err, "theme choices"))?;
        Ok(theme)
    }

    pub fn delete_theme(&self, id: ThemeId) -> Result<(), SiteError> {
        self.theme(id)?;
        if self
            .repository
            .websites(None)?
            .iter()
            .any(|website| website.theme == id)
        {
            return Err(SiteError::InUse("theme"));
        }
        self.repository.delete_theme(id)?;
        Ok(())
    }

    pub fn color_schemes(&self) -> Result<Vec<ColorScheme>, SiteError> {
        let mut schemes = self.repository.color_schemes()?;
        schemes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(schemes)
    }

    pub fn color_scheme(&self, id: ColorSchemeId) -> Result<ColorScheme, SiteError> {
        self.repository.color_scheme(id)?.ok_or(SiteError::NotFound)
    }

    pub fn color_scheme_exists(&self, id: ColorSchemeId) -> Result<bool, SiteError> {
        Ok(self.repository.color_scheme(id)?.is_some())
    }

    pub fn create_color_scheme(&self, input: ColorSchemeInput) -> Result<ColorScheme, SiteError> {
        let mut errors = FieldErrors::new();
        let name = check_name(input.name.as_deref(), 100)
            .map_err(|message| errors.add("name", message))
            .ok();
        let colors = input
            .theme_colors
            .as_ref()
            .map(parse_theme_colors)
            .transpose()
            .map_err(|message| errors.add("theme_colors", message))
            .ok();
        let (Some(name), Some(colors)) = (name, colors) else {
            return Err(errors.into());
        };
        let theme_colors = colors.unwrap_or_default();

        let now = Utc::now();
        let scheme = ColorScheme {
            id: ColorSchemeId(COLOR_SCHEME_SEQUENCE.fetch_add(1, Ordering::Relaxed)),
            name,
            internal_name: non_blank(input.internal_name),
            theme_colors,
            created_at: now,
            updated_at: now,
        };
        let stored = self
            .repository
            .insert_color_scheme(scheme)
            .map_err(|err| duplicate_name(err, "color scheme choices"))?;
        info!(color_scheme_id = %stored.id, name = %stored.name, "color scheme created");
        Ok(stored)
    }

    pub fn update_color_scheme(
        &self,
        id: ColorSchemeId,
        input: ColorSchemeInput,
    ) -> Result<ColorScheme, SiteError> {
        let mut scheme = self.color_scheme(id)?;
        if let Some(name) = input.name.as_deref() {
            scheme.name = check_name(Some(name), 100)
                .map_err(|message| FieldErrors::single("name", message))?;
        }
        if input.internal_name.is_some() {
            scheme.internal_name = non_blank(input.internal_name);
        }
        if let Some(raw) = input.theme_colors.as_ref() {
            scheme.theme_colors = parse_theme_colors(raw)
                .map_err(|message| FieldErrors::single("theme_colors", message))?;
        }
        scheme.updated_at = Utc::now();
        self.repository
            .update_color_scheme(scheme.clone())
            .map_err(|err| duplicate_name(err, "color scheme choices"))?;
        Ok(scheme)
    }

    pub fn delete_color_scheme(&self, id: ColorSchemeId) -> Result<(), SiteError> {
        self.color_scheme(id)?;
        if self
            .repository
            .websites(None)?
            .iter()
            .any(|website| website.color_scheme == id)
        {
            return Err(SiteError::InUse("color scheme"));
        }
        self.repository.delete_color_scheme(id)?;
        Ok(())
    }

    /// Admins see every website, users only their own.
    pub fn websites(&self, principal: Principal) -> Result<Vec<Website>, SiteError> {
        let owner = match principal {
            Principal::Admin => None,
            Principal::User(id) => Some(id),
            Principal::Anonymous => return Err(SiteError::Unauthenticated),
        };
        let mut websites = self.repository.websites(owner)?;
        websites.sort_by_key(|website| website.id);
        Ok(websites)
    }

    pub fn website(&self, principal: Principal, id: WebsiteId) -> Result<Website, SiteError> {
        let website = self.repository.website(id)?.ok_or(SiteError::NotFound)?;
        match principal {
            Principal::Admin => Ok(website),
            Principal::User(user) if website.owner == user => Ok(website),
            Principal::User(_) => Err(SiteError::NotFound),
            Principal::Anonymous => Err(SiteError::Unauthenticated),
        }
    }

    pub fn create_website(
        &self,
        principal: Principal,
        input: WebsiteInput,
    ) -> Result<Website, SiteError> {
        let owner = principal.user_id().ok_or(SiteError::Unauthenticated)?;
        let mut errors = FieldErrors::new();
        if input.theme.is_none() {
            errors.add("theme", "This field is required.");
        }
        if input.color_scheme.is_none() {
            errors.add("color_scheme", "This field is required.");
        }
        self.validate_website_input(&input, &mut errors)?;
        let (Some(theme), Some(color_scheme), true) =
            (input.theme, input.color_scheme, errors.is_empty())
        else {
            return Err(errors.into());
        };
        let now = Utc::now();
        let website = Website {
            id: WebsiteId(WEBSITE_SEQUENCE.fetch_add(1, Ordering::Relaxed)),
            owner,
            theme,
            color_scheme,
            airbnb_listing_url: non_blank(input.airbnb_listing_url),
            booking_listing_url: non_blank(input.booking_listing_url),
            domain_name: non_blank(input.domain_name),
            created_at: now,
            updated_at: now,
        };
        let stored = self.repository.insert_website(website)?;
        info!(website_id = %stored.id, owner = %stored.owner, "website created");
        Ok(stored)
    }

    pub fn update_website(
        &self,
        principal: Principal,
        id: WebsiteId,
        input: WebsiteInput,
    ) -> Result<Website, SiteError> {
        let mut website = self.website(principal, id)?;
        let mut errors = FieldErrors::new();
        self.validate_website_input(&input, &mut errors)?;
        errors.into_result()?;

        if let Some(theme) = input.theme {
            website.theme = theme;
        }
        if let Some(color_scheme) = input.color_scheme {
            website.color_scheme = color_scheme;
        }
        if input.airbnb_listing_url.is_some() {
            website.airbnb_listing_url = non_blank(input.airbnb_listing_url);
        }
        if input.booking_listing_url.is_some() {
            website.booking_listing_url = non_blank(input.booking_listing_url);
        }
        if input.domain_name.is_some() {
            website.domain_name = non_blank(input.domain_name);
        }
        website.updated_at = Utc::now();
        self.repository.update_website(website.clone())?;
        Ok(website)
    }

    pub fn configuration(
        &self,
        principal: Principal,
        id: WebsiteId,
    ) -> Result<WebsiteConfiguration, SiteError> {
        let website = self.website(principal, id)?;
        Ok(WebsiteConfiguration {
            theme_detail: self.repository.theme(website.theme)?,
            color_scheme_detail: self.repository.color_scheme(website.color_scheme)?,
            website,
        })
    }

    /// Queues an import of the website's Airbnb listing into the owner's properties.
    pub fn scrape_airbnb(&self, principal: Principal, id: WebsiteId) -> Result<Website, SiteError> {
        let website = self.website(principal, id)?;
        let Some(url) = website.airbnb_listing_url.clone() else {
            return Err(SiteError::MissingListingUrl(
                "No Airbnb listing URL configured",
            ));
        };
        self.scraper.schedule(ScrapeRequest {
            owner: website.owner,
            listing_url: url,
        })?;
        info!(website_id = %website.id, "airbnb scrape queued");
        Ok(website)
    }

    pub fn scrape_booking(
        &self,
        principal: Principal,
        id: WebsiteId,
    ) -> Result<Website, SiteError> {
        let website = self.website(principal, id)?;
        if website.booking_listing_url.is_none() {
            return Err(SiteError::MissingListingUrl(
                "No Booking.com listing URL configured",
            ));
        }
        Err(SiteError::Unsupported(
            "Booking.com scraping is not supported yet",
        ))
    }

    fn validate_website_input(
        &self,
        input: &WebsiteInput,
        errors: &mut FieldErrors,
    ) -> Result<(), SiteError> {
        if let Some(theme) = input.theme {
            if !self.theme_exists(theme)? {
                errors.add(
                    "theme",
                    format!("Invalid pk \"{theme}\" - object does not exist."),
                );
            }
        }
        if let Some(scheme) = input.color_scheme {
            if !self.color_scheme_exists(scheme)? {
                errors.add(
                    "color_scheme",
                    format!("Invalid pk \"{scheme}\" - object does not exist."),
                );
            }
        }
        let airbnb_url = input.airbnb_listing_url.as_deref().filter(|url| !url.trim().is_empty());
        if let Some(url) = airbnb_url {
            if !url.to_lowercase().contains("airbnb.com") {
                errors.add(
                    "airbnb_listing_url",
                    "Please provide a valid Airbnb listing URL",
                );
            }
        }
        let booking_url = input.booking_listing_url.as_deref().filter(|url| !url.trim().is_empty());
        if let Some(url) = booking_url {
            if !url.to_lowercase().contains("booking.com") {
                errors.add(
                    "booking_listing_url",
                    "Please provide a valid Booking.com listing URL",
                );
            }
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn check_name(raw: Option<&str>, max_len: usize) -> Result<String, String> {
    let name = raw.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err("This field may not be blank.".to_string());
    }
    if name.chars().count() > max_len {
        return Err(format!(
            "Ensure this field has no more than {max_len} characters."
        ));
    }
    Ok(name.to_string())
}

fn duplicate_name(err: RepositoryError, entity: &str) -> SiteError {
    match err {
        RepositoryError::Conflict => FieldErrors::single(
            "name",
            format!("{entity} with this name already exists."),
        )
        .into(),
        other => other.into(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("{0}")]
    Validation(FieldErrors),
    #[error("not found")]
    NotFound,
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0} is referenced by a website")]
    InUse(&'static str),
    #[error("{0}")]
    MissingListingUrl(&'static str),
    #[error("{0}")]
    Unsupported(&'static str),
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<FieldErrors> for SiteError {
    fn from(value: FieldErrors) -> Self {
        Self::Validation(value)
    }
}
