use super::domain::{ColorScheme, ColorSchemeId, Theme, ThemeId, Website, WebsiteId};
use crate::repository::RepositoryError;
use crate::users::UserId;

/// Storage for themes, color schemes and configured websites.
pub trait SiteRepository: Send + Sync {
    /// Fails with `Conflict` on a duplicate name.
    fn insert_theme(&self, theme: Theme) -> Result<Theme, RepositoryError>;
    fn update_theme(&self, theme: Theme) -> Result<(), RepositoryError>;
    fn delete_theme(&self, id: ThemeId) -> Result<(), RepositoryError>;
    fn theme(&self, id: ThemeId) -> Result<Option<Theme>, RepositoryError>;
    fn themes(&self) -> Result<Vec<Theme>, RepositoryError>;

    /// Fails with `Conflict` on a duplicate name.
    fn insert_color_scheme(&self, scheme: ColorScheme) -> Result<ColorScheme, RepositoryError>;
    fn update_color_scheme(&self, scheme: ColorScheme) -> Result<(), RepositoryError>;
    fn delete_color_scheme(&self, id: ColorSchemeId) -> Result<(), RepositoryError>;
    fn color_scheme(&self, id: ColorSchemeId) -> Result<Option<ColorScheme>, RepositoryError>;
    fn color_schemes(&self) -> Result<Vec<ColorScheme>, RepositoryError>;

    fn insert_website(&self, website: Website) -> Result<Website, RepositoryError>;
    fn update_website(&self, website: Website) -> Result<(), RepositoryError>;
    fn website(&self, id: WebsiteId) -> Result<Option<Website>, RepositoryError>;
    /// Every website when `owner` is `None`.
    fn websites(&self, owner: Option<UserId>) -> Result<Vec<Website>, RepositoryError>;
}
