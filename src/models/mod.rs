//! Data models
//!
//! Plain data shared by the repositories, services and web handlers:
//! - Database entities (Category, Page, User, UserProfile, Session)
//! - The `SessionData` key/value seam

mod category;
mod page;
mod session;
mod user;

pub use category::{Category, CATEGORY_NAME_MAX_LENGTH};
pub use page::{Page, PAGE_TITLE_MAX_LENGTH, PAGE_URL_MAX_LENGTH};
pub use session::{Session, SessionData};
pub use user::{User, UserProfile, USERNAME_MAX_LENGTH};
