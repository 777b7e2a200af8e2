//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Implementing business rules (validation, slugs, URL normalisation)
//! - Coordinating between repositories and cache
//! - The per-session visit counter

pub mod category;
pub mod page;
pub mod password;
pub mod session;
pub mod user;
pub mod visits;

pub use category::{generate_slug, CategoryService, CategoryServiceError};
pub use page::{PageService, PageServiceError};
pub use password::{hash_password, verify_password};
pub use session::SessionService;
pub use user::{RegisterInput, UserService, UserServiceError};
pub use visits::{VisitError, VisitState, VisitTracker};
