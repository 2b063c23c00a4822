//! Business logic: credentials, authorization policy and tenant-scoped
//! resource services over the store traits.

pub mod auth;
mod clock;
pub mod content;
mod database;
mod email;
pub mod error;
mod memory;
pub mod organizations;
pub mod policy;
pub mod store;
mod token;
pub mod users;

pub use auth::AuthService;
pub use clock::{Clock, MockClock, SystemClock};
pub use content::ContentService;
pub use database::MongoDb;
pub use email::{EmailProvider, EmailService, MockEmailService, SentEmail};
pub use error::ServiceError;
pub use memory::InMemoryStore;
pub use organizations::OrganizationService;
pub use store::{ContentStore, GrantEffect, IdentityStore, OrganizationStore, Store, UserUpdate};
pub use token::{TokenClaims, TokenResponse, TokenService};
pub use users::UserService;
