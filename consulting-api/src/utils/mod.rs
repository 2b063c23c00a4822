pub mod password;
pub mod slug;
pub mod token;
pub mod validation;

pub use password::{hash_password, verify_password, Password, PasswordHashString};
pub use slug::slugify;
pub use token::{generate_random_token, hash_token};
pub use validation::ValidatedJson;
