pub mod password;
pub mod validation;

pub use password::{hash_secret, verify_decoy, verify_secret, Secret, SecretHash};
pub use validation::ValidatedJson;
