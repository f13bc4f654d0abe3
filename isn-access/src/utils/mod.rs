pub mod password;
pub mod token;
pub mod validation;

pub use password::{
    hash_password, verify_dummy_password, verify_password, Password, PasswordHashString,
};
pub use token::{digests_match, generate_secure_token, hash_opaque_token, OPAQUE_TOKEN_BYTES};
pub use validation::ValidatedJson;
