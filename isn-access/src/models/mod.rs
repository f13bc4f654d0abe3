//! Domain models for accounts, credentials and the ISN catalog.

pub mod account;
pub mod isn;
pub mod refresh_token;
pub mod service_account;
pub mod user;

pub use account::{Account, AccountType, Role};
pub use isn::{Isn, IsnGrant, IsnSignalType, OpenBatch, Permission, Visibility};
pub use refresh_token::RefreshToken;
pub use service_account::{ClientSecret, ServiceAccount};
pub use user::User;
