pub mod credential;

pub use credential::{CredentialManager, TokenInfo, TokenSettings};
