pub mod push;
pub mod token_backend;

pub use push::HttpPushService;
pub use token_backend::SignerIdentityBackend;
