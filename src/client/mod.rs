pub mod credentials;
pub mod retry;
pub mod transport;
