pub mod batch;
pub mod codec;
pub mod constants;
pub mod error;
pub mod format;
pub mod query;
pub mod response;
pub mod session;

#[cfg(test)]
pub(crate) mod test_util;
