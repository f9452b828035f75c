pub mod challenge;
pub mod credentials;
pub mod export;
pub mod login;

#[cfg(test)]
pub(crate) mod mocks;
