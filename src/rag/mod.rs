pub mod embed;
pub mod local;
#[cfg(test)]
pub mod mock;
pub mod store;
pub mod types;
