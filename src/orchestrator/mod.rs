pub mod context;
pub mod filters;
pub mod pipeline;
pub mod router;
pub mod sources;
pub mod synthesis;

pub use pipeline::{AskResponse, QaService};
