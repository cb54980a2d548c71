pub mod errors;
pub mod extractors;
pub mod handlers;
pub mod router;
pub mod sse;

pub use router::build_router;
