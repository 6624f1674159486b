pub mod catch;
pub mod common;
pub mod completions;
pub mod import;
pub mod session;
pub mod sync;
pub mod trip;
pub mod weather;
