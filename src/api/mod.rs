// Client API module
pub mod sync_ops;
pub mod types;

pub use sync_ops::ShoalClient;
pub use types::{ApiError, ApiResult};
