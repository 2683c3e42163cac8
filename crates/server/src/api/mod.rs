pub mod audit;
pub mod campaigns;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod order_sets;
pub mod orders;
pub mod queue;
pub mod routes;
pub mod smm;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
