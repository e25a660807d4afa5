mod extractors;
mod routes;
mod state;
pub mod v1;

pub use extractors::{AppJson, RequestUser, USER_HEADER};
pub use routes::create_router;
pub use state::AppState;
