//! HTTP API: CRUD and search over every indexable entity collection.
//!
//! Collections live under `/api/v1/<collection>`. Every response, success or
//! failure, is wrapped in the [`ApiResponse`] envelope.

mod entities;
mod response;
mod search;
mod server;
mod session;
mod state;

pub use entities::PageParams;
pub use response::{ApiError, ApiErrorBody, ApiResponse, ErrorCode, ResponseDetails};
pub use search::SearchParams;
pub use server::{router, start_http_server};
pub use session::{HOUSEHOLD_ID_HEADER, RequestContext, SessionContext, USER_ID_HEADER};
pub use state::ApiState;
