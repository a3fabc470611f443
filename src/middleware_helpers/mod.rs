pub mod http_tracing;
pub mod request_id;

pub use http_tracing::configure_http_tracing;
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
