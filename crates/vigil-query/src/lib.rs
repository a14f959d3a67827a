mod filter;
mod merge;
mod response;
mod service;

pub use response::{PointResponse, ResponsePoint};
pub use service::TracePointService;
