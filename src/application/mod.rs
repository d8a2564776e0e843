// Application layer: use cases shared by the CLI and the HTTP API

mod crm;
pub mod error;
mod forecasting;
mod reporting;
mod treasury;

pub use crm::*;
pub use error::*;
pub use forecasting::*;
pub use reporting::*;
pub use treasury::*;
