//! Domain types shared by ingestion, analytics and the API

pub mod drive;
pub mod month;
pub mod record;
pub mod role;
pub mod user;

pub use drive::Drive;
pub use month::Month;
pub use record::{RecordKey, RecordView, SalesRecord};
pub use role::Role;
pub use user::{User, UserView};
