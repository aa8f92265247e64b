pub mod forms;
pub mod listing;
pub mod role;
pub mod session;
pub mod url_key;

pub use listing::{ListingQuery, Pagination};
pub use role::Role;
pub use session::SessionUser;
