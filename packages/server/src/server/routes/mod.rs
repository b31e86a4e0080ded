// HTTP routes
pub mod audit;
pub mod authz;
pub mod health;
pub mod roles;

pub use audit::*;
pub use authz::*;
pub use health::*;
pub use roles::*;
