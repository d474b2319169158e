mod auth;
mod backpack;

pub use auth::auth_routes;
pub use backpack::backpack_routes;
