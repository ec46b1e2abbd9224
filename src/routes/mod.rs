mod admin;
mod balance;
mod order;
mod public;

pub use admin::admin_routes;
pub use balance::balance_routes;
pub use order::order_routes;
pub use public::public_routes;
