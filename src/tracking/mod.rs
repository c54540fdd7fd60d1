pub mod authorizer;
pub mod events;
pub mod rooms;
pub mod session;
