pub mod event;
pub mod order;
pub mod session;
pub mod update;
