pub mod catalog;
pub mod guest;
pub mod rbac;
pub mod reservation;
pub mod room;
pub mod room_type;
pub mod user;
