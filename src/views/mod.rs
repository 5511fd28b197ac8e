//! View models returned to the dashboard front end.

pub mod editor;
pub mod map;
pub mod page;
pub mod table;
