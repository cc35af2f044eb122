pub mod separation;
pub mod separator;
pub mod track_store;
pub mod upload;
