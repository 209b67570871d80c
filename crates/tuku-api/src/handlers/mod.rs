pub mod delete;
pub mod gallery;
pub mod health;
pub mod upload;
