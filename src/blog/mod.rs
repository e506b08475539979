pub mod annotate;
pub mod authoring;
pub mod domain;
pub mod pagination;
pub mod query;
pub mod repository;
pub mod social;
pub mod views;

#[cfg(test)]
mod testing;

pub use domain::{BlogError, UserRef, ValidationErrors, Viewer};
pub use pagination::{Page, PageRequest, PAGE_SIZE};
pub use repository::{BlogRepository, RepositoryError, SqliteBlogRepository};
