//! File-backed JSON adapters.

pub mod run_repository;

pub use run_repository::JsonRunRepository;
