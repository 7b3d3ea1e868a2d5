pub mod crawler;
pub mod errors;
pub mod imports;
pub mod logging;
pub mod manifest;
pub mod metadata;
pub mod pip;
pub mod pyproject;
pub mod reconcile;
pub mod tools;
pub mod venv;
