//! Story data types: themes, scenes and choices.

pub mod scene;
pub mod theme;
