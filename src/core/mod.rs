//! Engine core: catalog, typewriter, session and graph analysis.

pub mod catalog;
pub mod config;
pub mod lint;
pub mod session;
pub mod typewriter;
