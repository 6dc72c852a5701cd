//! Story Engine — branching narratives with typewriter text reveal.
//!
//! A [`StoryCatalog`](core::catalog::StoryCatalog) holds validated scene
//! graphs, one per theme. A [`NarrativeSession`](core::session::NarrativeSession)
//! walks one reader through a theme, revealing each scene's text a
//! character at a time and accepting choices once the text is shown.

pub mod core;
pub mod schema;

pub use crate::core::catalog::{CatalogDefect, CatalogError, StoryCatalog, StoryGraph, ThemeStory};
pub use crate::core::config::{ConfigError, EngineConfig};
pub use crate::core::session::{AudioCues, InvalidChoice, NarrativeSession, SessionError, SessionPhase};
pub use crate::core::typewriter::{RevealError, RevealFrame, RevealHandle, RevealPublisher, Typewriter};
pub use crate::schema::scene::{Choice, ChoiceId, Scene, SceneId};
pub use crate::schema::theme::{Theme, ThemeKey};
