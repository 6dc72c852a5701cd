use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype wrapper for scene IDs, unique within a theme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(pub String);

/// Newtype wrapper for choice IDs, unique within a scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoiceId(pub String);

/// Every story graph enters through a scene with this id.
pub const START_SCENE: &str = "start";

impl SceneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The designated entry scene of every theme.
    pub fn start() -> Self {
        Self(START_SCENE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_start(&self) -> bool {
        self.0 == START_SCENE
    }
}

impl ChoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ChoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for ChoiceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A reader decision leading to another scene of the same theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub text: String,
    pub target: SceneId,
}

/// A single passage of a story.
///
/// A valid scene either offers at least one choice or is an ending,
/// never both and never neither. The catalog enforces this at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub is_ending: bool,
    /// Opaque identifier for an external music player.
    #[serde(default)]
    pub background_music: Option<String>,
    /// Opaque identifier for an external ambient sound player.
    #[serde(default)]
    pub ambient_sound: Option<String>,
}

impl Scene {
    /// Returns the choice with the given id, if this scene offers it.
    pub fn choice(&self, id: &ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|c| &c.id == id)
    }

    pub fn has_choices(&self) -> bool {
        !self.choices.is_empty()
    }
}
