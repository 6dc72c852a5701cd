/// Story catalog — themed scene graphs, RON loading, and validation.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::scene::{Choice, ChoiceId, Scene, SceneId};
use crate::schema::theme::{Theme, ThemeKey};

/// A structural problem in story data. Any defect aborts catalog
/// construction, so a running session never meets one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogDefect {
    #[error("theme '{0}' has no start scene")]
    MissingStart(ThemeKey),
    #[error("theme '{0}' is registered more than once")]
    DuplicateTheme(ThemeKey),
    #[error("theme '{theme}' defines scene '{scene}' more than once")]
    DuplicateScene { theme: ThemeKey, scene: SceneId },
    #[error("scene '{theme}/{scene}' defines choice '{choice}' more than once")]
    DuplicateChoice {
        theme: ThemeKey,
        scene: SceneId,
        choice: ChoiceId,
    },
    #[error("choice '{choice}' in scene '{theme}/{scene}' targets unknown scene '{target}'")]
    DanglingTarget {
        theme: ThemeKey,
        scene: SceneId,
        choice: ChoiceId,
        target: SceneId,
    },
    #[error("scene '{theme}/{scene}' has no choices and is not an ending")]
    DeadEnd { theme: ThemeKey, scene: SceneId },
    #[error("scene '{theme}/{scene}' is an ending but still offers choices")]
    EndingWithChoices { theme: ThemeKey, scene: SceneId },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("theme not found: {0}")]
    ThemeNotFound(ThemeKey),
    #[error("scene not found: {theme}/{scene}")]
    SceneNotFound { theme: ThemeKey, scene: SceneId },
    #[error("catalog defect: {0}")]
    Defect(#[from] CatalogDefect),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

impl CatalogError {
    /// True for lookups of an unknown theme or scene.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::ThemeNotFound(_) | CatalogError::SceneNotFound { .. }
        )
    }
}

/// Unvalidated story input: one theme and its scenes in authoring order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeStory {
    pub theme: Theme,
    pub scenes: Vec<Scene>,
}

// RON deserialization helpers. Story files group the theme header and the
// scene list under a `Story(...)` struct.

#[derive(Debug, Deserialize)]
struct RonChoice {
    id: String,
    text: String,
    target: String,
}

#[derive(Debug, Deserialize)]
struct RonScene {
    id: String,
    title: String,
    text: String,
    #[serde(default)]
    choices: Vec<RonChoice>,
    #[serde(default)]
    ending: bool,
    #[serde(default)]
    music: Option<String>,
    #[serde(default)]
    ambient: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RonTheme {
    key: String,
    name: String,
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Story")]
struct RonStory {
    theme: RonTheme,
    scenes: Vec<RonScene>,
}

impl ThemeStory {
    /// Load a story from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<ThemeStory, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a story from a RON string. No graph validation happens here.
    pub fn parse_ron(input: &str) -> Result<ThemeStory, CatalogError> {
        let raw: RonStory = ron::from_str(input)?;

        let scenes = raw
            .scenes
            .into_iter()
            .map(|s| Scene {
                id: SceneId(s.id),
                title: s.title,
                text: s.text,
                choices: s
                    .choices
                    .into_iter()
                    .map(|c| Choice {
                        id: ChoiceId(c.id),
                        text: c.text,
                        target: SceneId(c.target),
                    })
                    .collect(),
                is_ending: s.ending,
                background_music: s.music,
                ambient_sound: s.ambient,
            })
            .collect();

        Ok(ThemeStory {
            theme: Theme {
                key: ThemeKey(raw.theme.key),
                display_name: raw.theme.name,
                description: raw.theme.description,
            },
            scenes,
        })
    }
}

/// A validated scene graph for one theme.
#[derive(Debug, Clone)]
pub struct StoryGraph {
    theme: Theme,
    scenes: FxHashMap<SceneId, Scene>,
    /// Scene ids in authoring order, for deterministic reporting.
    order: Vec<SceneId>,
}

impl StoryGraph {
    /// Validate a story and turn it into a graph.
    ///
    /// Checks, in order: unique scene ids, start scene present, each scene
    /// is either an ending or offers choices (not both), unique choice ids
    /// within a scene, and every choice target resolves.
    pub fn from_story(story: ThemeStory) -> Result<StoryGraph, CatalogDefect> {
        let key = story.theme.key.clone();
        let mut scenes = FxHashMap::default();
        let mut order = Vec::with_capacity(story.scenes.len());

        for scene in story.scenes {
            if scenes.contains_key(&scene.id) {
                return Err(CatalogDefect::DuplicateScene {
                    theme: key,
                    scene: scene.id,
                });
            }
            order.push(scene.id.clone());
            scenes.insert(scene.id.clone(), scene);
        }

        if !scenes.contains_key(&SceneId::start()) {
            return Err(CatalogDefect::MissingStart(key));
        }

        for id in &order {
            let scene = &scenes[id];
            match (scene.is_ending, scene.has_choices()) {
                (false, false) => {
                    return Err(CatalogDefect::DeadEnd {
                        theme: key,
                        scene: id.clone(),
                    });
                }
                (true, true) => {
                    return Err(CatalogDefect::EndingWithChoices {
                        theme: key,
                        scene: id.clone(),
                    });
                }
                _ => {}
            }

            let mut seen = FxHashSet::default();
            for choice in &scene.choices {
                if !seen.insert(&choice.id) {
                    return Err(CatalogDefect::DuplicateChoice {
                        theme: key,
                        scene: id.clone(),
                        choice: choice.id.clone(),
                    });
                }
                if !scenes.contains_key(&choice.target) {
                    return Err(CatalogDefect::DanglingTarget {
                        theme: key,
                        scene: id.clone(),
                        choice: choice.id.clone(),
                        target: choice.target.clone(),
                    });
                }
            }
        }

        Ok(StoryGraph {
            theme: story.theme,
            scenes,
            order,
        })
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn scene(&self, id: &SceneId) -> Option<&Scene> {
        self.scenes.get(id)
    }

    /// Number of distinct scenes in the graph.
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Scenes in authoring order.
    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.order.iter().filter_map(|id| self.scenes.get(id))
    }
}

/// Read-only registry of every theme and its story graph.
#[derive(Debug, Clone, Default)]
pub struct StoryCatalog {
    order: Vec<ThemeKey>,
    graphs: FxHashMap<ThemeKey, StoryGraph>,
}

/// Builder for constructing a `StoryCatalog`.
#[derive(Debug, Default)]
pub struct StoryCatalogBuilder {
    stories_dirs: Vec<PathBuf>,
    story_files: Vec<PathBuf>,
    bundled: bool,
    /// Directly provided stories (for testing without files).
    stories: Vec<ThemeStory>,
}

/// Stories compiled into the crate.
mod bundled {
    pub const FOREST: &str = include_str!("../../story_data/forest.ron");
    pub const OCEAN: &str = include_str!("../../story_data/ocean.ron");
    pub const SPACE: &str = include_str!("../../story_data/space.ron");

    pub const ALL: [&str; 3] = [FOREST, OCEAN, SPACE];
}

impl StoryCatalog {
    pub fn builder() -> StoryCatalogBuilder {
        StoryCatalogBuilder::default()
    }

    /// The bundled story library.
    pub fn bundled() -> Result<StoryCatalog, CatalogError> {
        Self::builder().bundled().build()
    }

    fn graph(&self, theme: &ThemeKey) -> Result<&StoryGraph, CatalogError> {
        self.graphs
            .get(theme)
            .ok_or_else(|| CatalogError::ThemeNotFound(theme.clone()))
    }

    /// Look up a scene; unknown themes and scenes are both `NotFound`.
    pub fn scene(&self, theme: &ThemeKey, id: &SceneId) -> Result<&Scene, CatalogError> {
        self.graph(theme)?
            .scene(id)
            .ok_or_else(|| CatalogError::SceneNotFound {
                theme: theme.clone(),
                scene: id.clone(),
            })
    }

    /// The entry scene id of a theme. Always `"start"` for a valid graph.
    pub fn start_scene_id(&self, theme: &ThemeKey) -> Result<SceneId, CatalogError> {
        let start = SceneId::start();
        self.scene(theme, &start)?;
        Ok(start)
    }

    pub fn theme(&self, key: &ThemeKey) -> Result<&Theme, CatalogError> {
        Ok(self.graph(key)?.theme())
    }

    /// Themes in registration order.
    pub fn themes(&self) -> impl Iterator<Item = &Theme> {
        self.order
            .iter()
            .filter_map(|key| self.graphs.get(key).map(StoryGraph::theme))
    }

    /// Number of distinct scenes in a theme's graph.
    pub fn scene_count(&self, theme: &ThemeKey) -> Result<usize, CatalogError> {
        Ok(self.graph(theme)?.len())
    }

    /// Full graph access for analysis tools.
    pub fn story_graph(&self, theme: &ThemeKey) -> Result<&StoryGraph, CatalogError> {
        self.graph(theme)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn register(&mut self, story: ThemeStory) -> Result<(), CatalogError> {
        let key = story.theme.key.clone();
        if self.graphs.contains_key(&key) {
            return Err(CatalogDefect::DuplicateTheme(key).into());
        }
        let graph = StoryGraph::from_story(story)?;
        debug!(theme = %key, scenes = graph.len(), "registered story graph");
        self.order.push(key.clone());
        self.graphs.insert(key, graph);
        Ok(())
    }
}

impl StoryCatalogBuilder {
    /// Load every `.ron` story in a directory.
    pub fn stories_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.stories_dirs.push(path.into());
        self
    }

    /// Load a single `.ron` story file.
    pub fn story_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.story_files.push(path.into());
        self
    }

    /// Include the stories compiled into the crate.
    pub fn bundled(mut self) -> Self {
        self.bundled = true;
        self
    }

    /// Provide a story directly (for testing without files).
    pub fn with_story(mut self, story: ThemeStory) -> Self {
        self.stories.push(story);
        self
    }

    /// Load and validate every source. Bundled stories register first,
    /// then directories, then single files, then direct stories.
    pub fn build(self) -> Result<StoryCatalog, CatalogError> {
        let mut catalog = StoryCatalog::default();

        if self.bundled {
            for source in bundled::ALL {
                catalog.register(ThemeStory::parse_ron(source)?)?;
            }
        }

        for dir in &self.stories_dirs {
            load_ron_files_from_dir(dir, |path| {
                catalog.register(ThemeStory::load_from_ron(path)?)
            })?;
        }

        for path in &self.story_files {
            catalog.register(ThemeStory::load_from_ron(path)?)?;
        }

        for story in self.stories {
            catalog.register(story)?;
        }

        info!(themes = catalog.len(), "story catalog loaded");
        Ok(catalog)
    }
}

/// Load all .ron files from a directory in file-name order, calling
/// `loader` for each.
pub(crate) fn load_ron_files_from_dir<F>(dir: &Path, mut loader: F) -> Result<(), CatalogError>
where
    F: FnMut(&Path) -> Result<(), CatalogError>,
{
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            paths.push(path);
        }
    }
    paths.sort();
    for path in &paths {
        loader(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme(key: &str) -> Theme {
        Theme {
            key: ThemeKey::new(key),
            display_name: key.to_string(),
            description: String::new(),
        }
    }

    fn scene(id: &str, choices: &[(&str, &str)], is_ending: bool) -> Scene {
        Scene {
            id: SceneId::new(id),
            title: id.to_string(),
            text: format!("You are at {id}."),
            choices: choices
                .iter()
                .map(|(choice, target)| Choice {
                    id: ChoiceId::new(*choice),
                    text: choice.to_string(),
                    target: SceneId::new(*target),
                })
                .collect(),
            is_ending,
            background_music: None,
            ambient_sound: None,
        }
    }

    fn small_story(key: &str) -> ThemeStory {
        ThemeStory {
            theme: theme(key),
            scenes: vec![
                scene("start", &[("left", "cave"), ("right", "meadow")], false),
                scene("cave", &[("out", "meadow")], false),
                scene("meadow", &[], true),
            ],
        }
    }

    #[test]
    fn valid_story_builds() {
        let graph = StoryGraph::from_story(small_story("hills")).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.theme().key, ThemeKey::new("hills"));
        let ids: Vec<_> = graph.scenes().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["start", "cave", "meadow"]);
    }

    #[test]
    fn missing_start_is_a_defect() {
        let mut story = small_story("hills");
        story.scenes.remove(0);
        assert_eq!(
            StoryGraph::from_story(story).unwrap_err(),
            CatalogDefect::MissingStart(ThemeKey::new("hills"))
        );
    }

    #[test]
    fn dangling_target_is_a_defect() {
        let mut story = small_story("hills");
        story.scenes[1] = scene("cave", &[("deeper", "abyss")], false);
        let err = StoryGraph::from_story(story).unwrap_err();
        assert!(matches!(
            err,
            CatalogDefect::DanglingTarget { ref target, .. } if target.as_str() == "abyss"
        ));
    }

    #[test]
    fn dead_end_is_a_defect() {
        let mut story = small_story("hills");
        story.scenes[1] = scene("cave", &[], false);
        assert!(matches!(
            StoryGraph::from_story(story).unwrap_err(),
            CatalogDefect::DeadEnd { ref scene, .. } if scene.as_str() == "cave"
        ));
    }

    #[test]
    fn ending_with_choices_is_a_defect() {
        let mut story = small_story("hills");
        story.scenes[2] = scene("meadow", &[("again", "start")], true);
        assert!(matches!(
            StoryGraph::from_story(story).unwrap_err(),
            CatalogDefect::EndingWithChoices { .. }
        ));
    }

    #[test]
    fn duplicate_scene_and_choice_are_defects() {
        let mut story = small_story("hills");
        story.scenes.push(scene("cave", &[("out", "meadow")], false));
        assert!(matches!(
            StoryGraph::from_story(story).unwrap_err(),
            CatalogDefect::DuplicateScene { .. }
        ));

        let mut story = small_story("hills");
        story.scenes[1] = scene("cave", &[("out", "meadow"), ("out", "start")], false);
        assert!(matches!(
            StoryGraph::from_story(story).unwrap_err(),
            CatalogDefect::DuplicateChoice { ref choice, .. } if choice.as_str() == "out"
        ));
    }

    #[test]
    fn catalog_lookups() {
        let catalog = StoryCatalog::builder()
            .with_story(small_story("hills"))
            .with_story(small_story("dunes"))
            .build()
            .unwrap();

        let keys: Vec<_> = catalog.themes().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["hills", "dunes"]);

        let hills = ThemeKey::new("hills");
        assert_eq!(catalog.start_scene_id(&hills).unwrap(), SceneId::start());
        assert_eq!(catalog.scene_count(&hills).unwrap(), 3);
        assert_eq!(
            catalog.scene(&hills, &SceneId::new("cave")).unwrap().title,
            "cave"
        );

        let missing_scene = catalog.scene(&hills, &SceneId::new("abyss")).unwrap_err();
        assert!(missing_scene.is_not_found());
        let missing_theme = catalog.scene_count(&ThemeKey::new("swamp")).unwrap_err();
        assert!(matches!(missing_theme, CatalogError::ThemeNotFound(_)));
        assert!(catalog.start_scene_id(&ThemeKey::new("swamp")).is_err());
    }

    #[test]
    fn duplicate_theme_rejected() {
        let err = StoryCatalog::builder()
            .with_story(small_story("hills"))
            .with_story(small_story("hills"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Defect(CatalogDefect::DuplicateTheme(_))
        ));
    }

    #[test]
    fn parse_ron_story() {
        let story = ThemeStory::parse_ron(
            r#"Story(
                theme: (key: "garden", name: "The Garden", description: "A walled garden."),
                scenes: [
                    (
                        id: "start",
                        title: "The Gate",
                        text: "The gate creaks open.",
                        choices: [(id: "enter", text: "Step inside", target: "roses")],
                        music: Some("garden_theme"),
                    ),
                    (id: "roses", title: "Roses", text: "Sleep among the roses.", ending: true, ambient: Some("bees")),
                ],
            )"#,
        )
        .unwrap();

        assert_eq!(story.theme.display_name, "The Garden");
        assert_eq!(story.scenes.len(), 2);
        assert_eq!(story.scenes[0].choices[0].target, SceneId::new("roses"));
        assert_eq!(story.scenes[0].background_music.as_deref(), Some("garden_theme"));
        assert!(story.scenes[1].is_ending);
        assert_eq!(story.scenes[1].ambient_sound.as_deref(), Some("bees"));
        assert!(StoryGraph::from_story(story).is_ok());
    }

    #[test]
    fn parse_ron_rejects_malformed_input() {
        assert!(matches!(
            ThemeStory::parse_ron("Story(theme: ").unwrap_err(),
            CatalogError::Ron(_)
        ));
    }

    #[test]
    fn bundled_catalog_loads() {
        let catalog = StoryCatalog::bundled().unwrap();
        let keys: Vec<_> = catalog.themes().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["forest", "ocean", "space"]);
        assert_eq!(catalog.scene_count(&ThemeKey::new("forest")).unwrap(), 9);
    }
}
