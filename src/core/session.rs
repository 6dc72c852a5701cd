/// Narrative session — one reader's run through a themed story.
///
/// Owns the reader's position, visited history, mute flag and the
/// in-flight text reveal. Commands that fail leave every field untouched.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::core::catalog::{CatalogError, StoryCatalog};
use crate::core::config::EngineConfig;
use crate::core::typewriter::{RevealError, RevealFrame, RevealHandle, RevealPublisher, Typewriter};
use crate::schema::scene::{ChoiceId, Scene, SceneId};
use crate::schema::theme::{Theme, ThemeKey};

/// Why a choice was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidChoice {
    #[error("scene text is still being revealed")]
    StillRevealing,
    #[error("scene '{0}' offers no choices")]
    NoChoices(SceneId),
    #[error("scene '{scene}' has no choice '{choice}'")]
    Unknown { scene: SceneId, choice: ChoiceId },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("invalid choice: {0}")]
    InvalidChoice(#[from] InvalidChoice),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("reveal error: {0}")]
    Reveal(#[from] RevealError),
}

/// Where the reader is in the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// No run in progress; a theme may be chosen.
    ThemeSelect,
    /// Inside a run, on `scene`.
    Playing { scene: SceneId, revealing: bool },
    /// On an ending scene whose text is fully shown.
    Ended { scene: SceneId },
}

/// Sound identifiers for an external audio player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCues<'a> {
    pub background_music: Option<&'a str>,
    pub ambient_sound: Option<&'a str>,
    pub muted: bool,
}

/// Position inside an active run.
#[derive(Debug, Clone)]
struct RunState {
    scene: SceneId,
    visited: Vec<SceneId>,
}

/// A single reader's session. Construct one per reader flow.
#[derive(Debug)]
pub struct NarrativeSession {
    catalog: Arc<StoryCatalog>,
    config: EngineConfig,
    selected_theme: Option<ThemeKey>,
    run: Option<RunState>,
    muted: bool,
    publisher: RevealPublisher,
    reveal: Option<RevealHandle>,
}

impl NarrativeSession {
    pub fn new(catalog: Arc<StoryCatalog>) -> Self {
        Self::with_config(catalog, EngineConfig::default())
    }

    pub fn with_config(catalog: Arc<StoryCatalog>, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
            selected_theme: None,
            run: None,
            muted: false,
            publisher: RevealPublisher::new(),
            reveal: None,
        }
    }

    // --- queries ---

    pub fn catalog(&self) -> &StoryCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn current_theme(&self) -> Option<&Theme> {
        let key = self.selected_theme.as_ref()?;
        self.catalog.theme(key).ok()
    }

    pub fn selected_theme(&self) -> Option<&ThemeKey> {
        self.selected_theme.as_ref()
    }

    pub fn current_scene_id(&self) -> Option<&SceneId> {
        self.run.as_ref().map(|run| &run.scene)
    }

    /// The scene being read, or `None` outside a run.
    pub fn current_scene(&self) -> Option<&Scene> {
        let run = self.run.as_ref()?;
        let theme = self.selected_theme.as_ref()?;
        self.catalog.scene(theme, &run.scene).ok()
    }

    /// Scenes visited this run, start scene first. Empty outside a run.
    pub fn visited(&self) -> &[SceneId] {
        self.run
            .as_ref()
            .map(|run| run.visited.as_slice())
            .unwrap_or(&[])
    }

    /// The prefix on display while typing, the full text once complete.
    pub fn revealed_text(&self) -> String {
        self.publisher.current().text().to_string()
    }

    pub fn is_revealing(&self) -> bool {
        self.run.is_some() && !self.publisher.current().is_complete()
    }

    /// Watch the reveal frames as they are published.
    pub fn subscribe(&self) -> watch::Receiver<RevealFrame> {
        self.publisher.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.run.is_some()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Visited scenes over the theme's scene count.
    ///
    /// Not clamped: a run that revisits scenes can exceed 1.0.
    pub fn progress_fraction(&self) -> f64 {
        let Some(theme) = self.selected_theme.as_ref() else {
            return 0.0;
        };
        match self.catalog.scene_count(theme) {
            Ok(0) | Err(_) => 0.0,
            Ok(total) => self.visited().len() as f64 / total as f64,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        let Some(run) = self.run.as_ref() else {
            return SessionPhase::ThemeSelect;
        };
        let revealing = self.is_revealing();
        let ending = self.current_scene().is_some_and(|scene| scene.is_ending);
        if ending && !revealing {
            SessionPhase::Ended {
                scene: run.scene.clone(),
            }
        } else {
            SessionPhase::Playing {
                scene: run.scene.clone(),
                revealing,
            }
        }
    }

    pub fn audio_cues(&self) -> AudioCues<'_> {
        let scene = self.current_scene();
        AudioCues {
            background_music: scene.and_then(|s| s.background_music.as_deref()),
            ambient_sound: scene.and_then(|s| s.ambient_sound.as_deref()),
            muted: self.muted,
        }
    }

    // --- commands ---

    /// Choose the theme for the next run. Only allowed outside a run.
    pub fn select_theme(&mut self, key: ThemeKey) -> Result<(), SessionError> {
        if self.run.is_some() {
            return Err(SessionError::InvalidState(
                "cannot change theme during an active run",
            ));
        }
        self.catalog.theme(&key)?;
        info!(theme = %key, "theme selected");
        self.selected_theme = Some(key);
        Ok(())
    }

    /// Begin a run of the selected theme at its start scene.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.run.is_some() {
            return Err(SessionError::InvalidState("a run is already in progress"));
        }
        let theme = self
            .selected_theme
            .clone()
            .ok_or(SessionError::InvalidState("no theme selected"))?;

        let start = self.catalog.start_scene_id(&theme)?;
        let start = self.enter_scene(&theme, start)?;
        info!(theme = %theme, "run started");
        self.run = Some(RunState {
            visited: vec![start.clone()],
            scene: start,
        });
        Ok(())
    }

    /// Follow a choice of the current scene once its text is fully shown.
    pub fn choose(&mut self, choice_id: &ChoiceId) -> Result<(), SessionError> {
        let (Some(run), Some(theme)) = (self.run.as_ref(), self.selected_theme.clone()) else {
            return Err(SessionError::InvalidState("no run in progress"));
        };
        if self.is_revealing() {
            return Err(InvalidChoice::StillRevealing.into());
        }

        let scene = self.catalog.scene(&theme, &run.scene)?;
        let target = match scene.choice(choice_id) {
            Some(choice) => choice.target.clone(),
            None if !scene.has_choices() => {
                return Err(InvalidChoice::NoChoices(scene.id.clone()).into());
            }
            None => {
                return Err(InvalidChoice::Unknown {
                    scene: scene.id.clone(),
                    choice: choice_id.clone(),
                }
                .into());
            }
        };

        let target = self.enter_scene(&theme, target)?;
        info!(theme = %theme, choice = %choice_id, scene = %target, "choice taken");
        if let Some(run) = self.run.as_mut() {
            run.visited.push(target.clone());
            run.scene = target;
        }
        Ok(())
    }

    /// Return to the start scene of the current theme. Theme and mute
    /// state are kept.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        let (Some(_), Some(theme)) = (self.run.as_ref(), self.selected_theme.clone()) else {
            return Err(SessionError::InvalidState("no run in progress"));
        };

        let start = self.catalog.start_scene_id(&theme)?;
        let start = self.enter_scene(&theme, start)?;
        info!(theme = %theme, "run restarted");
        self.run = Some(RunState {
            visited: vec![start.clone()],
            scene: start,
        });
        Ok(())
    }

    /// Leave the run and go back to theme selection. Theme and mute
    /// state are kept.
    pub fn exit_run(&mut self) {
        self.cancel_reveal();
        self.publisher.reset();
        if self.run.take().is_some() {
            info!("run exited");
        }
    }

    /// Flip the mute flag and return the new value.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        debug!(muted = self.muted, "mute toggled");
        self.muted
    }

    /// Show the rest of the current scene's text at once.
    pub fn skip_reveal(&mut self) -> Result<(), SessionError> {
        let text = self
            .current_scene()
            .map(|scene| scene.text.clone())
            .ok_or(SessionError::InvalidState("no run in progress"))?;
        if !self.is_revealing() {
            return Ok(());
        }
        self.cancel_reveal();
        self.publisher.finish(&text);
        debug!("reveal skipped");
        Ok(())
    }

    /// Resolve `scene_id` and start revealing its text, replacing any
    /// in-flight reveal. Nothing changes if the scene or the reveal
    /// cannot be set up.
    fn enter_scene(&mut self, theme: &ThemeKey, scene_id: SceneId) -> Result<SceneId, SessionError> {
        let scene = self.catalog.scene(theme, &scene_id)?;
        let typewriter = Typewriter::new(scene.text.clone(), self.config.char_delay())?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(RevealError::NoRuntime.into());
        }

        self.cancel_reveal();
        self.reveal = Some(typewriter.spawn(&self.publisher)?);
        debug!(theme = %theme, scene = %scene_id, "entered scene");
        Ok(scene_id)
    }

    fn cancel_reveal(&mut self) {
        if let Some(handle) = self.reveal.take() {
            if !handle.is_finished() {
                debug!(generation = handle.generation(), "reveal cancelled");
            }
            handle.cancel();
        }
    }
}

impl Drop for NarrativeSession {
    fn drop(&mut self) {
        self.cancel_reveal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::ThemeStory;
    use crate::schema::scene::Choice;
    use std::time::Duration;
    use tokio::time::sleep;

    fn scene(id: &str, text: &str, choices: &[(&str, &str)]) -> Scene {
        Scene {
            id: SceneId::new(id),
            title: id.to_string(),
            text: text.to_string(),
            choices: choices
                .iter()
                .map(|(choice, target)| Choice {
                    id: ChoiceId::new(*choice),
                    text: choice.to_string(),
                    target: SceneId::new(*target),
                })
                .collect(),
            is_ending: choices.is_empty(),
            background_music: None,
            ambient_sound: None,
        }
    }

    fn make_session() -> NarrativeSession {
        let story = ThemeStory {
            theme: Theme {
                key: ThemeKey::new("tiny"),
                display_name: "Tiny".to_string(),
                description: "Three scenes.".to_string(),
            },
            scenes: vec![
                scene("start", "Go?", &[("go", "middle")]),
                scene("middle", "Mid", &[("on", "end")]),
                scene("end", "Fin", &[]),
            ],
        };
        let catalog = StoryCatalog::builder().with_story(story).build().unwrap();
        NarrativeSession::new(Arc::new(catalog))
    }

    async fn wait_for_reveal(session: &NarrativeSession) {
        while session.is_revealing() {
            sleep(Duration::from_millis(10)).await;
        }
    }

    #[test]
    fn new_session_is_in_theme_select() {
        let session = make_session();
        assert_eq!(session.phase(), SessionPhase::ThemeSelect);
        assert!(!session.is_active());
        assert!(!session.is_muted());
        assert!(session.visited().is_empty());
        assert_eq!(session.progress_fraction(), 0.0);
        assert!(session.current_scene().is_none());
    }

    #[test]
    fn select_unknown_theme_fails() {
        let mut session = make_session();
        let err = session.select_theme(ThemeKey::new("swamp")).unwrap_err();
        assert!(matches!(err, SessionError::Catalog(ref e) if e.is_not_found()));
        assert!(session.selected_theme().is_none());
    }

    #[test]
    fn start_without_theme_fails() {
        let mut session = make_session();
        assert!(matches!(
            session.start().unwrap_err(),
            SessionError::InvalidState(_)
        ));
    }

    #[test]
    fn start_outside_runtime_leaves_state_untouched() {
        let mut session = make_session();
        session.select_theme(ThemeKey::new("tiny")).unwrap();
        assert!(matches!(
            session.start().unwrap_err(),
            SessionError::Reveal(RevealError::NoRuntime)
        ));
        assert!(!session.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn theme_locked_during_run() {
        let mut session = make_session();
        session.select_theme(ThemeKey::new("tiny")).unwrap();
        session.start().unwrap();
        assert!(matches!(
            session.select_theme(ThemeKey::new("tiny")).unwrap_err(),
            SessionError::InvalidState(_)
        ));
        assert!(matches!(
            session.start().unwrap_err(),
            SessionError::InvalidState(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn choose_walks_to_ending() {
        let mut session = make_session();
        session.select_theme(ThemeKey::new("tiny")).unwrap();
        session.start().unwrap();
        assert!(matches!(
            session.phase(),
            SessionPhase::Playing { revealing: true, .. }
        ));

        wait_for_reveal(&session).await;
        assert_eq!(session.revealed_text(), "Go?");
        session.choose(&ChoiceId::new("go")).unwrap();
        assert_eq!(session.current_scene_id(), Some(&SceneId::new("middle")));

        wait_for_reveal(&session).await;
        session.choose(&ChoiceId::new("on")).unwrap();
        assert!(matches!(session.phase(), SessionPhase::Playing { .. }));

        wait_for_reveal(&session).await;
        assert_eq!(
            session.phase(),
            SessionPhase::Ended {
                scene: SceneId::new("end")
            }
        );
        assert_eq!(session.visited().len(), 3);
        assert_eq!(session.progress_fraction(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_choice_rejected() {
        let mut session = make_session();
        session.select_theme(ThemeKey::new("tiny")).unwrap();
        session.start().unwrap();
        wait_for_reveal(&session).await;

        let err = session.choose(&ChoiceId::new("fly")).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidChoice(InvalidChoice::Unknown { .. })
        ));
        assert_eq!(session.current_scene_id(), Some(&SceneId::start()));
        assert_eq!(session.visited(), &[SceneId::start()]);
    }

    #[tokio::test(start_paused = true)]
    async fn choose_outside_run_is_invalid_state() {
        let mut session = make_session();
        assert!(matches!(
            session.choose(&ChoiceId::new("go")).unwrap_err(),
            SessionError::InvalidState(_)
        ));
        assert!(matches!(
            session.restart().unwrap_err(),
            SessionError::InvalidState(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn skip_reveal_completes_text() {
        let mut session = make_session();
        session.select_theme(ThemeKey::new("tiny")).unwrap();
        session.start().unwrap();
        assert!(session.is_revealing());

        session.skip_reveal().unwrap();
        assert!(!session.is_revealing());
        assert_eq!(session.revealed_text(), "Go?");
        sleep(Duration::from_millis(200)).await;
        assert_eq!(session.revealed_text(), "Go?");
        session.choose(&ChoiceId::new("go")).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn mute_is_independent_of_runs() {
        let mut session = make_session();
        assert!(session.toggle_mute());
        session.select_theme(ThemeKey::new("tiny")).unwrap();
        session.start().unwrap();
        assert!(session.audio_cues().muted);
        session.restart().unwrap();
        assert!(session.is_muted());
        session.exit_run();
        assert!(session.is_muted());
        assert!(!session.toggle_mute());
    }

    #[tokio::test(start_paused = true)]
    async fn exit_run_returns_to_theme_select() {
        let mut session = make_session();
        session.select_theme(ThemeKey::new("tiny")).unwrap();
        session.start().unwrap();
        sleep(Duration::from_millis(45)).await;
        assert_eq!(session.revealed_text(), "G");

        session.exit_run();
        assert_eq!(session.phase(), SessionPhase::ThemeSelect);
        assert!(!session.is_revealing());
        assert_eq!(session.selected_theme(), Some(&ThemeKey::new("tiny")));
        sleep(Duration::from_millis(200)).await;
        assert_eq!(session.revealed_text(), "");

        session.start().unwrap();
        assert_eq!(session.visited(), &[SceneId::start()]);
    }
}
