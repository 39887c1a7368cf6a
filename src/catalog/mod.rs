//! Scene Catalog
//!
//! Ordered, fixed-size list of scenes. Each scene pairs one looping image
//! asset with one looping audio track. The engine only reads from it.

pub mod titles;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoomError};

pub use titles::TitleOverrides;

/// Built-in room tracks, in room order
const BUILTIN_TRACKS: [(&str, &str); 10] = [
    ("/bgm/good-night-lofi-cozy-cafe-1.mp3", "Good Night Lofi - Cozy Cafe"),
    ("/bgm/lofi-relax-music-lofium-2.mp3", "Lofi Relax Music - Lofium"),
    ("/bgm/lofi-295209.mp3", "Lofi 295209"),
    ("/bgm/lofi-relax-lofi-4.mp3", "Lofi Relax"),
    ("/bgm/spring-lofi-vibes-lofi-5.mp3", "Spring Lofi Vibes"),
    ("/bgm/walking-dreaming-chill-lofi-6.mp3", "Walking Dreaming Chill Lofi"),
    ("/bgm/focus-zone-relax-mellow-lofi-7.mp3", "Focus Zone - Relax & Mellow"),
    ("/bgm/lofi-background-music-8.mp3", "Lofi Background Music"),
    ("/bgm/rainy-lofi-city-lofi-9.mp3", "Rainy Lofi City"),
    ("/bgm/lofi-girl-lofi-ambient-10.mp3", "Lofi Girl - Ambient"),
];

/// One selectable room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Position in the catalog, `0..len`
    pub index: usize,
    /// Looping background image URL
    pub image_src: String,
    /// Looping audio track URL
    pub audio_src: String,
    /// Catalog title (may be empty)
    pub title: String,
}

impl Scene {
    pub fn new(
        index: usize,
        image_src: impl Into<String>,
        audio_src: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            index,
            image_src: image_src.into(),
            audio_src: audio_src.into(),
            title: title.into(),
        }
    }
}

/// Ordered scene list plus optional display-title overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneCatalog {
    scenes: Vec<Scene>,
    #[serde(default)]
    overrides: Option<TitleOverrides>,
}

impl SceneCatalog {
    /// Create a catalog from an ordered scene list
    ///
    /// Scene indices are rewritten to match list position.
    ///
    /// # Errors
    /// Returns [`RoomError::EmptyCatalog`] if `scenes` is empty.
    pub fn new(scenes: Vec<Scene>) -> Result<Self> {
        if scenes.is_empty() {
            return Err(RoomError::EmptyCatalog);
        }
        let scenes = scenes
            .into_iter()
            .enumerate()
            .map(|(index, scene)| Scene { index, ..scene })
            .collect();
        Ok(Self {
            scenes,
            overrides: None,
        })
    }

    /// The ten built-in rooms: `/bg{n}.gif` paired with the lofi tracks
    pub fn builtin() -> Self {
        let scenes = BUILTIN_TRACKS
            .iter()
            .enumerate()
            .map(|(i, (audio, title))| Scene::new(i, format!("/bg{}.gif", i + 1), *audio, *title))
            .collect();
        Self {
            scenes,
            overrides: None,
        }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Get a scene by index
    pub fn get(&self, index: usize) -> Result<&Scene> {
        self.scenes.get(index).ok_or(RoomError::SceneOutOfRange {
            index,
            len: self.scenes.len(),
        })
    }

    /// Get the scene at `index mod len`
    pub fn wrapped(&self, index: usize) -> &Scene {
        &self.scenes[index % self.scenes.len()]
    }

    /// Index following `index`, wrapping to 0
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.scenes.len()
    }

    /// Index preceding `index`, wrapping to the last scene
    pub fn previous_index(&self, index: usize) -> usize {
        let len = self.scenes.len();
        (index % len + len - 1) % len
    }

    /// Install display-title overrides
    ///
    /// Overrides whose length does not match the catalog are dropped.
    pub fn set_overrides(&mut self, overrides: TitleOverrides) {
        if overrides.len() == self.scenes.len() {
            self.overrides = Some(overrides);
        } else {
            tracing::warn!(
                expected = self.scenes.len(),
                got = overrides.len(),
                "ignoring title overrides with wrong length"
            );
        }
    }

    pub fn overrides(&self) -> Option<&TitleOverrides> {
        self.overrides.as_ref()
    }

    /// Title shown to the user for a scene
    ///
    /// Falls back from the override list to the catalog title to
    /// `"Scene {index + 1}"`.
    pub fn display_title(&self, index: usize) -> String {
        if let Some(title) = self.overrides.as_ref().and_then(|o| o.get(index)) {
            return title.to_string();
        }
        match self.scenes.get(index) {
            Some(scene) if !scene.title.trim().is_empty() => scene.title.clone(),
            _ => format!("Scene {}", index + 1),
        }
    }
}

impl Default for SceneCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
