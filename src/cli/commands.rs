//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};

use crate::catalog::{SceneCatalog, TitleOverrides};
use crate::config::EngineConfig;
use crate::engine::{Command, EngineSnapshot, PlaybackController};
use crate::error::{Result, RoomError};
use crate::media::{MockAudioBackend, MockImageLoader};

// ============================================================================
// Loading
// ============================================================================

/// Load the engine config, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            info!("Loading config: {}", path.display());
            EngineConfig::load(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Built-in catalog with optional title overrides.
///
/// A bad title file is logged and ignored.
pub fn load_catalog(titles: Option<&Path>) -> SceneCatalog {
    let mut catalog = SceneCatalog::builtin();
    if let Some(path) = titles {
        if let Some(overrides) = TitleOverrides::load_opportunistic(path, catalog.len()) {
            catalog.set_overrides(overrides);
        }
    }
    catalog
}

// ============================================================================
// Commands
// ============================================================================

/// List the scenes with their display titles.
pub fn catalog(titles: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(titles);

    println!("Scenes ({}):", catalog.len());
    println!("{:-<72}", "");
    for scene in catalog.scenes() {
        println!(
            "{:>3}  {:<32} {:<12} {}",
            scene.index,
            catalog.display_title(scene.index),
            scene.image_src,
            scene.audio_src
        );
    }

    Ok(())
}

/// Run a scripted session and print one snapshot per step.
pub fn simulate(config: Option<&Path>, titles: Option<&Path>, script: &str, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let catalog = load_catalog(titles);
    let steps = parse_script(script)?;
    info!("Simulating {} steps", steps.len());

    for (step, snapshot) in run_script(config, catalog, &steps)? {
        if json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            println!("{}", format_snapshot(&step, &snapshot));
        }
    }

    Ok(())
}

// ============================================================================
// Script
// ============================================================================

/// One step of a simulated session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptStep {
    Gesture,
    Play,
    Next,
    Prev,
    Select(usize),
    Mute,
    Volume(f32),
    Level(u32),
    Slider(f32),
    Rotate,
    /// Complete pending image loads, then advance the clock
    Wait(u64),
    FailLoads,
    BlockAutoplay,
    AllowAutoplay,
}

impl FromStr for ScriptStep {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| RoomError::InvalidScriptStep {
            step: s.to_string(),
            reason: reason.to_string(),
        };

        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };

        let step = match (name, arg) {
            ("gesture", None) => ScriptStep::Gesture,
            ("play", None) => ScriptStep::Play,
            ("next", None) => ScriptStep::Next,
            ("prev", None) => ScriptStep::Prev,
            ("mute", None) => ScriptStep::Mute,
            ("rotate", None) => ScriptStep::Rotate,
            ("fail-loads", None) => ScriptStep::FailLoads,
            ("block-autoplay", None) => ScriptStep::BlockAutoplay,
            ("allow-autoplay", None) => ScriptStep::AllowAutoplay,
            ("select", Some(arg)) => {
                ScriptStep::Select(arg.parse().map_err(|_| invalid("expected a scene index"))?)
            }
            ("volume", Some(arg)) => {
                ScriptStep::Volume(arg.parse().map_err(|_| invalid("expected a number"))?)
            }
            ("slider", Some(arg)) => {
                ScriptStep::Slider(arg.parse().map_err(|_| invalid("expected a number"))?)
            }
            ("level", Some(arg)) => {
                ScriptStep::Level(arg.parse().map_err(|_| invalid("expected a meter segment"))?)
            }
            ("wait", Some(arg)) => {
                ScriptStep::Wait(arg.parse().map_err(|_| invalid("expected milliseconds"))?)
            }
            ("select" | "volume" | "slider" | "level" | "wait", None) => {
                return Err(invalid("missing argument"))
            }
            (_, Some(_)) if KNOWN_FLAGS.contains(&name) => {
                return Err(invalid("takes no argument"))
            }
            _ => return Err(invalid("unknown step")),
        };
        Ok(step)
    }
}

const KNOWN_FLAGS: [&str; 9] = [
    "gesture",
    "play",
    "next",
    "prev",
    "mute",
    "rotate",
    "fail-loads",
    "block-autoplay",
    "allow-autoplay",
];

impl fmt::Display for ScriptStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptStep::Gesture => write!(f, "gesture"),
            ScriptStep::Play => write!(f, "play"),
            ScriptStep::Next => write!(f, "next"),
            ScriptStep::Prev => write!(f, "prev"),
            ScriptStep::Select(i) => write!(f, "select:{i}"),
            ScriptStep::Mute => write!(f, "mute"),
            ScriptStep::Volume(v) => write!(f, "volume:{v}"),
            ScriptStep::Level(k) => write!(f, "level:{k}"),
            ScriptStep::Slider(v) => write!(f, "slider:{v}"),
            ScriptStep::Rotate => write!(f, "rotate"),
            ScriptStep::Wait(ms) => write!(f, "wait:{ms}"),
            ScriptStep::FailLoads => write!(f, "fail-loads"),
            ScriptStep::BlockAutoplay => write!(f, "block-autoplay"),
            ScriptStep::AllowAutoplay => write!(f, "allow-autoplay"),
        }
    }
}

/// Split a script on whitespace and commas and parse each step.
pub fn parse_script(script: &str) -> Result<Vec<ScriptStep>> {
    script
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

type MockEngine = PlaybackController<MockAudioBackend, MockImageLoader>;

struct Simulator {
    engine: MockEngine,
    fail_loads: bool,
}

impl Simulator {
    fn apply(&mut self, step: ScriptStep) {
        debug!(%step, "script step");
        match step {
            ScriptStep::Gesture => self.engine.dispatch(Command::Gesture),
            ScriptStep::Play => self.engine.dispatch(Command::TogglePlayPause),
            ScriptStep::Next => self.engine.dispatch(Command::Next),
            ScriptStep::Prev => self.engine.dispatch(Command::Previous),
            ScriptStep::Select(i) => self.engine.dispatch(Command::Select(i)),
            ScriptStep::Mute => self.engine.dispatch(Command::ToggleMute),
            ScriptStep::Volume(v) => self.engine.dispatch(Command::SetVolume(v)),
            ScriptStep::Level(k) => self.engine.dispatch(Command::SetVolumeLevel(k)),
            ScriptStep::Slider(v) => self.engine.dispatch(Command::SetVolumeSlider(v)),
            ScriptStep::Rotate => self.engine.dispatch(Command::ToggleAutoRotate),
            ScriptStep::Wait(ms) => {
                self.complete_loads();
                self.engine.advance(Duration::from_millis(ms));
            }
            ScriptStep::FailLoads => self.fail_loads = true,
            ScriptStep::BlockAutoplay => self.engine.audio_backend_mut().set_autoplay_blocked(true),
            ScriptStep::AllowAutoplay => self.engine.audio_backend_mut().set_autoplay_blocked(false),
        }
    }

    fn complete_loads(&mut self) {
        for (ticket, source) in self.engine.image_loader_mut().take_pending() {
            let result = if self.fail_loads {
                Err(RoomError::AssetLoadFailed {
                    source_url: source,
                    reason: "simulated failure".to_string(),
                })
            } else {
                Ok(())
            };
            self.engine.complete_image_load(ticket, result);
        }
    }
}

/// Run `steps` against the in-memory backends, snapshotting after each.
pub fn run_script(
    config: EngineConfig,
    catalog: SceneCatalog,
    steps: &[ScriptStep],
) -> Result<Vec<(ScriptStep, EngineSnapshot)>> {
    let engine = PlaybackController::new(
        config,
        catalog,
        MockAudioBackend::new(),
        MockImageLoader::new(),
    )?;
    let mut sim = Simulator {
        engine,
        fail_loads: false,
    };

    let mut snapshots = Vec::with_capacity(steps.len());
    for step in steps {
        sim.apply(*step);
        snapshots.push((*step, sim.engine.snapshot()));
    }
    sim.engine.shutdown();

    Ok(snapshots)
}

fn format_snapshot(step: &ScriptStep, s: &EngineSnapshot) -> String {
    let [(top, top_opacity), (bottom, bottom_opacity)] = s.layers_top_first();
    format!(
        "[{:>7}ms] {:<16} #{} {:<28} {:<19} vol {:.2}{} bars {:>2}  layers {}:{:.2} {}:{:.2}  audio {}{}",
        s.elapsed_ms,
        step.to_string(),
        s.current_scene_index,
        s.title,
        s.state.to_string(),
        s.displayed_volume,
        if s.is_muted { " (muted)" } else { "" },
        s.filled_bars,
        top,
        top_opacity,
        bottom,
        bottom_opacity,
        s.audio_source.as_deref().unwrap_or("-"),
        if s.is_crossfading { " (crossfading)" } else { "" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PlaybackState;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_parse_script_steps() {
        let steps = parse_script("gesture, play wait:800\nselect:3 volume:0.5 level:6 fail-loads").unwrap();
        assert_eq!(
            steps,
            vec![
                ScriptStep::Gesture,
                ScriptStep::Play,
                ScriptStep::Wait(800),
                ScriptStep::Select(3),
                ScriptStep::Volume(0.5),
                ScriptStep::Level(6),
                ScriptStep::FailLoads,
            ]
        );
    }

    #[test]
    fn test_parse_rejects_bad_steps() {
        for bad in ["jump", "wait", "wait:soon", "next:2", "select:-1"] {
            let err = bad.parse::<ScriptStep>().unwrap_err();
            assert_eq!(err.error_code(), "INVALID_SCRIPT_STEP", "{bad}");
        }
    }

    #[test]
    fn test_step_display_parses_back() {
        for step in ["select:4", "wait:250", "block-autoplay"] {
            assert_eq!(step.parse::<ScriptStep>().unwrap().to_string(), step);
        }
    }

    #[test]
    fn test_run_script_transition() {
        let steps = parse_script("gesture play next wait:0 wait:800").unwrap();
        let out = run_script(EngineConfig::default(), SceneCatalog::builtin(), &steps).unwrap();

        let (_, after_next) = &out[2];
        assert_eq!(after_next.current_scene_index, 1);
        assert!(after_next.is_crossfading);
        assert_eq!(after_next.layer_sources[0], "/bg1.gif");

        let (_, last) = out.last().unwrap();
        assert_eq!(last.state, PlaybackState::Playing);
        assert_eq!(last.active_layer, 1);
        assert_eq!(last.layer_sources[1], "/bg2.gif");
        assert_eq!(last.audio_source.as_deref(), Some("/bgm/lofi-relax-music-lofium-2.mp3"));
        assert!(!last.is_crossfading);
        assert_eq!(last.filled_bars, 12);
    }

    #[test]
    fn test_failed_loads_keep_first_image() {
        let steps = parse_script("fail-loads gesture next wait:1000").unwrap();
        let out = run_script(EngineConfig::default(), SceneCatalog::builtin(), &steps).unwrap();
        let (_, last) = out.last().unwrap();
        assert_eq!(last.current_scene_index, 1);
        assert_eq!(last.layer_sources, ["/bg1.gif".to_string(), "/bg1.gif".to_string()]);
    }

    #[test]
    fn test_rotation_steps_advance_scene() {
        let steps = parse_script("rotate wait:20000 wait:20000").unwrap();
        let out = run_script(EngineConfig::default(), SceneCatalog::builtin(), &steps).unwrap();
        assert_eq!(out[1].1.current_scene_index, 1);
        assert_eq!(out[2].1.current_scene_index, 2);
        assert!(out[2].1.is_auto_rotating);
    }

    #[test]
    fn test_load_catalog_with_titles_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let titles: Vec<String> = (0..10).map(|i| format!("Room {i}")).collect();
        write!(file, "{}", serde_json::to_string(&titles).unwrap()).unwrap();

        let catalog = load_catalog(Some(file.path()));
        assert_eq!(catalog.display_title(3), "Room 3");
    }

    #[test]
    fn test_load_config_defaults_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
