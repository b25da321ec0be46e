use std::{path::PathBuf, str::FromStr, time::Duration};
use tracing::warn;

use crate::{mask::DEFAULT_BRUSH_SIZE, models::RenderMode};

pub const DEFAULT_API_BASE: &str = "http://localhost:5001";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base: String,
    pub render_mode: RenderMode,
    /// Deadline for a generation call; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    pub brush_size: f32,
    pub output_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            render_mode: RenderMode::Ai,
            request_timeout: None,
            brush_size: DEFAULT_BRUSH_SIZE,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    /// Reads `STORYBOARD_*` variables from the process environment.
    pub fn from_env() -> Self { Self::from_lookup(|key| std::env::var(key).ok()) }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_base: lookup("STORYBOARD_API_BASE").filter(|v| !v.trim().is_empty()).unwrap_or(defaults.api_base),
            render_mode: parse_or("STORYBOARD_RENDER_MODE", &lookup, defaults.render_mode),
            request_timeout: lookup("STORYBOARD_TIMEOUT_SECS").and_then(|v| match v.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    warn!("Ignoring STORYBOARD_TIMEOUT_SECS={v}: not a number of seconds");
                    None
                }
            }),
            brush_size: parse_or("STORYBOARD_BRUSH_SIZE", &lookup, defaults.brush_size),
            output_dir: lookup("STORYBOARD_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring {key}={raw}: falling back to default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(ClientConfig::from_lookup(lookup(&[])), ClientConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            ("STORYBOARD_API_BASE", "http://gpu-box:7860"),
            ("STORYBOARD_RENDER_MODE", "demo"),
            ("STORYBOARD_TIMEOUT_SECS", "90"),
            ("STORYBOARD_BRUSH_SIZE", "35"),
        ]));
        assert_eq!(cfg.api_base, "http://gpu-box:7860");
        assert_eq!(cfg.render_mode, RenderMode::Demo);
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(90)));
        assert_eq!(cfg.brush_size, 35.0);
    }

    #[test]
    fn bad_values_fall_back() {
        let cfg = ClientConfig::from_lookup(lookup(&[
            ("STORYBOARD_RENDER_MODE", "turbo"),
            ("STORYBOARD_TIMEOUT_SECS", "soon"),
            ("STORYBOARD_BRUSH_SIZE", "big"),
        ]));
        assert_eq!(cfg.render_mode, RenderMode::Ai);
        assert_eq!(cfg.request_timeout, None);
        assert_eq!(cfg.brush_size, DEFAULT_BRUSH_SIZE);
    }
}
