use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    collector::CollectorKind,
    style::{Glyphs, Styles},
};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// seconds between watch updates
    pub interval: f64,
    pub indent: usize,
    pub collector: CollectorKind,
    pub show_started: bool,
    pub styles: Styles,
    pub glyphs: Glyphs,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            interval: 1.0,
            indent: 4,
            collector: CollectorKind::Ps,
            show_started: false,
            styles: Styles::default(),
            glyphs: Glyphs::default(),
        }
    }
}

impl Config {
    pub fn load() -> Config {
        Self::load_from(&get_home_config())
    }

    ///missing file means defaults, a broken one is reported and ignored
    pub fn load_from(path: &Path) -> Config {
        if !path.exists() {
            return Config::default();
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!("cannot read {}: {err}", path.display());
                return Config::default();
            }
        };
        match toml::from_str::<Config>(&contents) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("ignoring {}: {err}", path.display());
                Config::default()
            }
        }
    }
}

fn get_home_config() -> PathBuf {
    //home directory
    if let Some(mut dir) = dirs::home_dir() {
        dir.push(".config");
        dir.push("pstree");
        dir.push("config.toml");
        return dir;
    }
    //should not happen, but just in case
    PathBuf::from("config.toml")
}
