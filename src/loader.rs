use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::config::MapSource;
use crate::error::{GameError, GameResult};
use crate::maze::MapSpec;

#[derive(Clone, Debug)]
pub struct LoadedMap {
    pub map: MapSpec,
    pub origin: Option<PathBuf>,
}

pub fn read_map(path: &Path) -> GameResult<MapSpec> {
    let text = fs::read_to_string(path)?;
    MapSpec::parse(&text)
}

/// Map files in `dir`, sorted by name.
pub fn list_maps(dir: &Path) -> GameResult<Vec<PathBuf>> {
    let mut maps = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            maps.push(path);
        }
    }
    maps.sort();
    Ok(maps)
}

/// Picks a random map, avoiding `current` whenever another one exists.
pub fn choose_map<R: Rng>(dir: &Path, current: Option<&Path>, rng: &mut R) -> GameResult<PathBuf> {
    let maps = list_maps(dir)?;
    let mut candidates: Vec<&PathBuf> = maps
        .iter()
        .filter(|path| Some(path.as_path()) != current)
        .collect();
    if candidates.is_empty() {
        candidates = maps.iter().collect();
    }
    if candidates.is_empty() {
        return Err(GameError::NoMapAvailable(dir.to_path_buf()));
    }
    Ok(candidates[rng.random_range(0..candidates.len())].clone())
}

pub fn load_map<R: Rng>(
    source: &MapSource,
    current: Option<&Path>,
    rng: &mut R,
) -> GameResult<LoadedMap> {
    match source {
        MapSource::Inline(text) => Ok(LoadedMap {
            map: MapSpec::parse(text)?,
            origin: None,
        }),
        MapSource::File(path) => Ok(LoadedMap {
            map: read_map(path)?,
            origin: Some(path.clone()),
        }),
        MapSource::Directory(dir) => {
            let path = choose_map(dir, current, rng)?;
            log::debug!("picked map {}", path.display());
            Ok(LoadedMap {
                map: read_map(&path)?,
                origin: Some(path),
            })
        }
    }
}
