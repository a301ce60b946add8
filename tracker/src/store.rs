use std::{
    fs,
    io::ErrorKind,
    path::{Path as FsPath, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};

use crate::{distance::WalkingDistance, error::StoreError, path::Path};

const PATH_FILE: &str = "path.json";
const FINISHED_FILE: &str = "finished_paths.json";
const WALKING_DISTANCE_FILE: &str = "walking_distance.json";

/// JSON files in one directory holding the current path, the archive of
/// finished paths and the walking distance cache.
///
/// Once a load fails every later save is refused, so a file that could not
/// be read is never replaced by a fresh, empty state.
#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
    load_failed: bool,
}

impl Store {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            load_failed: false,
        })
    }

    pub fn dir(&self) -> &FsPath {
        &self.dir
    }

    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn save_path(&self, path: &Path) -> Result<(), StoreError> {
        self.save(PATH_FILE, Some(path))
    }

    pub fn load_path(&mut self) -> Result<Option<Path>, StoreError> {
        self.load(PATH_FILE)
    }

    pub fn save_finished_paths(&self, paths: &[Path]) -> Result<(), StoreError> {
        self.save(FINISHED_FILE, Some(&paths))
    }

    pub fn load_finished_paths(&mut self) -> Result<Vec<Path>, StoreError> {
        Ok(self.load(FINISHED_FILE)?.unwrap_or_default())
    }

    /// Adds `path` to the archive, newest finish first. Paths without legs
    /// are not kept.
    pub fn archive_path(&mut self, mut path: Path) -> Result<(), StoreError> {
        let mut finished = self.load_finished_paths()?;
        path.stopped = true;
        enter_finished(&mut finished, path);
        self.save_finished_paths(&finished)
    }

    /// Resumes a stopped path and drops the walking distance cache.
    pub fn restart_path(&self, path: &mut Path) -> Result<(), StoreError> {
        path.stopped = false;
        self.save_path(path)?;
        self.save_walking_distance(None)?;
        tracing::info!("restarted {}", path.display_label());
        Ok(())
    }

    /// Makes the finished path at `index` current and archives `current` in
    /// its place. Returns the new current path, or `None` when `index` is out
    /// of range.
    pub fn switch_path(&mut self, current: Path, index: usize) -> Result<Option<Path>, StoreError> {
        let mut finished = self.load_finished_paths()?;
        if index >= finished.len() {
            tracing::debug!(index, finished = finished.len(), "switch ignored");
            return Ok(None);
        }
        let chosen = finished.remove(index);
        enter_finished(&mut finished, current);
        self.save_finished_paths(&finished)?;
        self.save_path(&chosen)?;
        self.save_walking_distance(None)?;
        tracing::info!("switched to {}", chosen.display_label());
        Ok(Some(chosen))
    }

    /// `None` removes the cache file.
    pub fn save_walking_distance(&self, distance: Option<&WalkingDistance>) -> Result<(), StoreError> {
        self.save(WALKING_DISTANCE_FILE, distance)
    }

    pub fn load_walking_distance(&mut self) -> Result<Option<WalkingDistance>, StoreError> {
        self.load(WALKING_DISTANCE_FILE)
    }

    fn save<T: Serialize + ?Sized>(&self, name: &str, value: Option<&T>) -> Result<(), StoreError> {
        let target = self.dir.join(name);
        if self.load_failed {
            tracing::warn!("save of {} skipped after a failed load", target.display());
            return Err(StoreError::LoadFailed(target.display().to_string()));
        }

        let Some(value) = value else {
            return match fs::remove_file(&target) {
                Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            };
        };

        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &target)?;
        tracing::info!("saved {}", target.display());
        Ok(())
    }

    fn load<T: DeserializeOwned>(&mut self, name: &str) -> Result<Option<T>, StoreError> {
        let source = self.dir.join(name);
        let bytes = match fs::read(&source) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                self.load_failed = true;
                return Err(err.into());
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|err| {
            tracing::error!("failed to load {}: {err}", source.display());
            self.load_failed = true;
            StoreError::from(err)
        })
    }
}

fn enter_finished(finished: &mut Vec<Path>, path: Path) {
    finished.push(path);
    finished.retain(Path::has_legs);
    finished.sort_by(|a, b| b.finished_date.cmp(&a.finished_date));
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{leg::Leg, models::Coordinate};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_path(name: &str, finished: NaiveDate) -> Path {
        let leg = Leg::straight_line(
            Coordinate::new(35.681, 139.767),
            Coordinate::new(35.710, 139.811),
            "Tokyo",
            "Skytree",
        );
        let mut path = Path::with_legs(d(2023, 3, 1), vec![leg], 1200.0);
        path.name = name.into();
        path.finished_date = finished;
        path
    }

    #[test]
    fn missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        assert!(store.load_path().unwrap().is_none());
        assert!(store.load_finished_paths().unwrap().is_empty());
        assert!(store.load_walking_distance().unwrap().is_none());
        assert!(!store.load_failed());
    }

    #[test]
    fn path_round_trip_restores_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        let path = sample_path("tokyo walk", d(2023, 3, 19));
        store.save_path(&path).unwrap();

        let loaded = store.load_path().unwrap().expect("saved path");
        assert_eq!(loaded.name, "tokyo walk");
        assert_eq!(loaded.walked_distance(), 1200.0);
        assert_eq!(loaded.legs().len(), 1);
        assert_eq!(loaded.legs()[0].finish_label(), "Skytree");
        assert!(loaded.legs()[0].traversed_segments().is_some());
    }

    #[test]
    fn walking_distance_can_be_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        let cache = WalkingDistance {
            distance: 42.0,
            to_date: d(2023, 3, 19),
        };
        store.save_walking_distance(Some(&cache)).unwrap();
        assert_eq!(store.load_walking_distance().unwrap(), Some(cache));

        store.save_walking_distance(None).unwrap();
        assert_eq!(store.load_walking_distance().unwrap(), None);
        store.save_walking_distance(None).unwrap();
    }

    #[test]
    fn archive_orders_newest_first_and_drops_empty_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        store.archive_path(sample_path("older", d(2023, 1, 1))).unwrap();
        store.archive_path(Path::new(d(2023, 2, 1))).unwrap();
        store.archive_path(sample_path("newer", d(2023, 4, 1))).unwrap();

        let finished = store.load_finished_paths().unwrap();
        let names: Vec<_> = finished.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["newer", "older"]);
        assert!(finished.iter().all(|p| p.stopped));
    }

    #[test]
    fn restart_resumes_path_and_clears_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        let cache = WalkingDistance {
            distance: 42.0,
            to_date: d(2023, 3, 19),
        };
        store.save_walking_distance(Some(&cache)).unwrap();
        let mut path = sample_path("paused", d(2023, 3, 19));
        path.stopped = true;

        store.restart_path(&mut path).unwrap();

        assert!(!path.stopped);
        assert!(!store.load_path().unwrap().unwrap().stopped);
        assert_eq!(store.load_walking_distance().unwrap(), None);
    }

    #[test]
    fn switch_swaps_current_with_finished() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        store.archive_path(sample_path("newer", d(2023, 4, 1))).unwrap();
        store.archive_path(sample_path("older", d(2023, 1, 1))).unwrap();

        let current = sample_path("current", d(2023, 2, 1));
        assert!(store.switch_path(current.clone(), 2).unwrap().is_none());

        let chosen = store.switch_path(current, 1).unwrap().expect("in range");
        assert_eq!(chosen.name, "older");
        assert_eq!(store.load_path().unwrap().unwrap().name, "older");
        let names: Vec<_> = store
            .load_finished_paths()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["newer", "current"]);
    }

    #[test]
    fn corrupt_file_blocks_later_saves() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PATH_FILE), b"{not json").unwrap();
        let mut store = Store::open(dir.path()).unwrap();

        assert!(matches!(store.load_path(), Err(StoreError::Json(_))));
        assert!(store.load_failed());
        let err = store
            .save_path(&sample_path("x", d(2023, 1, 1)))
            .unwrap_err();
        assert!(matches!(err, StoreError::LoadFailed(_)));
        assert_eq!(
            fs::read(dir.path().join(PATH_FILE)).unwrap(),
            b"{not json".to_vec()
        );
    }
}
