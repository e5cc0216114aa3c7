use std::path::PathBuf;

pub trait ConfigManager: Sized + Clone + Send + Sync {
    fn get_log_dir(&self) -> eyre::Result<PathBuf>;
}

#[derive(Default, Clone, Debug)]
pub struct LocalConfigManager {}

impl LocalConfigManager {
    pub fn new() -> Self {
        Self {}
    }
}

// NOTE: This requires HOME (USERPROFILE on Windows) when XDG_DATA_HOME isn't set.
#[cfg(not(target_os = "windows"))]
pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(target_os = "windows")]
pub fn home_dir() -> Option<PathBuf> {
    std::env::var("USERPROFILE").ok().map(PathBuf::from)
}

pub fn data_dir() -> Option<PathBuf> {
    let data_dir = match std::env::var("XDG_DATA_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => home_dir()?.join(".local").join("share"),
    };

    Some(data_dir.join("multilog"))
}

impl ConfigManager for LocalConfigManager {
    fn get_log_dir(&self) -> eyre::Result<PathBuf> {
        match data_dir() {
            Some(dir) => Ok(dir.join("logs")),
            None => Err(eyre::eyre!("Can't construct log dir, neither XDG_DATA_HOME nor HOME is set!")),
        }
    }
}
