use std::{path::Path, path::PathBuf, time::Duration};

pub fn parse_human_duration(h_time: &str) -> eyre::Result<Duration> {
    let duration = humantime::parse_duration(h_time)?;
    Ok(duration)
}

/// `<dir>/<prefix>_<nnn>.log`, numbered from 1.
pub fn numbered_log_file(dir: &Path, prefix: &str, number: usize) -> PathBuf {
    dir.join(format!("{}_{:03}.log", prefix, number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_names_are_zero_padded() {
        let path = numbered_log_file(Path::new("/tmp/logs"), "run", 7);
        assert_eq!(path, PathBuf::from("/tmp/logs/run_007.log"));
    }

    #[test]
    fn parses_human_durations() {
        assert_eq!(parse_human_duration("250ms").unwrap(), Duration::from_millis(250));
        assert!(parse_human_duration("soon").is_err());
    }
}
