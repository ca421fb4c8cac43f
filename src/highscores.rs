//! Persist the session-best run to disk (XDG config or ~/.config/fruitfall).

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

const FILENAME: &str = "best";

/// Best run on record: score, level reached, longest combo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BestRun {
    pub score: u32,
    pub level: u32,
    pub max_combo: u32,
}

impl BestRun {
    /// Fold a finished run in; keeps the per-field maxima.
    pub fn absorb(&mut self, score: u32, level: u32, max_combo: u32) -> bool {
        let improved = score > self.score || level > self.level || max_combo > self.max_combo;
        self.score = self.score.max(score);
        self.level = self.level.max(level);
        self.max_combo = self.max_combo.max(max_combo);
        improved
    }
}

/// Path to the best-run file (config dir / fruitfall / best).
fn config_path() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("fruitfall").join(FILENAME)
}

/// Load the best run from disk; zeros on missing or unparsable file.
pub fn load() -> BestRun {
    let content = match fs::read_to_string(config_path()) {
        Ok(c) => c,
        Err(_) => return BestRun::default(),
    };
    let mut nums = content
        .lines()
        .map(|l| l.trim().parse::<u32>().unwrap_or(0));
    BestRun {
        score: nums.next().unwrap_or(0),
        level: nums.next().unwrap_or(0),
        max_combo: nums.next().unwrap_or(0),
    }
}

/// Save the best run to disk, creating the config directory if needed.
pub fn save(best: BestRun) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::File::create(path)?;
    writeln!(f, "{}", best.score)?;
    writeln!(f, "{}", best.level)?;
    writeln!(f, "{}", best.max_combo)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_keeps_maxima() {
        let mut best = BestRun::default();
        assert!(best.absorb(100, 2, 3));
        assert!(best.absorb(50, 4, 1));
        assert_eq!(
            best,
            BestRun {
                score: 100,
                level: 4,
                max_combo: 3
            }
        );
        assert!(!best.absorb(10, 1, 1));
    }
}
