use std::str::FromStr;
use std::time::Duration;

use super::LoadTestError;

/// Named load shapes selectable with `--profile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Light,
    Medium,
    Heavy,
    Stress,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadShape {
    pub users: usize,
    /// Users started per second.
    pub spawn_rate: f64,
    pub run_time: Duration,
}

impl Profile {
    pub fn shape(self) -> LoadShape {
        let (users, spawn_rate, secs) = match self {
            Profile::Light => (10, 2.0, 60),
            Profile::Medium => (50, 5.0, 120),
            Profile::Heavy => (100, 10.0, 300),
            Profile::Stress => (200, 20.0, 600),
        };
        LoadShape {
            users,
            spawn_rate,
            run_time: Duration::from_secs(secs),
        }
    }
}

impl FromStr for Profile {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Profile::Light),
            "medium" => Ok(Profile::Medium),
            "heavy" => Ok(Profile::Heavy),
            "stress" => Ok(Profile::Stress),
            other => Err(LoadTestError::UnknownProfile(other.to_string())),
        }
    }
}
