//! Seasons (`YY-Q`) and the walk to the neighbouring populated season.
use std::{fmt, future::Future, sync::LazyLock};

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;


static SEASON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2})-([1-4])").expect("season pattern is valid")
});

/// Oldest period the player knows about.
pub const PERIOD_MIN: i32 = 13 * 4 + 1;

const SEASON_NAMES: [&str; 4] = ["Winter", "Spring", "Summer", "Fall"];


/// A broadcast season: two-digit year and quarter 1-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeasonId {
    pub year: u8,
    pub quarter: u8,
}

impl SeasonId {
    /// First `YY-Q` occurrence anywhere in `text`.
    pub fn find(text: &str) -> Option<Self> {
        let captures = SEASON_RE.captures(text)?;
        Some(Self {
            year: captures[1].parse().ok()?,
            quarter: captures[2].parse().ok()?,
        })
    }

    /// Parse text that is exactly `YY-Q`.
    pub fn parse(text: &str) -> Option<Self> {
        let season = Self::find(text)?;
        (text.len() == 4).then_some(season)
    }

    pub fn from_period(period: i32) -> Self {
        Self {
            year: period.div_euclid(4) as u8,
            quarter: period.rem_euclid(4) as u8 + 1,
        }
    }

    pub fn period(&self) -> i32 {
        self.year as i32 * 4 + (self.quarter as i32 - 1).rem_euclid(4)
    }

    /// Winter, Spring, Summer or Fall.
    pub fn name(&self) -> &'static str {
        SEASON_NAMES[(self.quarter as usize + 3) % 4]
    }

    pub fn full_year(&self) -> u32 {
        2000 + self.year as u32
    }

    /// Slot of this season within its year, 0-3.
    pub fn slot(&self) -> usize {
        (self.quarter as usize + 3) % 4
    }
}

impl fmt::Display for SeasonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{}", self.year, self.quarter)
    }
}


/// Half-open range `[min, max)` of periods that may hold a season.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonWindow {
    pub min: i32,
    pub max: i32,
}

impl SeasonWindow {
    /// Window ending with the season `today` falls in.
    pub fn at(today: NaiveDate) -> Self {
        let current = SeasonId {
            year: today.year().rem_euclid(100) as u8,
            quarter: today.month0() as u8 / 3 + 1,
        };
        Self {
            min: PERIOD_MIN,
            max: current.period() + 1,
        }
    }

    pub fn current() -> Self {
        Self::at(Utc::now().date_naive())
    }

    pub fn contains(&self, period: i32) -> bool {
        self.min <= period && period < self.max
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

impl Direction {
    fn step(self) -> i32 {
        match self {
            Direction::Previous => -1,
            Direction::Next => 1,
        }
    }
}


/// Step away from `from` one period at a time and return the first season
/// for which `exists` answers true. Every step inside the window costs one
/// probe; nothing is cached between calls.
pub async fn find_season<P, F>(
    from: SeasonId,
    direction: Direction,
    window: SeasonWindow,
    mut exists: P,
) -> Option<SeasonId>
where
    P: FnMut(SeasonId) -> F,
    F: Future<Output = bool>,
{
    let mut period = from.period() + direction.step();
    while window.contains(period) {
        let candidate = SeasonId::from_period(period);
        if exists(candidate).await {
            return Some(candidate);
        }
        period += direction.step();
    }
    None
}

/// Previous and next populated seasons around `current`.
pub async fn adjacent_seasons<P, F>(
    current: SeasonId,
    window: SeasonWindow,
    mut exists: P,
) -> (Option<SeasonId>, Option<SeasonId>)
where
    P: FnMut(SeasonId) -> F,
    F: Future<Output = bool>,
{
    let previous = find_season(current, Direction::Previous, window, &mut exists).await;
    let next = find_season(current, Direction::Next, window, &mut exists).await;
    (previous, next)
}
