//! Read-only queries over the statistics table.

use std::fmt;

use poise::serenity_prelude::UserId;

use super::{
    store::{Backend, Stat, StatKey},
    Counting, Result,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Profile {
    pub total: i64,
    pub high: i64,
    pub fails: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaderboard {
    pub stat: Stat,
    pub standings: Vec<(UserId, i64)>,
    pub global_high: i64,
}

impl<B: Backend> Counting<B> {
    /// Up to `n` users ordered by `stat`, highest first.
    pub async fn top(&self, stat: Stat, n: usize) -> Result<Vec<(UserId, i64)>> {
        Ok(self.store.top(stat, n).await?)
    }

    pub async fn global_high(&self) -> Result<i64> {
        Ok(self.store.stat(StatKey::global(Stat::High)).await?)
    }

    pub async fn profile(&self, user: UserId) -> Result<Profile> {
        Ok(Profile {
            total: self.store.stat(StatKey::user(Stat::Total, user)).await?,
            high: self.store.stat(StatKey::user(Stat::High, user)).await?,
            fails: self.store.stat(StatKey::user(Stat::Fail, user)).await?,
        })
    }

    pub async fn leaderboard(&self, stat: Stat, n: usize) -> Result<Leaderboard> {
        Ok(Leaderboard {
            stat,
            standings: self.top(stat, n).await?,
            global_high: self.global_high().await?,
        })
    }
}

impl fmt::Display for Leaderboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self.stat {
            Stat::Total => "most counts",
            Stat::High => "highest counts",
            Stat::Fail => "most ruined counts",
        };

        writeln!(f, "## 🏆 {title}")?;

        if self.standings.is_empty() {
            writeln!(f, "nobody yet!")?;
        }

        for (place, (user, value)) in self.standings.iter().enumerate() {
            writeln!(f, "{}. <@{user}>: `{value}`", place + 1)?;
        }

        write!(f, "highest count ever reached: `{}`", self.global_high)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "🧮 counted `{}` times, highest count `{}`, ruined `{}` counts",
            self.total, self.high, self.fails
        )
    }
}

#[cfg(test)]
mod tests {
    use poise::serenity_prelude::UserId;
    use pretty_assertions::assert_eq;

    use super::{Leaderboard, Profile};
    use crate::counting::store::Stat;

    #[test]
    fn leaderboard_display() {
        let board = Leaderboard {
            stat: Stat::Total,
            standings: vec![(UserId::new(1), 30), (UserId::new(2), 12)],
            global_high: 104,
        };

        assert_eq!(
            board.to_string(),
            "## 🏆 most counts\n1. <@1>: `30`\n2. <@2>: `12`\nhighest count ever reached: `104`"
        );
    }

    #[test]
    fn empty_leaderboard_display() {
        let board = Leaderboard {
            stat: Stat::Fail,
            standings: Vec::new(),
            global_high: 0,
        };

        assert_eq!(
            board.to_string(),
            "## 🏆 most ruined counts\nnobody yet!\nhighest count ever reached: `0`"
        );
    }

    #[test]
    fn profile_display() {
        let profile = Profile {
            total: 3,
            high: 40,
            fails: 1,
        };

        assert_eq!(
            profile.to_string(),
            "🧮 counted `3` times, highest count `40`, ruined `1` counts"
        );
    }
}
