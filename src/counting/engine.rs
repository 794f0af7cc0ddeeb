//! Decision logic of the counting game.
//!
//! Nothing here touches storage or Discord: [`evaluate`] takes the state as it
//! is persisted right now plus one incoming submission and returns a
//! [`Verdict`]. Callers must hold the guild's lane while evaluating and
//! applying, so that the next submission sees the result.

use std::fmt;

use poise::serenity_prelude::{ChannelId, UserId};
use serde::{Deserialize, Serialize};

use super::intake::{Content, Submission};

/// Reactions for accepted counts, advancing one step every hundred.
pub const REACTION_CYCLE: [&str; 5] = ["✅", "☑️", "🔥", "❤️‍🔥", "🌟"];

pub const RESET_REACTION: &str = "💥";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub count: u64,
    pub last_counter: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingStart,
    InProgress,
}

impl GameState {
    pub const fn phase(&self) -> Phase {
        if self.count == 0 {
            Phase::AwaitingStart
        } else {
            Phase::InProgress
        }
    }

    pub const fn expected(&self) -> u64 {
        self.count.saturating_add(1)
    }

    fn advanced(self, count: u64, by: UserId) -> Self {
        Self {
            count,
            last_counter: Some(by),
        }
    }
}

/// Everything about a guild's game that a decision depends on, read in one go
/// under the guild's lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub channel: Option<ChannelId>,
    pub paused: bool,
    pub allow_chat: bool,
    pub state: GameState,
}

/// Product-policy knobs that come from the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy {
    /// Whether a non-number ruins the game before anyone has counted.
    pub reset_on_chat_before_start: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    NonNumber,
    Twice,
    Wrong { got: u64, expected: u64 },
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonNumber => f.write_str("sent a non-number"),
            Self::Twice => f.write_str("counted twice in a row"),
            Self::Wrong { got, expected } => write!(f, "sent `{got}`, expected `{expected}`"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier(usize);

impl Tier {
    pub fn of(count: u64) -> Self {
        let index = (count % 500) / 100;
        Self(index as usize)
    }

    pub const fn emoji(self) -> &'static str {
        REACTION_CYCLE[self.0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    Reaction(Tier),
    Milestone,
}

impl Presentation {
    pub fn of(count: u64) -> Self {
        if count % 100 == 0 {
            Self::Milestone
        } else {
            Self::Reaction(Tier::of(count))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ignore,
    Accept {
        count: u64,
        presentation: Presentation,
    },
    Reject {
        /// count at the moment it was ruined
        at: u64,
        reason: ResetReason,
    },
}

impl Verdict {
    /// The state to persist once this verdict has been reached.
    pub fn next_state(&self, current: GameState, actor: UserId) -> GameState {
        match *self {
            Self::Ignore => current,
            Self::Accept { count, .. } => current.advanced(count, actor),
            Self::Reject { .. } => GameState::default(),
        }
    }

    pub const fn is_accept(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }
}

pub fn evaluate(snapshot: &Snapshot, policy: &Policy, submission: &Submission) -> Verdict {
    if snapshot.paused || snapshot.channel != Some(submission.channel) {
        return Verdict::Ignore;
    }

    let state = snapshot.state;

    let n = match submission.content {
        Content::Number(n) => n,
        Content::Text => {
            let ruins = match state.phase() {
                Phase::AwaitingStart => policy.reset_on_chat_before_start && !snapshot.allow_chat,
                Phase::InProgress => !snapshot.allow_chat,
            };

            return if ruins {
                Verdict::Reject {
                    at: state.count,
                    reason: ResetReason::NonNumber,
                }
            } else {
                Verdict::Ignore
            };
        }
    };

    let expected = state.expected();

    if state.last_counter == Some(submission.author) {
        Verdict::Reject {
            at: state.count,
            reason: ResetReason::Twice,
        }
    } else if n != expected {
        Verdict::Reject {
            at: state.count,
            reason: ResetReason::Wrong { got: n, expected },
        }
    } else {
        Verdict::Accept {
            count: n,
            presentation: Presentation::of(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use poise::serenity_prelude::{ChannelId, GuildId, MessageId, UserId};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::counting::intake::{Content, Submission};

    const GUILD: GuildId = GuildId::new(1);
    const CHANNEL: ChannelId = ChannelId::new(2);
    const ELSEWHERE: ChannelId = ChannelId::new(3);

    const A: UserId = UserId::new(10);
    const B: UserId = UserId::new(11);
    const C: UserId = UserId::new(12);

    fn snapshot(count: u64, last_counter: Option<UserId>) -> Snapshot {
        Snapshot {
            channel: Some(CHANNEL),
            paused: false,
            allow_chat: false,
            state: GameState {
                count,
                last_counter,
            },
        }
    }

    fn submit(author: UserId, text: &str) -> Submission {
        Submission {
            id: MessageId::new(1),
            guild: GUILD,
            channel: CHANNEL,
            author,
            content: Content::classify(text),
        }
    }

    #[test]
    fn opening_count() {
        let snapshot = snapshot(0, None);
        let verdict = evaluate(&snapshot, &Policy::default(), &submit(A, "1"));

        assert_eq!(
            verdict,
            Verdict::Accept {
                count: 1,
                presentation: Presentation::Reaction(Tier(0)),
            }
        );
        assert_eq!(
            verdict.next_state(snapshot.state, A),
            GameState {
                count: 1,
                last_counter: Some(A),
            }
        );
    }

    #[test]
    fn counting_twice() {
        let snapshot = snapshot(5, Some(A));
        let verdict = evaluate(&snapshot, &Policy::default(), &submit(A, "6"));

        assert_eq!(
            verdict,
            Verdict::Reject {
                at: 5,
                reason: ResetReason::Twice,
            }
        );
        assert_eq!(verdict.next_state(snapshot.state, A), GameState::default());
    }

    #[test]
    fn counting_twice_beats_wrong_number() {
        let verdict = evaluate(&snapshot(5, Some(A)), &Policy::default(), &submit(A, "9"));

        assert_eq!(
            verdict,
            Verdict::Reject {
                at: 5,
                reason: ResetReason::Twice,
            }
        );
    }

    #[test]
    fn wrong_number() {
        let verdict = evaluate(&snapshot(12, Some(A)), &Policy::default(), &submit(B, "14"));

        assert_eq!(
            verdict,
            Verdict::Reject {
                at: 12,
                reason: ResetReason::Wrong {
                    got: 14,
                    expected: 13,
                },
            }
        );
    }

    #[test]
    fn wrong_opening_number() {
        let verdict = evaluate(&snapshot(0, None), &Policy::default(), &submit(B, "0"));

        assert_eq!(
            verdict,
            Verdict::Reject {
                at: 0,
                reason: ResetReason::Wrong {
                    got: 0,
                    expected: 1,
                },
            }
        );
    }

    #[test]
    fn milestone() {
        let verdict = evaluate(&snapshot(99, Some(A)), &Policy::default(), &submit(B, "100"));

        assert_eq!(
            verdict,
            Verdict::Accept {
                count: 100,
                presentation: Presentation::Milestone,
            }
        );
    }

    #[test]
    fn non_number_in_progress() {
        let verdict = evaluate(&snapshot(12, Some(A)), &Policy::default(), &submit(C, "hello"));

        assert_eq!(
            verdict,
            Verdict::Reject {
                at: 12,
                reason: ResetReason::NonNumber,
            }
        );
    }

    #[test]
    fn non_number_with_chat_allowed() {
        let mut snapshot = snapshot(12, Some(A));
        snapshot.allow_chat = true;

        let verdict = evaluate(&snapshot, &Policy::default(), &submit(C, "hello"));

        assert_eq!(verdict, Verdict::Ignore);
        assert_eq!(verdict.next_state(snapshot.state, C), snapshot.state);
    }

    #[test]
    fn non_number_before_start() {
        let snapshot = snapshot(0, None);

        assert_eq!(
            evaluate(&snapshot, &Policy::default(), &submit(C, "hello")),
            Verdict::Ignore
        );

        let strict = Policy {
            reset_on_chat_before_start: true,
        };

        assert_eq!(
            evaluate(&snapshot, &strict, &submit(C, "hello")),
            Verdict::Reject {
                at: 0,
                reason: ResetReason::NonNumber,
            }
        );
    }

    #[test]
    fn paused() {
        let mut snapshot = snapshot(3, Some(A));
        snapshot.paused = true;

        assert_eq!(
            evaluate(&snapshot, &Policy::default(), &submit(B, "4")),
            Verdict::Ignore
        );
        assert_eq!(
            evaluate(&snapshot, &Policy::default(), &submit(B, "hello")),
            Verdict::Ignore
        );
    }

    #[test]
    fn other_channels() {
        let mut submission = submit(B, "4");
        submission.channel = ELSEWHERE;

        assert_eq!(
            evaluate(&snapshot(3, Some(A)), &Policy::default(), &submission),
            Verdict::Ignore
        );

        let mut unbound = snapshot(3, Some(A));
        unbound.channel = None;

        assert_eq!(
            evaluate(&unbound, &Policy::default(), &submit(B, "4")),
            Verdict::Ignore
        );
    }

    #[test]
    fn tiers() {
        let emoji = |count| Tier::of(count).emoji();

        assert_eq!(emoji(1), "✅");
        assert_eq!(emoji(99), "✅");
        assert_eq!(emoji(101), "☑️");
        assert_eq!(emoji(250), "🔥");
        assert_eq!(emoji(399), "❤️‍🔥");
        assert_eq!(emoji(401), "🌟");
        assert_eq!(emoji(501), "✅");
        assert_eq!(emoji(1234), "🔥");
    }

    #[test]
    fn presentation() {
        assert_eq!(Presentation::of(200), Presentation::Milestone);
        assert_eq!(Presentation::of(500), Presentation::Milestone);
        assert_eq!(Presentation::of(201), Presentation::Reaction(Tier(2)));
    }

    #[test]
    fn reset_reasons() {
        assert_eq!(ResetReason::NonNumber.to_string(), "sent a non-number");
        assert_eq!(ResetReason::Twice.to_string(), "counted twice in a row");
        assert_eq!(
            ResetReason::Wrong {
                got: 7,
                expected: 6
            }
            .to_string(),
            "sent `7`, expected `6`"
        );
    }
}
