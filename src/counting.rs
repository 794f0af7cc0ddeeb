//! The counting game.
//!
//! Members post consecutive numbers into one channel per guild. A number is
//! accepted when it is exactly one more than the current count and its author
//! did not post the previous one; anything else resets the count to zero.
//!
//! [`Counting`] is the only writer of the game state. Each submission is
//! evaluated and applied while holding its guild's lane, so two racing
//! messages can never both advance from the same count.

use poise::serenity_prelude::{ChannelId, GuildId, UserId};
use tracing::{debug, error, info, instrument};

pub mod engine;
pub use engine::{GameState, Verdict};
use engine::{Policy, Snapshot};

pub mod intake;
pub use intake::Submission;
use intake::Lanes;

pub mod settings;
use settings::{AllowChat, CountState, CountingChannel, Paused};

pub mod stats;

pub mod store;
use store::{Backend, Stat, StatKey, Store};

#[derive(Debug, thiserror::Error, thisslime::TracingError)]
pub enum Error {
    #[error("counting storage failed: {0}")]
    #[event(level = ERROR)]
    Store(#[from] store::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub struct Counting<B = store::MongoDb> {
    store: Store<B>,
    lanes: Lanes,
    policy: Policy,
}

impl<B> Clone for Counting<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            lanes: self.lanes.clone(),
            policy: self.policy,
        }
    }
}

impl<B> Counting<B> {
    pub fn new(store: Store<B>, policy: Policy) -> Self {
        Self {
            store,
            lanes: Lanes::new(),
            policy,
        }
    }
}

impl<B: Backend> Counting<B> {
    async fn snapshot(&self, guild: GuildId) -> Result<Snapshot> {
        Ok(Snapshot {
            channel: self.store.get::<CountingChannel>(guild).await?,
            paused: self.store.get::<Paused>(guild).await?,
            allow_chat: self.store.get::<AllowChat>(guild).await?,
            state: self.store.get::<CountState>(guild).await?,
        })
    }

    pub async fn settings(&self, guild: GuildId) -> Result<Snapshot> {
        self.snapshot(guild).await
    }

    pub async fn state(&self, guild: GuildId) -> Result<GameState> {
        Ok(self.store.get::<CountState>(guild).await?)
    }

    /// Evaluates one submission against the state as persisted right now and
    /// applies the result. An `Err` means nothing visible should be shown for
    /// the submission.
    ///
    /// The guild's lane is taken before anything awaits on storage, so
    /// submissions are evaluated in the order they were delivered.
    #[instrument(skip_all, fields(guild = %submission.guild, channel = %submission.channel, user = %submission.author, message = %submission.id))]
    pub async fn submit(&self, submission: Submission) -> Result<Verdict> {
        let guild = submission.guild;

        let _lane = self.lanes.enter(guild).await;

        let snapshot = self.snapshot(guild).await?;
        let verdict = engine::evaluate(&snapshot, &self.policy, &submission);
        let next = verdict.next_state(snapshot.state, submission.author);

        match verdict {
            Verdict::Ignore => {
                debug!("submission ignored");
            }
            Verdict::Accept { count, .. } => {
                self.store.set::<CountState>(guild, &next).await?;

                if let Err(err) = self.record_accept(submission.author, count).await {
                    self.restore(guild, snapshot.state).await;
                    return Err(err);
                }

                info!(count, "count accepted");
            }
            Verdict::Reject { at, reason } => {
                self.store.set::<CountState>(guild, &next).await?;

                let fail = StatKey::user(Stat::Fail, submission.author);
                if let Err(err) = self.store.increment(fail, 1).await {
                    self.restore(guild, snapshot.state).await;
                    return Err(err.into());
                }

                info!(count = at, %reason, "count ruined");
            }
        }

        Ok(verdict)
    }

    /// `total` goes first since it is the only write that can be undone.
    /// Highs are raised once it has landed.
    async fn record_accept(&self, user: UserId, count: u64) -> Result<()> {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        let total = StatKey::user(Stat::Total, user);

        self.store.increment(total, 1).await?;

        let raised = async {
            self.store
                .raise_to(StatKey::user(Stat::High, user), count)
                .await?;
            self.store
                .raise_to(StatKey::global(Stat::High), count)
                .await
        };

        if let Err(err) = raised.await {
            if let Err(undo) = self.store.increment(total, -1).await {
                error!(%undo, key = %total, "could not take back total after failed stats write");
            }
            return Err(err.into());
        }

        Ok(())
    }

    async fn restore(&self, guild: GuildId, previous: GameState) {
        match self.store.set::<CountState>(guild, &previous).await {
            Ok(()) => debug!(count = previous.count, "restored count after failed stats write"),
            Err(err) => error!(%err, "could not restore count after failed stats write"),
        }
    }

    pub async fn bind(&self, guild: GuildId, channel: ChannelId) -> Result<()> {
        let _lane = self.lanes.enter(guild).await;
        self.store
            .set::<CountingChannel>(guild, &Some(channel))
            .await?;
        info!(%guild, %channel, "counting channel set");
        Ok(())
    }

    pub async fn set_paused(&self, guild: GuildId, paused: bool) -> Result<()> {
        let _lane = self.lanes.enter(guild).await;
        self.store.set::<Paused>(guild, &paused).await?;
        info!(%guild, paused, "counting pause changed");
        Ok(())
    }

    /// Flips whether chatting between counts is allowed, returning the new value.
    pub async fn toggle_chat(&self, guild: GuildId) -> Result<bool> {
        let _lane = self.lanes.enter(guild).await;
        let allowed = !self.store.get::<AllowChat>(guild).await?;
        self.store.set::<AllowChat>(guild, &allowed).await?;
        info!(%guild, allowed, "chat between counts changed");
        Ok(allowed)
    }
}
