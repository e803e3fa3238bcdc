use crate::commitment::CommitmentDigest;
use crate::error::{ProtocolError, Result};
use crate::events::GameEvent;
use crate::rules::GameType;
use crate::session::{GameSession, RoundResult};
use crate::settlement::{self, Settlement};
use gambit_core::{
    Amount, Clock, CoreError, Custody, PlayerId, ProtocolConfig, SessionRecord, SessionStore,
    Storage,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Owns all game sessions and serializes every mutating operation.
///
/// The registry is the authoritative executor: one request at a time per
/// session, guards applied by the state machine, stake movement through the
/// custody collaborator, terminal sessions settled exactly once and then
/// archived read-only.
pub struct GameRegistry {
    config: ProtocolConfig,
    custody: Arc<dyn Custody>,
    clock: Arc<dyn Clock>,
    storage: Arc<Storage>,
    sessions: RwLock<HashMap<u64, GameSession>>,
    next_id: AtomicU64,
    events: broadcast::Sender<GameEvent>,
}

impl GameRegistry {
    /// Opens the registry, restoring unfinished sessions from storage.
    pub async fn open(
        config: ProtocolConfig,
        custody: Arc<dyn Custody>,
        clock: Arc<dyn Clock>,
        data_dir: &Path,
    ) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(Storage::new(&data_dir.join("gambit.db")).await?);
        let store = SessionStore::new(&storage);

        let mut sessions = HashMap::new();
        for record in store.load_open_sessions().await? {
            let session: GameSession =
                serde_json::from_str(&record.snapshot).map_err(CoreError::from)?;
            sessions.insert(session.id(), session);
        }
        if !sessions.is_empty() {
            tracing::info!("Restored {} open game(s) from storage", sessions.len());
        }

        let next_id = store.max_session_id().await? + 1;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            custody,
            clock,
            storage,
            sessions: RwLock::new(sessions),
            next_id: AtomicU64::new(next_id),
            events,
        })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Allocates a Waiting session, escrowing the creator's stake.
    pub async fn create_game(
        &self,
        game_type: GameType,
        creator: PlayerId,
        stake: Amount,
    ) -> Result<u64> {
        if stake != self.config.stake {
            return Err(ProtocolError::InvalidStake {
                expected: self.config.stake,
                got: stake,
            });
        }
        self.custody.escrow(creator, stake)?;

        let now = self.clock.now();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = GameSession::new(id, game_type, creator, stake, now);
        self.sessions.write().insert(id, session.clone());
        self.persist(&session).await?;

        tracing::info!("Player {} created game {} ({})", creator, id, game_type);
        let _ = self.events.send(GameEvent::GameCreated {
            id,
            game_type,
            player1: creator,
        });
        Ok(id)
    }

    /// Waiting -> InProgress, escrowing the joiner's stake.
    pub async fn join_game(&self, id: u64, player: PlayerId, stake: Amount) -> Result<()> {
        let now = self.clock.now();
        let snapshot = {
            let mut sessions = self.sessions.write();
            match sessions.get_mut(&id) {
                None => None,
                Some(session) => {
                    session.ensure_joinable(player, stake)?;
                    self.custody.escrow(player, stake)?;
                    session.join(player, stake, now)?;
                    Some(session.clone())
                }
            }
        };
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => return Err(self.missing_session(id).await),
        };
        self.persist(&snapshot).await?;

        let _ = self.events.send(GameEvent::PlayerJoined { id, player2: player });
        Ok(())
    }

    /// Records a commitment digest for a participant.
    pub async fn commit_move(
        &self,
        id: u64,
        player: PlayerId,
        digest: CommitmentDigest,
    ) -> Result<()> {
        let now = self.clock.now();
        let snapshot = {
            let mut sessions = self.sessions.write();
            match sessions.get_mut(&id) {
                None => None,
                Some(session) => {
                    self.noted(id, player, session.commit_move(player, digest, now))?;
                    Some(session.clone())
                }
            }
        };
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => return Err(self.missing_session(id).await),
        };
        self.persist(&snapshot).await?;
        Ok(())
    }

    /// Records a reveal; may finish the session and trigger settlement.
    pub async fn reveal_move(
        &self,
        id: u64,
        player: PlayerId,
        value: u64,
        nonce: u64,
    ) -> Result<RoundResult> {
        let now = self.clock.now();
        let outcome = {
            let mut sessions = self.sessions.write();
            match sessions.get_mut(&id) {
                None => None,
                Some(session) => {
                    let rules = session.game_type().rules();
                    let result = self.noted(
                        id,
                        player,
                        session.reveal_move(player, value, nonce, rules.as_ref(), now),
                    )?;
                    if session.is_terminal() {
                        let settlement = settlement::settle(session, &self.config)?;
                        self.apply_settlement(id, &settlement)?;
                        session.record_settlement(settlement);
                        let snapshot = session.clone();
                        sessions.remove(&id);
                        Some((snapshot, result))
                    } else {
                        Some((session.clone(), result))
                    }
                }
            }
        };
        let (snapshot, result) = match outcome {
            Some(outcome) => outcome,
            None => return Err(self.missing_session(id).await),
        };
        self.persist(&snapshot).await?;

        if let RoundResult::Finished { winner } = result {
            let _ = self.events.send(GameEvent::GameFinished { id, winner });
        }
        Ok(result)
    }

    /// Cooperative liveness: forces a session past its deadline into
    /// Expired and settles it. Any caller may invoke this.
    pub async fn expire_game(&self, id: u64) -> Result<()> {
        let now = self.clock.now();
        let snapshot = {
            let mut sessions = self.sessions.write();
            match sessions.get_mut(&id) {
                None => None,
                Some(session) => {
                    session.expire(now, &self.config)?;
                    let settlement = settlement::settle(session, &self.config)?;
                    self.apply_settlement(id, &settlement)?;
                    session.record_settlement(settlement);
                    let snapshot = session.clone();
                    sessions.remove(&id);
                    Some(snapshot)
                }
            }
        };
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => return Err(self.missing_session(id).await),
        };
        self.persist(&snapshot).await?;

        let _ = self.events.send(GameEvent::GameExpired { id });
        Ok(())
    }

    /// Expires every active session whose deadline has elapsed.
    pub async fn sweep_expired(&self) -> Result<Vec<u64>> {
        let mut expired = Vec::new();
        for id in self.list_active() {
            match self.expire_game(id).await {
                Ok(()) => expired.push(id),
                Err(ProtocolError::NotYetExpirable)
                | Err(ProtocolError::AlreadyTerminal)
                | Err(ProtocolError::SessionNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(expired)
    }

    /// Read-only session snapshot, live or archived.
    pub async fn get_game(&self, id: u64) -> Result<GameSession> {
        if let Some(session) = self.sessions.read().get(&id) {
            return Ok(session.clone());
        }

        let store = SessionStore::new(&self.storage);
        let record = store
            .load_session(id)
            .await?
            .ok_or(ProtocolError::SessionNotFound(id))?;
        let session = serde_json::from_str(&record.snapshot).map_err(CoreError::from)?;
        Ok(session)
    }

    /// Highest session identifier allocated so far.
    pub fn game_counter(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst).saturating_sub(1)
    }

    /// Identifiers of sessions currently Waiting or InProgress.
    pub fn list_active(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.sessions.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Total funds escrowed across active sessions.
    pub fn escrowed_total(&self) -> Amount {
        self.sessions
            .read()
            .values()
            .fold(Amount::ZERO, |acc, session| {
                acc.checked_add(session.escrowed()).unwrap_or(acc)
            })
    }

    fn apply_settlement(&self, id: u64, settlement: &Settlement) -> Result<()> {
        for payout in &settlement.payouts {
            self.custody.disburse(payout.account, payout.amount)?;
            tracing::info!(
                "Game {}: paid {} to {} ({:?})",
                id,
                payout.amount,
                payout.account,
                payout.reason
            );
        }
        Ok(())
    }

    /// A session missing from the active set is either archived (terminal)
    /// or was never created; the two are distinct signals.
    async fn missing_session(&self, id: u64) -> ProtocolError {
        let store = SessionStore::new(&self.storage);
        match store.load_session(id).await {
            Ok(Some(_)) => ProtocolError::AlreadyTerminal,
            _ => ProtocolError::SessionNotFound(id),
        }
    }

    fn noted<T>(&self, id: u64, player: PlayerId, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_protocol_violation() {
                tracing::warn!("Game {}: rejected request from {}: {}", id, player, e);
            }
        }
        result
    }

    async fn persist(&self, session: &GameSession) -> Result<()> {
        let record = SessionRecord {
            id: session.id(),
            game_type: session.game_type().to_string(),
            state: session.state().to_string(),
            winner: session.winner().map(|w| w.to_string()),
            open: !session.is_terminal(),
            snapshot: serde_json::to_string(session).map_err(CoreError::from)?,
            created_at: session.created_at(),
            updated_at: session.last_action_time(),
        };
        SessionStore::new(&self.storage)
            .save_session(&record)
            .await?;
        Ok(())
    }
}
