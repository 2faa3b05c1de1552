//! Timer-driven computer turns and pair-matching settles
//!
//! Every scheduled action is a tokio task carrying a cancellation token. At
//! fire time the task re-checks its token and the session's ended flag before
//! touching the engine, so a finished or abandoned session never receives a
//! stale move. Applied actions are published as `TurnEvent`s.

use crate::common::types::SessionId;
use crate::config::SchedulerConfig;
use crate::errors::GameError;
use crate::games::{GameEngine, MoveResult, MoveSource, PendingAction, SessionHandle};
use crate::metrics::PlatformMetrics;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Action applied by the scheduler on behalf of a session
#[derive(Debug, Clone)]
pub enum TurnEvent {
    ComputerMoved(MoveResult),
    Settled(MoveResult),
}

impl TurnEvent {
    pub fn result(&self) -> &MoveResult {
        match self {
            TurnEvent::ComputerMoved(result) | TurnEvent::Settled(result) => result,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.result().session_id
    }

    pub fn is_terminal(&self) -> bool {
        self.result().is_terminal()
    }
}

struct ScheduledTask {
    action: PendingAction,
    /// Distinguishes this task from a later one for the same session
    ticket: u64,
    token: CancellationToken,
}

enum Fired {
    Applied(TurnEvent),
    Stale,
    NoMove,
    Rejected(GameError),
}

struct SchedulerInner {
    engine: Arc<GameEngine>,
    opponent: Arc<dyn MoveSource>,
    config: SchedulerConfig,
    pending: DashMap<SessionId, ScheduledTask>,
    events: broadcast::Sender<TurnEvent>,
    metrics: Arc<PlatformMetrics>,
    /// Parent of every task token; cancelled on shutdown
    root: CancellationToken,
    tickets: AtomicU64,
}

/// Drives computer seats and settle delays; at most one pending action per session
pub struct TurnScheduler {
    inner: Arc<SchedulerInner>,
}

impl TurnScheduler {
    pub fn new(
        engine: Arc<GameEngine>,
        opponent: Arc<dyn MoveSource>,
        config: SchedulerConfig,
        metrics: Arc<PlatformMetrics>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            inner: Arc::new(SchedulerInner {
                engine,
                opponent,
                config,
                pending: DashMap::new(),
                events,
                metrics,
                root: CancellationToken::new(),
                tickets: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.inner.events.subscribe()
    }

    /// Schedule whatever the session needs next. Returns the action if one
    /// was scheduled.
    pub fn drive(&self, handle: &SessionHandle) -> Option<PendingAction> {
        self.inner.drive(handle)
    }

    pub fn schedule_computer_turn(&self, handle: &SessionHandle, seat: usize) -> bool {
        self.inner
            .schedule(handle.clone(), PendingAction::ComputerTurn { seat })
    }

    pub fn schedule_settle(&self, handle: &SessionHandle) -> bool {
        self.inner.schedule(handle.clone(), PendingAction::Settle)
    }

    /// Cancel the pending action of a session, if any
    pub fn cancel(&self, id: &SessionId) -> bool {
        self.inner.cancel(id)
    }

    pub fn pending_action(&self, id: &SessionId) -> Option<PendingAction> {
        self.inner.pending.get(id).map(|t| t.action)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Cancel everything and refuse new work
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl Drop for TurnScheduler {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl SchedulerInner {
    fn drive(self: &Arc<Self>, handle: &SessionHandle) -> Option<PendingAction> {
        let action = self.engine.pending_action(&handle.id)?;
        self.schedule(handle.clone(), action).then_some(action)
    }

    fn schedule(self: &Arc<Self>, handle: SessionHandle, action: PendingAction) -> bool {
        if self.root.is_cancelled() || handle.is_ended() {
            return false;
        }

        match self.pending.entry(handle.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let delay = match action {
                    PendingAction::Settle => self.config.settle_delay(),
                    PendingAction::ComputerTurn { .. } => self.config.thinking_delay(),
                };
                let token = self.root.child_token();
                let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
                debug!(session_id = %handle.id, ?action, delay_ms = delay.as_millis() as u64, "Action scheduled");
                slot.insert(ScheduledTask {
                    action,
                    ticket,
                    token: token.clone(),
                });
                tokio::spawn(Arc::clone(self).fire(handle, action, ticket, token, delay));
                true
            }
        }
    }

    async fn fire(
        self: Arc<Self>,
        handle: SessionHandle,
        action: PendingAction,
        ticket: u64,
        token: CancellationToken,
        delay: Duration,
    ) {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(session_id = %handle.id, ?action, "Scheduled action cancelled before firing");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        let fired = self.run(&handle, action, &token).await;
        self.pending.remove_if(&handle.id, |_, t| t.ticket == ticket);

        match fired {
            Fired::Applied(event) => {
                let terminal = event.is_terminal();
                // No subscribers is fine; the engine already holds the result.
                let _ = self.events.send(event);
                if !terminal {
                    self.drive(&handle);
                }
            }
            Fired::Stale => {
                self.metrics.record_stale_action();
                debug!(session_id = %handle.id, ?action, "Stale scheduled action suppressed");
            }
            Fired::NoMove => {
                warn!(session_id = %handle.id, ?action, "Move source produced no move");
            }
            Fired::Rejected(error) => {
                warn!(session_id = %handle.id, ?action, %error, "Scheduled action rejected");
            }
        }
    }

    async fn run(&self, handle: &SessionHandle, action: PendingAction, token: &CancellationToken) -> Fired {
        if self.is_stale(handle, token) {
            return Fired::Stale;
        }

        match action {
            PendingAction::Settle => match self.engine.settle(&handle.id) {
                Ok(result) => Fired::Applied(TurnEvent::Settled(result)),
                Err(error) => Fired::Rejected(error),
            },
            PendingAction::ComputerTurn { seat } => {
                let snapshot = match self.engine.snapshot(&handle.id) {
                    Ok(snapshot) => snapshot,
                    Err(error) => return Fired::Rejected(error),
                };
                let mv = match self.opponent.next_move(&snapshot, seat).await {
                    Some(mv) => mv,
                    None => return Fired::NoMove,
                };
                if self.is_stale(handle, token) {
                    return Fired::Stale;
                }
                match self.engine.apply_move(&handle.id, seat, mv) {
                    Ok(result) => Fired::Applied(TurnEvent::ComputerMoved(result)),
                    Err(error) => Fired::Rejected(error),
                }
            }
        }
    }

    fn is_stale(&self, handle: &SessionHandle, token: &CancellationToken) -> bool {
        token.is_cancelled() || handle.is_ended()
    }

    fn cancel(&self, id: &SessionId) -> bool {
        match self.pending.remove(id) {
            Some((_, scheduled)) => {
                scheduled.token.cancel();
                debug!(session_id = %id, action = ?scheduled.action, "Scheduled action cancelled");
                true
            }
            None => false,
        }
    }

    fn shutdown(&self) {
        if self.root.is_cancelled() {
            return;
        }
        self.root.cancel();
        let cancelled = self.pending.len();
        self.pending.clear();
        info!(cancelled, "Turn scheduler shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{Identity, Player, WalletProfile};
    use crate::games::{ComputerOpponent, GameKind, Move};
    use tokio::time::timeout;

    fn human() -> Player {
        Player::human(&WalletProfile {
            identity: Identity::from("alice"),
            display_name: "Alice".to_string(),
            avatar: "🚀".to_string(),
            base_balance: 100.0,
        })
    }

    fn bot(id: &str) -> Player {
        Player::computer(id, "AI Bot", "🤖")
    }

    fn setup() -> (Arc<GameEngine>, TurnScheduler, Arc<PlatformMetrics>) {
        let metrics = Arc::new(PlatformMetrics::new());
        let engine = Arc::new(GameEngine::with_metrics(metrics.clone()));
        let scheduler = TurnScheduler::new(
            engine.clone(),
            Arc::new(ComputerOpponent::new()),
            SchedulerConfig::default(),
            metrics.clone(),
        );
        (engine, scheduler, metrics)
    }

    #[tokio::test(start_paused = true)]
    async fn test_computer_moves_after_thinking_delay() {
        let (engine, scheduler, _) = setup();
        let mut events = scheduler.subscribe();
        let handle = engine.start(GameKind::GridCapture, vec![human(), bot("computer_1")]).unwrap();
        engine.apply_move(&handle.id, 0, Move::Claim { cell: 4 }).unwrap();

        assert_eq!(scheduler.drive(&handle), Some(PendingAction::ComputerTurn { seat: 1 }));
        assert!(timeout(Duration::from_millis(1400), events.recv()).await.is_err());

        let event = timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
        match event {
            TurnEvent::ComputerMoved(result) => {
                assert_eq!(result.seat, 1);
                assert_eq!(result.turn_owner, 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_action_per_session() {
        let (engine, scheduler, _) = setup();
        let handle = engine.start(GameKind::Combat, vec![bot("c1"), human()]).unwrap();

        assert!(scheduler.schedule_computer_turn(&handle, 0));
        assert!(!scheduler.schedule_computer_turn(&handle, 0));
        assert_eq!(scheduler.drive(&handle), None);
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_action_never_applies() {
        let (engine, scheduler, _) = setup();
        let mut events = scheduler.subscribe();
        let handle = engine.start(GameKind::Combat, vec![bot("c1"), human()]).unwrap();

        scheduler.drive(&handle);
        assert!(scheduler.cancel(&handle.id));
        assert!(!scheduler.cancel(&handle.id));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(events.try_recv().is_err());
        assert_eq!(engine.snapshot(&handle.id).unwrap().move_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduled_action_survives_cancelled_one() {
        let (engine, scheduler, metrics) = setup();
        let mut events = scheduler.subscribe();
        let handle = engine.start(GameKind::Combat, vec![bot("c1"), human()]).unwrap();

        assert!(scheduler.schedule_computer_turn(&handle, 0));
        assert!(scheduler.cancel(&handle.id));
        assert!(scheduler.schedule_computer_turn(&handle, 0));
        assert_eq!(scheduler.pending_count(), 1);

        let event = timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap();
        assert!(matches!(event, TurnEvent::ComputerMoved(_)));
        assert_eq!(engine.snapshot(&handle.id).unwrap().move_count, 1);
        assert_eq!(metrics.stale_actions_suppressed(), 0);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fire_after_abandon_is_counted() {
        let (engine, scheduler, metrics) = setup();
        let mut events = scheduler.subscribe();
        let handle = engine.start(GameKind::GridCapture, vec![bot("c1"), human()]).unwrap();

        scheduler.drive(&handle);
        assert!(engine.abandon(&handle.id));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(events.try_recv().is_err());
        assert_eq!(metrics.stale_actions_suppressed(), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_follows_second_reveal() {
        let (engine, scheduler, _) = setup();
        let mut events = scheduler.subscribe();
        let handle = engine.start(GameKind::PairMatch, vec![human()]).unwrap();

        engine.apply_move(&handle.id, 0, Move::Reveal { position: 0 }).unwrap();
        assert_eq!(scheduler.drive(&handle), None);
        engine.apply_move(&handle.id, 0, Move::Reveal { position: 1 }).unwrap();
        assert_eq!(scheduler.drive(&handle), Some(PendingAction::Settle));

        let event = timeout(Duration::from_millis(1100), events.recv()).await.unwrap().unwrap();
        assert!(matches!(event, TurnEvent::Settled(_)));
        assert!(!engine.snapshot(&handle.id).unwrap().awaiting_settle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_computer_only_session_plays_to_the_end() {
        let (engine, scheduler, _) = setup();
        let mut events = scheduler.subscribe();
        let handle = engine.start(GameKind::GridCapture, vec![bot("c1"), bot("c2")]).unwrap();
        scheduler.drive(&handle);

        let mut moves = 0;
        loop {
            let event = timeout(Duration::from_secs(10), events.recv()).await.unwrap().unwrap();
            moves += 1;
            if event.is_terminal() {
                break;
            }
        }
        assert!((5..=9).contains(&moves));
        assert!(handle.is_ended());
        assert!(engine.outcome(&handle.id).is_some());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_and_refuses_work() {
        let (engine, scheduler, _) = setup();
        let first = engine.start(GameKind::Combat, vec![bot("c1"), human()]).unwrap();
        let second = engine.start(GameKind::Combat, vec![bot("c2"), human()]).unwrap();
        scheduler.drive(&first);
        scheduler.drive(&second);
        assert_eq!(scheduler.pending_count(), 2);

        scheduler.shutdown();
        assert_eq!(scheduler.pending_count(), 0);
        assert!(scheduler.drive(&first).is_none());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.snapshot(&first.id).unwrap().move_count, 0);
    }
}
