//! Game session engine
//!
//! Owns every live session in a concurrent map. Each session is an
//! independently locked entry, so moves on different sessions never contend.
//! A failed move leaves its session exactly as it was.

use super::combat::CombatState;
use super::grid::{GridBoard, GridStatus, DRAW_SCORE, WIN_SCORE};
use super::pairs::PairBoard;
use super::types::{
    BoardView, GameKind, Move, MoveEffect, MoveResult, Outcome, PendingAction, SessionSnapshot,
    SessionStatus,
};
use crate::common::types::{Player, SessionId};
use crate::errors::GameError;
use crate::metrics::PlatformMetrics;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Variant-specific session state
#[derive(Debug, Clone)]
enum GameState {
    Grid(GridBoard),
    Pairs(PairBoard),
    Combat(CombatState),
}

enum Transition {
    Continue { next_turn: usize },
    Finish(Outcome),
}

#[derive(Debug)]
struct GameSession {
    id: SessionId,
    kind: GameKind,
    state: GameState,
    participants: Vec<Player>,
    turn_owner: usize,
    status: SessionStatus,
    move_count: u32,
    ended: Arc<AtomicBool>,
    rng: StdRng,
    outcome: Option<Outcome>,
}

/// Caller's handle on a session. The ended flag is monotonic and readable
/// without touching the engine.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub kind: GameKind,
    ended: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

impl GameSession {
    fn new(id: SessionId, kind: GameKind, participants: Vec<Player>, mut rng: StdRng) -> Self {
        let seats = participants.len();
        let state = match kind {
            GameKind::GridCapture => GameState::Grid(GridBoard::new()),
            GameKind::PairMatch => GameState::Pairs(PairBoard::shuffled(&mut rng, seats)),
            GameKind::Combat => GameState::Combat(CombatState::new([
                participants[0].is_computer,
                participants[1].is_computer,
            ])),
        };
        Self {
            id,
            kind,
            state,
            participants,
            turn_owner: 0,
            status: SessionStatus::Active,
            move_count: 0,
            ended: Arc::new(AtomicBool::new(false)),
            rng,
            outcome: None,
        }
    }

    fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id.clone(),
            kind: self.kind,
            ended: self.ended.clone(),
        }
    }

    fn other_seat(&self, seat: usize) -> usize {
        (seat + 1) % self.participants.len()
    }

    fn awaiting_settle(&self) -> bool {
        matches!(&self.state, GameState::Pairs(board) if board.awaiting_settle())
    }

    fn ensure_active(&self) -> Result<(), GameError> {
        if self.status == SessionStatus::Finished {
            return Err(GameError::SessionFinished(self.id.clone()));
        }
        Ok(())
    }

    fn apply(&mut self, seat: usize, mv: Move) -> Result<MoveResult, GameError> {
        self.ensure_active()?;
        if seat != self.turn_owner {
            return Err(GameError::NotYourTurn {
                seat,
                turn_owner: self.turn_owner,
            });
        }

        let seats = self.participants.len();
        let next = self.other_seat(seat);
        let (effect, transition) = match (&mut self.state, mv) {
            (GameState::Grid(board), Move::Claim { cell }) => {
                let transition = match board.claim(cell, seat)? {
                    GridStatus::InProgress => Transition::Continue { next_turn: next },
                    GridStatus::Won { seat, .. } => Transition::Finish(Outcome::win(seat, seats, WIN_SCORE)),
                    GridStatus::Draw => Transition::Finish(Outcome::draw(seats, DRAW_SCORE)),
                };
                (MoveEffect::Claimed { cell }, transition)
            }
            (GameState::Pairs(board), Move::Reveal { position }) => {
                let symbol = board.reveal(position)?;
                (
                    MoveEffect::Revealed { position, symbol },
                    Transition::Continue { next_turn: seat },
                )
            }
            (GameState::Combat(state), Move::Combat { action }) => {
                let effect = match state.apply(seat, action, &mut self.rng)? {
                    super::combat::CombatEffect::Attacked { damage } => MoveEffect::Attacked { damage },
                    super::combat::CombatEffect::Defended => MoveEffect::Defended,
                    super::combat::CombatEffect::Charged => MoveEffect::Charged,
                };
                let transition = match state.defeated() {
                    Some(loser) => {
                        let winner = 1 - loser;
                        Transition::Finish(Outcome::win(winner, seats, state.score(winner)))
                    }
                    None => Transition::Continue { next_turn: next },
                };
                (effect, transition)
            }
            (_, mv) => {
                return Err(GameError::IllegalMove(format!(
                    "{} move in a {} session",
                    mv.kind(),
                    self.kind
                )))
            }
        };

        self.move_count += 1;
        Ok(self.commit(seat, effect, transition))
    }

    fn settle(&mut self) -> Result<MoveResult, GameError> {
        self.ensure_active()?;
        let seat = self.turn_owner;
        let seats = self.participants.len();
        let next = self.other_seat(seat);

        let board = match &mut self.state {
            GameState::Pairs(board) => board,
            _ => {
                return Err(GameError::IllegalMove(format!(
                    "{} sessions have nothing to settle",
                    self.kind
                )))
            }
        };
        let comparison = board.settle(seat)?;
        let transition = if board.is_complete() {
            Transition::Finish(pair_outcome(board, seats))
        } else if comparison.matched {
            Transition::Continue { next_turn: seat }
        } else {
            Transition::Continue { next_turn: next }
        };

        let effect = MoveEffect::Compared {
            first: comparison.first,
            second: comparison.second,
            matched: comparison.matched,
        };
        Ok(self.commit(seat, effect, transition))
    }

    fn commit(&mut self, seat: usize, effect: MoveEffect, transition: Transition) -> MoveResult {
        match transition {
            Transition::Continue { next_turn } => self.turn_owner = next_turn,
            Transition::Finish(outcome) => {
                for (player, score) in self.participants.iter_mut().zip(&outcome.score_per_seat) {
                    player.score = *score;
                }
                self.status = SessionStatus::Finished;
                self.outcome = Some(outcome);
                self.ended.store(true, Ordering::SeqCst);
            }
        }

        MoveResult {
            session_id: self.id.clone(),
            seat,
            effect,
            turn_owner: self.turn_owner,
            status: self.status,
            awaiting_settle: self.awaiting_settle(),
            outcome: self.outcome.clone(),
        }
    }

    fn pending_action(&self) -> Option<PendingAction> {
        if self.status == SessionStatus::Finished {
            return None;
        }
        if self.awaiting_settle() {
            return Some(PendingAction::Settle);
        }
        self.participants
            .get(self.turn_owner)
            .filter(|p| p.is_computer)
            .map(|_| PendingAction::ComputerTurn { seat: self.turn_owner })
    }

    fn snapshot(&self) -> SessionSnapshot {
        let board = match &self.state {
            GameState::Grid(board) => BoardView::Grid { cells: board.cells() },
            GameState::Pairs(board) => BoardView::Pairs {
                cards: board.view(),
                moves_used: board.moves_used(),
                pairs_per_seat: board.pairs_per_seat().to_vec(),
            },
            GameState::Combat(state) => BoardView::Combat { fighters: state.view() },
        };
        SessionSnapshot {
            session_id: self.id.clone(),
            kind: self.kind,
            participants: self.participants.clone(),
            turn_owner: self.turn_owner,
            status: self.status,
            move_count: self.move_count,
            awaiting_settle: self.awaiting_settle(),
            board,
            outcome: self.outcome.clone(),
        }
    }
}

/// Solo: the player wins with the board score. Two seats: more pairs wins,
/// equal pairs is a draw at the board score.
fn pair_outcome(board: &PairBoard, seats: usize) -> Outcome {
    let score = board.score();
    let pairs = board.pairs_per_seat();
    if seats < 2 {
        return Outcome::win(0, seats, score);
    }
    match pairs[0].cmp(&pairs[1]) {
        std::cmp::Ordering::Greater => Outcome::win(0, seats, score),
        std::cmp::Ordering::Less => Outcome::win(1, seats, score),
        std::cmp::Ordering::Equal => Outcome::draw(seats, score),
    }
}

/// Polymorphic state machine over every game kind
pub struct GameEngine {
    sessions: DashMap<SessionId, GameSession>,
    metrics: Arc<PlatformMetrics>,
}

impl GameEngine {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(PlatformMetrics::new()))
    }

    pub fn with_metrics(metrics: Arc<PlatformMetrics>) -> Self {
        Self {
            sessions: DashMap::new(),
            metrics,
        }
    }

    /// Start a session; participants are seated in order
    pub fn start(&self, kind: GameKind, participants: Vec<Player>) -> Result<SessionHandle, GameError> {
        self.start_with_rng(kind, participants, StdRng::from_entropy())
    }

    /// Deterministic variant. A pair-matching shuffle draws from the seeded
    /// rng before anything else.
    pub fn start_seeded(
        &self,
        kind: GameKind,
        participants: Vec<Player>,
        seed: u64,
    ) -> Result<SessionHandle, GameError> {
        self.start_with_rng(kind, participants, StdRng::seed_from_u64(seed))
    }

    fn start_with_rng(
        &self,
        kind: GameKind,
        participants: Vec<Player>,
        rng: StdRng,
    ) -> Result<SessionHandle, GameError> {
        let seats = kind.seat_range();
        if !seats.contains(&participants.len()) {
            return Err(GameError::InvalidConfiguration(format!(
                "{} needs {}..={} participants, got {}",
                kind,
                seats.start(),
                seats.end(),
                participants.len()
            )));
        }

        let session = GameSession::new(SessionId::generate(), kind, participants, rng);
        let handle = session.handle();
        info!(
            session_id = %handle.id,
            kind = %kind,
            seats = session.participants.len(),
            "Session started"
        );
        self.sessions.insert(handle.id.clone(), session);
        self.metrics.record_session_started();
        Ok(handle)
    }

    /// Apply `mv` for `seat`; the session is unchanged on error
    pub fn apply_move(&self, id: &SessionId, seat: usize, mv: Move) -> Result<MoveResult, GameError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| GameError::SessionNotFound(id.clone()))?;
        let result = session.apply(seat, mv)?;
        self.metrics.record_move();
        debug!(session_id = %id, seat, effect = ?result.effect, "Move applied");
        if result.is_terminal() {
            self.on_finished(&result);
        }
        Ok(result)
    }

    /// Compare the two face-up cards of a pair-matching session
    pub fn settle(&self, id: &SessionId) -> Result<MoveResult, GameError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| GameError::SessionNotFound(id.clone()))?;
        let result = session.settle()?;
        debug!(session_id = %id, effect = ?result.effect, "Pair settled");
        if result.is_terminal() {
            self.on_finished(&result);
        }
        Ok(result)
    }

    fn on_finished(&self, result: &MoveResult) {
        self.metrics.record_session_finished();
        if let Some(outcome) = &result.outcome {
            info!(
                session_id = %result.session_id,
                winner = ?outcome.winner_seat,
                scores = ?outcome.score_per_seat,
                draw = outcome.is_draw,
                "Session finished"
            );
        }
    }

    pub fn outcome(&self, id: &SessionId) -> Option<Outcome> {
        self.sessions.get(id).and_then(|s| s.outcome.clone())
    }

    pub fn snapshot(&self, id: &SessionId) -> Result<SessionSnapshot, GameError> {
        self.sessions
            .get(id)
            .map(|s| s.snapshot())
            .ok_or_else(|| GameError::SessionNotFound(id.clone()))
    }

    pub fn handle(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.get(id).map(|s| s.handle())
    }

    /// Work the scheduler must arrange next, if any
    pub fn pending_action(&self, id: &SessionId) -> Option<PendingAction> {
        self.sessions.get(id).and_then(|s| s.pending_action())
    }

    /// End a session without an outcome and drop it
    pub fn abandon(&self, id: &SessionId) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                session.ended.store(true, Ordering::SeqCst);
                if session.status == SessionStatus::Active {
                    self.metrics.record_session_abandoned();
                    info!(session_id = %id, moves = session.move_count, "Session abandoned");
                }
                true
            }
            None => false,
        }
    }

    /// Drop a finished session, returning its outcome
    pub fn close(&self, id: &SessionId) -> Option<Outcome> {
        self.sessions
            .remove_if(id, |_, s| s.status == SessionStatus::Finished)
            .and_then(|(_, s)| s.outcome)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .count()
    }
}

impl Default for GameEngine {
    fn default() -> Self {
        Self::new()
    }
}
