//! Move selection for computer-controlled seats
//!
//! The scheduler asks a `MoveSource` for the next move of a seat. The local
//! computer opponent is the only source today; a remote peer would implement
//! the same trait.

use super::combat::ATTACK_COST;
use super::types::{BoardView, CardView, CombatAction, Move, SessionSnapshot};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;

/// Supplies moves for a seat the local player does not control
#[async_trait]
pub trait MoveSource: Send + Sync {
    /// Next move for `seat`, or `None` when no legal move exists
    async fn next_move(&self, snapshot: &SessionSnapshot, seat: usize) -> Option<Move>;
}

/// Random legal play, with a bias towards attacking in combat
#[derive(Debug, Clone)]
pub struct ComputerOpponent {
    attack_probability: f64,
}

impl ComputerOpponent {
    pub fn new() -> Self {
        Self { attack_probability: 0.6 }
    }

    pub fn with_attack_probability(attack_probability: f64) -> Self {
        Self {
            attack_probability: attack_probability.clamp(0.0, 1.0),
        }
    }

    /// Pick a move with the supplied rng
    pub fn choose<R: Rng + ?Sized>(&self, snapshot: &SessionSnapshot, seat: usize, rng: &mut R) -> Option<Move> {
        match &snapshot.board {
            BoardView::Grid { cells } => {
                let free: Vec<usize> = (0..cells.len()).filter(|&i| cells[i].is_none()).collect();
                free.choose(rng).map(|&cell| Move::Claim { cell })
            }
            BoardView::Pairs { cards, .. } => {
                let hidden: Vec<usize> = (0..cards.len())
                    .filter(|&i| cards[i] == CardView::Hidden)
                    .collect();
                hidden.choose(rng).map(|&position| Move::Reveal { position })
            }
            BoardView::Combat { fighters } => {
                let energy = fighters.get(seat)?.energy;
                let action = if energy >= ATTACK_COST && rng.gen_bool(self.attack_probability) {
                    CombatAction::Attack
                } else {
                    CombatAction::Charge
                };
                Some(Move::Combat { action })
            }
        }
    }
}

impl Default for ComputerOpponent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MoveSource for ComputerOpponent {
    async fn next_move(&self, snapshot: &SessionSnapshot, seat: usize) -> Option<Move> {
        self.choose(snapshot, seat, &mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::SessionId;
    use crate::games::types::{FighterView, GameKind, SessionStatus};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn snapshot(kind: GameKind, board: BoardView) -> SessionSnapshot {
        SessionSnapshot {
            session_id: SessionId::from("s-1"),
            kind,
            participants: Vec::new(),
            turn_owner: 1,
            status: SessionStatus::Active,
            move_count: 0,
            awaiting_settle: false,
            board,
            outcome: None,
        }
    }

    #[test]
    fn test_grid_picks_free_cell() {
        let mut cells = [Some(0); 9];
        cells[6] = None;
        let snap = snapshot(GameKind::GridCapture, BoardView::Grid { cells });
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(
            ComputerOpponent::new().choose(&snap, 1, &mut rng),
            Some(Move::Claim { cell: 6 })
        );

        let full = snapshot(GameKind::GridCapture, BoardView::Grid { cells: [Some(1); 9] });
        assert_eq!(ComputerOpponent::new().choose(&full, 1, &mut rng), None);
    }

    #[test]
    fn test_pairs_picks_hidden_card() {
        let mut cards = vec![CardView::Matched { symbol: '🚀', seat: 0 }; 16];
        cards[9] = CardView::Hidden;
        cards[3] = CardView::FaceUp { symbol: '🌟' };
        let snap = snapshot(
            GameKind::PairMatch,
            BoardView::Pairs { cards, moves_used: 3, pairs_per_seat: vec![0, 0] },
        );
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            assert_eq!(
                ComputerOpponent::new().choose(&snap, 1, &mut rng),
                Some(Move::Reveal { position: 9 })
            );
        }
    }

    #[test]
    fn test_combat_charges_without_energy() {
        let fighters = [
            FighterView { health: 100, energy: 3 },
            FighterView { health: 100, energy: 0 },
        ];
        let snap = snapshot(GameKind::Combat, BoardView::Combat { fighters });
        let always_attack = ComputerOpponent::with_attack_probability(1.0);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(
            always_attack.choose(&snap, 1, &mut rng),
            Some(Move::Combat { action: CombatAction::Charge })
        );
        assert_eq!(
            always_attack.choose(&snap, 0, &mut rng),
            Some(Move::Combat { action: CombatAction::Attack })
        );
    }

    #[tokio::test]
    async fn test_move_source_trait_object() {
        let source: Box<dyn MoveSource> = Box::new(ComputerOpponent::new());
        let snap = snapshot(GameKind::GridCapture, BoardView::Grid { cells: [None; 9] });
        assert!(matches!(source.next_move(&snap, 0).await, Some(Move::Claim { .. })));
    }
}
