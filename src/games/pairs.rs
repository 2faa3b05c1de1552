//! Pair-matching rules
//!
//! Sixteen face-down cards hold eight symbol pairs. A turn reveals one card;
//! once two are face-up they are compared on `settle`, which either matches
//! them for good or hides them again.

use super::types::CardView;
use crate::errors::GameError;
use rand::seq::SliceRandom;
use rand::Rng;

pub const PAIR_COUNT: usize = 8;
pub const DECK_SIZE: usize = PAIR_COUNT * 2;
pub const MAX_SCORE: u32 = 200;
pub const MIN_SCORE: u32 = 50;
pub const MOVE_PENALTY: u32 = 5;

pub const SYMBOLS: [char; PAIR_COUNT] = ['🚀', '🌟', '💎', '🎯', '⚡', '🔥', '💫', '🎮'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardState {
    Hidden,
    FaceUp,
    Matched { seat: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Card {
    symbol: char,
    state: CardState,
}

/// Result of comparing two face-up cards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub first: usize,
    pub second: usize,
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairBoard {
    cards: Vec<Card>,
    face_up: Vec<usize>,
    moves_used: u32,
    pairs_per_seat: Vec<u32>,
}

impl PairBoard {
    /// Shuffle eight pairs with the given rng
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R, seats: usize) -> Self {
        let mut layout: Vec<char> = SYMBOLS.iter().chain(SYMBOLS.iter()).copied().collect();
        layout.shuffle(rng);
        Self::from_layout(&layout, seats)
    }

    /// Board with a fixed card order. `layout` must hold every symbol exactly twice.
    pub fn with_layout(layout: &[char], seats: usize) -> Result<Self, GameError> {
        if layout.len() != DECK_SIZE {
            return Err(GameError::InvalidConfiguration(format!(
                "pair layout needs {} cards, got {}",
                DECK_SIZE,
                layout.len()
            )));
        }
        for symbol in layout {
            if layout.iter().filter(|s| *s == symbol).count() != 2 {
                return Err(GameError::InvalidConfiguration(format!(
                    "symbol {} does not appear exactly twice",
                    symbol
                )));
            }
        }
        Ok(Self::from_layout(layout, seats))
    }

    fn from_layout(layout: &[char], seats: usize) -> Self {
        Self {
            cards: layout
                .iter()
                .map(|&symbol| Card { symbol, state: CardState::Hidden })
                .collect(),
            face_up: Vec::with_capacity(2),
            moves_used: 0,
            pairs_per_seat: vec![0; seats],
        }
    }

    /// Card symbols in position order, regardless of visibility
    pub fn layout(&self) -> Vec<char> {
        self.cards.iter().map(|c| c.symbol).collect()
    }

    pub fn awaiting_settle(&self) -> bool {
        self.face_up.len() == 2
    }

    pub fn moves_used(&self) -> u32 {
        self.moves_used
    }

    pub fn matched_pairs(&self) -> u32 {
        self.pairs_per_seat.iter().sum()
    }

    pub fn pairs_per_seat(&self) -> &[u32] {
        &self.pairs_per_seat
    }

    pub fn is_complete(&self) -> bool {
        self.matched_pairs() as usize == PAIR_COUNT
    }

    /// max(200 - 5 * moves_used, 50)
    pub fn score(&self) -> u32 {
        MAX_SCORE
            .saturating_sub(MOVE_PENALTY.saturating_mul(self.moves_used))
            .max(MIN_SCORE)
    }

    pub fn hidden_positions(&self) -> Vec<usize> {
        self.cards
            .iter()
            .enumerate()
            .filter(|(_, c)| c.state == CardState::Hidden)
            .map(|(i, _)| i)
            .collect()
    }

    /// Turn the card at `position` face-up and return its symbol
    pub fn reveal(&mut self, position: usize) -> Result<char, GameError> {
        if self.awaiting_settle() {
            return Err(GameError::IllegalMove("two cards are already face-up".to_string()));
        }
        let card = self
            .cards
            .get_mut(position)
            .ok_or_else(|| GameError::IllegalMove(format!("position {} is off the board", position)))?;
        if card.state != CardState::Hidden {
            return Err(GameError::IllegalMove(format!("card {} is not hidden", position)));
        }
        card.state = CardState::FaceUp;
        self.face_up.push(position);
        Ok(card.symbol)
    }

    /// Compare the two face-up cards. Each compare counts as one move.
    pub fn settle(&mut self, seat: usize) -> Result<Comparison, GameError> {
        let (first, second) = match self.face_up.as_slice() {
            [first, second] => (*first, *second),
            _ => return Err(GameError::IllegalMove("no pair is waiting to be compared".to_string())),
        };
        let matched = self.cards[first].symbol == self.cards[second].symbol;
        let state = if matched {
            CardState::Matched { seat }
        } else {
            CardState::Hidden
        };
        self.cards[first].state = state;
        self.cards[second].state = state;
        if matched {
            if let Some(pairs) = self.pairs_per_seat.get_mut(seat) {
                *pairs += 1;
            }
        }
        self.face_up.clear();
        self.moves_used += 1;
        Ok(Comparison { first, second, matched })
    }

    pub fn view(&self) -> Vec<CardView> {
        self.cards
            .iter()
            .map(|card| match card.state {
                CardState::Hidden => CardView::Hidden,
                CardState::FaceUp => CardView::FaceUp { symbol: card.symbol },
                CardState::Matched { seat } => CardView::Matched { symbol: card.symbol, seat },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ordered_layout() -> Vec<char> {
        // Pairs sit next to each other: (0,1), (2,3), ...
        SYMBOLS.iter().flat_map(|&s| [s, s]).collect()
    }

    fn compare(board: &mut PairBoard, a: usize, b: usize) -> Comparison {
        board.reveal(a).unwrap();
        board.reveal(b).unwrap();
        board.settle(0).unwrap()
    }

    #[test]
    fn test_ten_compares_score_150() {
        let mut board = PairBoard::with_layout(&ordered_layout(), 1).unwrap();

        assert!(!compare(&mut board, 0, 2).matched);
        assert!(!compare(&mut board, 1, 3).matched);
        for pair in 0..PAIR_COUNT {
            assert!(compare(&mut board, pair * 2, pair * 2 + 1).matched);
        }

        assert!(board.is_complete());
        assert_eq!(board.moves_used(), 10);
        assert_eq!(board.score(), 150);
    }

    #[test]
    fn test_reveal_rules() {
        let mut board = PairBoard::with_layout(&ordered_layout(), 1).unwrap();
        board.reveal(0).unwrap();
        assert!(matches!(board.reveal(0), Err(GameError::IllegalMove(_))));
        assert!(matches!(board.reveal(16), Err(GameError::IllegalMove(_))));
        board.reveal(1).unwrap();
        assert!(board.awaiting_settle());
        assert!(matches!(board.reveal(2), Err(GameError::IllegalMove(_))));

        board.settle(0).unwrap();
        assert!(matches!(board.reveal(0), Err(GameError::IllegalMove(_))));
        assert!(matches!(board.settle(0), Err(GameError::IllegalMove(_))));
    }

    #[test]
    fn test_mismatch_hides_cards_again() {
        let mut board = PairBoard::with_layout(&ordered_layout(), 1).unwrap();
        let result = compare(&mut board, 0, 2);
        assert!(!result.matched);
        assert_eq!(board.hidden_positions().len(), DECK_SIZE);
        assert_eq!(board.view()[0], CardView::Hidden);
    }

    #[test]
    fn test_invalid_layout_rejected() {
        let mut layout = ordered_layout();
        layout[0] = layout[2];
        assert!(matches!(
            PairBoard::with_layout(&layout, 1),
            Err(GameError::InvalidConfiguration(_))
        ));
        assert!(PairBoard::with_layout(&layout[..4], 1).is_err());
    }

    #[test]
    fn test_random_play_always_terminates_in_eight_matches() {
        for seed in 0..50u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut board = PairBoard::shuffled(&mut rng, 1);
            while !board.is_complete() {
                let hidden = board.hidden_positions();
                let picks: Vec<usize> = hidden.choose_multiple(&mut rng, 2).copied().collect();
                compare(&mut board, picks[0], picks[1]);
                assert!(board.moves_used() < 10_000);
            }
            assert_eq!(board.matched_pairs() as usize, PAIR_COUNT);
            assert!(board.moves_used() >= PAIR_COUNT as u32);
            assert!((MIN_SCORE..=MAX_SCORE).contains(&board.score()));
        }
    }
}
