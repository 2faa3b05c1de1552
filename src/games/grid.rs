//! Grid-capture rules
//!
//! Two seats alternately claim cells of a 3x3 grid. Owning any of the eight
//! lines wins; nine filled cells without a line is a draw.

use crate::errors::GameError;

pub const CELLS: usize = 9;
pub const WIN_SCORE: u32 = 100;
pub const DRAW_SCORE: u32 = 50;

pub const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridStatus {
    InProgress,
    Won { seat: usize, line: [usize; 3] },
    Draw,
}

/// Cell ownership by seat index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridBoard {
    cells: [Option<usize>; CELLS],
}

impl GridBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cells(&self) -> [Option<usize>; CELLS] {
        self.cells
    }

    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Claim `cell` for `seat`. The board is untouched on error.
    pub fn claim(&mut self, cell: usize, seat: usize) -> Result<GridStatus, GameError> {
        match self.cells.get(cell) {
            None => return Err(GameError::IllegalMove(format!("cell {} is off the grid", cell))),
            Some(Some(_)) => return Err(GameError::IllegalMove(format!("cell {} is already taken", cell))),
            Some(None) => {}
        }
        self.cells[cell] = Some(seat);
        Ok(self.status())
    }

    pub fn status(&self) -> GridStatus {
        for line in LINES {
            if let Some(seat) = self.cells[line[0]] {
                if self.cells[line[1]] == Some(seat) && self.cells[line[2]] == Some(seat) {
                    return GridStatus::Won { seat, line };
                }
            }
        }
        if self.filled() == CELLS {
            GridStatus::Draw
        } else {
            GridStatus::InProgress
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    #[test]
    fn test_diagonal_win() {
        let mut board = GridBoard::new();
        let moves = [(0, 0), (1, 1), (4, 0), (2, 1)];
        for (cell, seat) in moves {
            assert_eq!(board.claim(cell, seat).unwrap(), GridStatus::InProgress);
        }
        assert_eq!(
            board.claim(8, 0).unwrap(),
            GridStatus::Won { seat: 0, line: [0, 4, 8] }
        );
    }

    #[test]
    fn test_occupied_and_out_of_range_cells() {
        let mut board = GridBoard::new();
        board.claim(4, 0).unwrap();
        let before = board.clone();

        assert!(matches!(board.claim(4, 1), Err(GameError::IllegalMove(_))));
        assert!(matches!(board.claim(9, 1), Err(GameError::IllegalMove(_))));
        assert_eq!(board, before);
    }

    #[test]
    fn test_full_board_without_line_is_draw() {
        // X O X / X O O / O X X
        let mut board = GridBoard::new();
        let order = [(0, 0), (1, 1), (2, 0), (4, 1), (3, 0), (5, 1), (7, 0), (6, 1)];
        for (cell, seat) in order {
            assert_eq!(board.claim(cell, seat).unwrap(), GridStatus::InProgress);
        }
        assert_eq!(board.claim(8, 0).unwrap(), GridStatus::Draw);
    }

    #[test]
    fn test_random_games_respect_line_invariants() {
        for seed in 0..200u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut order: Vec<usize> = (0..CELLS).collect();
            order.shuffle(&mut rng);

            let mut board = GridBoard::new();
            let mut status = GridStatus::InProgress;
            for (turn, cell) in order.into_iter().enumerate() {
                status = board.claim(cell, turn % 2).unwrap();
                assert!(board.filled() <= CELLS);
                if status != GridStatus::InProgress {
                    break;
                }
            }

            match status {
                GridStatus::Won { seat, line } => {
                    assert!(line.iter().all(|&c| board.cells()[c] == Some(seat)));
                    let owned = LINES
                        .iter()
                        .filter(|l| l.iter().all(|&c| board.cells()[c] == Some(seat)))
                        .count();
                    assert!(owned >= 1);
                }
                GridStatus::Draw => assert_eq!(board.filled(), CELLS),
                GridStatus::InProgress => panic!("a full playout must terminate"),
            }
        }
    }
}
