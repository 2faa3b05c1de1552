//! Turn-based combat rules

use super::types::{CombatAction, FighterView};
use crate::errors::GameError;
use rand::Rng;
use std::ops::Range;

pub const MAX_HEALTH: u32 = 100;
pub const MAX_ENERGY: u32 = 5;
pub const START_ENERGY: u32 = 3;
pub const ATTACK_COST: u32 = 1;
pub const DEFEND_HEAL: u32 = 10;
pub const DEFEND_ENERGY: u32 = 1;
pub const CHARGE_ENERGY: u32 = 2;
pub const ENERGY_SCORE: u32 = 10;

pub const HUMAN_DAMAGE: Range<u32> = 15..25;
pub const COMPUTER_DAMAGE: Range<u32> = 10..20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fighter {
    pub health: u32,
    pub energy: u32,
    pub computer: bool,
}

impl Fighter {
    fn new(computer: bool) -> Self {
        Self {
            health: MAX_HEALTH,
            energy: START_ENERGY,
            computer,
        }
    }

    pub fn damage_range(&self) -> Range<u32> {
        if self.computer {
            COMPUTER_DAMAGE
        } else {
            HUMAN_DAMAGE
        }
    }

    pub fn can_attack(&self) -> bool {
        self.energy >= ATTACK_COST
    }
}

/// Effect of one combat action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatEffect {
    Attacked { damage: u32 },
    Defended,
    Charged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatState {
    fighters: [Fighter; 2],
}

impl CombatState {
    /// Seats flagged as computer-controlled roll the lower damage range
    pub fn new(computer: [bool; 2]) -> Self {
        Self {
            fighters: [Fighter::new(computer[0]), Fighter::new(computer[1])],
        }
    }

    pub fn fighter(&self, seat: usize) -> Option<&Fighter> {
        self.fighters.get(seat)
    }

    /// Apply `action` for `seat` against the other seat
    pub fn apply<R: Rng + ?Sized>(
        &mut self,
        seat: usize,
        action: CombatAction,
        rng: &mut R,
    ) -> Result<CombatEffect, GameError> {
        if seat > 1 {
            return Err(GameError::IllegalMove(format!("seat {} is not in this duel", seat)));
        }
        let target = 1 - seat;

        match action {
            CombatAction::Attack => {
                let actor = self.fighters[seat];
                if !actor.can_attack() {
                    return Err(GameError::IllegalMove("not enough energy to attack".to_string()));
                }
                let damage = rng.gen_range(actor.damage_range());
                self.fighters[seat].energy -= ATTACK_COST;
                let defender = &mut self.fighters[target];
                defender.health = defender.health.saturating_sub(damage);
                Ok(CombatEffect::Attacked { damage })
            }
            CombatAction::Defend => {
                let actor = &mut self.fighters[seat];
                actor.health = (actor.health + DEFEND_HEAL).min(MAX_HEALTH);
                actor.energy = (actor.energy + DEFEND_ENERGY).min(MAX_ENERGY);
                Ok(CombatEffect::Defended)
            }
            CombatAction::Charge => {
                let actor = &mut self.fighters[seat];
                actor.energy = (actor.energy + CHARGE_ENERGY).min(MAX_ENERGY);
                Ok(CombatEffect::Charged)
            }
        }
    }

    /// Seat whose health reached 0, if any
    pub fn defeated(&self) -> Option<usize> {
        self.fighters.iter().position(|f| f.health == 0)
    }

    /// remaining health + remaining energy * 10
    pub fn score(&self, seat: usize) -> u32 {
        self.fighters
            .get(seat)
            .map(|f| f.health + f.energy * ENERGY_SCORE)
            .unwrap_or(0)
    }

    pub fn view(&self) -> [FighterView; 2] {
        self.fighters.map(|f| FighterView {
            health: f.health,
            energy: f.energy,
        })
    }
}
