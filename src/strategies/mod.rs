pub mod arena;
pub mod mcts;

use rand::rngs::SmallRng;
use rand::Rng;

use crate::game::controller::POLICY_SIZE;
use crate::game::{Controller, Move};

/// A registered player. The player itself is shared and immutable; all
/// mutable scratch (search arenas, RNG streams, network copies, the last
/// computed priors) lives in the per-thread [`AiWorker`] it hands out.
pub trait AiPlayer: Send + Sync {
    fn name(&self) -> String;

    fn worker(&self) -> Box<dyn AiWorker + '_>;
}

/// Per-thread playing instance. `select_move` must pick one of the supplied
/// legal moves and report a confidence in `[0, 1]`.
pub trait AiWorker {
    fn select_move(
        &mut self,
        game: &Controller<'_>,
        moves: &[Move],
        rng: &mut SmallRng,
    ) -> (Move, f32);

    /// Visit distribution over fixed move indices from the last search.
    /// `None` for players that do not compute one.
    fn puct_priors(&self) -> Option<&[f32; POLICY_SIZE]> {
        None
    }
}

/// Uniform random baseline.
pub struct RandomAi;

impl AiPlayer for RandomAi {
    fn name(&self) -> String {
        "random".into()
    }

    fn worker(&self) -> Box<dyn AiWorker + '_> {
        Box::new(RandomWorker)
    }
}

struct RandomWorker;

impl AiWorker for RandomWorker {
    fn select_move(
        &mut self,
        _game: &Controller<'_>,
        moves: &[Move],
        rng: &mut SmallRng,
    ) -> (Move, f32) {
        (moves[rng.gen_range(0..moves.len())], 0.0)
    }
}

/// Random over non-burn moves whenever one exists. Burning is usually the
/// worst option, which makes this a surprisingly decent baseline.
pub struct NoBurnAi;

impl AiPlayer for NoBurnAi {
    fn name(&self) -> String {
        "no-burn".into()
    }

    fn worker(&self) -> Box<dyn AiWorker + '_> {
        Box::new(NoBurnWorker)
    }
}

struct NoBurnWorker;

impl AiWorker for NoBurnWorker {
    fn select_move(
        &mut self,
        _game: &Controller<'_>,
        moves: &[Move],
        rng: &mut SmallRng,
    ) -> (Move, f32) {
        let keep: Vec<Move> = moves.iter().copied().filter(|m| !m.is_burn()).collect();
        if keep.is_empty() {
            (moves[rng.gen_range(0..moves.len())], 0.0)
        } else {
            (keep[rng.gen_range(0..keep.len())], 0.0)
        }
    }
}

/// One-ply greedy lookahead over a value network: plays every legal move in
/// a scratch copy and keeps the one the net likes best, breaking near-ties
/// randomly so self-play does not collapse into repetition.
pub struct GreedyValueAi {
    pub factory: std::sync::Arc<dyn crate::net::ValueNetFactory>,
    pub score_margin: f32,
}

impl GreedyValueAi {
    pub fn new(factory: std::sync::Arc<dyn crate::net::ValueNetFactory>) -> GreedyValueAi {
        GreedyValueAi {
            factory,
            score_margin: 0.03,
        }
    }
}

impl AiPlayer for GreedyValueAi {
    fn name(&self) -> String {
        format!("greedy[{}]", self.factory.name())
    }

    fn worker(&self) -> Box<dyn AiWorker + '_> {
        Box::new(GreedyValueWorker {
            net: self.factory.create(),
            score_margin: self.score_margin,
        })
    }
}

struct GreedyValueWorker {
    net: Box<dyn crate::net::ValueNet>,
    score_margin: f32,
}

impl AiWorker for GreedyValueWorker {
    fn select_move(
        &mut self,
        game: &Controller<'_>,
        moves: &[Move],
        rng: &mut SmallRng,
    ) -> (Move, f32) {
        let player = game.player_to_move();
        let mut scores = Vec::with_capacity(moves.len());

        for &mv in moves {
            let mut probe = *game;
            let ended = probe.play(mv, rng);
            let score = if ended {
                if probe.winner() == Some(player) {
                    1.0
                } else {
                    0.0
                }
            } else {
                crate::net::score_state(self.net.as_mut(), &probe, player)
            };
            scores.push(score);
        }

        let best = scores.iter().cloned().fold(f32::MIN, f32::max);
        let eligible: Vec<usize> = (0..moves.len())
            .filter(|&i| scores[i] >= best - self.score_margin)
            .collect();
        let choice = eligible[rng.gen_range(0..eligible.len())];
        (moves[choice], scores[choice])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Catalog;
    use rand_core::SeedableRng;

    fn play_out(a: &dyn AiPlayer, b: &dyn AiPlayer, seed: u64) -> u8 {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut game = Controller::new(&catalog, &mut rng);
        let mut workers = [a.worker(), b.worker()];
        let mut moves = Vec::new();
        loop {
            game.enumerate_moves(&mut moves);
            let player = game.player_to_move() as usize;
            let (mv, _) = workers[player].select_move(&game, &moves, &mut rng);
            assert!(moves.contains(&mv));
            if game.play(mv, &mut rng) {
                return game.winner().unwrap();
            }
        }
    }

    #[test]
    fn random_players_finish_games() {
        for seed in 0..5 {
            let winner = play_out(&RandomAi, &RandomAi, seed);
            assert!(winner < 2);
        }
    }

    #[test]
    fn greedy_value_player_finishes_games() {
        let greedy = GreedyValueAi::new(std::sync::Arc::new(crate::net::UniformNetFactory));
        let winner = play_out(&greedy, &RandomAi, 9);
        assert!(winner < 2);
    }

    #[test]
    fn no_burn_avoids_burns_when_possible() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(31);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);
        assert!(moves.iter().any(|m| !m.is_burn()));

        let mut worker = NoBurnAi.worker();
        for _ in 0..20 {
            let (mv, _) = worker.select_move(&game, &moves, &mut rng);
            assert!(!mv.is_burn());
        }
    }
}
