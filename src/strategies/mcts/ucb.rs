use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::SmallRng;
use rand::Rng;
use rand_core::SeedableRng;
use rand_xorshift::XorShiftRng;
use rayon::prelude::*;

use super::super::arena::{Arena, Id};
use super::super::{AiPlayer, AiWorker};
use super::{backpropagate, rollout, terminal_reward, Node, RolloutPolicy, RootStats, EPSILON};
use crate::game::{Controller, Move};

#[derive(Clone)]
pub struct UcbConfig {
    /// Search iterations per determinization.
    pub iterations: u32,
    /// Independent determinizations; their root statistics are summed.
    pub samples: u32,
    pub exploration: f32,
    pub rollout: RolloutPolicy,
    /// Run determinizations across the rayon pool.
    pub parallel: bool,
}

impl Default for UcbConfig {
    fn default() -> Self {
        UcbConfig {
            iterations: 1000,
            samples: 50,
            exploration: std::f32::consts::SQRT_2,
            rollout: RolloutPolicy::Uniform,
            parallel: false,
        }
    }
}

/// UCB1 tree search over root-level determinizations: eager root expansion,
/// random single-child expansion below, random playouts to terminal.
pub struct UcbSearch {
    pub config: UcbConfig,
    stop: Arc<AtomicBool>,
}

impl UcbSearch {
    pub fn new(config: UcbConfig) -> UcbSearch {
        UcbSearch {
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Raise to make in-flight searches return their current best after the
    /// ongoing iteration.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }
}

impl AiPlayer for UcbSearch {
    fn name(&self) -> String {
        format!(
            "mcts-ucb[m{}-s{}{}]",
            self.config.iterations,
            self.config.samples,
            match self.config.rollout {
                RolloutPolicy::Uniform => "",
                RolloutPolicy::NoBurn => "-noburn",
            }
        )
    }

    fn worker(&self) -> Box<dyn AiWorker + '_> {
        Box::new(UcbWorker {
            config: self.config.clone(),
            stop: self.stop.clone(),
        })
    }
}

pub struct UcbWorker {
    config: UcbConfig,
    stop: Arc<AtomicBool>,
}

impl AiWorker for UcbWorker {
    fn select_move(
        &mut self,
        game: &Controller<'_>,
        moves: &[Move],
        rng: &mut SmallRng,
    ) -> (Move, f32) {
        debug_assert!(!moves.is_empty());
        let base_seed: u64 = rng.gen();
        let stats = search_root(game, moves, &self.config, &self.stop, base_seed);
        let (best, confidence) = stats.best();
        log::debug!(
            "ucb: {} samples, {} visits on best move {:?}",
            stats.samples,
            stats.visits[best],
            moves[best]
        );
        (moves[best], confidence)
    }
}

/// Run every determinization sample and reduce the per-move statistics
/// under one mutex. Sample `i` always consumes the stream seeded with
/// `base_seed + i`, so sequential and parallel runs agree.
pub(crate) fn search_root(
    game: &Controller<'_>,
    moves: &[Move],
    config: &UcbConfig,
    stop: &AtomicBool,
    base_seed: u64,
) -> RootStats {
    let stats = Mutex::new(RootStats::new(moves.len()));

    let run_sample = |i: u32| {
        let mut rng = XorShiftRng::seed_from_u64(base_seed.wrapping_add(i as u64));
        let mut arena: Arena<Node<'_>> =
            Arena::with_capacity(config.iterations as usize + moves.len() + 1);

        let mut root_game = *game;
        root_game.determinize(&mut rng);
        let root = arena.insert(Node::new(Id::INVALID, None, root_game));

        // The root is expanded eagerly, one child per legal move, so every
        // sample reduces over the same move order.
        for &mv in moves {
            let mut child_game = root_game;
            child_game.play(mv, &mut rng);
            let child = arena.insert(Node::new(root, Some(mv), child_game));
            arena.get_mut(root).children.push(child);
        }

        let mut scratch = Vec::new();
        for _ in 0..config.iterations {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let selected = select(&arena, root, config.exploration);
            let expanded = expand(&mut arena, selected, &mut rng);
            let node = arena.get(expanded);
            let (reward, player) = if node.game.is_terminal() {
                terminal_reward(node)
            } else {
                rollout(&node.game, config.rollout, &mut scratch, &mut rng)
            };
            backpropagate(&mut arena, expanded, player, reward);
        }

        stats.lock().unwrap().merge(&arena, root);
        arena.clear();
    };

    if config.parallel {
        (0..config.samples).into_par_iter().for_each(run_sample);
    } else {
        (0..config.samples).for_each(run_sample);
    }

    stats.into_inner().unwrap()
}

/// Descend by UCB1 until a node with untried moves, a leaf or a terminal.
/// A child that is an immediate win for the player choosing it is taken
/// unconditionally.
fn select(arena: &Arena<Node<'_>>, root: Id, exploration: f32) -> Id {
    let mut id = root;
    loop {
        let node = arena.get(id);
        if node.children.is_empty() || !node.moves.is_empty() {
            return id;
        }

        let parent_log = ((node.visits as f32) + 1.0).ln();
        let mut best = Id::INVALID;
        let mut best_ucb = f32::NEG_INFINITY;
        for &child_id in &node.children {
            let child = arena.get(child_id);
            if child.game.is_terminal() && child.game.winner() == Some(node.player) {
                return child_id;
            }
            let visits = child.visits as f32;
            let ucb = child.rewards / (visits + EPSILON)
                + exploration * (parent_log / (visits + EPSILON)).sqrt();
            if ucb > best_ucb {
                best_ucb = ucb;
                best = child_id;
            }
        }
        id = best;
    }
}

/// Expand one random untried move; terminals are re-evaluated in place.
fn expand<'c, R: Rng>(arena: &mut Arena<Node<'c>>, id: Id, rng: &mut R) -> Id {
    if arena.get(id).game.is_terminal() {
        return id;
    }

    if arena.get(id).children.is_empty() && arena.get(id).moves.is_empty() {
        let mut moves = Vec::new();
        arena.get(id).game.enumerate_moves(&mut moves);
        debug_assert!(!moves.is_empty());
        arena.get_mut(id).moves = moves;
    }

    let k = rng.gen_range(0..arena.get(id).moves.len());
    let mv = arena.get_mut(id).moves.swap_remove(k);
    let mut child_game = arena.get(id).game;
    child_game.play(mv, rng);
    let child = arena.insert(Node::new(id, Some(mv), child_game));
    arena.get_mut(id).children.push(child);
    child
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::{CardType, Catalog};

    /// Drive a game to a spot where the side to move can win immediately by
    /// picking a military card at +8.
    pub(crate) fn forced_win_position(catalog: &Catalog, seed: u64) -> (Controller<'_>, Move) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut game = Controller::with_auto_draft(catalog, &mut rng);
        game.determinize(&mut rng);
        game.state.military = 8;
        game.state.player = 0;

        let mut moves = Vec::new();
        loop {
            game.state.cities[0].gold = 50;
            game.enumerate_moves(&mut moves);
            let winning = moves.iter().copied().find(|mv| match mv {
                Move::Pick { card } => {
                    game.state.player == 0
                        && game.state.playable_card(*card, catalog).kind == CardType::Military
                }
                _ => false,
            });
            if let Some(mv) = winning {
                return (game, mv);
            }
            let burn = moves.iter().find(|m| m.is_burn()).copied().unwrap();
            assert!(!game.play(burn, &mut rng));
        }
    }

    #[test]
    fn finds_the_immediate_win() {
        let catalog = Catalog::new();
        let (game, winning_move) = forced_win_position(&catalog, 61);
        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);

        let config = UcbConfig {
            iterations: 200,
            samples: 4,
            parallel: false,
            ..Default::default()
        };
        let stop = AtomicBool::new(false);
        let stats = search_root(&game, &moves, &config, &stop, 7);
        let (best, _) = stats.best();
        assert_eq!(moves[best], winning_move);

        // Nearly all visits concentrate on the winning child.
        let total: u64 = stats.visits.iter().sum();
        assert!(stats.visits[best] as f64 >= 0.99 * total as f64);
    }

    #[test]
    fn parallel_and_sequential_sampling_agree() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(62);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);

        let stop = AtomicBool::new(false);
        let mut sequential = UcbConfig {
            iterations: 60,
            samples: 8,
            parallel: false,
            ..Default::default()
        };
        let a = search_root(&game, &moves, &sequential, &stop, 1234);
        sequential.parallel = true;
        let b = search_root(&game, &moves, &sequential, &stop, 1234);

        assert_eq!(a.visits, b.visits);
        assert_eq!(a.best().0, b.best().0);
    }

    #[test]
    fn stop_flag_short_circuits() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(63);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);

        let config = UcbConfig {
            iterations: 100_000,
            samples: 1,
            parallel: false,
            ..Default::default()
        };
        let stop = AtomicBool::new(true);
        let stats = search_root(&game, &moves, &config, &stop, 5);
        // Only the eager root expansion ran; no iteration visits.
        assert_eq!(stats.visits.iter().sum::<u64>(), 0);
    }

    #[test]
    fn worker_returns_a_legal_move() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(64);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);

        let search = UcbSearch::new(UcbConfig {
            iterations: 50,
            samples: 2,
            ..Default::default()
        });
        let mut worker = search.worker();
        let (mv, confidence) = worker.select_move(&game, &moves, &mut rng);
        assert!(moves.contains(&mv));
        assert!((0.0..=1.0).contains(&confidence));
    }
}
