use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::SmallRng;
use rand::Rng;
use rand_core::SeedableRng;
use rand_distr::{Dirichlet, Distribution};
use rand_xorshift::XorShiftRng;
use rayon::prelude::*;

use super::super::arena::{Arena, Id};
use super::super::{AiPlayer, AiWorker};
use super::{backpropagate, rollout, terminal_reward, Node, RolloutPolicy, RootStats, EPSILON};
use crate::game::controller::POLICY_SIZE;
use crate::game::state::NO_AGE;
use crate::game::{Controller, Move};
use crate::net::{encode_state, PolicyValueNet, PolicyValueNetFactory, NET_INPUT};

#[derive(Clone)]
pub struct PuctConfig {
    pub iterations: u32,
    pub samples: u32,
    /// Without network priors a larger constant explores enough; with a
    /// trained policy lower values work better.
    pub exploration: f32,
    pub parallel: bool,
    pub dirichlet_epsilon: f32,
    pub dirichlet_alpha: f32,
}

impl Default for PuctConfig {
    fn default() -> Self {
        PuctConfig {
            iterations: 1000,
            samples: 50,
            exploration: 5.0,
            parallel: false,
            dirichlet_epsilon: 0.25,
            dirichlet_alpha: 0.3,
        }
    }
}

/// PUCT search with lazy expansion and optional network guidance. Without a
/// network it degrades to uniform priors and random playouts.
pub struct PuctSearch {
    pub config: PuctConfig,
    pub net: Option<Arc<dyn PolicyValueNetFactory>>,
    stop: Arc<AtomicBool>,
}

impl PuctSearch {
    pub fn new(config: PuctConfig) -> PuctSearch {
        PuctSearch {
            config,
            net: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_net(config: PuctConfig, net: Arc<dyn PolicyValueNetFactory>) -> PuctSearch {
        PuctSearch {
            config,
            net: Some(net),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }
}

impl AiPlayer for PuctSearch {
    fn name(&self) -> String {
        match &self.net {
            Some(net) => format!(
                "mcts-puct[m{}-s{}-{}]",
                self.config.iterations,
                self.config.samples,
                net.name()
            ),
            None => format!(
                "mcts-puct[m{}-s{}]",
                self.config.iterations, self.config.samples
            ),
        }
    }

    fn worker(&self) -> Box<dyn AiWorker + '_> {
        Box::new(PuctWorker {
            config: self.config.clone(),
            net: self.net.clone(),
            stop: self.stop.clone(),
            last_priors: [0.0; POLICY_SIZE],
        })
    }
}

pub struct PuctWorker {
    config: PuctConfig,
    net: Option<Arc<dyn PolicyValueNetFactory>>,
    stop: Arc<AtomicBool>,
    last_priors: [f32; POLICY_SIZE],
}

impl AiWorker for PuctWorker {
    fn select_move(
        &mut self,
        game: &Controller<'_>,
        moves: &[Move],
        rng: &mut SmallRng,
    ) -> (Move, f32) {
        debug_assert!(!moves.is_empty());
        let base_seed: u64 = rng.gen();
        let stats = search_root(
            game,
            moves,
            &self.config,
            self.net.as_deref(),
            &self.stop,
            base_seed,
        );
        self.last_priors = stats.averaged_priors();
        let (best, confidence) = stats.best();
        log::debug!(
            "puct: {} samples, {} visits on best move {:?}",
            stats.samples,
            stats.visits[best],
            moves[best]
        );
        (moves[best], confidence)
    }

    fn puct_priors(&self) -> Option<&[f32; POLICY_SIZE]> {
        Some(&self.last_priors)
    }
}

pub(crate) fn search_root(
    game: &Controller<'_>,
    moves: &[Move],
    config: &PuctConfig,
    net_factory: Option<&dyn PolicyValueNetFactory>,
    stop: &AtomicBool,
    base_seed: u64,
) -> RootStats {
    let stats = Mutex::new(RootStats::new(moves.len()));

    let run_sample = |i: u32| {
        let mut rng = XorShiftRng::seed_from_u64(base_seed.wrapping_add(i as u64));
        let mut net = net_factory.map(|f| f.create());
        let mut arena: Arena<Node<'_>> =
            Arena::with_capacity(config.iterations as usize + moves.len() + 1);

        let mut root_game = *game;
        root_game.determinize(&mut rng);
        let root = arena.insert(Node::new(Id::INVALID, None, root_game));
        let mut net_ref: Option<&mut (dyn PolicyValueNet + 'static)> = net.as_deref_mut();
        init_root(&mut arena, root, moves, config, &mut net_ref, &mut rng);

        let mut scratch = Vec::new();
        let net_is_some = net_ref.is_some();
        for _ in 0..config.iterations {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let leaf = descend(&mut arena, root, config, &mut net_ref, &mut rng);
            let node = arena.get(leaf);
            let (reward, player) = if node.game.is_terminal() {
                terminal_reward(node)
            } else if net_is_some {
                (node.value_estimate, node.player)
            } else {
                rollout(&node.game, RolloutPolicy::Uniform, &mut scratch, &mut rng)
            };
            backpropagate(&mut arena, leaf, player, reward);
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

/// Masked, renormalized priors plus the value estimate for a node whose
/// move list is already populated.
fn init_priors(
    arena: &mut Arena<Node<'_>>,
    id: Id,
    net: &mut Option<&mut (dyn PolicyValueNet + 'static)>,
) {
    let node = arena.get(id);
    let mut priors = [1.0 / POLICY_SIZE as f32; POLICY_SIZE];
    let mut value = 0.5;

    if let Some(net) = net.as_deref_mut() {
        // The draft phase is outside the policy head's move space.
        if !node.game.state.is_drafting() {
            let mut input = [0.0f32; NET_INPUT];
            encode_state(&node.game, node.player, &mut input);
            let age = if node.game.state.age == NO_AGE {
                0
            } else {
                node.game.state.age
            };
            value = net.evaluate(age, &input, &mut priors);
        }
    }

    let mut mask = [0.0f32; POLICY_SIZE];
    for mv in &node.moves {
        mask[mv.fixed_index()] = 1.0;
    }
    let mut sum = EPSILON;
    for i in 0..POLICY_SIZE {
        sum += priors[i] * mask[i];
    }
    let inv = 1.0 / sum;
    for i in 0..POLICY_SIZE {
        priors[i] *= mask[i] * inv;
    }

    let node = arena.get_mut(id);
    node.priors = priors;
    node.value_estimate = value;
}

/// Eager root setup: all children materialized in legal-move order, priors
/// blended with Dirichlet noise for exploration diversity.
fn init_root<R: Rng>(
    arena: &mut Arena<Node<'_>>,
    root: Id,
    moves: &[Move],
    config: &PuctConfig,
    net: &mut Option<&mut (dyn PolicyValueNet + 'static)>,
    rng: &mut R,
) {
    let root_game = arena.get(root).game;
    arena.get_mut(root).moves = moves.to_vec();

    for &mv in moves {
        let mut child_game = root_game;
        child_game.play(mv, rng);
        let child = arena.insert(Node::new(root, Some(mv), child_game));
        arena.get_mut(root).children.push(child);
    }

    init_priors(arena, root, net);

    if moves.len() >= 2 {
        let alphas = vec![config.dirichlet_alpha as f64; moves.len()];
        if let Ok(dirichlet) = Dirichlet::new(&alphas) {
            let noise = dirichlet.sample(rng);
            let node = arena.get_mut(root);
            for (a, mv) in moves.iter().enumerate() {
                let index = mv.fixed_index();
                node.priors[index] = (1.0 - config.dirichlet_epsilon) * node.priors[index]
                    + config.dirichlet_epsilon * noise[a] as f32;
            }
        }
    }
}

/// Walk down by PUCT. Fresh interior nodes get their move list and priors
/// on first touch and are returned for evaluation; children materialize the
/// first time the selection rule lands on their slot.
fn descend<R: Rng>(
    arena: &mut Arena<Node<'_>>,
    root: Id,
    config: &PuctConfig,
    net: &mut Option<&mut (dyn PolicyValueNet + 'static)>,
    rng: &mut R,
) -> Id {
    let mut id = root;
    loop {
        if arena.get(id).game.is_terminal() {
            return id;
        }

        if arena.get(id).children.is_empty() {
            let mut moves = Vec::new();
            arena.get(id).game.enumerate_moves(&mut moves);
            debug_assert!(!moves.is_empty());
            let n = moves.len();
            let node = arena.get_mut(id);
            node.moves = moves;
            node.children = vec![Id::INVALID; n];
            init_priors(arena, id, net);
            return id;
        }

        let node = arena.get(id);
        let parent_visits = node.visits as f32 + 1.0;
        let mut best_index = 0;
        let mut best_score = f32::NEG_INFINITY;
        let mut shortcut = Id::INVALID;

        for (i, &child_id) in node.children.iter().enumerate() {
            let (q, child_visits) = if child_id.is_valid() {
                let child = arena.get(child_id);
                if child.game.is_terminal() && child.game.winner() == Some(node.player) {
                    shortcut = child_id;
                    break;
                }
                let q = if child.visits == 0 {
                    0.5
                } else {
                    child.rewards / child.visits as f32
                };
                (q, child.visits as f32)
            } else {
                // Unvisited slots get the optimistic coin-flip value.
                (0.5, 0.0)
            };

            let prior = node.priors[node.moves[i].fixed_index()];
            let score =
                q + config.exploration * prior * parent_visits.sqrt() / (1.0 + child_visits);
            if score > best_score {
                best_score = score;
                best_index = i;
            }
        }

        if shortcut.is_valid() {
            return shortcut;
        }

        if !arena.get(id).children[best_index].is_valid() {
            let mv = arena.get(id).moves[best_index];
            let mut child_game = arena.get(id).game;
            child_game.play(mv, rng);
            let child = arena.insert(Node::new(id, Some(mv), child_game));
            arena.get_mut(id).children[best_index] = child;
        }
        id = arena.get(id).children[best_index];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::UniformNetFactory;

    use crate::game::Catalog;

    #[test]
    fn finds_the_immediate_win() {
        let catalog = Catalog::new();
        let (game, winning_move) = super::super::ucb::tests::forced_win_position(&catalog, 71);
        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);

        let config = PuctConfig {
            iterations: 200,
            samples: 4,
            parallel: false,
            ..Default::default()
        };
        let stop = AtomicBool::new(false);
        let stats = search_root(&game, &moves, &config, None, &stop, 11);
        let (best, _) = stats.best();
        assert_eq!(moves[best], winning_move);

        let total: u64 = stats.visits.iter().sum();
        assert!(stats.visits[best] as f64 >= 0.99 * total as f64);
    }

    #[test]
    fn network_backed_search_returns_legal_moves_and_priors() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(72);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);

        let search = PuctSearch::with_net(
            PuctConfig {
                iterations: 80,
                samples: 2,
                ..Default::default()
            },
            Arc::new(UniformNetFactory),
        );
        let mut worker = search.worker();
        let (mv, confidence) = worker.select_move(&game, &moves, &mut rng);
        assert!(moves.contains(&mv));
        assert!((0.0..=1.0).contains(&confidence));

        let priors = worker.puct_priors().unwrap();
        let sum: f32 = priors.iter().sum();
        assert!(sum > 0.0 && sum <= 1.0 + 1e-3);
        // Probability mass only on legal fixed indices.
        for (i, &p) in priors.iter().enumerate() {
            if p > 0.0 {
                assert!(moves.iter().any(|m| m.fixed_index() == i));
            }
        }
    }

    #[test]
    fn parallel_and_sequential_sampling_agree() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(73);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);

        let stop = AtomicBool::new(false);
        let mut config = PuctConfig {
            iterations: 60,
            samples: 8,
            parallel: false,
            ..Default::default()
        };
        let a = search_root(&game, &moves, &config, None, &stop, 555);
        config.parallel = true;
        let b = search_root(&game, &moves, &config, None, &stop, 555);
        assert_eq!(a.visits, b.visits);
        assert_eq!(a.best().0, b.best().0);
    }

    #[test]
    fn priors_are_masked_to_legal_moves() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(74);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);

        let mut arena: Arena<Node<'_>> = Arena::new();
        let root = arena.insert(Node::new(Id::INVALID, None, game));
        arena.get_mut(root).moves = moves.clone();
        init_priors(&mut arena, root, &mut None);

        let node = arena.get(root);
        let sum: f32 = node.priors.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
        for i in 0..POLICY_SIZE {
            let legal = moves.iter().any(|m| m.fixed_index() == i);
            assert_eq!(node.priors[i] > 0.0, legal);
        }
    }
}
