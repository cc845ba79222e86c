pub mod puct;
pub mod ucb;

use rand::Rng;

use super::arena::{Arena, Id};
use crate::game::controller::POLICY_SIZE;
use crate::game::{Controller, Move};

pub(crate) const EPSILON: f32 = 1e-5;

/// Leaf playout policy for searches without a value network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RolloutPolicy {
    #[default]
    Uniform,
    /// Uniform over non-burn moves whenever any exist.
    NoBurn,
}

/// One search-tree node, shared by both searchers. UCB keeps `moves` as the
/// untried list and `children` dense; PUCT keeps them parallel, with
/// `Id::INVALID` marking children not yet materialized.
pub struct Node<'c> {
    pub parent: Id,
    pub mv: Option<Move>,
    pub game: Controller<'c>,
    /// Side to move at this node, cached for reward bookkeeping.
    pub player: u8,
    pub moves: Vec<Move>,
    pub children: Vec<Id>,
    pub visits: u32,
    /// Accumulated from the perspective of the player who played into this
    /// node (the parent's side to move).
    pub rewards: f32,
    /// Network value estimate for the side to move, when one was computed.
    pub value_estimate: f32,
    pub priors: [f32; POLICY_SIZE],
}

impl<'c> Node<'c> {
    pub fn new(parent: Id, mv: Option<Move>, game: Controller<'c>) -> Node<'c> {
        let player = game.player_to_move();
        Node {
            parent,
            mv,
            game,
            player,
            moves: Vec::new(),
            children: Vec::new(),
            visits: 0,
            rewards: 0.0,
            value_estimate: 0.5,
            priors: [0.0; POLICY_SIZE],
        }
    }
}

/// Random playout to a terminal state. Returns the reward for the side to
/// move at `game` together with that player's index.
pub(crate) fn rollout<R: Rng>(
    game: &Controller<'_>,
    policy: RolloutPolicy,
    scratch: &mut Vec<Move>,
    rng: &mut R,
) -> (f32, u8) {
    debug_assert!(!game.is_terminal());
    let perspective = game.player_to_move();
    let mut sim = *game;

    loop {
        sim.enumerate_moves(scratch);
        let mv = match policy {
            RolloutPolicy::Uniform => scratch[rng.gen_range(0..scratch.len())],
            RolloutPolicy::NoBurn => {
                let non_burn = scratch.iter().filter(|m| !m.is_burn()).count();
                if non_burn > 0 {
                    let k = rng.gen_range(0..non_burn);
                    scratch
                        .iter()
                        .filter(|m| !m.is_burn())
                        .nth(k)
                        .copied()
                        .unwrap()
                } else {
                    scratch[rng.gen_range(0..scratch.len())]
                }
            }
        };
        if sim.play(mv, rng) {
            break;
        }
    }

    (
        (sim.winner() == Some(perspective)) as u8 as f32,
        perspective,
    )
}

/// Reward for a terminal node, in the perspective of its recorded player.
pub(crate) fn terminal_reward(node: &Node<'_>) -> (f32, u8) {
    debug_assert!(node.game.is_terminal());
    (
        (node.game.winner() == Some(node.player)) as u8 as f32,
        node.player,
    )
}

/// Walk up from a leaf: every node gets a visit; reward is credited in the
/// perspective of whoever played the move into each node.
pub(crate) fn backpropagate(
    arena: &mut Arena<Node<'_>>,
    leaf: Id,
    playout_player: u8,
    reward: f32,
) {
    let mut id = leaf;
    loop {
        arena.get_mut(id).visits += 1;
        let parent = arena.get(id).parent;
        if !parent.is_valid() {
            break;
        }
        let owner = arena.get(parent).player;
        let value = if owner == playout_player {
            reward
        } else {
            1.0 - reward
        };
        arena.get_mut(id).rewards += value;
        id = parent;
    }
}

/// Per-root-move accumulators reduced over all determinization samples.
pub(crate) struct RootStats {
    pub visits: Vec<u64>,
    pub rewards: Vec<f64>,
    pub priors: [f64; POLICY_SIZE],
    pub samples: u32,
}

impl RootStats {
    pub fn new(num_moves: usize) -> RootStats {
        RootStats {
            visits: vec![0; num_moves],
            rewards: vec![0.0; num_moves],
            priors: [0.0; POLICY_SIZE],
            samples: 0,
        }
    }

    /// Fold one finished sample in. Root children were created in legal-move
    /// order, so child `j` corresponds to move `j`.
    pub fn merge(&mut self, arena: &Arena<Node<'_>>, root: Id) {
        let root_node = arena.get(root);
        debug_assert_eq!(root_node.children.len(), self.visits.len());
        let root_visits = root_node.visits.max(1) as f64;

        for (j, &child_id) in root_node.children.iter().enumerate() {
            if !child_id.is_valid() {
                continue;
            }
            let child = arena.get(child_id);
            self.visits[j] += child.visits as u64;
            self.rewards[j] += child.rewards as f64;
            if let Some(mv) = child.mv {
                self.priors[mv.fixed_index()] += child.visits as f64 / root_visits;
            }
        }
        self.samples += 1;
    }

    /// Most-visited root move plus its average reward as a confidence.
    pub fn best(&self) -> (usize, f32) {
        let mut best = 0;
        for j in 1..self.visits.len() {
            if self.visits[j] > self.visits[best] {
                best = j;
            }
        }
        let confidence = if self.visits[best] > 0 {
            (self.rewards[best] / self.visits[best] as f64) as f32
        } else {
            0.0
        };
        (best, confidence)
    }

    /// Average visit distribution over fixed move indices, the PUCT policy
    /// target.
    pub fn averaged_priors(&self) -> [f32; POLICY_SIZE] {
        let mut out = [0.0f32; POLICY_SIZE];
        let samples = self.samples.max(1) as f64;
        for (slot, &p) in out.iter_mut().zip(self.priors.iter()) {
            *slot = (p / samples) as f32;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Catalog;
    use rand::rngs::SmallRng;
    use rand_core::SeedableRng;

    #[test]
    fn backprop_credits_the_owner_of_each_move() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(51);
        let game = Controller::with_auto_draft(&catalog, &mut rng);

        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);

        let mut arena: Arena<Node<'_>> = Arena::new();
        let root = arena.insert(Node::new(Id::INVALID, None, game));

        let mut child_game = game;
        child_game.play(moves[0], &mut rng);
        let child = arena.insert(Node::new(root, Some(moves[0]), child_game));
        arena.get_mut(root).children.push(child);

        let root_player = arena.get(root).player;
        backpropagate(&mut arena, child, root_player, 1.0);
        assert_eq!(arena.get(child).visits, 1);
        assert_eq!(arena.get(root).visits, 1);
        // Root owns the move into the child and the playout player won.
        assert_eq!(arena.get(child).rewards, 1.0);

        backpropagate(&mut arena, child, root_player ^ 1, 1.0);
        // Opponent win credits 0 to the root-owned edge.
        assert_eq!(arena.get(child).rewards, 1.0);
        assert_eq!(arena.get(child).visits, 2);
    }

    #[test]
    fn rollout_reaches_a_terminal_state() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(52);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut scratch = Vec::new();
        for policy in [RolloutPolicy::Uniform, RolloutPolicy::NoBurn] {
            let (reward, player) = rollout(&game, policy, &mut scratch, &mut rng);
            assert!(reward == 0.0 || reward == 1.0);
            assert_eq!(player, game.player_to_move());
        }
    }

    #[test]
    fn root_stats_pick_the_most_visited_move() {
        let mut stats = RootStats::new(3);
        stats.visits = vec![5, 20, 10];
        stats.rewards = vec![1.0, 15.0, 2.0];
        let (best, confidence) = stats.best();
        assert_eq!(best, 1);
        assert!((confidence - 0.75).abs() < 1e-6);
    }
}
