//! Network contract for the search. Weight loading and training live
//! outside the core; anything implementing these traits can back the PUCT
//! searcher or the greedy value player.

use crate::game::controller::POLICY_SIZE;
use crate::game::state::NO_AGE;
use crate::game::tensor::{self, BASE_TENSOR, EXTRA_TENSOR};
use crate::game::Controller;

/// Full fixed-shape input: base encoding followed by the decision-context
/// extra encoding.
pub const NET_INPUT: usize = BASE_TENSOR + EXTRA_TENSOR;

/// Value-only head: win probability for player 0 given a state encoded from
/// player 0's perspective.
pub trait ValueNet: Send {
    fn value(&mut self, age: u8, input: &[f32]) -> f32;
}

/// Value + policy head for PUCT: win probability for the side to move
/// (input encoded from that side's perspective) plus one prior per fixed
/// move index.
pub trait PolicyValueNet: Send {
    fn evaluate(&mut self, age: u8, input: &[f32], priors_out: &mut [f32; POLICY_SIZE]) -> f32;
}

/// Hands each worker thread its own inference instance, so the hot path
/// never synchronizes.
pub trait ValueNetFactory: Send + Sync {
    fn name(&self) -> String;
    fn create(&self) -> Box<dyn ValueNet>;
}

pub trait PolicyValueNetFactory: Send + Sync {
    fn name(&self) -> String;
    fn create(&self) -> Box<dyn PolicyValueNet>;
}

pub fn encode_state(game: &Controller<'_>, main_player: u8, out: &mut [f32; NET_INPUT]) {
    let (base, extra) = out.split_at_mut(BASE_TENSOR);
    tensor::base_tensor(
        &game.state,
        main_player,
        game.catalog,
        base.try_into().unwrap(),
    );
    tensor::extra_tensor(game, extra.try_into().unwrap());
}

/// Value-net score for `player`, mirroring the net's player-0 output.
pub fn score_state(net: &mut dyn ValueNet, game: &Controller<'_>, player: u8) -> f32 {
    let mut input = [0.0f32; NET_INPUT];
    encode_state(game, 0, &mut input);
    let age = if game.state.age == NO_AGE { 0 } else { game.state.age };
    let p0 = net.value(age, &input);
    if player == 0 {
        p0
    } else {
        1.0 - p0
    }
}

/// Indifferent network: 0.5 value, flat policy. Useful as a placeholder and
/// in tests that only exercise the search plumbing.
pub struct UniformNet;

impl ValueNet for UniformNet {
    fn value(&mut self, _age: u8, _input: &[f32]) -> f32 {
        0.5
    }
}

impl PolicyValueNet for UniformNet {
    fn evaluate(&mut self, _age: u8, _input: &[f32], priors_out: &mut [f32; POLICY_SIZE]) -> f32 {
        priors_out.fill(1.0 / POLICY_SIZE as f32);
        0.5
    }
}

pub struct UniformNetFactory;

impl ValueNetFactory for UniformNetFactory {
    fn name(&self) -> String {
        "uniform".into()
    }

    fn create(&self) -> Box<dyn ValueNet> {
        Box::new(UniformNet)
    }
}

impl PolicyValueNetFactory for UniformNetFactory {
    fn name(&self) -> String {
        "uniform".into()
    }

    fn create(&self) -> Box<dyn PolicyValueNet> {
        Box::new(UniformNet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Catalog;
    use rand::rngs::SmallRng;
    use rand_core::SeedableRng;

    #[test]
    fn encode_state_fills_both_sections() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(41);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut input = [0.0f32; NET_INPUT];
        encode_state(&game, 0, &mut input);
        // Gold 7 appears in the base section; the extra section is in Play
        // mode with populated card descriptors.
        assert!(input[..BASE_TENSOR].iter().any(|&v| v == 7.0));
        assert_eq!(input[BASE_TENSOR], 0.0);
        assert!(input[BASE_TENSOR..].iter().any(|&v| v > 0.0));
    }

    #[test]
    fn score_state_flips_perspective() {
        struct Fixed(f32);
        impl ValueNet for Fixed {
            fn value(&mut self, _age: u8, _input: &[f32]) -> f32 {
                self.0
            }
        }
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(42);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut net = Fixed(0.8);
        assert!((score_state(&mut net, &game, 0) - 0.8).abs() < 1e-6);
        assert!((score_state(&mut net, &game, 1) - 0.2).abs() < 1e-6);
    }
}
