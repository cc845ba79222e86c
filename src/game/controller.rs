use rand::Rng;

use super::catalog::Catalog;
use super::state::{GameState, NextAge};
use super::{Resource, SpecialAction, Wonder};

/// Size of the dense move-index space consumed by the policy head. Moves
/// differing only in their destroy/revive target share an index.
pub const POLICY_SIZE: usize = 36;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Move {
    /// Acquire playable card `card` for its cost (0 when chained).
    Pick { card: u8 },
    /// Discard playable card `card` for 2 + owned-yellow gold.
    Burn { card: u8 },
    /// Consume playable `card` to erect the wonder in `wonder` slot.
    /// `target` is the opponent card to destroy (Zeus / Circus Maximus) or
    /// the discarded card to revive (Mausoleum).
    BuildWonder { card: u8, wonder: u8, target: Option<u8> },
    /// Pick from the board pool, or from the great-library triple when the
    /// state machine is in a library phase.
    ScienceToken { slot: u8 },
    DraftWonder { slot: u8 },
}

impl Move {
    /// Stable dense index in `[0, POLICY_SIZE)` for the policy head.
    #[inline]
    pub fn fixed_index(&self) -> usize {
        let index = match *self {
            Move::ScienceToken { .. } => 0,
            Move::Pick { card } => card as usize,
            Move::DraftWonder { slot } => slot as usize,
            Move::Burn { card } => 6 + card as usize,
            Move::BuildWonder { card, wonder, .. } => 12 + wonder as usize * 6 + card as usize,
        };
        debug_assert!(index < POLICY_SIZE);
        index
    }

    pub fn is_burn(&self) -> bool {
        matches!(self, Move::Burn { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    DraftWonder,
    Play,
    PickScienceToken,
    GreatLibraryToken,
    /// Library pick granted by a replay wonder: the same player plays again
    /// after choosing the token.
    GreatLibraryTokenThenReplay,
    WinPlayer0,
    WinPlayer1,
}

impl Phase {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::WinPlayer0 | Phase::WinPlayer1)
    }

    #[inline]
    pub fn winner(self) -> Option<u8> {
        match self {
            Phase::WinPlayer0 => Some(0),
            Phase::WinPlayer1 => Some(1),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WinType {
    None,
    Civil,
    Military,
    Science,
}

/// Thin facade over [`GameState`]: enumerates legal moves, applies them and
/// resolves the phase machine. Cheap to copy; search clones one per node.
#[derive(Clone, Copy)]
pub struct Controller<'c> {
    pub catalog: &'c Catalog,
    pub state: GameState,
    pub phase: Phase,
    pub win_type: WinType,
}

impl<'c> Controller<'c> {
    pub fn new<R: Rng>(catalog: &'c Catalog, rng: &mut R) -> Controller<'c> {
        let state = GameState::new(rng);
        Controller {
            catalog,
            state,
            phase: Phase::DraftWonder,
            win_type: WinType::None,
        }
    }

    /// Start past the draft, each pick taking the first offered wonder.
    pub fn with_auto_draft<R: Rng>(catalog: &'c Catalog, rng: &mut R) -> Controller<'c> {
        let mut game = Controller::new(catalog, rng);
        while game.state.is_drafting() {
            game.state.draft_wonder(0, catalog, rng);
        }
        game.phase = Phase::Play;
        game
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    #[inline]
    pub fn winner(&self) -> Option<u8> {
        self.phase.winner()
    }

    #[inline]
    pub fn player_to_move(&self) -> u8 {
        self.state.player
    }

    pub fn determinize<R: Rng>(&mut self, rng: &mut R) {
        self.state.determinize(self.catalog, rng);
    }

    /// Exactly the legal moves for the current phase, in a deterministic
    /// order. Calling this on a terminal state is a programming error.
    pub fn enumerate_moves(&self, moves: &mut Vec<Move>) {
        moves.clear();
        let state = &self.state;

        match self.phase {
            Phase::DraftWonder => {
                for slot in 0..state.num_draftable_wonders() {
                    moves.push(Move::DraftWonder { slot });
                }
            }
            Phase::Play => {
                let city = state.current_city();
                let other = state.other_city();

                for i in 0..state.graph.num_playable {
                    let card = state.playable_card(i, self.catalog);
                    if city.compute_cost(card, other) <= city.gold as u32 {
                        moves.push(Move::Pick { card: i });
                    }
                    moves.push(Move::Burn { card: i });
                }

                let unbuilt = state.cities[0].num_wonders + state.cities[1].num_wonders;
                let built = 8 - unbuilt;
                if built < 7 {
                    for slot in 0..city.num_wonders {
                        let wonder = city.unbuilt_wonder(slot);
                        let wonder_card = self.catalog.wonder(wonder);
                        if city.compute_cost(wonder_card, other) > city.gold as u32 {
                            continue;
                        }
                        for card in 0..state.graph.num_playable {
                            self.push_wonder_moves(moves, card, slot, wonder);
                        }
                    }
                }
            }
            Phase::PickScienceToken => {
                debug_assert!(state.num_board_tokens > 0);
                for slot in 0..state.num_board_tokens {
                    moves.push(Move::ScienceToken { slot });
                }
            }
            Phase::GreatLibraryToken | Phase::GreatLibraryTokenThenReplay => {
                for slot in 0..3 {
                    moves.push(Move::ScienceToken { slot });
                }
            }
            Phase::WinPlayer0 | Phase::WinPlayer1 => {
                debug_assert!(false, "move enumeration on a finished game");
            }
        }
        debug_assert!(!moves.is_empty() || self.is_terminal());
    }

    /// Wonders with a targeted side effect expand into one move per valid
    /// target; a single untargeted move stands in when no target exists.
    fn push_wonder_moves(&self, moves: &mut Vec<Move>, card: u8, slot: u8, wonder: Wonder) {
        let other = self.state.other_city();
        let base = Move::BuildWonder { card, wonder: slot, target: None };

        match wonder {
            Wonder::Zeus => {
                let before = moves.len();
                for r in Resource::NORMAL {
                    let target = other.best_production_card[r as usize];
                    if target != super::catalog::INVALID_CARD {
                        moves.push(Move::BuildWonder { card, wonder: slot, target: Some(target) });
                    }
                }
                if moves.len() == before {
                    moves.push(base);
                }
            }
            Wonder::CircusMaximus => {
                let before = moves.len();
                for r in Resource::RARE {
                    let target = other.best_production_card[r as usize];
                    if target != super::catalog::INVALID_CARD {
                        moves.push(Move::BuildWonder { card, wonder: slot, target: Some(target) });
                    }
                }
                if moves.len() == before {
                    moves.push(base);
                }
            }
            Wonder::Mausoleum => {
                // Any discarded card may be revived.
                if self.state.discard.is_empty() {
                    moves.push(base);
                } else {
                    for &id in self.state.discard.cards() {
                        moves.push(Move::BuildWonder { card, wonder: slot, target: Some(id) });
                    }
                }
            }
            _ => moves.push(base),
        }
    }

    /// Apply a move from [`enumerate_moves`]. Returns `true` iff the game
    /// just ended. Illegal moves are undefined behavior (asserted in debug).
    pub fn play<R: Rng>(&mut self, mv: Move, rng: &mut R) -> bool {
        debug_assert!(!self.is_terminal());
        let catalog = self.catalog;
        let mut action = SpecialAction::Nothing;

        match mv {
            Move::DraftWonder { slot } => {
                self.state.draft_wonder(slot, catalog, rng);
                self.phase = if self.state.is_drafting() {
                    Phase::DraftWonder
                } else {
                    Phase::Play
                };
                return false;
            }
            Move::Pick { card } => {
                action = self.state.pick(card, catalog, rng);
                if action == SpecialAction::TakeScienceToken && self.state.num_board_tokens > 0 {
                    self.phase = Phase::PickScienceToken;
                    return false;
                }
            }
            Move::Burn { card } => {
                self.state.burn(card, catalog, rng);
            }
            Move::BuildWonder { card, wonder, target } => {
                let built = self.state.current_city().unbuilt_wonder(wonder);
                action = self.state.build_wonder(card, wonder, target, catalog, rng);
                if built == Wonder::GreatLibrary {
                    self.phase = if action == SpecialAction::Replay {
                        Phase::GreatLibraryTokenThenReplay
                    } else {
                        Phase::GreatLibraryToken
                    };
                    return false;
                }
            }
            Move::ScienceToken { slot } => match self.phase {
                Phase::PickScienceToken => {
                    action = self.state.pick_science_token(slot, false, catalog);
                }
                Phase::GreatLibraryToken | Phase::GreatLibraryTokenThenReplay => {
                    action = self.state.pick_science_token(slot, true, catalog);
                    if action == SpecialAction::Nothing
                        && self.phase == Phase::GreatLibraryTokenThenReplay
                    {
                        action = SpecialAction::Replay;
                    }
                }
                _ => debug_assert!(false, "science token outside a token phase"),
            },
        }

        if action == SpecialAction::MilitaryWin || action == SpecialAction::ScienceWin {
            self.win_type = if action == SpecialAction::MilitaryWin {
                WinType::Military
            } else {
                WinType::Science
            };
            self.phase = if self.state.player == 0 {
                Phase::WinPlayer0
            } else {
                Phase::WinPlayer1
            };
            return true;
        }

        match self.state.next_age(catalog, rng) {
            NextAge::Stay => {
                if action != SpecialAction::Replay {
                    self.state.next_player();
                }
            }
            NextAge::Advance => {}
            NextAge::EndGame => {
                self.win_type = WinType::Civil;
                self.phase = if self.state.find_winner(catalog) == 0 {
                    Phase::WinPlayer0
                } else {
                    Phase::WinPlayer1
                };
                return true;
            }
        }

        self.phase = Phase::Play;
        false
    }

    /// Human-readable move description for logs and the CLI.
    pub fn describe_move(&self, mv: Move) -> String {
        match mv {
            Move::Pick { card } => {
                format!("pick {}", self.state.playable_card(card, self.catalog).name)
            }
            Move::Burn { card } => {
                format!("burn {}", self.state.playable_card(card, self.catalog).name)
            }
            Move::BuildWonder { card, wonder, target } => {
                let w = self.state.current_city().unbuilt_wonder(wonder);
                let mut out = format!(
                    "build {} with {}",
                    self.catalog.wonder(w).name,
                    self.state.playable_card(card, self.catalog).name
                );
                if let Some(id) = target {
                    out.push_str(&format!(" targeting {}", self.catalog.card(id).name));
                }
                out
            }
            Move::ScienceToken { slot } => format!("science token #{slot}"),
            Move::DraftWonder { slot } => {
                format!(
                    "draft {}",
                    self.catalog.wonder(self.state.draftable_wonder(slot)).name
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::graph::GRAPH_NODES;
    use crate::game::CardType;
    use rand::rngs::SmallRng;
    use rand_core::SeedableRng;
    use rustc_hash::FxHashSet;

    fn check_invariants(game: &Controller<'_>) {
        let s = &game.state;
        for city in &s.cities {
            assert!(city.num_wonders <= 4);
            for &count in &city.science_symbols {
                assert!(count <= 2);
            }
        }
        if !s.is_drafting() {
            // At most 7 of the 8 drafted wonders ever get built.
            let unbuilt = s.cities[0].num_wonders + s.cities[1].num_wonders;
            assert!((1..=8).contains(&unbuilt));
        }
        assert!(s.military >= -9 && s.military <= 9);
        if s.military.unsigned_abs() >= 9 {
            assert!(game.is_terminal());
        }
        for &i in s.graph.playable() {
            let node = s.graph.nodes[i as usize];
            assert!(node.childless());
            assert!(node.visible());
        }
        if !s.is_drafting() && !game.is_terminal() {
            // Played + playable + hidden-on-board accounts for all 20 sites.
            let gone = s.num_played as usize;
            let playable = s.graph.num_playable as usize;
            assert!(gone + playable <= GRAPH_NODES);
        }
    }

    #[test]
    fn random_games_preserve_invariants_and_terminate() {
        let cat = Catalog::new();
        for seed in 0..20 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut game = Controller::new(&cat, &mut rng);
            let mut moves = Vec::new();
            let mut steps = 0;
            loop {
                check_invariants(&game);
                game.enumerate_moves(&mut moves);
                assert!(!moves.is_empty());
                let mv = moves[rng.gen_range(0..moves.len())];
                let done = game.play(mv, &mut rng);
                steps += 1;
                assert!(steps < 400, "game failed to terminate");
                if done {
                    break;
                }
            }
            assert!(game.is_terminal());
            assert_ne!(game.win_type, WinType::None);
            assert!(game.winner().is_some());

            // Terminal states are absorbing: nothing more is enumerable.
            check_invariants(&game);
        }
    }

    #[test]
    fn enumeration_is_stable_on_identical_states() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(77);
        let mut game = Controller::with_auto_draft(&cat, &mut rng);
        game.determinize(&mut rng);

        let mut a = Vec::new();
        let mut b = Vec::new();
        game.enumerate_moves(&mut a);
        game.enumerate_moves(&mut b);
        assert_eq!(a, b);

        // A copy enumerates identically.
        let copy = game;
        copy.enumerate_moves(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn fixed_indices_are_dense_and_collision_free() {
        let cat = Catalog::new();
        for seed in 0..10 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut game = Controller::new(&cat, &mut rng);
            let mut moves = Vec::new();
            loop {
                game.enumerate_moves(&mut moves);

                // The documented encoding collapses destroy/revive targets
                // and token slots; everything else must map injectively.
                let mut canonical = FxHashSet::default();
                for mv in &moves {
                    assert!(mv.fixed_index() < POLICY_SIZE);
                    canonical.insert(match *mv {
                        Move::BuildWonder { card, wonder, .. } => {
                            Move::BuildWonder { card, wonder, target: None }
                        }
                        m => m,
                    });
                }
                let mut indices = FxHashSet::default();
                for mv in &canonical {
                    if matches!(mv, Move::ScienceToken { .. }) {
                        assert_eq!(mv.fixed_index(), 0);
                        continue;
                    }
                    assert!(indices.insert(mv.fixed_index()), "collision for {mv:?}");
                }

                let mv = moves[rng.gen_range(0..moves.len())];
                if game.play(mv, &mut rng) {
                    break;
                }
            }
        }
    }

    #[test]
    fn picks_are_only_offered_when_affordable() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(5);
        let mut game = Controller::with_auto_draft(&cat, &mut rng);
        game.state.cities[0].gold = 0;

        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);
        for mv in &moves {
            if let Move::Pick { card } = mv {
                let c = game.state.playable_card(*card, &cat);
                let cost = game
                    .state
                    .current_city()
                    .compute_cost(c, game.state.other_city());
                assert_eq!(cost, 0);
            }
        }
    }

    #[test]
    fn military_win_is_absorbing() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(6);
        let mut game = Controller::with_auto_draft(&cat, &mut rng);
        game.determinize(&mut rng);

        // Force the track to the brink; player 0 picks the first affordable
        // red card that shows up and crosses +-9.
        game.state.military = 8;
        game.state.player = 0;
        let mut moves = Vec::new();
        let mut rounds = 0;
        loop {
            game.state.cities[0].gold = 50;
            game.enumerate_moves(&mut moves);
            let red = moves.iter().copied().find(|mv| match mv {
                Move::Pick { card } => {
                    game.state.player == 0
                        && game.state.playable_card(*card, &cat).kind == CardType::Military
                }
                _ => false,
            });
            let done = if let Some(mv) = red {
                game.play(mv, &mut rng)
            } else {
                let burn = moves.iter().find(|m| m.is_burn()).copied().unwrap();
                game.play(burn, &mut rng)
            };
            if done {
                break;
            }
            rounds += 1;
            assert!(rounds < 200);
        }
        assert_eq!(game.phase, Phase::WinPlayer0);
        assert_eq!(game.win_type, WinType::Military);
        assert_eq!(game.winner(), Some(0));
    }

    #[test]
    fn science_pair_routes_through_token_phase() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(7);
        let mut game = Controller::with_auto_draft(&cat, &mut rng);
        game.determinize(&mut rng);

        // Seed the current player with one copy of some visible science
        // symbol, then pick the matching card to complete the pair.
        'outer: for _ in 0..60 {
            let p = game.state.player as usize;
            game.state.cities[p].gold = 20;
            let mut moves = Vec::new();
            game.enumerate_moves(&mut moves);
            for i in 0..game.state.graph.num_playable {
                let card = game.state.playable_card(i, &cat);
                if card.kind == CardType::Science && moves.contains(&Move::Pick { card: i }) {
                    let symbol = card.science.unwrap();
                    if game.state.cities[p].science_symbols[symbol as usize] == 0 {
                        game.state.cities[p].science_symbols[symbol as usize] = 1;
                        game.state.cities[p].num_science_symbols += 1;
                    }
                    game.play(Move::Pick { card: i }, &mut rng);
                    break 'outer;
                }
            }
            let burn = moves.iter().find(|m| m.is_burn()).copied().unwrap();
            if game.play(burn, &mut rng) {
                panic!("game ended before a science pick was possible");
            }
        }

        assert_eq!(game.phase, Phase::PickScienceToken);
        let mut moves = Vec::new();
        game.enumerate_moves(&mut moves);
        assert_eq!(moves.len(), game.state.num_board_tokens as usize);
        let player = game.state.player;
        let tokens_before = game.state.num_board_tokens;
        game.play(moves[0], &mut rng);
        assert_eq!(game.state.num_board_tokens, tokens_before - 1);
        assert_eq!(game.phase, Phase::Play);
        // The pick ended that player's turn.
        assert_ne!(game.state.player, player);
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]
        #[test]
        fn any_legal_sequence_keeps_the_state_consistent(
            seed in any::<u64>(),
            plies in 1usize..150,
        ) {
            let cat = Catalog::new();
            let mut rng = SmallRng::seed_from_u64(seed);
            let mut game = Controller::new(&cat, &mut rng);
            let mut moves = Vec::new();
            for _ in 0..plies {
                game.enumerate_moves(&mut moves);
                prop_assert!(!moves.is_empty());
                let mv = moves[rng.gen_range(0..moves.len())];
                if game.play(mv, &mut rng) {
                    break;
                }
                check_invariants(&game);
            }
            check_invariants(&game);
        }
    }

    #[test]
    fn law_token_science_win() {
        let cat = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(8);
        let mut game = Controller::with_auto_draft(&cat, &mut rng);
        game.determinize(&mut rng);

        // Five distinct symbols plus the Law token is a science win.
        game.state.cities[0].num_science_symbols = 5;
        for s in 0..5 {
            game.state.cities[0].science_symbols[s] = 1;
        }
        game.phase = Phase::PickScienceToken;
        let law_slot = game
            .state
            .board_tokens()
            .iter()
            .position(|&t| t == crate::game::ScienceToken::Law)
            .unwrap_or_else(|| {
                // Move Law onto the board if the shuffle left it in reserve.
                let pos = game
                    .state
                    .science_pool
                    .iter()
                    .position(|&t| t == crate::game::ScienceToken::Law)
                    .unwrap();
                game.state.science_pool.swap(0, pos);
                0
            });
        let done = game.play(Move::ScienceToken { slot: law_slot as u8 }, &mut rng);
        assert!(done);
        assert_eq!(game.phase, Phase::WinPlayer0);
        assert_eq!(game.win_type, WinType::Science);
    }
}
