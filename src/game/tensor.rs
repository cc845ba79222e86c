use super::catalog::{Catalog, INVALID_CARD};
use super::controller::{Controller, Phase};
use super::state::GameState;
use super::{CardType, ChainSymbol, ScienceToken, Wonder};

/// Scalar + per-city encoding of a state, independent of whose decision it
/// is. Layout: 4 scalars, 10 board-token one-hots, 9 discard-pile summary
/// entries, 7 visible-type counts, both civil VPs, then two 30-float city
/// blocks (main player first).
pub const BASE_TENSOR: usize = 4 + 10 + 9 + 7 + 2 + 2 * CITY_BLOCK;
const CITY_BLOCK: usize = 30;

pub const TENSOR_PER_CARD: usize = 18;
pub const TENSOR_PER_WONDER: usize = 10;

/// Decision-context encoding: a mode header, then either per-playable-card
/// and per-unbuilt-wonder descriptors (Play) or a token-pool one-hot (token
/// phases). Unused slots hold -1.
pub const EXTRA_TENSOR: usize = 1 + 6 * TENSOR_PER_CARD + 4 * TENSOR_PER_WONDER;

/// Types that can appear face-up on the card graph.
const TYPES_IN_GRAPH: usize = CardType::Guild as usize + 1;

pub fn base_tensor(
    state: &GameState,
    main_player: u8,
    catalog: &Catalog,
    out: &mut [f32; BASE_TENSOR],
) {
    out.fill(0.0);
    let main = main_player as usize;
    let opponent = main ^ 1;
    let mut i = 0;

    out[i] = state.turn as f32;
    i += 1;
    out[i] = if main == 0 {
        state.military as f32
    } else {
        -(state.military as f32)
    };
    i += 1;
    out[i] = state.military_token2[main] as u8 as f32 + state.military_token5[main] as u8 as f32;
    i += 1;
    out[i] =
        state.military_token2[opponent] as u8 as f32 + state.military_token5[opponent] as u8 as f32;
    i += 1;

    for &token in state.board_tokens() {
        out[i + token as usize] = 1.0;
    }
    i += ScienceToken::COUNT;

    // What the Mausoleum could bring back.
    let discard = &state.discard;
    out[i] = if discard.best_blue != INVALID_CARD {
        catalog.card(discard.best_blue).victory_points as f32
    } else {
        0.0
    };
    i += 1;
    out[i] = if discard.best_military != INVALID_CARD {
        catalog.card(discard.best_military).military as f32
    } else {
        0.0
    };
    i += 1;
    out[i] = discard.num_guilds as f32;
    i += 1;
    // Law is a token-only symbol and can never be discarded.
    for s in 0..super::ScienceSymbol::COUNT - 1 {
        out[i] = (discard.science[s] != INVALID_CARD) as u8 as f32;
        i += 1;
    }

    for node in &state.graph.nodes {
        if node.visible() && node.card() != super::graph::CardNode::INVALID_CARD {
            let kind = catalog.card(node.card() as u8).kind as usize;
            if kind < TYPES_IN_GRAPH {
                out[i + kind] += 1.0;
            }
        }
    }
    i += TYPES_IN_GRAPH;

    let my_city = &state.cities[main];
    let opp_city = &state.cities[opponent];
    out[i] = my_city.victory_points(opp_city, catalog, false) as f32;
    i += 1;
    out[i] = opp_city.victory_points(my_city, catalog, false) as f32;
    i += 1;

    for city in [my_city, opp_city] {
        let mut families = [0.0f32; 4];
        for s in 0..ChainSymbol::COUNT as u8 {
            if city.chaining & (1 << s) == 0 {
                continue;
            }
            let family = if s <= ChainSymbol::LAST_YELLOW {
                0
            } else if s <= ChainSymbol::LAST_BLUE {
                1
            } else if s <= ChainSymbol::LAST_RED {
                2
            } else {
                3
            };
            families[family] += 1.0;
        }
        out[i..i + 4].copy_from_slice(&families);
        i += 4;

        for t in 0..ScienceToken::TENSOR_COUNT {
            out[i] = ((city.tokens >> t) & 1) as f32;
            i += 1;
        }

        out[i] = city.num_science_symbols as f32;
        i += 1;
        out[i] = city.gold as f32;
        i += 1;
        out[i] = city.cards_per_type[CardType::Yellow as usize] as f32;
        i += 1;

        for r in 0..super::Resource::COUNT {
            out[i] = city.production[r] as f32;
            i += 1;
            out[i] = city.discount[r] as u8 as f32;
            i += 1;
        }

        for t in [
            CardType::Yellow,
            CardType::Blue,
            CardType::Military,
            CardType::Science,
            CardType::Guild,
        ] {
            out[i] = city.cards_per_type[t as usize] as f32;
            i += 1;
        }

        out[i] = city.weak_normal as f32;
        i += 1;
        out[i] = city.weak_rare as f32;
        i += 1;

        let mut replay_wonders = 0.0;
        for slot in 0..city.num_wonders {
            let w = city.unbuilt_wonder(slot);
            if w.grants_replay() || city.owns_token(ScienceToken::Theology) {
                replay_wonders += 1.0;
            }
        }
        out[i] = replay_wonders;
        i += 1;
    }

    debug_assert_eq!(i, BASE_TENSOR);
}

/// Per-playable-card descriptor for the extra tensor.
fn card_tensor(
    game: &Controller<'_>,
    playable: u8,
    main_player: u8,
    out: &mut [f32],
) {
    let state = &game.state;
    let catalog = game.catalog;
    let main = main_player as usize;
    let my_city = &state.cities[main];
    let opp_city = &state.cities[main ^ 1];
    let card = state.playable_card(playable, catalog);
    let mut i = 0;

    // Yellow and guild cards have long-term implicit value the flat fields
    // miss, so they get their own flags.
    out[i] = (card.kind == CardType::Yellow) as u8 as f32;
    i += 1;
    out[i] = (card.kind == CardType::Guild) as u8 as f32;
    i += 1;

    for r in 0..super::Resource::COUNT {
        out[i] = card.production[r] as f32;
        i += 1;
    }

    if let Some(symbol) = card.science {
        out[i] = if my_city.science_symbols[symbol as usize] > 0 { -1.0 } else { 1.0 };
        out[i + 1] = if opp_city.science_symbols[symbol as usize] > 0 { -1.0 } else { 1.0 };
    } else {
        out[i] = 0.0;
        out[i + 1] = 0.0;
    }
    i += 2;

    let mut gold_reward = 0u32;
    let chained = card
        .chain_in
        .is_some_and(|c| my_city.chaining & c.bit() != 0);
    if chained && my_city.owns_token(ScienceToken::TownPlanning) {
        gold_reward += 4;
    }
    if card.gold_per_card_type {
        gold_reward +=
            my_city.cards_per_type[card.secondary as usize] as u32 * card.gold_reward as u32;
    } else if card.kind == CardType::Guild && (card.secondary as usize) < CardType::COUNT {
        let count = my_city.cards_per_type[card.secondary as usize]
            .max(opp_city.cards_per_type[card.secondary as usize]);
        gold_reward += count as u32 * card.gold_reward as u32;
    } else {
        gold_reward += card.gold_reward as u32;
    }

    let vp = if card.kind != CardType::Guild {
        card.victory_points as u32
    } else if (card.secondary as usize) < CardType::COUNT {
        let count = my_city.cards_per_type[card.secondary as usize]
            .max(opp_city.cards_per_type[card.secondary as usize]);
        card.victory_points as u32 * count as u32
    } else {
        // Usurers: provisional, gold may be spent later, but the signal
        // still helps.
        gold_reward / 3
    };

    out[i] = vp as f32;
    i += 1;
    out[i] = gold_reward as f32;
    i += 1;
    out[i] = card.military as f32;
    i += 1;
    out[i] = card.chain_out.is_some() as u8 as f32;
    i += 1;
    out[i] = card.weak_production as u8 as f32;
    i += 1;
    out[i] = card.resource_discount as u8 as f32;
    i += 1;
    out[i] = my_city.compute_cost(card, opp_city) as f32;
    i += 1;
    out[i] = opp_city.compute_cost(card, my_city) as f32;
    i += 1;
    out[i] = state.graph.discoveries_if_picked(playable) as f32;
    i += 1;

    debug_assert_eq!(i, TENSOR_PER_CARD);
}

pub fn extra_tensor(game: &Controller<'_>, out: &mut [f32; EXTRA_TENSOR]) {
    out.fill(0.0);
    let state = &game.state;

    match game.phase {
        Phase::Play => {
            out[0] = 0.0;
            let cards = &mut out[1..1 + 6 * TENSOR_PER_CARD];
            for i in 0..state.graph.num_playable {
                let offset = i as usize * TENSOR_PER_CARD;
                card_tensor(game, i, state.player, &mut cards[offset..offset + TENSOR_PER_CARD]);
            }
            for i in state.graph.num_playable as usize..6 {
                cards[i * TENSOR_PER_CARD..(i + 1) * TENSOR_PER_CARD].fill(-1.0);
            }

            let wonders = &mut out[1 + 6 * TENSOR_PER_CARD..];
            let city = state.current_city();
            let opp = state.other_city();
            for slot in 0..city.num_wonders {
                let w = city.unbuilt_wonder(slot);
                let card = game.catalog.wonder(w);
                let d = &mut wonders
                    [slot as usize * TENSOR_PER_WONDER..(slot as usize + 1) * TENSOR_PER_WONDER];
                d[0] = card.victory_points as f32;
                d[1] = card.military as f32;
                d[2] = (w.grants_replay() || city.owns_token(ScienceToken::Theology)) as u8 as f32;
                d[3] = if card.weak_production {
                    card.production[super::Resource::Wood as usize] as f32
                } else {
                    0.0
                };
                d[4] = if card.weak_production {
                    card.production[super::Resource::Glass as usize] as f32
                } else {
                    0.0
                };
                d[5] = card.gold_reward as f32;
                d[6] = matches!(w, Wonder::Zeus | Wonder::CircusMaximus) as u8 as f32;
                d[7] = (w == Wonder::GreatLibrary) as u8 as f32;
                d[8] = (w == Wonder::Mausoleum) as u8 as f32;
                d[9] = city.compute_cost(card, opp) as f32;
            }
            for slot in city.num_wonders as usize..4 {
                wonders[slot * TENSOR_PER_WONDER..(slot + 1) * TENSOR_PER_WONDER].fill(-1.0);
            }
        }
        Phase::PickScienceToken
        | Phase::GreatLibraryToken
        | Phase::GreatLibraryTokenThenReplay => {
            out[0] = 1.0;
            let pool: Vec<ScienceToken> = if game.phase == Phase::PickScienceToken {
                state.board_tokens().to_vec()
            } else {
                state.great_library_draft().to_vec()
            };
            for (slot, token) in pool.iter().enumerate() {
                out[1 + slot * ScienceToken::COUNT + *token as usize] = 1.0;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand_core::SeedableRng;

    #[test]
    fn base_tensor_mirrors_military_for_both_sides() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(21);
        let mut game = Controller::with_auto_draft(&catalog, &mut rng);
        game.state.military = 4;

        let mut for_p0 = [0.0f32; BASE_TENSOR];
        let mut for_p1 = [0.0f32; BASE_TENSOR];
        base_tensor(&game.state, 0, &catalog, &mut for_p0);
        base_tensor(&game.state, 1, &catalog, &mut for_p1);
        assert_eq!(for_p0[1], 4.0);
        assert_eq!(for_p1[1], -4.0);
    }

    #[test]
    fn base_tensor_encodes_board_tokens_once_each() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(22);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut out = [0.0f32; BASE_TENSOR];
        base_tensor(&game.state, 0, &catalog, &mut out);
        let ones: f32 = out[4..4 + ScienceToken::COUNT].iter().sum();
        assert_eq!(ones, 5.0);
    }

    #[test]
    fn base_tensor_city_blocks_swap_with_perspective() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(23);
        let mut game = Controller::with_auto_draft(&catalog, &mut rng);
        game.state.cities[0].gold = 11;
        game.state.cities[1].gold = 3;

        let mut out = [0.0f32; BASE_TENSOR];
        base_tensor(&game.state, 0, &catalog, &mut out);
        let city0 = BASE_TENSOR - 2 * CITY_BLOCK;
        // gold sits after 4 chain counts, 5 token flags and the symbol count.
        assert_eq!(out[city0 + 10], 11.0);
        assert_eq!(out[city0 + CITY_BLOCK + 10], 3.0);

        base_tensor(&game.state, 1, &catalog, &mut out);
        assert_eq!(out[city0 + 10], 3.0);
        assert_eq!(out[city0 + CITY_BLOCK + 10], 11.0);
    }

    #[test]
    fn extra_tensor_pads_missing_slots() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(24);
        let game = Controller::with_auto_draft(&catalog, &mut rng);
        let mut out = [0.0f32; EXTRA_TENSOR];
        extra_tensor(&game, &mut out);

        assert_eq!(out[0], 0.0);
        // Age I exposes all 6 playables, so no card padding; the unbuilt
        // wonder rows are fully populated too (4 wonders after the draft).
        assert_eq!(game.state.graph.num_playable, 6);
        let wonders = &out[1 + 6 * TENSOR_PER_CARD..];
        assert!(wonders.iter().all(|&v| v != -1.0));

        // Costs are non-negative where rows are populated.
        for i in 0..6 {
            assert!(out[1 + i * TENSOR_PER_CARD + 15] >= 0.0);
        }
    }

    #[test]
    fn extra_tensor_one_hots_token_pool() {
        let catalog = Catalog::new();
        let mut rng = SmallRng::seed_from_u64(25);
        let mut game = Controller::with_auto_draft(&catalog, &mut rng);
        game.phase = Phase::PickScienceToken;

        let mut out = [0.0f32; EXTRA_TENSOR];
        extra_tensor(&game, &mut out);
        assert_eq!(out[0], 1.0);
        let ones: f32 = out[1..1 + 5 * ScienceToken::COUNT].iter().sum();
        assert_eq!(ones, game.state.num_board_tokens as f32);
    }

    #[test]
    fn tensor_sizes_are_consistent() {
        assert_eq!(BASE_TENSOR, 92);
        assert_eq!(EXTRA_TENSOR, 149);
        assert!(1 + 5 * ScienceToken::COUNT <= EXTRA_TENSOR);
    }
}
