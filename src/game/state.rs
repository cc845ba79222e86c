use rand::seq::SliceRandom;
use rand::Rng;

use super::catalog::{Card, Catalog, MAX_CARDS_PER_AGE};
use super::city::{DiscardPile, PlayerCity};
use super::graph::AgeGraph;
use super::{CardType, ScienceToken, SpecialAction, Wonder};

/// `age` value before Age I starts (during the wonder draft).
pub const NO_AGE: u8 = u8::MAX;

/// Tokens face-up on the board at game start; the rest form the
/// great-library reserve.
pub const NUM_BOARD_TOKENS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextAge {
    Stay,
    Advance,
    EndGame,
}

/// Full game snapshot. Everything is inline and `Copy`; cloning a state is a
/// memcpy, which is what makes per-node search clones affordable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameState {
    pub cities: [PlayerCity; 2],
    /// First `num_board_tokens` entries are pickable on a science pair; the
    /// tail `[5..10]` is the great-library reserve.
    pub science_pool: [ScienceToken; ScienceToken::COUNT],
    pub num_board_tokens: u8,
    pub deterministic: bool,
    pub graphs: [AgeGraph; 3],
    /// Working copy of the current age's graph.
    pub graph: AgeGraph,
    pub played_age_cards: [u8; MAX_CARDS_PER_AGE],
    pub num_played: u8,
    pub discard: DiscardPile,
    pub turn: u8,
    pub player: u8,
    pub age: u8,
    /// Positive favors player 0; `|military| >= 9` ends the game.
    pub military: i8,
    pub military_token2: [bool; 2],
    pub military_token5: [bool; 2],
    /// Shuffled wonder indices; each draft round consumes a quartet.
    pub wonder_pool: [u8; Wonder::COUNT],
    /// 0 or 1 while drafting, 2 once play begins.
    pub draft_round: u8,
    pub draft_picks: u8,
}

impl GameState {
    pub fn new<R: Rng>(rng: &mut R) -> GameState {
        let mut science_pool = ScienceToken::ALL;
        science_pool.shuffle(rng);

        let mut wonder_pool = [0u8; Wonder::COUNT];
        for (i, slot) in wonder_pool.iter_mut().enumerate() {
            *slot = i as u8;
        }
        wonder_pool.shuffle(rng);

        let mut city = PlayerCity::new();
        city.gold = 7;

        GameState {
            cities: [city; 2],
            science_pool,
            num_board_tokens: NUM_BOARD_TOKENS as u8,
            deterministic: false,
            graphs: [AgeGraph::zeroed(); 3],
            graph: AgeGraph::zeroed(),
            played_age_cards: [0; MAX_CARDS_PER_AGE],
            num_played: 0,
            discard: DiscardPile::new(),
            turn: 0,
            player: 0,
            age: NO_AGE,
            military: 0,
            military_token2: [false; 2],
            military_token5: [false; 2],
            wonder_pool,
            draft_round: 0,
            draft_picks: 0,
        }
    }

    #[inline]
    pub fn is_drafting(&self) -> bool {
        self.draft_round < 2
    }

    #[inline]
    pub fn num_draftable_wonders(&self) -> u8 {
        if self.is_drafting() {
            4 - self.draft_picks
        } else {
            0
        }
    }

    pub fn draftable_wonder(&self, index: u8) -> Wonder {
        debug_assert!(self.is_drafting() && index < self.num_draftable_wonders());
        let first = (self.draft_round * 4 + self.draft_picks) as usize;
        Wonder::from_index(self.wonder_pool[first + index as usize]).unwrap()
    }

    #[inline]
    pub fn current_city(&self) -> &PlayerCity {
        &self.cities[self.player as usize]
    }

    #[inline]
    pub fn other_city(&self) -> &PlayerCity {
        &self.cities[(self.player ^ 1) as usize]
    }

    pub fn playable_card<'a>(&self, index: u8, catalog: &'a Catalog) -> &'a Card {
        debug_assert!(index < self.graph.num_playable);
        let node = self.graph.playable[index as usize];
        catalog.card(self.graph.nodes[node as usize].card() as u8)
    }

    pub fn board_tokens(&self) -> &[ScienceToken] {
        &self.science_pool[..self.num_board_tokens as usize]
    }

    /// The three reserve tokens offered by the Great Library. The reserve is
    /// shuffled when the wonder is built, so this is a pure read.
    pub fn great_library_draft(&self) -> [ScienceToken; 3] {
        [
            self.science_pool[NUM_BOARD_TOKENS],
            self.science_pool[NUM_BOARD_TOKENS + 1],
            self.science_pool[NUM_BOARD_TOKENS + 2],
        ]
    }

    #[inline]
    pub fn next_player(&mut self) {
        self.turn += 1;
        self.player ^= 1;
    }

    /// Wonder draft: the round starter picks one, the opponent picks two,
    /// the remaining wonder of the quartet goes back to the starter. Player 1
    /// starts round 2.
    pub fn draft_wonder<R: Rng>(&mut self, index: u8, catalog: &Catalog, rng: &mut R) {
        {
            let first = (self.draft_round * 4 + self.draft_picks) as usize;
            let last = (self.draft_round as usize + 1) * 4 - 1;
            let pick = first + index as usize;
            debug_assert!(self.is_drafting() && pick <= last);

            let city = &mut self.cities[self.player as usize];
            debug_assert!(city.num_wonders < 4);
            city.wonders[city.num_wonders as usize] = self.wonder_pool[pick];
            city.num_wonders += 1;

            self.wonder_pool.swap(pick, first);
            self.draft_picks += 1;
        }

        let starter = self.draft_round;
        match self.draft_picks {
            1 => self.player = (starter + 1) % 2,
            2 => {} // the opponent picks a second wonder
            3 => {
                // Last wonder of the quartet goes to the round starter.
                let first = (self.draft_round * 4 + self.draft_picks) as usize;
                let remaining = self.wonder_pool[first];
                let starter_city = &mut self.cities[starter as usize];
                starter_city.wonders[starter_city.num_wonders as usize] = remaining;
                starter_city.num_wonders += 1;

                self.draft_round += 1;
                self.draft_picks = 0;

                if self.draft_round < 2 {
                    if !self.deterministic {
                        self.wonder_pool[4..].shuffle(rng);
                    }
                    self.player = 1;
                } else {
                    self.player = 0;
                    self.init_age(0, catalog, rng);
                }
            }
            _ => unreachable!(),
        }
    }

    fn init_age<R: Rng>(&mut self, age: u8, catalog: &Catalog, rng: &mut R) {
        self.age = age;
        if !self.deterministic {
            self.graphs[age as usize] = match age {
                0 => AgeGraph::age1(catalog, rng, false),
                1 => AgeGraph::age2(catalog, rng, false),
                _ => AgeGraph::age3(catalog, rng, false),
            };
        }
        self.graph = self.graphs[age as usize];
        self.num_played = 0;
    }

    fn update_military(&mut self, shields: u8, strategy_token: bool) {
        if shields == 0 {
            return;
        }
        let total = (shields + strategy_token as u8) as i8;
        self.military += if self.player == 0 { total } else { -total };
        self.military = self.military.clamp(-9, 9);

        if self.military >= 3 && !self.military_token2[0] {
            self.military_token2[0] = true;
            self.cities[1].gold = self.cities[1].gold.saturating_sub(2);
        }
        if self.military >= 6 && !self.military_token5[0] {
            self.military_token5[0] = true;
            self.cities[1].gold = self.cities[1].gold.saturating_sub(5);
        }
        if self.military <= -3 && !self.military_token2[1] {
            self.military_token2[1] = true;
            self.cities[0].gold = self.cities[0].gold.saturating_sub(2);
        }
        if self.military <= -6 && !self.military_token5[1] {
            self.military_token5[1] = true;
            self.cities[0].gold = self.cities[0].gold.saturating_sub(5);
        }
    }

    /// Remove a playable node from the graph and return its card id.
    fn take_card<R: Rng>(&mut self, playable_index: u8, catalog: &Catalog, rng: &mut R) -> u8 {
        let node = self.graph.take_playable(playable_index);
        self.graph.unlink(node, catalog, rng);
        let card_id = self.graph.nodes[node as usize].card() as u8;
        self.played_age_cards[self.num_played as usize] = catalog.card(card_id).age_id;
        self.num_played += 1;
        card_id
    }

    pub fn pick<R: Rng>(
        &mut self,
        playable_index: u8,
        catalog: &Catalog,
        rng: &mut R,
    ) -> SpecialAction {
        let card_id = self.take_card(playable_index, catalog, rng);
        let card = catalog.card(card_id);

        let p = self.player as usize;
        let o = p ^ 1;
        let cost = self.cities[p].compute_cost(card, &self.cities[o]);
        debug_assert!(self.cities[p].gold as u32 >= cost);
        self.cities[p].gold -= cost as u8;

        if self.cities[o].owns_token(ScienceToken::Economy) && cost >= card.gold_cost as u32 {
            self.cities[o].gold += cost as u8 - card.gold_cost;
        }

        self.update_military(card.military, self.cities[p].owns_token(ScienceToken::Strategy));

        let other = self.cities[o];
        let action = self.cities[p].add_card(card, &other, catalog);

        if self.military.unsigned_abs() >= 9 {
            SpecialAction::MilitaryWin
        } else {
            action
        }
    }

    pub fn burn<R: Rng>(&mut self, playable_index: u8, catalog: &Catalog, rng: &mut R) {
        let card_id = self.take_card(playable_index, catalog, rng);
        self.discard.add(catalog, catalog.card(card_id));

        let p = self.player as usize;
        let reward = 2 + self.cities[p].cards_per_type[CardType::Yellow as usize];
        self.cities[p].gold += reward;
    }

    pub fn build_wonder<R: Rng>(
        &mut self,
        playable_index: u8,
        wonder_slot: u8,
        additional: Option<u8>,
        catalog: &Catalog,
        rng: &mut R,
    ) -> SpecialAction {
        let _ = self.take_card(playable_index, catalog, rng);

        let p = self.player as usize;
        let o = p ^ 1;

        let city = &mut self.cities[p];
        debug_assert!(wonder_slot < city.num_wonders);
        let wonder =
            Wonder::from_index(city.wonders[wonder_slot as usize]).unwrap();
        city.wonders
            .swap(wonder_slot as usize, city.num_wonders as usize - 1);
        city.num_wonders -= 1;

        let wonder_card = catalog.wonder(wonder);
        let cost = self.cities[p].compute_cost(wonder_card, &self.cities[o]);
        debug_assert!(self.cities[p].gold as u32 >= cost);
        self.cities[p].gold -= cost as u8;

        let mut revive_action = SpecialAction::Nothing;
        match wonder {
            Wonder::ViaAppia => {
                self.cities[o].gold = self.cities[o].gold.saturating_sub(3);
            }
            Wonder::Zeus | Wonder::CircusMaximus => {
                if let Some(target) = additional {
                    let destroyed = catalog.card(target);
                    self.discard.add(catalog, destroyed);
                    self.cities[o].remove_card(destroyed);
                }
            }
            Wonder::Mausoleum => {
                if let Some(target) = additional {
                    let revived = catalog.card(target);
                    let other = self.cities[o];
                    revive_action = self.cities[p].add_card(revived, &other, catalog);
                }
            }
            Wonder::GreatLibrary => {
                if !self.deterministic {
                    self.science_pool[NUM_BOARD_TOKENS..].shuffle(rng);
                }
            }
            _ => {}
        }

        // The strategy token only boosts military cards, not wonders.
        self.update_military(wonder_card.military, false);

        let other = self.cities[o];
        let action = self.cities[p].add_card(wonder_card, &other, catalog);

        if self.military.unsigned_abs() >= 9 {
            return SpecialAction::MilitaryWin;
        }
        combine_actions(action, revive_action)
    }

    /// `slot` indexes the board pool, or the great-library triple when
    /// `from_library` is set (library tokens leave the reserve untouched:
    /// there is only one Great Library).
    pub fn pick_science_token(
        &mut self,
        slot: u8,
        from_library: bool,
        catalog: &Catalog,
    ) -> SpecialAction {
        let token = if from_library {
            debug_assert!(slot < 3);
            self.science_pool[NUM_BOARD_TOKENS + slot as usize]
        } else {
            debug_assert!(slot < self.num_board_tokens);
            let token = self.science_pool[slot as usize];
            self.science_pool
                .swap(slot as usize, self.num_board_tokens as usize - 1);
            self.num_board_tokens -= 1;
            token
        };

        let p = self.player as usize;
        let other = self.cities[p ^ 1];
        self.cities[p].add_card(catalog.token(token), &other, catalog)
    }

    /// Advance to the next age once the board is empty. The player trailing
    /// in military starts the new age; a tie keeps the last player.
    pub fn next_age<R: Rng>(&mut self, catalog: &Catalog, rng: &mut R) -> NextAge {
        if self.graph.num_playable != 0 {
            return NextAge::Stay;
        }
        match self.age {
            0 | 1 => {
                let next = self.age + 1;
                self.init_age(next, catalog, rng);
            }
            2 => return NextAge::EndGame,
            _ => unreachable!(),
        }

        if self.military < 0 {
            self.player = 0;
        } else if self.military > 0 {
            self.player = 1;
        }
        NextAge::Advance
    }

    /// Civil end-of-game winner: VP with gold and guilds, military 2/5/10
    /// bonus, blue-count tiebreak.
    pub fn find_winner(&self, catalog: &Catalog) -> u8 {
        let mut vp0 = self.cities[0].victory_points(&self.cities[1], catalog, true);
        let mut vp1 = self.cities[1].victory_points(&self.cities[0], catalog, true);

        if self.military >= 6 {
            vp0 += 10;
        } else if self.military >= 3 {
            vp0 += 5;
        } else if self.military >= 1 {
            vp0 += 2;
        }
        if self.military <= -6 {
            vp1 += 10;
        } else if self.military <= -3 {
            vp1 += 5;
        } else if self.military <= -1 {
            vp1 += 2;
        }

        if vp0 == vp1 {
            let blue0 = self.cities[0].cards_per_type[CardType::Blue as usize];
            let blue1 = self.cities[1].cards_per_type[CardType::Blue as usize];
            if blue0 > blue1 {
                0
            } else {
                1
            }
        } else if vp0 > vp1 {
            0
        } else {
            1
        }
    }

    /// Resolve every hidden draw in the remaining game: undrafted wonders,
    /// the great-library reserve order, future-age graphs and every
    /// face-down slot of the active graph. One-shot; calling again is a
    /// no-op, so the transition is idempotent.
    pub fn determinize<R: Rng>(&mut self, catalog: &Catalog, rng: &mut R) {
        if self.deterministic {
            return;
        }

        if self.is_drafting() {
            let first = ((self.draft_round + 1) * 4) as usize;
            self.wonder_pool[first..].shuffle(rng);
        }
        self.science_pool[NUM_BOARD_TOKENS..].shuffle(rng);

        if self.is_drafting() {
            self.graphs[0] = AgeGraph::age1(catalog, rng, true);
        }
        if self.is_drafting() || self.age < 1 {
            self.graphs[1] = AgeGraph::age2(catalog, rng, true);
        }
        if self.is_drafting() || self.age < 2 {
            self.graphs[2] = AgeGraph::age3(catalog, rng, true);
        }

        if !self.is_drafting() {
            self.graph.resolve_all(catalog, rng);
        }
        self.deterministic = true;
    }
}

/// Wonder side effects can stack a revived-card action on top of the
/// wonder's own; wins dominate, a pending token pick beats a replay.
fn combine_actions(wonder: SpecialAction, revive: SpecialAction) -> SpecialAction {
    use SpecialAction::*;
    match (wonder, revive) {
        (_, ScienceWin) | (ScienceWin, _) => ScienceWin,
        (_, MilitaryWin) | (MilitaryWin, _) => MilitaryWin,
        (_, TakeScienceToken) | (TakeScienceToken, _) => TakeScienceToken,
        (_, Replay) | (Replay, _) => Replay,
        _ => Nothing,
    }
}
