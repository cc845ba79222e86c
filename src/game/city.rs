use super::catalog::{Card, Catalog, INVALID_CARD};
use super::{CardType, Resource, ScienceSymbol, ScienceToken, SpecialAction, Wonder};

/// Upper bound on burned/destroyed cards over a full game (60 site cards
/// plus a handful of wonder destroys).
pub const MAX_DISCARDED: usize = 64;

/// One player's tableau with every derived accumulator kept inline, so the
/// whole city copies with the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerCity {
    pub gold: u8,
    pub victory_points: u8,
    /// Bitset over [`super::ChainSymbol`].
    pub chaining: u32,
    /// Bitset over guild secondary types (bit 9 is the usurers guild).
    pub guilds: u16,
    /// Bitset over [`ScienceToken`].
    pub tokens: u16,
    pub num_science_symbols: u8,
    pub science_symbols: [u8; ScienceSymbol::COUNT],
    pub cards_per_type: [u8; CardType::COUNT],
    pub production: [u8; Resource::COUNT],
    /// Substituting units over {Wood, Clay, Stone}.
    pub weak_normal: u8,
    /// Substituting units over {Glass, Papyrus}.
    pub weak_rare: u8,
    pub discount: [bool; Resource::COUNT],
    /// Card currently granting the highest production per resource
    /// (destroy-effect targets). `INVALID_CARD` when none.
    pub best_production_card: [u8; Resource::COUNT],
    /// Unbuilt wonders as [`Wonder`] indices, `INVALID_CARD`-padded.
    pub wonders: [u8; 4],
    pub num_wonders: u8,
}

impl PlayerCity {
    pub fn new() -> PlayerCity {
        PlayerCity {
            gold: 0,
            victory_points: 0,
            chaining: 0,
            guilds: 0,
            tokens: 0,
            num_science_symbols: 0,
            science_symbols: [0; ScienceSymbol::COUNT],
            cards_per_type: [0; CardType::COUNT],
            production: [0; Resource::COUNT],
            weak_normal: 0,
            weak_rare: 0,
            discount: [false; Resource::COUNT],
            best_production_card: [INVALID_CARD; Resource::COUNT],
            wonders: [INVALID_CARD; 4],
            num_wonders: 0,
        }
    }

    #[inline]
    pub fn owns_token(&self, token: ScienceToken) -> bool {
        self.tokens & token.bit() != 0
    }

    #[inline]
    pub fn unbuilt_wonder(&self, slot: u8) -> Wonder {
        debug_assert!(slot < self.num_wonders);
        Wonder::from_index(self.wonders[slot as usize]).unwrap()
    }

    /// Gold needed to acquire `card` given the opponent's market pressure.
    /// Chained builds are free; otherwise each missing unit costs
    /// 2 + opponent production, capped at 1 by a matching discount.
    pub fn compute_cost(&self, card: &Card, other: &PlayerCity) -> u32 {
        if let Some(chain) = card.chain_in {
            if self.chaining & chain.bit() != 0 {
                return 0;
            }
        }

        let mut price = [0u32; Resource::COUNT];
        for r in 0..Resource::COUNT {
            price[r] = 2 + other.production[r] as u32;
            if self.discount[r] {
                price[r] = 1;
            }
        }

        let mut need = [0u32; Resource::COUNT];
        let mut covered = true;
        for r in 0..Resource::COUNT {
            need[r] = (card.cost[r] as u32).saturating_sub(self.production[r] as u32);
            covered &= need[r] == 0;
        }
        if covered {
            return card.gold_cost as u32;
        }

        // Masonry / Architecture: two free units, spent on the priciest
        // missing resources first.
        if (self.owns_token(ScienceToken::Masonry) && card.kind == CardType::Blue)
            || (self.owns_token(ScienceToken::Architecture) && card.kind == CardType::Wonder)
        {
            let mut order = [0usize, 1, 2, 3, 4];
            order.sort_by(|&a, &b| price[b].cmp(&price[a]));
            let mut free = 2;
            for r in order {
                while free > 0 && need[r] > 0 {
                    need[r] -= 1;
                    free -= 1;
                }
            }
        }

        let mut normal = Resource::NORMAL.map(|r| r as usize);
        normal.sort_by(|&a, &b| price[b].cmp(&price[a]));
        for _ in 0..self.weak_normal {
            for &r in &normal {
                if need[r] > 0 {
                    need[r] -= 1;
                    break;
                }
            }
        }

        let mut rare = Resource::RARE.map(|r| r as usize);
        rare.sort_by(|&a, &b| price[b].cmp(&price[a]));
        for _ in 0..self.weak_rare {
            for &r in &rare {
                if need[r] > 0 {
                    need[r] -= 1;
                    break;
                }
            }
        }

        let units: u32 = (0..Resource::COUNT).map(|r| need[r] * price[r]).sum();
        units + card.gold_cost as u32
    }

    /// Apply a card's effects to this city. The caller has already paid the
    /// cost and handled military; the returned action drives the state
    /// machine (token pick, replay, science win).
    pub fn add_card(&mut self, card: &Card, other: &PlayerCity, catalog: &Catalog) -> SpecialAction {
        let mut action = SpecialAction::Nothing;

        let chained = card
            .chain_in
            .is_some_and(|c| self.chaining & c.bit() != 0);
        if chained && self.owns_token(ScienceToken::TownPlanning) {
            self.gold += 4;
        }

        if let Some(out) = card.chain_out {
            self.chaining |= out.bit();
        }

        if card.gold_per_card_type {
            self.gold += self.cards_per_type[card.secondary as usize] * card.gold_reward;
        } else if card.kind == CardType::Guild && (card.secondary as usize) < CardType::COUNT {
            let count = self.cards_per_type[card.secondary as usize]
                .max(other.cards_per_type[card.secondary as usize]);
            self.gold += count * card.gold_reward;
        } else {
            self.gold += card.gold_reward;
        }

        if card.kind == CardType::Brown || card.kind == CardType::Grey {
            for r in 0..Resource::COUNT {
                if card.production[r] > 0 {
                    let best = self.best_production_card[r];
                    if best == INVALID_CARD
                        || card.production[r] > catalog.card(best).production[r]
                    {
                        self.best_production_card[r] = card.id;
                    }
                }
            }
        }

        self.cards_per_type[card.kind as usize] += 1;
        if card.kind != CardType::Guild {
            self.victory_points += card.victory_points;
        }

        if card.resource_discount {
            for r in 0..Resource::COUNT {
                self.discount[r] |= card.production[r] > 0;
            }
        } else if card.weak_production {
            self.weak_normal += card.production[Resource::Wood as usize];
            self.weak_rare += card.production[Resource::Glass as usize];
        } else {
            for r in 0..Resource::COUNT {
                self.production[r] += card.production[r];
            }
        }

        match card.kind {
            CardType::Science => {
                let s = card.science.unwrap() as usize;
                self.science_symbols[s] += 1;
                debug_assert!(self.science_symbols[s] < 3);
                if self.science_symbols[s] == 2 {
                    action = SpecialAction::TakeScienceToken;
                } else {
                    self.num_science_symbols += 1;
                }
            }
            CardType::Guild => {
                self.guilds |= 1 << card.secondary;
            }
            CardType::Token => {
                let token = ScienceToken::from_index(card.secondary).unwrap();
                if token == ScienceToken::Mathematics {
                    self.victory_points += 3 * self.tokens.count_ones() as u8;
                }
                if token == ScienceToken::Law {
                    self.science_symbols[ScienceSymbol::Law as usize] += 1;
                    self.num_science_symbols += 1;
                }
                self.tokens |= token.bit();
                if self.owns_token(ScienceToken::Mathematics) {
                    self.victory_points += 3;
                }
            }
            CardType::Wonder => {
                let wonder = Wonder::from_index(card.secondary).unwrap();
                if wonder.grants_replay() || self.owns_token(ScienceToken::Theology) {
                    action = SpecialAction::Replay;
                }
            }
            _ => {}
        }

        if self.num_science_symbols == 6 {
            return SpecialAction::ScienceWin;
        }
        action
    }

    /// Rollback for destroyed production cards (Zeus / Circus Maximus).
    pub fn remove_card(&mut self, card: &Card) {
        debug_assert!(card.kind == CardType::Brown || card.kind == CardType::Grey);
        debug_assert!(card.chain_in.is_none() && card.chain_out.is_none());

        for r in 0..Resource::COUNT {
            self.production[r] -= card.production[r];
            // The destroyed card can no longer be targeted again.
            if self.best_production_card[r] == card.id {
                self.best_production_card[r] = INVALID_CARD;
            }
        }
        self.cards_per_type[card.kind as usize] -= 1;
    }

    /// Civil victory points. `include_gold` adds the gold/3 component (the
    /// tensorizer wants it without).
    pub fn victory_points(&self, other: &PlayerCity, catalog: &Catalog, include_gold: bool) -> u32 {
        let mut gold_vp = 0;
        if include_gold {
            gold_vp = self.gold as u32 / 3;
            if self.guilds & (1 << CardType::COUNT as u16) != 0 {
                gold_vp *= 2;
            }
        }

        let mut guild_vp = 0;
        for card in catalog.guild_cards() {
            let bonus_type = card.secondary as usize;
            if bonus_type < CardType::COUNT && self.guilds & (1 << card.secondary) != 0 {
                let mut mine = self.cards_per_type[bonus_type] as u32;
                let mut theirs = other.cards_per_type[bonus_type] as u32;
                // The shipowners guild scores brown and grey together.
                if bonus_type == CardType::Brown as usize {
                    mine += self.cards_per_type[CardType::Grey as usize] as u32;
                    theirs += other.cards_per_type[CardType::Grey as usize] as u32;
                }
                guild_vp += card.victory_points as u32 * mine.max(theirs);
            }
        }

        self.victory_points as u32 + gold_vp + guild_vp
    }
}

impl Default for PlayerCity {
    fn default() -> Self {
        Self::new()
    }
}

/// Burned and destroyed cards. The flat `cards` list is the legal revive
/// pool for the Mausoleum; the categorized fields summarize the pile for the
/// tensorizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiscardPile {
    pub cards: [u8; MAX_DISCARDED],
    pub len: u8,
    pub best_production: [u8; Resource::COUNT],
    pub best_blue: u8,
    pub best_military: u8,
    pub science: [u8; ScienceSymbol::COUNT],
    pub guilds: [u8; 7],
    pub num_guilds: u8,
    pub best_yellow_gold: u8,
    pub yellow_weak_normal: u8,
    pub yellow_weak_rare: u8,
    pub yellow_discount: [u8; 4],
    pub num_yellow_discount: u8,
    pub yellow_gold_per_type: [u8; 5],
    pub num_yellow_gold_per_type: u8,
}

impl DiscardPile {
    pub fn new() -> DiscardPile {
        DiscardPile {
            cards: [INVALID_CARD; MAX_DISCARDED],
            len: 0,
            best_production: [INVALID_CARD; Resource::COUNT],
            best_blue: INVALID_CARD,
            best_military: INVALID_CARD,
            science: [INVALID_CARD; ScienceSymbol::COUNT],
            guilds: [INVALID_CARD; 7],
            num_guilds: 0,
            best_yellow_gold: INVALID_CARD,
            yellow_weak_normal: INVALID_CARD,
            yellow_weak_rare: INVALID_CARD,
            yellow_discount: [INVALID_CARD; 4],
            num_yellow_discount: 0,
            yellow_gold_per_type: [INVALID_CARD; 5],
            num_yellow_gold_per_type: 0,
        }
    }

    /// All discarded card ids, in discard order.
    pub fn cards(&self) -> &[u8] {
        &self.cards[..self.len as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn add(&mut self, catalog: &Catalog, card: &Card) {
        debug_assert!((self.len as usize) < MAX_DISCARDED);
        self.cards[self.len as usize] = card.id;
        self.len += 1;

        match card.kind {
            CardType::Brown | CardType::Grey => {
                for r in 0..Resource::COUNT {
                    if card.production[r] > 0 {
                        let best = self.best_production[r];
                        if best == INVALID_CARD
                            || card.production[r] > catalog.card(best).production[r]
                        {
                            self.best_production[r] = card.id;
                        }
                    }
                }
            }
            CardType::Blue => {
                if self.best_blue == INVALID_CARD
                    || card.victory_points > catalog.card(self.best_blue).victory_points
                {
                    self.best_blue = card.id;
                }
            }
            CardType::Military => {
                if self.best_military == INVALID_CARD
                    || card.military > catalog.card(self.best_military).military
                {
                    self.best_military = card.id;
                }
            }
            CardType::Science => {
                let s = card.science.unwrap() as usize;
                self.science[s] = card.id;
            }
            CardType::Guild => {
                if (self.num_guilds as usize) < self.guilds.len() {
                    self.guilds[self.num_guilds as usize] = card.id;
                    self.num_guilds += 1;
                }
            }
            CardType::Yellow => {
                if card.gold_reward > 0 && !card.gold_per_card_type {
                    if self.best_yellow_gold == INVALID_CARD
                        || card.gold_reward > catalog.card(self.best_yellow_gold).gold_reward
                    {
                        self.best_yellow_gold = card.id;
                    }
                }
                if card.weak_production {
                    let rare = card.production[Resource::Glass as usize] > 0
                        || card.production[Resource::Papyrus as usize] > 0;
                    let slot = if rare {
                        &mut self.yellow_weak_rare
                    } else {
                        &mut self.yellow_weak_normal
                    };
                    if *slot == INVALID_CARD {
                        *slot = card.id;
                    }
                }
                if card.resource_discount {
                    let seen = self.yellow_discount[..self.num_yellow_discount as usize]
                        .contains(&card.id);
                    if !seen && (self.num_yellow_discount as usize) < self.yellow_discount.len() {
                        self.yellow_discount[self.num_yellow_discount as usize] = card.id;
                        self.num_yellow_discount += 1;
                    }
                }
                if card.gold_per_card_type {
                    let seen = self.yellow_gold_per_type[..self.num_yellow_gold_per_type as usize]
                        .contains(&card.id);
                    if !seen
                        && (self.num_yellow_gold_per_type as usize)
                            < self.yellow_gold_per_type.len()
                    {
                        self.yellow_gold_per_type[self.num_yellow_gold_per_type as usize] =
                            card.id;
                        self.num_yellow_gold_per_type += 1;
                    }
                }
            }
            _ => {}
        }
    }
}

impl Default for DiscardPile {
    fn default() -> Self {
        Self::new()
    }
}
