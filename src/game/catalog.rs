use super::{CardType, ChainSymbol, Resource, ScienceSymbol, ScienceToken, Wonder};

/// Sentinel for "no card" in u8 id slots.
pub const INVALID_CARD: u8 = u8::MAX;

/// Upper bound on cards drafted in a single age (20 sites, 23-card pools).
pub const MAX_CARDS_PER_AGE: usize = 30;

/// One immutable card record. Everything at runtime refers to cards by their
/// global `id` and resolves against the [`Catalog`], so game states stay
/// bit-copyable.
#[derive(Clone, Debug)]
pub struct Card {
    pub name: &'static str,
    pub id: u8,
    pub age_id: u8,
    pub kind: CardType,
    pub chain_in: Option<ChainSymbol>,
    pub chain_out: Option<ChainSymbol>,
    pub production: [u8; Resource::COUNT],
    pub gold_reward: u8,
    pub weak_production: bool,
    pub resource_discount: bool,
    pub cost: [u8; Resource::COUNT],
    pub gold_cost: u8,
    pub victory_points: u8,
    pub military: u8,
    pub science: Option<ScienceSymbol>,
    /// Gold reward scales with the owned count of `secondary`'s card type.
    pub gold_per_card_type: bool,
    pub extra_turn: bool,
    /// Guild bonus type, wonder index or token index depending on `kind`.
    pub secondary: u8,
}

impl Card {
    fn base(kind: CardType, name: &'static str) -> Card {
        Card {
            name,
            id: INVALID_CARD,
            age_id: INVALID_CARD,
            kind,
            chain_in: None,
            chain_out: None,
            production: [0; Resource::COUNT],
            gold_reward: 0,
            weak_production: false,
            resource_discount: false,
            cost: [0; Resource::COUNT],
            gold_cost: 0,
            victory_points: 0,
            military: 0,
            science: None,
            gold_per_card_type: false,
            extra_turn: false,
            secondary: 0,
        }
    }

    fn blue(name: &'static str, vp: u8) -> Card {
        let mut c = Card::base(CardType::Blue, name);
        c.victory_points = vp;
        c
    }

    fn brown(name: &'static str, resource: Resource, amount: u8) -> Card {
        let mut c = Card::base(CardType::Brown, name);
        c.production[resource as usize] = amount;
        c
    }

    fn grey(name: &'static str, resource: Resource) -> Card {
        let mut c = Card::base(CardType::Grey, name);
        c.production[resource as usize] = 1;
        c
    }

    fn military(name: &'static str, shields: u8) -> Card {
        let mut c = Card::base(CardType::Military, name);
        c.military = shields;
        c
    }

    fn yellow(name: &'static str, vp: u8) -> Card {
        let mut c = Card::base(CardType::Yellow, name);
        c.victory_points = vp;
        c
    }

    fn science(name: &'static str, symbol: ScienceSymbol, vp: u8) -> Card {
        let mut c = Card::base(CardType::Science, name);
        c.science = Some(symbol);
        c.victory_points = vp;
        c
    }

    /// `bonus` is the card type the guild scores per copy of; `None` is the
    /// usurers guild (gold-VP doubling).
    fn guild(name: &'static str, bonus: Option<CardType>, gold: u8, vp: u8) -> Card {
        let mut c = Card::base(CardType::Guild, name);
        c.secondary = bonus.map_or(CardType::COUNT as u8, |t| t as u8);
        c.gold_reward = gold;
        c.victory_points = vp;
        c
    }

    fn token(token: ScienceToken, name: &'static str, gold: u8, vp: u8) -> Card {
        let mut c = Card::base(CardType::Token, name);
        c.secondary = token as u8;
        c.gold_reward = gold;
        c.victory_points = vp;
        c
    }

    fn wonder(wonder: Wonder, name: &'static str, vp: u8, extra_turn: bool) -> Card {
        let mut c = Card::base(CardType::Wonder, name);
        c.secondary = wonder as u8;
        c.victory_points = vp;
        c.extra_turn = extra_turn;
        c
    }

    fn cost(mut self, resources: &[Resource]) -> Card {
        for &r in resources {
            self.cost[r as usize] += 1;
        }
        self
    }

    fn gold_cost(mut self, gold: u8) -> Card {
        self.gold_cost = gold;
        self
    }

    fn gold(mut self, reward: u8) -> Card {
        self.gold_reward = reward;
        self
    }

    fn gold_per_type(mut self, gold: u8, rewarded: CardType) -> Card {
        self.gold_reward = gold;
        self.gold_per_card_type = true;
        self.secondary = rewarded as u8;
        self
    }

    fn shields(mut self, shields: u8) -> Card {
        self.military = shields;
        self
    }

    fn chain_in(mut self, symbol: ChainSymbol) -> Card {
        self.chain_in = Some(symbol);
        self
    }

    fn chain_out(mut self, symbol: ChainSymbol) -> Card {
        self.chain_out = Some(symbol);
        self
    }

    /// Market discount on the listed resources.
    fn discount(mut self, resources: &[Resource]) -> Card {
        self.resource_discount = true;
        for &r in resources {
            self.production[r as usize] = 1;
        }
        self
    }

    /// Weak (substituting) production over a resource group.
    fn weak(mut self, resources: &[Resource]) -> Card {
        self.weak_production = true;
        for &r in resources {
            self.production[r as usize] = 1;
        }
        self
    }
}

/// Construct-once table of every card, wonder and science token. Runtime
/// randomness (shuffles, pool draws) lives with the callers; the catalog is
/// shared by reference and never mutates.
pub struct Catalog {
    cards: Vec<Card>,
    age_start: [u8; 3],
    age_count: [u8; 3],
    guild_start: u8,
    wonder_start: u8,
    token_start: u8,
}

pub const NUM_GUILD_CARDS: usize = 7;

impl Catalog {
    pub fn new() -> Catalog {
        let mut cards = Vec::with_capacity(95);
        let mut age_start = [0u8; 3];
        let mut age_count = [0u8; 3];

        let mut push_age = |cards: &mut Vec<Card>, age: usize, batch: Vec<Card>, start: u8| {
            age_start[age] = cards.len() as u8;
            age_count[age] = batch.len() as u8;
            let mut local = start;
            for mut card in batch {
                card.id = cards.len() as u8;
                card.age_id = local;
                local += 1;
                cards.push(card);
            }
        };

        push_age(&mut cards, 0, Self::age1_cards(), 0);
        push_age(&mut cards, 1, Self::age2_cards(), 0);
        push_age(&mut cards, 2, Self::age3_cards(), 0);

        let guild_start = cards.len() as u8;
        // Guild cards extend the age III pool, so their age-local ids continue
        // after the 20 regular cards.
        let mut local = age_count[2];
        for mut card in Self::guild_cards_table() {
            card.id = cards.len() as u8;
            card.age_id = local;
            local += 1;
            cards.push(card);
        }

        let wonder_start = cards.len() as u8;
        for mut card in Self::wonder_table() {
            card.id = cards.len() as u8;
            cards.push(card);
        }

        let token_start = cards.len() as u8;
        for mut card in Self::token_table() {
            card.id = cards.len() as u8;
            cards.push(card);
        }

        Catalog {
            cards,
            age_start,
            age_count,
            guild_start,
            wonder_start,
            token_start,
        }
    }

    #[inline]
    pub fn card(&self, id: u8) -> &Card {
        &self.cards[id as usize]
    }

    #[inline]
    pub fn age_card_count(&self, age: u8) -> u8 {
        self.age_count[age as usize]
    }

    /// Card at `index` within the given age's draw pool.
    #[inline]
    pub fn age_card(&self, age: u8, index: u8) -> &Card {
        debug_assert!(index < self.age_count[age as usize]);
        &self.cards[self.age_start[age as usize] as usize + index as usize]
    }

    #[inline]
    pub fn guild_card(&self, index: u8) -> &Card {
        debug_assert!((index as usize) < NUM_GUILD_CARDS);
        &self.cards[self.guild_start as usize + index as usize]
    }

    pub fn guild_cards(&self) -> &[Card] {
        &self.cards[self.guild_start as usize..self.guild_start as usize + NUM_GUILD_CARDS]
    }

    #[inline]
    pub fn wonder(&self, wonder: Wonder) -> &Card {
        &self.cards[self.wonder_start as usize + wonder as usize]
    }

    #[inline]
    pub fn token(&self, token: ScienceToken) -> &Card {
        &self.cards[self.token_start as usize + token as usize]
    }

    pub fn num_cards(&self) -> usize {
        self.cards.len()
    }

    fn age1_cards() -> Vec<Card> {
        use ChainSymbol as CS;
        use Resource as RT;
        vec![
            Card::blue("Autel", 3).chain_out(CS::Moon),
            Card::blue("Bains", 3).cost(&[RT::Stone]).chain_out(CS::WaterDrop),
            Card::blue("Theater", 3).chain_out(CS::Mask),
            Card::brown("Chantier", RT::Wood, 1),
            Card::brown("Exploitation", RT::Wood, 1).gold_cost(1),
            Card::brown("BassinArgileux", RT::Clay, 1),
            Card::brown("Cavite", RT::Clay, 1).gold_cost(1),
            Card::brown("Gisement", RT::Stone, 1),
            Card::brown("Mine", RT::Stone, 1).gold_cost(1),
            Card::grey("Verrerie", RT::Glass).gold_cost(1),
            Card::grey("Presse", RT::Papyrus).gold_cost(1),
            Card::yellow("Taverne", 0).gold(4).chain_out(CS::Jar),
            Card::yellow("DepotBois", 0).gold_cost(3).discount(&[RT::Wood]),
            Card::yellow("DepotArgile", 0).gold_cost(3).discount(&[RT::Clay]),
            Card::yellow("DepotPierre", 0).gold_cost(3).discount(&[RT::Stone]),
            Card::military("TourDeGarde", 1),
            Card::military("Caserne", 1).cost(&[RT::Clay]).chain_out(CS::Sword),
            Card::military("Ecurie", 1).cost(&[RT::Wood]).chain_out(CS::Horseshoe),
            Card::military("Palissade", 1).gold_cost(2).chain_out(CS::Tower),
            Card::science("Apothicaire", ScienceSymbol::Wheel, 1).cost(&[RT::Glass]),
            Card::science("Atelier", ScienceSymbol::Triangle, 1).cost(&[RT::Papyrus]),
            Card::science("Scriptorium", ScienceSymbol::Script, 0)
                .gold_cost(2)
                .chain_out(CS::Book),
            Card::science("Officine", ScienceSymbol::Bowl, 0)
                .gold_cost(2)
                .chain_out(CS::Gear),
        ]
    }

    fn age2_cards() -> Vec<Card> {
        use ChainSymbol as CS;
        use Resource as RT;
        vec![
            Card::blue("Tribunal", 5).cost(&[RT::Wood, RT::Wood, RT::Glass]),
            Card::blue("Statue", 4)
                .cost(&[RT::Clay, RT::Clay])
                .chain_in(CS::Mask)
                .chain_out(CS::GreekPillar),
            Card::blue("Temple", 4)
                .cost(&[RT::Wood, RT::Papyrus])
                .chain_in(CS::Moon)
                .chain_out(CS::Sun),
            Card::blue("Aqueduc", 5)
                .cost(&[RT::Stone, RT::Stone, RT::Stone])
                .chain_in(CS::WaterDrop),
            Card::blue("Rostres", 4)
                .cost(&[RT::Stone, RT::Wood])
                .chain_out(CS::Bank),
            Card::brown("Scierie", RT::Wood, 2).gold_cost(2),
            Card::brown("Briquerie", RT::Clay, 2).gold_cost(2),
            Card::brown("Carriere", RT::Stone, 2).gold_cost(2),
            Card::grey("Soufflerie", RT::Glass),
            Card::grey("Sechoire", RT::Papyrus),
            Card::yellow("Brasserie", 0).gold(6).chain_out(CS::Barrel),
            Card::yellow("Caravanserail", 0)
                .gold_cost(2)
                .cost(&[RT::Glass, RT::Papyrus])
                .weak(&[RT::Wood, RT::Clay, RT::Stone]),
            Card::yellow("Forum", 0)
                .gold_cost(3)
                .cost(&[RT::Clay])
                .weak(&[RT::Glass, RT::Papyrus]),
            Card::yellow("Douane", 0)
                .gold_cost(4)
                .discount(&[RT::Papyrus, RT::Glass]),
            Card::military("Haras", 1)
                .cost(&[RT::Clay, RT::Wood])
                .chain_in(CS::Horseshoe),
            Card::military("Baraquements", 1).gold_cost(3).chain_in(CS::Sword),
            Card::military("ChampsDeTir", 2)
                .cost(&[RT::Stone, RT::Wood, RT::Papyrus])
                .chain_out(CS::Target),
            Card::military("PlaceArmes", 2)
                .cost(&[RT::Clay, RT::Clay, RT::Glass])
                .chain_out(CS::Helmet),
            Card::military("Muraille", 2).cost(&[RT::Stone, RT::Stone]),
            Card::science("Ecole", ScienceSymbol::Wheel, 1)
                .cost(&[RT::Wood, RT::Papyrus, RT::Papyrus])
                .chain_out(CS::Harp),
            Card::science("Laboratoire", ScienceSymbol::Triangle, 1)
                .cost(&[RT::Wood, RT::Glass, RT::Glass])
                .chain_out(CS::Lamp),
            Card::science("Bibliotheque", ScienceSymbol::Script, 2)
                .cost(&[RT::Stone, RT::Wood, RT::Glass])
                .chain_in(CS::Book),
            Card::science("Dispensaire", ScienceSymbol::Bowl, 2)
                .cost(&[RT::Clay, RT::Clay, RT::Stone])
                .chain_in(CS::Gear),
        ]
    }

    fn age3_cards() -> Vec<Card> {
        use ChainSymbol as CS;
        use Resource as RT;
        vec![
            Card::blue("Senat", 5)
                .cost(&[RT::Clay, RT::Clay, RT::Stone, RT::Papyrus])
                .chain_in(CS::Bank),
            Card::blue("Obelisque", 5).cost(&[RT::Stone, RT::Stone, RT::Glass]),
            Card::blue("Jardins", 6)
                .cost(&[RT::Clay, RT::Clay, RT::Wood, RT::Wood])
                .chain_in(CS::GreekPillar),
            Card::blue("Pantheon", 6)
                .cost(&[RT::Clay, RT::Wood, RT::Papyrus, RT::Papyrus])
                .chain_in(CS::Sun),
            Card::blue("Palace", 7).cost(&[RT::Clay, RT::Stone, RT::Wood, RT::Glass, RT::Glass]),
            Card::blue("HotelDeVille", 7)
                .cost(&[RT::Stone, RT::Stone, RT::Stone, RT::Wood, RT::Wood]),
            Card::military("Fortifications", 2)
                .cost(&[RT::Stone, RT::Stone, RT::Clay, RT::Papyrus])
                .chain_in(CS::Tower),
            Card::military("Cirque", 2)
                .cost(&[RT::Clay, RT::Clay, RT::Stone, RT::Stone])
                .chain_in(CS::Helmet),
            Card::military("AtelierDeSiege", 2)
                .cost(&[RT::Wood, RT::Wood, RT::Wood, RT::Glass])
                .chain_in(CS::Target),
            Card::military("Arsenal", 3)
                .cost(&[RT::Clay, RT::Clay, RT::Clay, RT::Wood, RT::Wood]),
            Card::military("Pretoire", 3).gold_cost(8),
            Card::yellow("Armurerie", 3)
                .cost(&[RT::Stone, RT::Stone, RT::Glass])
                .gold_per_type(1, CardType::Military),
            Card::yellow("Phare", 3)
                .cost(&[RT::Clay, RT::Clay, RT::Glass])
                .gold_per_type(1, CardType::Yellow)
                .chain_in(CS::Jar),
            Card::yellow("Port", 3)
                .cost(&[RT::Wood, RT::Glass, RT::Papyrus])
                .gold_per_type(2, CardType::Brown),
            Card::yellow("ChambreDeCommerce", 3)
                .cost(&[RT::Papyrus, RT::Papyrus])
                .gold_per_type(3, CardType::Grey),
            Card::yellow("Arene", 3)
                .cost(&[RT::Clay, RT::Stone, RT::Wood])
                .gold_per_type(2, CardType::Wonder)
                .chain_in(CS::Barrel),
            Card::science("Observatoire", ScienceSymbol::Globe, 2)
                .cost(&[RT::Stone, RT::Papyrus, RT::Papyrus])
                .chain_in(CS::Lamp),
            Card::science("University", ScienceSymbol::Globe, 2)
                .cost(&[RT::Clay, RT::Glass, RT::Papyrus])
                .chain_in(CS::Harp),
            Card::science("Etude", ScienceSymbol::SolarClock, 3)
                .cost(&[RT::Wood, RT::Wood, RT::Glass, RT::Papyrus]),
            Card::science("Academie", ScienceSymbol::SolarClock, 3)
                .cost(&[RT::Stone, RT::Wood, RT::Glass, RT::Glass]),
        ]
    }

    fn guild_cards_table() -> Vec<Card> {
        use Resource as RT;
        vec![
            Card::guild("GuildeDesArmateurs", Some(CardType::Brown), 1, 1)
                .cost(&[RT::Clay, RT::Stone, RT::Glass, RT::Papyrus]),
            Card::guild("GuildeDesCommercant", Some(CardType::Yellow), 1, 1)
                .cost(&[RT::Clay, RT::Wood, RT::Glass, RT::Papyrus]),
            Card::guild("GuildeDesTacticiens", Some(CardType::Military), 1, 1)
                .cost(&[RT::Stone, RT::Stone, RT::Clay, RT::Papyrus]),
            Card::guild("GuildeDesMagistrats", Some(CardType::Blue), 1, 1)
                .cost(&[RT::Wood, RT::Wood, RT::Clay, RT::Papyrus]),
            Card::guild("GuildeDesSciences", Some(CardType::Science), 1, 1)
                .cost(&[RT::Clay, RT::Clay, RT::Wood, RT::Wood]),
            Card::guild("GuildeDesBatisseurs", Some(CardType::Wonder), 0, 2)
                .cost(&[RT::Stone, RT::Stone, RT::Clay, RT::Wood, RT::Glass]),
            Card::guild("GuildeDesUsuriers", None, 0, 0)
                .cost(&[RT::Stone, RT::Stone, RT::Wood, RT::Wood]),
        ]
    }

    fn wonder_table() -> Vec<Card> {
        use Resource as RT;
        let mut wonders = vec![Card::base(CardType::Wonder, ""); Wonder::COUNT];
        let mut set = |w: Wonder, card: Card| wonders[w as usize] = card;

        set(
            Wonder::Colossus,
            Card::wonder(Wonder::Colossus, "LeColosse", 3, false)
                .shields(2)
                .cost(&[RT::Clay, RT::Clay, RT::Clay, RT::Glass]),
        );
        set(
            Wonder::Artemis,
            Card::wonder(Wonder::Artemis, "TempleArtemis", 0, true)
                .gold(12)
                .cost(&[RT::Wood, RT::Stone, RT::Glass, RT::Papyrus]),
        );
        set(
            Wonder::Pyramids,
            Card::wonder(Wonder::Pyramids, "LesPyramides", 9, false)
                .cost(&[RT::Papyrus, RT::Stone, RT::Stone, RT::Stone]),
        );
        set(
            Wonder::Zeus,
            Card::wonder(Wonder::Zeus, "StatueDeZeus", 3, false)
                .shields(1)
                .cost(&[RT::Papyrus, RT::Papyrus, RT::Clay, RT::Wood, RT::Stone]),
        );
        set(
            Wonder::GreatLighthouse,
            Card::wonder(Wonder::GreatLighthouse, "LeGrandPhare", 4, false)
                .weak(&[RT::Clay, RT::Stone, RT::Wood])
                .cost(&[RT::Papyrus, RT::Papyrus, RT::Stone, RT::Wood]),
        );
        set(
            Wonder::CircusMaximus,
            Card::wonder(Wonder::CircusMaximus, "CircusMaximus", 3, false)
                .shields(1)
                .cost(&[RT::Stone, RT::Stone, RT::Wood, RT::Glass]),
        );
        set(
            Wonder::GreatLibrary,
            Card::wonder(Wonder::GreatLibrary, "GreatLibrary", 4, false)
                .cost(&[RT::Wood, RT::Wood, RT::Wood, RT::Glass, RT::Papyrus]),
        );
        set(
            Wonder::Sphinx,
            Card::wonder(Wonder::Sphinx, "Sphinx", 6, true)
                .cost(&[RT::Stone, RT::Clay, RT::Glass, RT::Glass]),
        );
        set(
            Wonder::ViaAppia,
            Card::wonder(Wonder::ViaAppia, "LaViaAppia", 3, true)
                .gold(3)
                .cost(&[RT::Clay, RT::Clay, RT::Stone, RT::Stone, RT::Papyrus]),
        );
        set(
            Wonder::Piraeus,
            Card::wonder(Wonder::Piraeus, "LaPiree", 2, true)
                .weak(&[RT::Papyrus, RT::Glass])
                .cost(&[RT::Clay, RT::Stone, RT::Wood, RT::Wood]),
        );
        set(
            Wonder::HangingGarden,
            Card::wonder(Wonder::HangingGarden, "JardinSuspendus", 3, true)
                .gold(6)
                .cost(&[RT::Papyrus, RT::Glass, RT::Wood, RT::Wood]),
        );
        set(
            Wonder::Mausoleum,
            Card::wonder(Wonder::Mausoleum, "Mausoleum", 2, false)
                .cost(&[RT::Papyrus, RT::Glass, RT::Glass, RT::Clay, RT::Clay]),
        );

        wonders
    }

    fn token_table() -> Vec<Card> {
        use ScienceToken as ST;
        let mut tokens = vec![Card::base(CardType::Token, ""); ScienceToken::COUNT];
        let mut set = |t: ST, card: Card| tokens[t as usize] = card;

        set(ST::Agriculture, Card::token(ST::Agriculture, "Agriculture", 6, 4));
        set(ST::Architecture, Card::token(ST::Architecture, "Architecture", 0, 0));
        set(ST::Economy, Card::token(ST::Economy, "Economy", 0, 0));
        set(ST::Law, Card::token(ST::Law, "Law", 0, 0));
        set(ST::Masonry, Card::token(ST::Masonry, "Masonry", 0, 0));
        set(ST::Mathematics, Card::token(ST::Mathematics, "Mathematics", 0, 0));
        set(ST::Philosophy, Card::token(ST::Philosophy, "Philosophy", 0, 7));
        set(ST::Strategy, Card::token(ST::Strategy, "Strategy", 0, 0));
        set(ST::Theology, Card::token(ST::Theology, "Theology", 0, 0));
        set(ST::TownPlanning, Card::token(ST::TownPlanning, "TownPlanning", 6, 0));

        tokens
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
