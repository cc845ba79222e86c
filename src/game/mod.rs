pub mod catalog;
pub mod city;
pub mod controller;
pub mod graph;
pub mod serialize;
pub mod state;
pub mod tensor;

pub use catalog::{Card, Catalog};
pub use city::{DiscardPile, PlayerCity};
pub use controller::{Controller, Move, Phase, WinType};
pub use state::GameState;

/// The five tradeable resources. `Wood..=Stone` are the brown (normal)
/// group, `Glass..=Papyrus` the grey (rare) group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Wood,
    Clay,
    Stone,
    Glass,
    Papyrus,
}

impl Resource {
    pub const COUNT: usize = 5;
    pub const ALL: [Resource; 5] = [
        Resource::Wood,
        Resource::Clay,
        Resource::Stone,
        Resource::Glass,
        Resource::Papyrus,
    ];
    pub const NORMAL: [Resource; 3] = [Resource::Wood, Resource::Clay, Resource::Stone];
    pub const RARE: [Resource; 2] = [Resource::Glass, Resource::Papyrus];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardType {
    Blue,
    Brown,
    Grey,
    Yellow,
    Science,
    Military,
    Guild,
    Wonder,
    Token,
}

impl CardType {
    pub const COUNT: usize = 9;
    pub const ALL: [CardType; 9] = [
        CardType::Blue,
        CardType::Brown,
        CardType::Grey,
        CardType::Yellow,
        CardType::Science,
        CardType::Military,
        CardType::Guild,
        CardType::Wonder,
        CardType::Token,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wonder {
    CircusMaximus,
    Colossus,
    GreatLighthouse,
    HangingGarden,
    GreatLibrary,
    Piraeus,
    Pyramids,
    Sphinx,
    Zeus,
    Artemis,
    ViaAppia,
    Mausoleum,
}

impl Wonder {
    pub const COUNT: usize = 12;
    pub const ALL: [Wonder; 12] = [
        Wonder::CircusMaximus,
        Wonder::Colossus,
        Wonder::GreatLighthouse,
        Wonder::HangingGarden,
        Wonder::GreatLibrary,
        Wonder::Piraeus,
        Wonder::Pyramids,
        Wonder::Sphinx,
        Wonder::Zeus,
        Wonder::Artemis,
        Wonder::ViaAppia,
        Wonder::Mausoleum,
    ];

    pub fn from_index(i: u8) -> Option<Wonder> {
        Self::ALL.get(i as usize).copied()
    }

    /// Wonders granting the builder an extra turn.
    pub fn grants_replay(self) -> bool {
        matches!(
            self,
            Wonder::HangingGarden
                | Wonder::Artemis
                | Wonder::Sphinx
                | Wonder::ViaAppia
                | Wonder::Piraeus
        )
    }
}

/// Seven science symbols; collecting 6 distinct ones wins the game
/// immediately, a pair of the same symbol grants a science-token pick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScienceSymbol {
    Wheel,
    Script,
    Triangle,
    Bowl,
    SolarClock,
    Globe,
    Law,
}

impl ScienceSymbol {
    pub const COUNT: usize = 7;
    pub const ALL: [ScienceSymbol; 7] = [
        ScienceSymbol::Wheel,
        ScienceSymbol::Script,
        ScienceSymbol::Triangle,
        ScienceSymbol::Bowl,
        ScienceSymbol::SolarClock,
        ScienceSymbol::Globe,
        ScienceSymbol::Law,
    ];

    pub fn from_index(i: u8) -> Option<ScienceSymbol> {
        Self::ALL.get(i as usize).copied()
    }
}

/// Chaining symbols, grouped by the card color that prints them. The group
/// ranges matter to the tensorizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainSymbol {
    Jar,
    Barrel,
    Mask,
    Bank,
    Sun,
    WaterDrop,
    GreekPillar,
    Moon,
    Target,
    Helmet,
    Horseshoe,
    Sword,
    Tower,
    Harp,
    Gear,
    Book,
    Lamp,
}

impl ChainSymbol {
    pub const COUNT: usize = 17;

    pub const FIRST_YELLOW: u8 = ChainSymbol::Jar as u8;
    pub const LAST_YELLOW: u8 = ChainSymbol::Barrel as u8;
    pub const FIRST_BLUE: u8 = ChainSymbol::Mask as u8;
    pub const LAST_BLUE: u8 = ChainSymbol::Moon as u8;
    pub const FIRST_RED: u8 = ChainSymbol::Target as u8;
    pub const LAST_RED: u8 = ChainSymbol::Tower as u8;
    pub const FIRST_GREEN: u8 = ChainSymbol::Harp as u8;
    pub const LAST_GREEN: u8 = ChainSymbol::Lamp as u8;

    #[inline]
    pub fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// The ten one-shot progress tokens. The first `Self::TENSOR_COUNT` are the
/// only ones encoded per city in the NN input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScienceToken {
    Strategy,
    Masonry,
    Economy,
    Mathematics,
    TownPlanning,
    Theology,
    Law,
    Architecture,
    Philosophy,
    Agriculture,
}

impl ScienceToken {
    pub const COUNT: usize = 10;
    /// Tokens below this index are encoded per player city in the base tensor.
    pub const TENSOR_COUNT: usize = ScienceToken::Theology as usize;
    pub const ALL: [ScienceToken; 10] = [
        ScienceToken::Strategy,
        ScienceToken::Masonry,
        ScienceToken::Economy,
        ScienceToken::Mathematics,
        ScienceToken::TownPlanning,
        ScienceToken::Theology,
        ScienceToken::Law,
        ScienceToken::Architecture,
        ScienceToken::Philosophy,
        ScienceToken::Agriculture,
    ];

    pub fn from_index(i: u8) -> Option<ScienceToken> {
        Self::ALL.get(i as usize).copied()
    }

    #[inline]
    pub fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// Outcome of applying a card to a city; the controller turns these into
/// state-machine transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialAction {
    Nothing,
    Replay,
    TakeScienceToken,
    MilitaryWin,
    ScienceWin,
}
