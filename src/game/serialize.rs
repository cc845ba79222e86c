use std::fmt;

use super::catalog::{Catalog, MAX_CARDS_PER_AGE};
use super::city::{DiscardPile, PlayerCity, MAX_DISCARDED};
use super::controller::{Controller, Phase, WinType};
use super::graph::{AgeGraph, CardNode, GRAPH_NODES, MAX_PLAYABLE};
use super::state::GameState;
use super::{ScienceToken, Wonder};

pub const STATE_MAGIC: [u8; 4] = *b"7WGS";
pub const STATE_VERSION: u8 = 3;

/// I/O and wire-format failures. Rule violations never surface here; those
/// are asserts.
#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    Format(&'static str),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "i/o error: {e}"),
            LoadError::Format(reason) => write!(f, "malformed data: {reason}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            LoadError::Format(_) => None,
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

pub(crate) struct Writer(pub Vec<u8>);

impl Writer {
    pub fn new() -> Writer {
        Writer(Vec::with_capacity(1024))
    }

    #[inline]
    pub fn u8(&mut self, v: u8) {
        self.0.push(v);
    }

    #[inline]
    pub fn i8(&mut self, v: i8) {
        self.0.push(v as u8);
    }

    #[inline]
    pub fn u16(&mut self, v: u16) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn f32(&mut self, v: f32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }
}

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Reader<'a> {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], LoadError> {
        if self.pos + n > self.buf.len() {
            return Err(LoadError::Format("unexpected end of blob"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8, LoadError> {
        Ok(self.take(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8, LoadError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn u16(&mut self) -> Result<u16, LoadError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn u32(&mut self) -> Result<u32, LoadError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn f32(&mut self) -> Result<f32, LoadError> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], LoadError> {
        self.take(n)
    }

    pub fn done(&self) -> bool {
        self.pos == self.buf.len()
    }
}

fn phase_to_u8(phase: Phase) -> u8 {
    match phase {
        Phase::DraftWonder => 0,
        Phase::Play => 1,
        Phase::PickScienceToken => 2,
        Phase::GreatLibraryToken => 3,
        Phase::GreatLibraryTokenThenReplay => 4,
        Phase::WinPlayer0 => 5,
        Phase::WinPlayer1 => 6,
    }
}

fn phase_from_u8(v: u8) -> Result<Phase, LoadError> {
    Ok(match v {
        0 => Phase::DraftWonder,
        1 => Phase::Play,
        2 => Phase::PickScienceToken,
        3 => Phase::GreatLibraryToken,
        4 => Phase::GreatLibraryTokenThenReplay,
        5 => Phase::WinPlayer0,
        6 => Phase::WinPlayer1,
        _ => return Err(LoadError::Format("bad phase tag")),
    })
}

fn win_type_to_u8(win: WinType) -> u8 {
    match win {
        WinType::None => 0,
        WinType::Civil => 1,
        WinType::Military => 2,
        WinType::Science => 3,
    }
}

pub(crate) fn win_type_from_u8(v: u8) -> Result<WinType, LoadError> {
    Ok(match v {
        0 => WinType::None,
        1 => WinType::Civil,
        2 => WinType::Military,
        3 => WinType::Science,
        _ => return Err(LoadError::Format("bad win-type tag")),
    })
}

fn write_city(w: &mut Writer, city: &PlayerCity) {
    w.u32(city.chaining);
    w.u16(city.guilds);
    w.u16(city.tokens);
    w.u8(city.num_science_symbols);
    w.u8(city.gold);
    w.u8(city.victory_points);
    for v in city.science_symbols {
        w.u8(v);
    }
    for v in city.cards_per_type {
        w.u8(v);
    }
    for v in city.production {
        w.u8(v);
    }
    w.u8(city.weak_normal);
    w.u8(city.weak_rare);
    for v in city.discount {
        w.u8(v as u8);
    }
    for v in city.best_production_card {
        w.u8(v);
    }
    for v in city.wonders {
        w.u8(v);
    }
    w.u8(city.num_wonders);
}

fn read_city(r: &mut Reader<'_>) -> Result<PlayerCity, LoadError> {
    let mut city = PlayerCity::new();
    city.chaining = r.u32()?;
    city.guilds = r.u16()?;
    city.tokens = r.u16()?;
    city.num_science_symbols = r.u8()?;
    city.gold = r.u8()?;
    city.victory_points = r.u8()?;
    for v in city.science_symbols.iter_mut() {
        *v = r.u8()?;
    }
    for v in city.cards_per_type.iter_mut() {
        *v = r.u8()?;
    }
    for v in city.production.iter_mut() {
        *v = r.u8()?;
    }
    city.weak_normal = r.u8()?;
    city.weak_rare = r.u8()?;
    for v in city.discount.iter_mut() {
        *v = r.u8()? != 0;
    }
    for v in city.best_production_card.iter_mut() {
        *v = r.u8()?;
    }
    for v in city.wonders.iter_mut() {
        *v = r.u8()?;
    }
    city.num_wonders = r.u8()?;
    if city.num_wonders > 4 {
        return Err(LoadError::Format("bad unbuilt-wonder count"));
    }
    for slot in 0..city.num_wonders {
        if Wonder::from_index(city.wonders[slot as usize]).is_none() {
            return Err(LoadError::Format("bad wonder index in city"));
        }
    }
    Ok(city)
}

fn write_discard(w: &mut Writer, pile: &DiscardPile) {
    w.u8(pile.len);
    for v in pile.cards {
        w.u8(v);
    }
    for v in pile.best_production {
        w.u8(v);
    }
    w.u8(pile.best_blue);
    w.u8(pile.best_military);
    for v in pile.science {
        w.u8(v);
    }
    w.u8(pile.num_guilds);
    for v in pile.guilds {
        w.u8(v);
    }
    w.u8(pile.best_yellow_gold);
    w.u8(pile.yellow_weak_normal);
    w.u8(pile.yellow_weak_rare);
    w.u8(pile.num_yellow_discount);
    for v in pile.yellow_discount {
        w.u8(v);
    }
    w.u8(pile.num_yellow_gold_per_type);
    for v in pile.yellow_gold_per_type {
        w.u8(v);
    }
}

fn read_discard(r: &mut Reader<'_>) -> Result<DiscardPile, LoadError> {
    let mut pile = DiscardPile::new();
    pile.len = r.u8()?;
    if pile.len as usize > MAX_DISCARDED {
        return Err(LoadError::Format("bad discard-pile length"));
    }
    for v in pile.cards.iter_mut() {
        *v = r.u8()?;
    }
    for v in pile.best_production.iter_mut() {
        *v = r.u8()?;
    }
    pile.best_blue = r.u8()?;
    pile.best_military = r.u8()?;
    for v in pile.science.iter_mut() {
        *v = r.u8()?;
    }
    pile.num_guilds = r.u8()?;
    for v in pile.guilds.iter_mut() {
        *v = r.u8()?;
    }
    pile.best_yellow_gold = r.u8()?;
    pile.yellow_weak_normal = r.u8()?;
    pile.yellow_weak_rare = r.u8()?;
    pile.num_yellow_discount = r.u8()?;
    for v in pile.yellow_discount.iter_mut() {
        *v = r.u8()?;
    }
    pile.num_yellow_gold_per_type = r.u8()?;
    for v in pile.yellow_gold_per_type.iter_mut() {
        *v = r.u8()?;
    }
    if pile.num_guilds as usize > pile.guilds.len()
        || pile.num_yellow_discount as usize > pile.yellow_discount.len()
        || pile.num_yellow_gold_per_type as usize > pile.yellow_gold_per_type.len()
    {
        return Err(LoadError::Format("bad discard tracker counts"));
    }
    Ok(pile)
}

fn write_graph(w: &mut Writer, graph: &AgeGraph) {
    for node in graph.nodes {
        w.u32(node.0);
    }
    for v in graph.playable {
        w.u8(v);
    }
    for v in graph.age_pool {
        w.u8(v);
    }
    for v in graph.guild_pool {
        w.u8(v);
    }
    w.u8(graph.age);
    w.u8(graph.num_playable);
    w.u8(graph.num_age_pool);
    w.u8(graph.num_guild_pool);
}

fn read_graph(r: &mut Reader<'_>) -> Result<AgeGraph, LoadError> {
    let mut graph = AgeGraph::zeroed();
    for node in graph.nodes.iter_mut() {
        *node = CardNode(r.u32()?);
    }
    for v in graph.playable.iter_mut() {
        *v = r.u8()?;
    }
    for v in graph.age_pool.iter_mut() {
        *v = r.u8()?;
    }
    for v in graph.guild_pool.iter_mut() {
        *v = r.u8()?;
    }
    graph.age = r.u8()?;
    graph.num_playable = r.u8()?;
    graph.num_age_pool = r.u8()?;
    graph.num_guild_pool = r.u8()?;
    if graph.num_playable as usize > MAX_PLAYABLE {
        return Err(LoadError::Format("bad playable count"));
    }
    if graph.num_age_pool as usize > graph.age_pool.len()
        || graph.num_guild_pool as usize > graph.guild_pool.len()
    {
        return Err(LoadError::Format("bad draw-pool count"));
    }
    for &slot in &graph.playable[..graph.num_playable as usize] {
        if slot as usize >= GRAPH_NODES {
            return Err(LoadError::Format("playable index out of range"));
        }
    }
    Ok(graph)
}

/// Serialize a full game snapshot (state plus phase machine) into the
/// version-3 `7WGS` blob.
pub fn serialize_game(game: &Controller<'_>) -> Vec<u8> {
    serialize_snapshot(&game.state, game.phase, game.win_type)
}

/// Catalog-free variant for dataset points, which store bare states.
pub fn serialize_snapshot(s: &GameState, phase: Phase, win_type: WinType) -> Vec<u8> {
    let mut w = Writer::new();
    w.0.extend_from_slice(&STATE_MAGIC);
    w.u8(STATE_VERSION);

    w.u8(phase_to_u8(phase));
    w.u8(win_type_to_u8(win_type));
    w.u8(s.turn);
    w.u8(s.player);
    w.u8(s.age);
    w.i8(s.military);
    w.u8(s.military_token2[0] as u8);
    w.u8(s.military_token2[1] as u8);
    w.u8(s.military_token5[0] as u8);
    w.u8(s.military_token5[1] as u8);
    w.u8(s.deterministic as u8);

    w.u8(s.num_board_tokens);
    for t in s.science_pool {
        w.u8(t as u8);
    }

    w.u8(s.num_played);
    for v in s.played_age_cards {
        w.u8(v);
    }

    write_discard(&mut w, &s.discard);

    for v in s.wonder_pool {
        w.u8(v);
    }
    w.u8(s.draft_round);
    w.u8(s.draft_picks);

    for city in &s.cities {
        write_city(&mut w, city);
    }

    for graph in &s.graphs {
        write_graph(&mut w, graph);
    }
    write_graph(&mut w, &s.graph);

    w.0
}

/// Parse a `7WGS` blob. Validation happens before any state is handed back;
/// on failure nothing of the caller's is touched.
pub fn deserialize_game<'c>(
    catalog: &'c Catalog,
    blob: &[u8],
) -> Result<Controller<'c>, LoadError> {
    let (state, phase, win_type) = deserialize_snapshot(blob)?;
    Ok(Controller {
        catalog,
        state,
        phase,
        win_type,
    })
}

pub fn deserialize_snapshot(blob: &[u8]) -> Result<(GameState, Phase, WinType), LoadError> {
    let mut r = Reader::new(blob);

    let magic = [r.u8()?, r.u8()?, r.u8()?, r.u8()?];
    if magic != STATE_MAGIC {
        return Err(LoadError::Format("bad state magic"));
    }
    if r.u8()? != STATE_VERSION {
        return Err(LoadError::Format("unsupported state version"));
    }

    let phase = phase_from_u8(r.u8()?)?;
    let win_type = win_type_from_u8(r.u8()?)?;

    // Start from a blank state; every field below is overwritten.
    let mut state = {
        use rand_core::SeedableRng;
        let mut rng = rand::rngs::SmallRng::seed_from_u64(0);
        GameState::new(&mut rng)
    };
    state.turn = r.u8()?;
    state.player = r.u8()?;
    state.age = r.u8()?;
    state.military = r.i8()?;
    if state.player > 1 {
        return Err(LoadError::Format("bad player index"));
    }
    state.military_token2[0] = r.u8()? != 0;
    state.military_token2[1] = r.u8()? != 0;
    state.military_token5[0] = r.u8()? != 0;
    state.military_token5[1] = r.u8()? != 0;
    state.deterministic = r.u8()? != 0;

    state.num_board_tokens = r.u8()?;
    if state.num_board_tokens as usize > super::state::NUM_BOARD_TOKENS {
        return Err(LoadError::Format("bad board-token count"));
    }
    for slot in state.science_pool.iter_mut() {
        *slot = ScienceToken::from_index(r.u8()?)
            .ok_or(LoadError::Format("bad science token"))?;
    }

    state.num_played = r.u8()?;
    if state.num_played as usize > MAX_CARDS_PER_AGE {
        return Err(LoadError::Format("bad played-card count"));
    }
    for v in state.played_age_cards.iter_mut() {
        *v = r.u8()?;
    }

    state.discard = read_discard(&mut r)?;

    for v in state.wonder_pool.iter_mut() {
        let raw = r.u8()?;
        if Wonder::from_index(raw).is_none() {
            return Err(LoadError::Format("bad wonder in draft pool"));
        }
        *v = raw;
    }
    state.draft_round = r.u8()?;
    state.draft_picks = r.u8()?;
    if state.draft_round > 2 || state.draft_picks > 3 {
        return Err(LoadError::Format("bad draft progress"));
    }

    state.cities = [read_city(&mut r)?, read_city(&mut r)?];

    for graph in state.graphs.iter_mut() {
        *graph = read_graph(&mut r)?;
    }
    state.graph = read_graph(&mut r)?;

    if !r.done() {
        return Err(LoadError::Format("trailing bytes after state blob"));
    }

    Ok((state, phase, win_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::Rng;
    use rand_core::SeedableRng;

    fn mid_game(seed: u64, plies: usize) -> (&'static Catalog, Controller<'static>) {
        let catalog: &'static Catalog = Box::leak(Box::new(Catalog::new()));
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut game = Controller::new(catalog, &mut rng);
        let mut moves = Vec::new();
        for _ in 0..plies {
            game.enumerate_moves(&mut moves);
            let mv = moves[rng.gen_range(0..moves.len())];
            if game.play(mv, &mut rng) {
                break;
            }
        }
        (catalog, game)
    }

    #[test]
    fn round_trip_preserves_every_field() {
        for seed in 0..8 {
            let (catalog, game) = mid_game(seed, 8 + seed as usize * 7);
            let blob = serialize_game(&game);
            let restored = deserialize_game(catalog, &blob).unwrap();
            assert_eq!(game.state, restored.state);
            assert_eq!(game.phase, restored.phase);
            assert_eq!(game.win_type, restored.win_type);
        }
    }

    #[test]
    fn round_trip_preserves_legal_moves() {
        let (catalog, game) = mid_game(3, 25);
        if game.is_terminal() {
            return;
        }
        let blob = serialize_game(&game);
        let restored = deserialize_game(catalog, &blob).unwrap();

        let mut a = Vec::new();
        let mut b = Vec::new();
        game.enumerate_moves(&mut a);
        restored.enumerate_moves(&mut b);
        let a: std::collections::BTreeSet<String> = a.iter().map(|m| format!("{m:?}")).collect();
        let b: std::collections::BTreeSet<String> = b.iter().map(|m| format!("{m:?}")).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn round_trip_game_continues_identically() {
        let (catalog, game) = mid_game(4, 30);
        if game.is_terminal() {
            return;
        }
        let blob = serialize_game(&game);
        let mut restored = deserialize_game(catalog, &blob).unwrap();
        let mut original = game;

        // Determinized copies evolve identically under the same moves.
        let mut rng = SmallRng::seed_from_u64(99);
        original.determinize(&mut rng);
        let mut rng = SmallRng::seed_from_u64(99);
        restored.determinize(&mut rng);

        let mut moves = Vec::new();
        let mut dummy = SmallRng::seed_from_u64(0);
        for _ in 0..10 {
            if original.is_terminal() {
                break;
            }
            original.enumerate_moves(&mut moves);
            let mv = moves[0];
            let a = original.play(mv, &mut dummy);
            let b = restored.play(mv, &mut dummy);
            assert_eq!(a, b);
            assert_eq!(original.state, restored.state);
        }
    }

    #[test]
    fn rejects_bad_magic_version_and_truncation() {
        let (catalog, game) = mid_game(5, 12);
        let blob = serialize_game(&game);

        let mut bad = blob.clone();
        bad[0] = b'X';
        assert!(matches!(
            deserialize_game(catalog, &bad),
            Err(LoadError::Format(_))
        ));

        let mut bad = blob.clone();
        bad[4] = 99;
        assert!(matches!(
            deserialize_game(catalog, &bad),
            Err(LoadError::Format(_))
        ));

        let truncated = &blob[..blob.len() / 2];
        assert!(deserialize_game(catalog, truncated).is_err());

        let mut extended = blob.clone();
        extended.push(0);
        assert!(deserialize_game(catalog, &extended).is_err());
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]
        #[test]
        fn round_trip_any_reachable_state(seed in any::<u64>(), plies in 0usize..120) {
            let (catalog, game) = mid_game(seed, plies);
            let blob = serialize_game(&game);
            let restored = deserialize_game(catalog, &blob).unwrap();
            prop_assert_eq!(game.state, restored.state);
            prop_assert_eq!(game.phase, restored.phase);
        }
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let (catalog, game) = mid_game(6, 12);
        let blob = serialize_game(&game);

        // Phase byte lives right after the 5-byte header.
        let mut bad = blob.clone();
        bad[5] = 42;
        assert!(deserialize_game(catalog, &bad).is_err());
    }
}
