//! Round-robin self-play driver producing per-age training samples.

use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand_core::SeedableRng;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::game::controller::POLICY_SIZE;
use crate::game::serialize::{
    deserialize_snapshot, serialize_snapshot, win_type_from_u8, LoadError, Reader, Writer,
};
use crate::game::{Catalog, Controller, GameState, Phase, WinType};
use crate::strategies::{AiPlayer, AiWorker};

pub const DATASET_MAGIC: [u8; 4] = *b"7WDS";
pub const DATASET_VERSION: u8 = 2;

/// States kept per age from one finished game.
pub const SAMPLES_PER_AGE: usize = 16;

/// One labeled training sample: a pre-decision snapshot, the final result
/// of the game it came from, and the acting searcher's visit distribution
/// (zeros for players that do not compute one).
#[derive(Clone)]
pub struct SamplePoint {
    pub state: GameState,
    pub phase: Phase,
    pub winner: u8,
    pub win_type: WinType,
    pub priors: [f32; POLICY_SIZE],
}

/// An in-memory shard of training samples plus its binary format.
#[derive(Default)]
pub struct Dataset {
    pub points: Vec<SamplePoint>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn extend(&mut self, mut other: Dataset) {
        self.points.append(&mut other.points);
    }

    pub fn shuffle(&mut self, rng: &mut SmallRng) {
        self.points.shuffle(rng);
    }

    pub fn save(&self, path: &Path) -> Result<(), LoadError> {
        let mut w = Writer::new();
        w.0.extend_from_slice(&DATASET_MAGIC);
        w.u8(DATASET_VERSION);
        w.u32(self.points.len() as u32);

        for point in &self.points {
            w.u8(point.winner);
            w.u8(match point.win_type {
                WinType::None => 0,
                WinType::Civil => 1,
                WinType::Military => 2,
                WinType::Science => 3,
            });
            for &p in &point.priors {
                w.f32(p);
            }
            let blob = serialize_snapshot(&point.state, point.phase, WinType::None);
            w.u32(blob.len() as u32);
            w.0.extend_from_slice(&blob);
        }

        std::fs::write(path, &w.0)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Dataset, LoadError> {
        let bytes = std::fs::read(path)?;
        let mut r = Reader::new(&bytes);

        let magic = [r.u8()?, r.u8()?, r.u8()?, r.u8()?];
        if magic != DATASET_MAGIC {
            return Err(LoadError::Format("bad dataset magic"));
        }
        if r.u8()? != DATASET_VERSION {
            return Err(LoadError::Format("unsupported dataset version"));
        }

        let count = r.u32()? as usize;
        let mut points = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            let winner = r.u8()?;
            if winner > 1 {
                return Err(LoadError::Format("bad winner label"));
            }
            let win_type = win_type_from_u8(r.u8()?)?;
            let mut priors = [0.0f32; POLICY_SIZE];
            for p in priors.iter_mut() {
                *p = r.f32()?;
            }
            let blob_len = r.u32()? as usize;
            let blob = r.bytes(blob_len)?;
            let (state, phase, _) = deserialize_snapshot(blob)?;
            points.push(SamplePoint {
                state,
                phase,
                winner,
                win_type,
                priors,
            });
        }

        Ok(Dataset { points })
    }

    pub fn stats(&self) -> DatasetStats {
        let mut stats = DatasetStats::default();
        stats.points = self.points.len();
        for p in &self.points {
            stats.winners[p.winner as usize] += 1;
            stats.win_types.record(p.win_type);
        }
        stats
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct WinTypeCounter {
    pub civil: u32,
    pub military: u32,
    pub science: u32,
}

impl WinTypeCounter {
    pub fn record(&mut self, win_type: WinType) {
        match win_type {
            WinType::Civil => self.civil += 1,
            WinType::Military => self.military += 1,
            WinType::Science => self.science += 1,
            WinType::None => {}
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DatasetStats {
    pub points: usize,
    pub winners: [u32; 2],
    pub win_types: WinTypeCounter,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerStats {
    pub name: String,
    pub wins: u32,
    pub games: u32,
    pub win_types: WinTypeCounter,
    /// Total decision time across all games, milliseconds.
    pub think_ms: f64,
}

impl PlayerStats {
    fn new(name: String) -> PlayerStats {
        PlayerStats {
            name,
            wins: 0,
            games: 0,
            win_types: WinTypeCounter::default(),
            think_ms: 0.0,
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.wins as f64 / self.games as f64
        }
    }
}

struct GameOutcome {
    winner_seat: u8,
    win_type: WinType,
    think_ms: [f64; 2],
    samples: [Vec<SamplePoint>; 3],
}

/// Plays registered AIs against each other on a thread pool and harvests
/// per-age training samples.
pub struct Tournament<'c> {
    catalog: &'c Catalog,
    players: Vec<Box<dyn AiPlayer>>,
    index_by_name: FxHashMap<String, usize>,
    stats: Mutex<Vec<PlayerStats>>,
    datasets: [Dataset; 3],
}

impl<'c> Tournament<'c> {
    pub fn new(catalog: &'c Catalog) -> Tournament<'c> {
        Tournament {
            catalog,
            players: Vec::new(),
            index_by_name: FxHashMap::default(),
            stats: Mutex::new(Vec::new()),
            datasets: Default::default(),
        }
    }

    pub fn add_player(&mut self, player: Box<dyn AiPlayer>) {
        let name = player.name();
        log::info!("registering AI: {name}");
        debug_assert!(!self.index_by_name.contains_key(&name), "duplicate AI name");
        self.index_by_name.insert(name.clone(), self.players.len());
        self.players.push(player);
        self.stats.lock().unwrap().push(PlayerStats::new(name));
    }

    pub fn player_index(&self, name: &str) -> Option<usize> {
        self.index_by_name.get(name).copied()
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    pub fn datasets(&self) -> &[Dataset; 3] {
        &self.datasets
    }

    pub fn take_datasets(&mut self) -> [Dataset; 3] {
        std::mem::take(&mut self.datasets)
    }

    pub fn stats(&self) -> Vec<PlayerStats> {
        self.stats.lock().unwrap().clone()
    }

    /// Play `games` games over all ordered player pairs, `threads` wide.
    pub fn generate_dataset(&mut self, games: u32, threads: usize, seed: u64) {
        assert!(self.players.len() >= 2, "need at least two players");
        let mut pairs = Vec::new();
        for i in 0..self.players.len() {
            for j in 0..self.players.len() {
                if i != j {
                    pairs.push((i, j));
                }
            }
        }
        let next_game = AtomicU32::new(0);
        let schedule = move |_: &AtomicUsize| {
            let g = next_game.fetch_add(1, Ordering::Relaxed);
            if g >= games {
                None
            } else {
                Some(pairs[g as usize % pairs.len()])
            }
        };
        self.run_games(games as u64, threads, seed, &schedule);
    }

    /// Match `player` against every previously registered AI, alternating
    /// seats, until roughly `target_samples` age-0 samples were collected.
    pub fn generate_dataset_from_ai(
        &mut self,
        player: Box<dyn AiPlayer>,
        target_samples: usize,
        threads: usize,
        seed: u64,
    ) {
        self.add_player(player);
        assert!(self.players.len() >= 2, "need an opponent pool");

        let target = self.players.len() - 1;
        let opponents = target; // every player except the new one
        let round = AtomicU32::new(0);
        let schedule = move |collected: &AtomicUsize| {
            if collected.load(Ordering::Relaxed) >= target_samples {
                return None;
            }
            let r = round.fetch_add(1, Ordering::Relaxed) as usize;
            let opponent = r % opponents;
            // Alternate seats between rounds so both colors are covered.
            if (r / opponents) % 2 == 0 {
                Some((target, opponent))
            } else {
                Some((opponent, target))
            }
        };
        self.run_games(u64::MAX, threads, seed, &schedule);
    }

    fn run_games<F>(&mut self, expected: u64, threads: usize, seed: u64, schedule: &F)
    where
        F: Fn(&AtomicUsize) -> Option<(usize, usize)> + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()
            .expect("tournament thread pool");

        let progress = if expected == u64::MAX {
            ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new(expected)
        };
        progress.set_style(
            ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
            )
            .unwrap(),
        );
        progress.set_message("self-play");

        let collected = AtomicUsize::new(0);
        let merged: Mutex<[Dataset; 3]> = Mutex::new(Default::default());
        let this = &*self;

        pool.scope(|scope| {
            for t in 0..threads.max(1) {
                let progress = progress.clone();
                let collected = &collected;
                let merged = &merged;
                let thread_seed = seed
                    .wrapping_add((t as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
                scope.spawn(move |_| {
                    let mut rng = SmallRng::seed_from_u64(thread_seed);
                    // One worker per AI for this thread; network copies and
                    // search scratch live inside them.
                    let mut workers: Vec<Box<dyn AiWorker + '_>> =
                        this.players.iter().map(|p| p.worker()).collect();
                    let mut local: [Dataset; 3] = Default::default();

                    while let Some((i, j)) = schedule(collected) {
                        let outcome = this.play_one_game([i, j], &mut workers, &mut rng);
                        collected.fetch_add(outcome.samples[0].len(), Ordering::Relaxed);

                        {
                            let mut stats = this.stats.lock().unwrap();
                            let seats = [i, j];
                            let winner = seats[outcome.winner_seat as usize];
                            stats[winner].wins += 1;
                            stats[winner].win_types.record(outcome.win_type);
                            for (seat, &index) in seats.iter().enumerate() {
                                stats[index].games += 1;
                                stats[index].think_ms += outcome.think_ms[seat];
                            }
                        }

                        for (age, samples) in outcome.samples.into_iter().enumerate() {
                            local[age].points.extend(samples);
                        }
                        progress.inc(1);
                    }

                    let mut merged = merged.lock().unwrap();
                    for (age, shard) in local.into_iter().enumerate() {
                        merged[age].extend(shard);
                    }
                });
            }
        });
        progress.finish_and_clear();

        let mut rng = SmallRng::seed_from_u64(seed ^ 0xD1CE);
        let merged = merged.into_inner().unwrap();
        for (age, shard) in merged.into_iter().enumerate() {
            self.datasets[age].extend(shard);
            self.datasets[age].shuffle(&mut rng);
        }
    }

    /// Play one full game between seats `ai[0]` (player 0) and `ai[1]`.
    /// Every pre-decision state after the draft is recorded with the acting
    /// AI's visit distribution; at most [`SAMPLES_PER_AGE`] survive per age.
    fn play_one_game(
        &self,
        ai: [usize; 2],
        workers: &mut [Box<dyn AiWorker + '_>],
        rng: &mut SmallRng,
    ) -> GameOutcome {
        let mut game = Controller::new(self.catalog, rng);
        let mut moves = Vec::new();
        let mut think_ms = [0.0f64; 2];
        let mut records: [Vec<SamplePoint>; 3] = Default::default();

        loop {
            game.enumerate_moves(&mut moves);
            let seat = game.player_to_move() as usize;
            let worker = &mut workers[ai[seat]];

            let start = Instant::now();
            let (mv, _) = worker.select_move(&game, &moves, rng);
            think_ms[seat] += start.elapsed().as_secs_f64() * 1e3;

            if !game.state.is_drafting() {
                let age = game.state.age as usize;
                let priors = worker
                    .puct_priors()
                    .copied()
                    .unwrap_or([0.0; POLICY_SIZE]);
                records[age].push(SamplePoint {
                    state: game.state,
                    phase: game.phase,
                    winner: 0,
                    win_type: WinType::None,
                    priors,
                });
            }

            if game.play(mv, rng) {
                break;
            }
        }

        let winner_seat = game.winner().unwrap();
        let win_type = game.win_type;

        let mut samples: [Vec<SamplePoint>; 3] = Default::default();
        for (age, mut pool) in records.into_iter().enumerate() {
            pool.shuffle(rng);
            pool.truncate(SAMPLES_PER_AGE);
            for point in pool.iter_mut() {
                point.winner = winner_seat;
                point.win_type = win_type;
            }
            samples[age] = pool;
        }

        GameOutcome {
            winner_seat,
            win_type,
            think_ms,
            samples,
        }
    }

    /// Drop the weakest players (by win rate) until `keep` remain.
    pub fn remove_worst(&mut self, keep: usize) {
        while self.players.len() > keep {
            let stats = self.stats.get_mut().unwrap();
            let mut worst = 0;
            for i in 1..stats.len() {
                if stats[i].win_rate() < stats[worst].win_rate() {
                    worst = i;
                }
            }
            log::info!("dropping AI: {}", stats[worst].name);
            stats.remove(worst);
            self.players.remove(worst);
            self.index_by_name = stats
                .iter()
                .enumerate()
                .map(|(i, s)| (s.name.clone(), i))
                .collect();
        }
    }

    pub fn summary(&self) -> String {
        use std::fmt::Write;
        let mut out = String::from("tournament results:\n");
        let stats = self.stats();
        for s in &stats {
            let avg_think = if s.games > 0 {
                s.think_ms / s.games as f64
            } else {
                0.0
            };
            writeln!(
                out,
                "{:<32} winrate {:.2} ({}/{}) [civil {}, military {}, science {}] {:.1} ms/game",
                s.name,
                s.win_rate(),
                s.wins,
                s.games,
                s.win_types.civil,
                s.win_types.military,
                s.win_types.science,
                avg_think,
            )
            .unwrap();
        }
        out
    }
}
