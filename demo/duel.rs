use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use duelmind::game::Catalog;
use duelmind::strategies::mcts::puct::{PuctConfig, PuctSearch};
use duelmind::strategies::mcts::ucb::{UcbConfig, UcbSearch};
use duelmind::strategies::mcts::RolloutPolicy;
use duelmind::strategies::{NoBurnAi, RandomAi};
use duelmind::tournament::{Dataset, Tournament};

#[derive(Parser)]
#[command(name = "duel", about = "7 Wonders Duel self-play driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a round-robin tournament and write per-age datasets.
    Generate {
        /// Number of games to play.
        #[arg(long, default_value_t = 100)]
        games: u32,

        /// Worker threads for the tournament pool.
        #[arg(long, default_value_t = std::thread::available_parallelism().map_or(4, |n| n.get()))]
        threads: usize,

        /// Output path prefix; three files `<prefix>_age{0,1,2}.bin` are written.
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Search iterations per determinization for the MCTS players.
        #[arg(long, default_value_t = 1000)]
        iterations: u32,

        /// Root determinizations per decision.
        #[arg(long, default_value_t = 8)]
        samples: u32,

        /// Leave out the trivial baseline players.
        #[arg(long)]
        no_baselines: bool,
    },

    /// Summarize a dataset file.
    Stats {
        /// Dataset file produced by `generate`.
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    color_backtrace::install();
    pretty_env_logger::init();

    match Cli::parse().command {
        Command::Generate {
            games,
            threads,
            out,
            seed,
            iterations,
            samples,
            no_baselines,
        } => {
            let catalog = Catalog::new();
            let mut tournament = Tournament::new(&catalog);

            if !no_baselines {
                tournament.add_player(Box::new(RandomAi));
                tournament.add_player(Box::new(NoBurnAi));
            }
            tournament.add_player(Box::new(UcbSearch::new(UcbConfig {
                iterations,
                samples,
                rollout: RolloutPolicy::NoBurn,
                ..Default::default()
            })));
            tournament.add_player(Box::new(PuctSearch::new(PuctConfig {
                iterations,
                samples,
                ..Default::default()
            })));

            tournament.generate_dataset(games, threads, seed);
            print!("{}", tournament.summary());

            if let Some(parent) = out.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
            }
            for (age, dataset) in tournament.datasets().iter().enumerate() {
                let path = out.with_file_name(format!(
                    "{}_age{age}.bin",
                    out.file_name().unwrap_or_default().to_string_lossy()
                ));
                dataset
                    .save(&path)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("wrote {} samples to {}", dataset.len(), path.display());
            }
        }

        Command::Stats { input } => {
            let dataset = Dataset::load(&input)
                .with_context(|| format!("loading {}", input.display()))?;
            println!("{}", serde_json::to_string_pretty(&dataset.stats())?);
        }
    }

    Ok(())
}
