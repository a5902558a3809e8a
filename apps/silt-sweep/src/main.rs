//! # Silt Sweep
//!
//! A standalone CLI that walks through log compaction on an in-memory Silt
//! store. Every scenario prints the log block by block before and after
//! compaction so the effect of each sweep or immediate write is visible.
//!
//! ## Block states
//!
//! ```text
//! #3  put  key = value    block holds data
//! #4  del  key            tombstone, holds data until swept
//! #5  ░░ cleared ░░       storage released
//! ```

use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use silt_compaction::{CompactionConfig, CompactionError, Compactor, ImmediateOutcome, SweepReport};
use silt_log::{GetOptions, MemoryStore, VersionedStore, WriteOptions};

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "silt-sweep")]
#[command(about = "Incremental compaction walkthrough for append-only versioned logs")]
#[command(version)]
struct Cli {
    /// JSON file with a compaction configuration
    #[arg(long, global = true)]
    config: Option<String>,

    /// Channel id under which sweep checkpoints are stored
    #[arg(long, global = true, default_value = "compaction")]
    channel: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Superseded values are swept; the live value and the newest block stay
    Demo,
    /// Deleted keys: value blocks go first, tombstones once a later sweep covers them
    Tombstones,
    /// Immediate put/del-and-clear guarded by compare-and-swap predicates
    Cas,
    /// Random workload with periodic sweeps and a safety check at the end
    Stress {
        /// Number of writes to issue
        #[arg(long, default_value_t = 5000)]
        ops: usize,
        /// Number of distinct keys
        #[arg(long, default_value_t = 64)]
        keys: usize,
        /// Sweep after this many writes
        #[arg(long, default_value_t = 250)]
        sweep_every: usize,
        /// Seed for the workload generator
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

type Result<T> = std::result::Result<T, CompactionError>;

// ─── Session: a store plus its compactor ───────────────────────────────────

struct Session {
    store: Arc<MemoryStore>,
    compactor: Compactor<MemoryStore>,
    channel: String,
}

impl Session {
    fn new(config: CompactionConfig, channel: &str) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            compactor: Compactor::with_config(store.clone(), config),
            store,
            channel: channel.to_string(),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.store
            .put(key.as_bytes(), value.as_bytes(), WriteOptions::new())
            .await?;
        step(&format!("put {} = {}", key.bright_white(), value));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.store.del(key.as_bytes(), WriteOptions::new()).await?;
        step(&format!("del {}", key.bright_white()));
        Ok(())
    }

    async fn sweep(&self) -> Result<SweepReport> {
        let report = self.compactor.sweep(&self.channel).await?;
        show_report(&report);
        Ok(report)
    }

    async fn value(&self, key: &str) -> Result<String> {
        let entry = self.store.get(key.as_bytes(), GetOptions::wait()).await?;
        Ok(match entry {
            Some(e) => format!("#{} {}", e.seq, e.value_str().unwrap_or("<binary>")),
            None => "(absent)".to_string(),
        })
    }
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

async fn show_log(store: &MemoryStore) -> Result<()> {
    let border = "─".repeat(44);
    println!("  ┌{}┐", border);
    println!(
        "  │ {:^42} │",
        format!("Log: {} blocks", store.length()).bright_yellow().to_string()
    );
    println!("  ├{}┤", border);

    for seq in 0..store.length() {
        let line = if seq == 0 {
            format!("#{:<3} header", seq).dimmed().to_string()
        } else if store.is_cleared(seq) {
            format!("#{:<3} ░░ cleared ░░", seq).bright_black().to_string()
        } else {
            match store.get_block(seq, GetOptions::no_wait()).await? {
                Some(e) if e.is_tombstone() => format!(
                    "#{:<3} {}  {}",
                    seq,
                    "del".bright_red(),
                    String::from_utf8_lossy(&e.key)
                ),
                Some(e) => format!(
                    "#{:<3} {}  {} = {}",
                    seq,
                    "put".bright_green(),
                    String::from_utf8_lossy(&e.key),
                    e.value_str().unwrap_or("<binary>")
                ),
                None => format!("#{:<3} ?", seq),
            }
        };
        // Pad on the visible width, colour codes excluded
        let visible = strip_width(&line);
        println!("  │ {}{} │", line, " ".repeat(42usize.saturating_sub(visible)));
    }
    println!("  └{}┘", border);
    Ok(())
}

/// Printed width of a line that may carry ANSI colour codes.
fn strip_width(line: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    for c in line.chars() {
        match (in_escape, c) {
            (false, '\u{1b}') => in_escape = true,
            (true, 'm') => in_escape = false,
            (true, _) => {}
            (false, _) => width += 1,
        }
    }
    width
}

fn show_report(report: &SweepReport) {
    let written = match &report.checkpoint {
        Some(cp) => cp.to_string(),
        None => "(unchanged)".to_string(),
    };
    println!(
        "  {} window {}  scanned {}  reclaimed {}  retained {}",
        "⟳".bright_cyan(),
        report.window.to_string().bright_white(),
        report.scanned,
        report.reclaimed.to_string().bright_green(),
        report.retained,
    );
    println!(
        "    lookups {}  cache hits {}  checkpoint {} → {}",
        report.index_lookups,
        report.cache_hits,
        report.previous,
        written.bright_white()
    );
}

fn show_outcome(label: &str, outcome: ImmediateOutcome) {
    let text = match outcome {
        ImmediateOutcome::Reclaimed(seq) => format!("reclaimed #{}", seq).bright_green(),
        ImmediateOutcome::NothingToReclaim => "nothing to reclaim".normal(),
        ImmediateOutcome::CasRejected => "cas rejected, block kept".bright_yellow(),
    };
    step(&format!("{:<28} → {}", label, text));
}

fn verdict(ok: bool, good: &str, bad: &str) {
    if ok {
        println!("\n  {} {}", "✓".bright_green().bold(), good.bright_green().bold());
    } else {
        println!("\n  {} {}", "✗".bright_red().bold(), bad.bright_red().bold());
    }
}

// ─── Demo ──────────────────────────────────────────────────────────────────

async fn run_demo(session: &Session) -> Result<()> {
    header("DEMO — Sweeping Superseded Values");

    section("Phase 1: Write three versions of A between other keys");
    session.put("A", "v1").await?;
    session.put("B", "b1").await?;
    session.put("A", "v3").await?;
    session.put("C", "c1").await?;
    session.put("A", "v5").await?;
    session.put("D", "d1").await?;
    show_log(&session.store).await?;

    section("Phase 2: Sweep");
    session.sweep().await?;
    show_log(&session.store).await?;
    step(&format!("get A → {}", session.value("A").await?));

    section("Phase 3: Sweep again without writes");
    let again = session.sweep().await?;
    verdict(
        again.is_noop(),
        "Second sweep found nothing to do",
        "Second sweep was not a no-op!",
    );

    section("Phase 4: Append and sweep the new window only");
    session.put("D", "d2").await?;
    session.put("E", "e1").await?;
    let next = session.sweep().await?;
    show_log(&session.store).await?;
    verdict(
        next.window.gte == 6,
        "Sweep resumed from the stored checkpoint",
        "Sweep re-read history below its checkpoint!",
    );
    Ok(())
}

// ─── Tombstones ────────────────────────────────────────────────────────────

async fn run_tombstones(session: &Session) -> Result<()> {
    header("TOMBSTONES — Deletes Across Two Sweeps");

    section("Phase 1: Put then delete B");
    session.put("X", "x1").await?;
    session.put("B", "b").await?;
    session.put("X", "x3").await?;
    session.del("B").await?;
    show_log(&session.store).await?;

    section("Phase 2: Sweep; the tombstone is the newest block and stays");
    session.sweep().await?;
    show_log(&session.store).await?;
    step(&format!("get B → {}", session.value("B").await?));

    section("Phase 3: One more write, then sweep the tombstone");
    session.put("X", "x5").await?;
    session.sweep().await?;
    show_log(&session.store).await?;
    step(&format!("get B → {}", session.value("B").await?));

    verdict(
        session.store.is_cleared(2) && session.store.is_cleared(4),
        "Value and tombstone of B both reclaimed",
        "Blocks of B are still held!",
    );
    Ok(())
}

// ─── CAS ───────────────────────────────────────────────────────────────────

async fn run_cas(session: &Session) -> Result<()> {
    header("CAS — Immediate Reclamation With Predicates");
    let compactor = &session.compactor;

    section("Phase 1: put_and_clear twice");
    show_outcome(
        "put_and_clear k = v1",
        compactor.put_and_clear(b"k", b"v1", WriteOptions::new()).await?,
    );
    show_outcome(
        "put_and_clear k = v2",
        compactor.put_and_clear(b"k", b"v2", WriteOptions::new()).await?,
    );
    show_log(&session.store).await?;

    section("Phase 2: CAS predicates");
    show_outcome(
        "put k = v3, cas → false",
        compactor
            .put_and_clear(b"k", b"v3", WriteOptions::with_cas(|_, _| false))
            .await?,
    );
    step(&format!("get k → {}", session.value("k").await?));
    show_outcome(
        "put k = v3, cas → true",
        compactor
            .put_and_clear(b"k", b"v3", WriteOptions::with_cas(|_, _| true))
            .await?,
    );
    step(&format!("get k → {}", session.value("k").await?));

    section("Phase 3: del_and_clear");
    show_outcome(
        "del missing, no-op",
        compactor.del_and_clear(b"missing", WriteOptions::new()).await?,
    );
    show_outcome(
        "del k, cas → false",
        compactor
            .del_and_clear(b"k", WriteOptions::with_cas(|_, _| false))
            .await?,
    );
    show_outcome(
        "del k, cas → true",
        compactor
            .del_and_clear(b"k", WriteOptions::with_cas(|_, _| true))
            .await?,
    );
    step(&format!("get k → {}", session.value("k").await?));
    show_log(&session.store).await?;

    let stats = compactor.stats();
    verdict(
        stats.immediate_reclaims == 3 && stats.cas_rejections == 2,
        "Every accepted write reclaimed its predecessor; rejected writes kept theirs",
        "Unexpected immediate reclamation counts!",
    );
    Ok(())
}

// ─── Stress ────────────────────────────────────────────────────────────────

async fn run_stress(
    session: &Session,
    ops: usize,
    keys: usize,
    sweep_every: usize,
    seed: u64,
) -> Result<()> {
    header("STRESS — Random Workload With Periodic Sweeps");

    let keys = keys.max(1);
    let sweep_every = sweep_every.max(1);
    let mut rng = StdRng::seed_from_u64(seed);

    section(&format!(
        "Issuing {} writes over {} keys, sweeping every {}",
        ops, keys, sweep_every
    ));
    for i in 0..ops {
        let key = format!("key-{}", rng.gen_range(0..keys));
        match rng.gen_range(0..10) {
            0..=5 => {
                session
                    .store
                    .put(key.as_bytes(), i.to_string().as_bytes(), WriteOptions::new())
                    .await?;
            }
            6 => session.store.del(key.as_bytes(), WriteOptions::new()).await?,
            7 | 8 => {
                session
                    .compactor
                    .put_and_clear(key.as_bytes(), i.to_string().as_bytes(), WriteOptions::new())
                    .await?;
            }
            _ => {
                session
                    .compactor
                    .del_and_clear(key.as_bytes(), WriteOptions::new())
                    .await?;
            }
        }
        if (i + 1) % sweep_every == 0 {
            session.compactor.sweep(&session.channel).await?;
        }
    }
    session.compactor.sweep(&session.channel).await?;

    section("Safety check: every live key still readable");
    let mut lost = 0;
    for (key, seq) in session.store.live_index() {
        if session.store.get_block(seq, GetOptions::no_wait()).await?.is_none() {
            lost += 1;
            step(&format!(
                "{} live at #{} was reclaimed",
                String::from_utf8_lossy(&key).bright_red(),
                seq
            ));
        }
    }

    section("Statistics");
    let stats = session.compactor.stats();
    match serde_json::to_string_pretty(&stats) {
        Ok(json) => println!("{}", json),
        Err(e) => step(&format!("cannot render statistics: {}", e)),
    }
    step(&format!(
        "log length {}, cleared {}, live keys {}",
        session.store.length(),
        session.store.cleared_count(),
        session.store.live_index().len()
    ));

    verdict(
        lost == 0,
        "No live block was reclaimed",
        &format!("{} live blocks were reclaimed!", lost),
    );
    Ok(())
}

// ─── Entry point ───────────────────────────────────────────────────────────

fn load_config(path: Option<&str>) -> Result<CompactionConfig> {
    match path {
        None => Ok(CompactionConfig::default()),
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| {
                CompactionError::InvalidConfig(format!("cannot read {}: {}", path, e))
            })?;
            CompactionConfig::from_json(&json)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.channel.trim().is_empty() {
        return Err(CompactionError::MissingChannelId);
    }
    let config = load_config(cli.config.as_deref())?;
    let session = Session::new(config, &cli.channel);

    match cli.command {
        Commands::Demo => run_demo(&session).await,
        Commands::Tombstones => run_tombstones(&session).await,
        Commands::Cas => run_cas(&session).await,
        Commands::Stress {
            ops,
            keys,
            sweep_every,
            seed,
        } => run_stress(&session, ops, keys, sweep_every, seed).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".bright_red().bold(), e);
        process::exit(1);
    }
}
