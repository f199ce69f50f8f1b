use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linemark::config::MarkConfig;
use linemark::models::{parse_line, Expansion, Mark, NodeId};
use linemark::render;
use linemark::service::{default_mark_name, Conflict, ReconcileOutcome};
use linemark::workspace::{Editor, Workspace};
use linemark::MarkService;

#[derive(Parser)]
#[command(name = "lmk")]
#[command(about = "Named, grouped line bookmarks for a workspace")]
struct Cli {
    /// Workspace folder (repeat for a multi-root workspace)
    #[arg(short, long, global = true)]
    workspace: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the mark tree
    Tree {
        /// Also show children of collapsed groups
        #[arg(short, long)]
        all: bool,
    },
    /// List marks, optionally only those in one file
    List {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Bookmark a line (lines are one-based)
    Add {
        file: PathBuf,
        line: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long, default_value = "")]
        comment: String,
        /// Group (or mark whose group) receives the new mark
        #[arg(short, long)]
        under: Option<String>,
    },
    /// Create a group
    Group {
        name: String,
        #[arg(short, long)]
        under: Option<String>,
    },
    /// Delete a mark or a group with everything inside it
    Rm { node: String },
    Rename { node: String, name: String },
    Comment { node: String, text: String },
    /// Change the line a mark points at (one-based)
    Line { node: String, line: String },
    Collapse { node: String },
    Expand { node: String },
    /// Reorder (up/down) or reparent (left/right) a node
    Move { node: String, direction: Direction },
    /// Drag a node onto another, or onto the top level when no target is given
    Drop {
        node: String,
        #[arg(long)]
        onto: Option<String>,
    },
    /// Print the next mark in the same group
    Next { node: String },
    /// Print the previous mark in the same group
    Prev { node: String },
    /// Fuzzy-search marks by name
    Search {
        query: String,
        /// File whose marks are listed for an empty query
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Write a subtree to a file
    Export { node: String, dest: PathBuf },
    /// Add exported subtrees
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long)]
        under: Option<String>,
    },
    /// Watch the save file and pick up edits made outside this process
    Sync {
        /// Take the file's contents without asking
        #[arg(short, long)]
        yes: bool,
        /// Seconds between checks
        #[arg(long, default_value = "2")]
        interval: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Editor stand-in that prints locations.
struct Terminal;

impl Editor for Terminal {
    fn reveal(&self, path: &Path, line: u32) {
        println!("{}:{}", path.display(), line + 1);
    }

    fn active_file(&self) -> Option<PathBuf> {
        None
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "linemark=info".into()),
    );

    // stdout carries command output
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn node(service: &MarkService, reference: &str) -> anyhow::Result<NodeId> {
    service
        .resolve_ref(reference)
        .ok_or_else(|| anyhow!("No mark matches {:?}", reference))
}

fn anchor(service: &MarkService, reference: Option<&str>) -> anyhow::Result<Option<NodeId>> {
    reference.map(|r| node(service, r)).transpose()
}

fn one_based(raw: &str) -> anyhow::Result<u32> {
    let line = parse_line(raw)?;
    line.checked_sub(1)
        .ok_or_else(|| anyhow!("Line numbers start at 1"))
}

fn relative(workspace: &Workspace, file: &Path) -> anyhow::Result<String> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(workspace.relative(&cwd.join(file)))
}

fn print_mark(service: &MarkService, node: NodeId) {
    let chain = service
        .chain(node)
        .map(|c| c.iter().map(usize::to_string).collect::<Vec<_>>().join("."))
        .unwrap_or_default();
    if let Some(mark) = service.mark(node) {
        println!(
            "{:<8} {:<5} {}  [{}]",
            chain,
            mark.kind().as_str(),
            render::label(mark),
            mark.id()
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let roots = if cli.workspace.is_empty() {
        vec![std::env::current_dir().context("Failed to read current directory")?]
    } else {
        cli.workspace
    };
    let workspace = Workspace::new(roots);
    let mut config = MarkConfig::load();
    // Each invocation writes once, synchronously, before exiting.
    let save_at_exit = config.auto_save;
    config.auto_save = false;

    let mut service = MarkService::open(config, workspace.clone())?;
    let mut changed = true;

    match cli.command {
        Commands::Tree { all } => {
            let title = service
                .store()
                .map(|s| s.path().display().to_string())
                .unwrap_or_else(|| "marks".into());
            print!("{}", render::render_tree(service.tree(), service.root(), &title, all));
            changed = false;
        }
        Commands::List { file } => {
            let nodes = match file {
                Some(file) => service.marks_in_file(&relative(&workspace, &file)?),
                None => service.leaves(),
            };
            for n in nodes {
                print_mark(&service, n);
            }
            changed = false;
        }
        Commands::Add {
            file,
            line,
            name,
            comment,
            under,
        } => {
            let file = relative(&workspace, &file)?;
            let line = one_based(&line)?;
            let name = match name {
                Some(name) => name,
                None if service.config().default_mark_name => default_mark_name(&file, line),
                None => bail!("A name is required unless DefaultMarkName is enabled"),
            };
            let under = anchor(&service, under.as_deref())?;
            let n = service.add_leaf(Mark::leaf(name, comment, file, line), under)?;
            print_mark(&service, n);
        }
        Commands::Group { name, under } => {
            let under = anchor(&service, under.as_deref())?;
            let n = service.create_group(under, &name)?;
            print_mark(&service, n);
        }
        Commands::Rm { node: r } => {
            let n = node(&service, &r)?;
            service.delete_node(n)?;
        }
        Commands::Rename { node: r, name } => {
            let n = node(&service, &r)?;
            service.rename(n, &name)?;
        }
        Commands::Comment { node: r, text } => {
            let n = node(&service, &r)?;
            service.edit_comment(n, &text)?;
        }
        Commands::Line { node: r, line } => {
            let n = node(&service, &r)?;
            service.set_line(n, one_based(&line)?)?;
        }
        Commands::Collapse { node: r } => {
            let n = node(&service, &r)?;
            service.set_expansion(n, Expansion::Collapsed)?;
        }
        Commands::Expand { node: r } => {
            let n = node(&service, &r)?;
            service.set_expansion(n, Expansion::Expanded)?;
        }
        Commands::Move { node: r, direction } => {
            let n = node(&service, &r)?;
            changed = match direction {
                Direction::Up => service.move_up(n)?,
                Direction::Down => service.move_down(n)?,
                Direction::Left => service.promote(n)?,
                Direction::Right => service.demote(n)?,
            };
            if !changed {
                println!("Nothing to do");
            }
        }
        Commands::Drop { node: r, onto } => {
            let n = node(&service, &r)?;
            let target = anchor(&service, onto.as_deref())?;
            service.begin_drag(n)?;
            service.drop_on(target)?;
        }
        Commands::Next { node: r } => {
            let n = node(&service, &r)?;
            let next = service.next(n)?;
            service.reveal(next, &Terminal)?;
            changed = false;
        }
        Commands::Prev { node: r } => {
            let n = node(&service, &r)?;
            let prev = service.previous(n)?;
            service.reveal(prev, &Terminal)?;
            changed = false;
        }
        Commands::Search { query, file } => {
            let active = file.or_else(|| Terminal.active_file());
            let active = active.map(|f| relative(&workspace, &f)).transpose()?;
            let index = service.search_index(active.as_deref());
            index.search(&query).await;
            for hit in index.results().hits {
                println!(
                    "{:>4}  {}  {}:{}",
                    hit.score,
                    hit.entry.name,
                    hit.entry.file_path,
                    hit.entry.line + 1
                );
            }
            changed = false;
        }
        Commands::Export { node: r, dest } => {
            let n = node(&service, &r)?;
            service.export(n, &dest)?;
            changed = false;
        }
        Commands::Import { files, under } => {
            let under = anchor(&service, under.as_deref())?;
            let added = service.import(&files, under)?;
            for n in added {
                print_mark(&service, n);
            }
        }
        Commands::Sync { yes, interval } => {
            sync(&mut service, yes, Duration::from_secs(interval.max(1))).await?;
            changed = false;
        }
    }

    if changed && save_at_exit {
        service.save()?;
    }
    Ok(())
}

async fn sync(service: &mut MarkService, yes: bool, interval: Duration) -> anyhow::Result<()> {
    let path = service
        .store()
        .map(|s| s.path().to_path_buf())
        .ok_or_else(|| anyhow!("No save file for this workspace"))?;
    tracing::info!("Watching {}", path.display());

    let mut ticker = tokio::time::interval(interval);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }

        match service.on_focus_regained()? {
            ReconcileOutcome::Unavailable | ReconcileOutcome::Unchanged => {}
            ReconcileOutcome::Identical => tracing::debug!("Save file touched, contents unchanged"),
            ReconcileOutcome::Replaced => println!("Reloaded {}", path.display()),
            ReconcileOutcome::Pending(conflict) => {
                if yes || confirm(&conflict, &mut stdin).await? {
                    service.accept(conflict);
                    println!("Reloaded {}", path.display());
                } else {
                    service.decline(conflict);
                    service.save()?;
                    println!("Kept local marks");
                }
            }
        }
    }
}

async fn confirm(
    conflict: &Conflict,
    stdin: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>,
) -> anyhow::Result<bool> {
    println!(
        "{} changed outside lmk ({} marks). Load it? [y/N]",
        conflict.path().display(),
        conflict.tree().leaves().len()
    );
    let answer = stdin.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
