//! Command-line front end for the editor core.
//!
//! # Responsibility
//! - Map subcommands onto `EditorService` use-cases and bulk tools.
//! - Remember the last viewed model between runs.

use anyhow::{bail, Context, Result};
use atlas_core::exchange::{export_tables, import_tables, TableCount};
use atlas_core::model::identifier::system_name;
use atlas_core::navigation::Direction;
use atlas_core::sync::{sync_share_database, SyncDirection};
use atlas_core::{
    default_log_level, init_logging, open_db, AppConfig, BodyModel, Classification,
    DescriptionFilter, EditorService, Gender, ModelRecord, NewStructure, SaveOutcome,
    SessionStore,
};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use rusqlite::Connection;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "atlas")]
#[command(about = "Edit sentence descriptions of anatomical models", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "atlas.json", global = true)]
    config: PathBuf,

    /// Database file, overriding the config value
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Log level, overriding the config value
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Absolute log directory; file logging stays off without one
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a model and its paragraph
    Show { value: i64 },
    /// Move to the next model
    Next { value: i64 },
    /// Move to the previous model
    Prev { value: i64 },
    /// Jump to a value, or the nearest stored one
    Jump { value: i64 },
    /// Reopen the last viewed model
    Resume,
    /// Search models by name, then by legacy info
    Search {
        #[arg(default_value = "")]
        keywords: String,
        #[arg(long)]
        system: Option<u8>,
        #[arg(long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,
    },
    /// Print how a paragraph would be split
    Split {
        /// Paragraph file; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Save a paragraph to a model; blank input clears it
    Save {
        value: i64,
        /// Paragraph file; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Remove every sentence link of a model
    Clear { value: i64 },
    /// Add the sentences of one model to other models
    Link {
        source: i64,
        #[arg(required = true)]
        targets: Vec<i64>,
        /// Save the merged models instead of previewing them
        #[arg(long)]
        commit: bool,
    },
    /// Find the same-name model of the opposite gender
    Counterpart { value: i64 },
    /// Print a model's legacy info block
    Legacy { value: i64 },
    /// Print a model's paragraph extended with another model's sentences
    AppendFrom { value: i64, source: i64 },
    /// Percentage of models with at least one sentence
    Progress {
        #[arg(long)]
        system: Option<u8>,
        #[arg(long, value_enum)]
        gender: Option<GenderArg>,
    },
    /// Smallest free value of a partition
    Allocate {
        system: u8,
        #[arg(long)]
        parent: bool,
        #[arg(long, value_enum, default_value_t = GenderArg::Male)]
        gender: GenderArg,
    },
    /// Insert a new structure
    Create {
        value: i64,
        name: String,
        #[arg(long)]
        parent: Option<i64>,
    },
    /// Delete sentences no model links to
    Purge,
    /// Write attribution.json and ia_connect.json into a directory
    Export { dir: PathBuf },
    /// Load attribution.json and ia_connect.json from a directory
    Import { dir: PathBuf },
    /// Copy sentences to or from the share database
    Sync {
        #[arg(long)]
        download: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FilterArg {
    All,
    Without,
    With,
}

impl From<FilterArg> for DescriptionFilter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::All => Self::All,
            FilterArg::Without => Self::WithoutSentences,
            FilterArg::With => Self::WithSentences,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GenderArg {
    Male,
    Female,
}

impl From<GenderArg> for Gender {
    fn from(value: GenderArg) -> Self {
        match value {
            GenderArg::Male => Self::Male,
            GenderArg::Female => Self::Female,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    if let Some(database) = cli.database.clone() {
        config.database_path = database;
    }
    if let Some(level) = cli.log_level.clone() {
        config.log_level = Some(level);
    }
    if let Some(dir) = cli.log_dir.clone() {
        config.log_dir = Some(dir);
    }

    if let Some(dir) = &config.log_dir {
        let level = config.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, dir).context("starting file logging")?;
    }

    let conn = open_db(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    run(cli.command, &config, &conn)
}

fn run(command: Commands, config: &AppConfig, conn: &Connection) -> Result<()> {
    let service = EditorService::from_connection(conn)?.with_search_limit(config.search_limit);
    let session = SessionStore::new(&config.session_path);

    match command {
        Commands::Show { value } => visit(&service, &session, value, Direction::Jump, false),
        Commands::Next { value } => visit(&service, &session, value, Direction::Next, true),
        Commands::Prev { value } => visit(&service, &session, value, Direction::Previous, true),
        Commands::Jump { value } => visit(&service, &session, value, Direction::Jump, true),
        Commands::Resume => {
            let model = service.resume(&session)?;
            service.remember(&session, model.value())?;
            print_model(&model);
            Ok(())
        }
        Commands::Search {
            keywords,
            system,
            filter,
        } => {
            let records = service.search(&keywords, system, filter.into())?;
            for record in &records {
                print_record(record);
            }
            info!("event=cli_search module=cli status=ok hits={}", records.len());
            Ok(())
        }
        Commands::Split { file } => {
            let paragraph = read_paragraph(file.as_deref())?;
            for (index, sentence) in service.split_preview(&paragraph)?.iter().enumerate() {
                println!("{index:>3} {sentence}");
            }
            Ok(())
        }
        Commands::Save { value, file } => {
            let paragraph = read_paragraph(file.as_deref())?;
            let outcome = service.save_paragraph(value, &paragraph)?;
            print_outcome(&outcome);
            Ok(())
        }
        Commands::Clear { value } => {
            print_outcome(&service.clear_sentences(value)?);
            Ok(())
        }
        Commands::Link {
            source,
            targets,
            commit,
        } => {
            let source = service.load_model(source)?;
            let merged = service.preview_links(source.sentences(), &targets)?;
            if commit {
                for outcome in service.commit_models(&merged)? {
                    print_outcome(&outcome);
                }
            } else {
                for model in &merged {
                    print_model(model);
                }
            }
            Ok(())
        }
        Commands::Counterpart { value } => {
            match service.counterpart(value)? {
                Some(record) => print_record(&record),
                None => println!("no counterpart for {value}"),
            }
            Ok(())
        }
        Commands::Legacy { value } => {
            match service.legacy_info(value)? {
                Some(text) => println!("{text}"),
                None => println!("no legacy info for {value}"),
            }
            Ok(())
        }
        Commands::AppendFrom { value, source } => {
            let model = service.load_model(value)?;
            println!("{}", service.append_from_model(&model.paragraph(), source)?);
            Ok(())
        }
        Commands::Progress { system, gender } => {
            let percentage = service.progress_percentage(system, gender.map(Gender::from))?;
            println!("{percentage}%");
            Ok(())
        }
        Commands::Allocate {
            system,
            parent,
            gender,
        } => {
            let classification = Classification::new(system, parent, gender.into())?;
            println!("{}", service.allocate_value(classification)?);
            Ok(())
        }
        Commands::Create {
            value,
            name,
            parent,
        } => {
            let record = service.create_structure(NewStructure {
                value,
                name,
                parent_value: parent,
            })?;
            print_record(&record);
            Ok(())
        }
        Commands::Purge => {
            println!("purged {} sentences", service.purge_orphan_sentences()?);
            Ok(())
        }
        Commands::Export { dir } => {
            print_counts(&export_tables(conn, &dir)?);
            Ok(())
        }
        Commands::Import { dir } => {
            print_counts(&import_tables(conn, &dir)?);
            Ok(())
        }
        Commands::Sync { download } => {
            let Some(share) = &config.share_database_path else {
                bail!("share_database_path is not configured");
            };
            let direction = if download {
                SyncDirection::Download
            } else {
                SyncDirection::Upload
            };
            let report = sync_share_database(conn, share, direction)?;
            println!(
                "copied {} rows ({} sentences, {} links)",
                report.total(),
                report.sentences,
                report.links
            );
            Ok(())
        }
    }
}

fn visit<M, S>(
    service: &EditorService<M, S>,
    session: &SessionStore,
    value: i64,
    direction: Direction,
    remember: bool,
) -> Result<()>
where
    M: atlas_core::ModelRepository,
    S: atlas_core::SentenceRepository,
{
    let model = match direction {
        Direction::Jump if !remember => service.load_model(value)?,
        _ => service.navigate(value, direction)?,
    };
    if remember {
        service.remember(session, model.value())?;
    }
    print_model(&model);
    Ok(())
}

fn read_paragraph(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading paragraph from {}", path.display())),
        None => {
            let mut paragraph = String::new();
            std::io::stdin()
                .read_to_string(&mut paragraph)
                .context("reading paragraph from stdin")?;
            Ok(paragraph)
        }
    }
}

fn print_record(record: &ModelRecord) {
    let system = system_name(record.value.system_id()).unwrap_or("?");
    println!("{} [{}] {}", record.label(), system, record.gender());
}

fn print_model(model: &BodyModel) {
    print_record(&model.record);
    println!("{}", model.paragraph());
}

fn print_outcome(outcome: &SaveOutcome) {
    println!(
        "{}: linked={} unlinked={} reordered={} new_sentences={}",
        outcome.model_value,
        outcome.linked,
        outcome.unlinked,
        outcome.reordered,
        outcome.new_sentences
    );
}

fn print_counts(counts: &[TableCount]) {
    for count in counts {
        println!("{}: {}", count.table, count.rows);
    }
}
