//! Command-line entry point.
//!
//! # Responsibility
//! - Open the configured database and invoke core boundary operations.
//! - Print results as plain text for manual checks.

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use eventdesk_core::search::date_range::DateFilter;
use eventdesk_core::service::event_service::{SearchOutcome, ShowOutcome, SquashOutcome};
use eventdesk_core::{
    init_from_config, open_db, Candidate, CloneOutcome, CoreConfig, DeleteOutcome, EditOutcome,
    Event, EventId, EventService, HttpSourceFetcher, SearchRequest, SourceId, SourceService,
    SourceUpdate,
};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

/// EventDesk: import event sources, find duplicates and search events.
#[derive(Parser, Debug)]
#[command(name = "eventdesk", version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Database file, overriding the configured path.
    #[arg(short = 'd', long = "db")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import events from a source URL.
    Import { origin: String },
    /// List duplicate groups for a comparison type.
    Duplicates {
        #[arg(default_value = "title")]
        kind: String,
    },
    /// Mark events as duplicates of a canonical event.
    Squash {
        canonical: EventId,
        #[arg(required = true)]
        ids: Vec<EventId>,
    },
    /// Search events by keyword or tag.
    Search(SearchArgs),
    /// List upcoming events, or events within a date range.
    List {
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// date, name or venue.
        #[arg(long)]
        order: Option<String>,
    },
    /// Show one event.
    Show { id: EventId },
    /// Add an event by hand.
    Add(EventFields),
    /// Replace the fields of an event.
    Edit {
        id: EventId,
        #[command(flatten)]
        fields: EventFields,
    },
    /// Print the fields a copy of an event would start from.
    Clone { id: EventId },
    /// Delete an event.
    Delete { id: EventId },
    /// List known venues.
    Venues,
    /// Change the origin or title of a source.
    SourceEdit {
        id: SourceId,
        origin: String,
        #[arg(long)]
        title: Option<String>,
    },
}

#[derive(Args, Debug)]
struct EventFields {
    title: String,
    #[arg(long)]
    start_date: Option<String>,
    #[arg(long)]
    start_time: Option<String>,
    #[arg(long)]
    end_date: Option<String>,
    #[arg(long)]
    end_time: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    url: Option<String>,
    /// Existing venue id; wins over --venue.
    #[arg(long)]
    venue_id: Option<String>,
    /// Venue name, created when unknown.
    #[arg(long)]
    venue: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
}

impl From<EventFields> for Candidate {
    fn from(fields: EventFields) -> Self {
        Candidate {
            title: fields.title,
            description: fields.description,
            url: fields.url,
            start_date: fields.start_date,
            start_time: fields.start_time,
            end_date: fields.end_date,
            end_time: fields.end_time,
            venue_id: fields.venue_id,
            venue_name: fields.venue,
            tags: fields.tags,
            time_zone: None,
        }
    }
}

#[derive(Args, Debug)]
struct SearchArgs {
    query: Option<String>,
    #[arg(long)]
    tag: Option<String>,
    /// date, name, venue or score.
    #[arg(long)]
    order: Option<String>,
    #[arg(long)]
    current_only: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let config = match cli.config.as_deref() {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    if let Err(err) = init_from_config(&config.logging) {
        eprintln!("warning: logging disabled: {err}");
    }

    let db_path = cli.db.unwrap_or_else(|| config.database.path.clone());
    let mut conn = open_db(&db_path)?;
    let now = Utc::now();
    info!(
        "event=cli_command module=cli status=start command={}",
        command_name(&cli.command)
    );

    match cli.command {
        Command::Import { origin } => {
            let fetcher = HttpSourceFetcher::new(&config.import)?;
            let outcome = SourceService::new(&mut conn).import_origin(
                &origin,
                &fetcher,
                &config.import,
                &config.listing,
                now,
            )?;
            for line in outcome.summary.lines() {
                println!("{line}");
            }
            for venue in &outcome.report.created_venues {
                println!("new venue: {} ({})", venue.title, venue.uuid);
            }
            if !outcome.summary.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Duplicates { kind } => {
            let listing = EventService::new(&mut conn, &config).find_duplicates_by_type(&kind)?;
            if let Some(message) = listing.message {
                eprintln!("{message}");
                return Ok(ExitCode::FAILURE);
            }
            for (key, members) in &listing.groups {
                println!("[{key}]");
                members.iter().for_each(print_event);
            }
        }
        Command::Squash { canonical, mut ids } => {
            if !ids.contains(&canonical) {
                ids.push(canonical);
            }
            match EventService::new(&mut conn, &config).squash_many(&ids, canonical)? {
                SquashOutcome::Squashed(event) => print_event(&event),
                SquashOutcome::Rejected(message) => {
                    eprintln!("{message}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Search(args) => {
            let request = SearchRequest {
                query: args.query,
                tag: args.tag,
                order: args.order,
                current_only: args.current_only,
            };
            match EventService::new(&mut conn, &config).search(&request, now)? {
                SearchOutcome::Found(grouped) => {
                    for warning in &grouped.warnings {
                        eprintln!("warning: {warning}");
                    }
                    println!("current ({}):", grouped.current.len());
                    grouped.current.iter().for_each(print_event);
                    if !request.current_only {
                        println!("past ({}):", grouped.past.len());
                        grouped.past.iter().for_each(print_event);
                    }
                }
                SearchOutcome::Rejected(message) => {
                    eprintln!("{message}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::List { start, end, order } => {
            let service = EventService::new(&mut conn, &config);
            let (warnings, events) = if start.is_some() || end.is_some() {
                let filter = DateFilter { start, end };
                let listing = service.within_dates(Some(&filter), order.as_deref(), now)?;
                for warning in &listing.range.warnings {
                    eprintln!("warning: {warning}");
                }
                println!("{} to {}:", listing.range.start, listing.range.end);
                (listing.warnings, listing.events)
            } else {
                let listing = service.future(order.as_deref(), now)?;
                (listing.warnings, listing.events)
            };
            for warning in &warnings {
                eprintln!("warning: {warning}");
            }
            events.iter().for_each(print_event);
        }
        Command::Show { id } => match EventService::new(&mut conn, &config).show(id)? {
            ShowOutcome::Found(detail) => {
                print_event(&detail.event);
                if let Some(venue) = detail.venue {
                    println!("  at {}", venue.title);
                }
                if !detail.event.tags.is_empty() {
                    println!("  tags: {}", detail.event.tags.join(", "));
                }
            }
            ShowOutcome::Redirect(canonical) => println!("duplicate of {canonical}"),
            ShowOutcome::NotFound(message) => {
                eprintln!("{message}");
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Add(fields) => {
            let outcome = EventService::new(&mut conn, &config).create(&fields.into())?;
            return Ok(print_edit(outcome));
        }
        Command::Edit { id, fields } => {
            let outcome = EventService::new(&mut conn, &config).update(id, &fields.into())?;
            return Ok(print_edit(outcome));
        }
        Command::Clone { id } => match EventService::new(&mut conn, &config).clone_event(id)? {
            CloneOutcome::Draft(fields) => {
                println!("title: {}", fields.title);
                let optional = [
                    ("description", &fields.description),
                    ("url", &fields.url),
                    ("venue_id", &fields.venue_id),
                ];
                for (name, value) in optional {
                    if let Some(value) = value {
                        println!("{name}: {value}");
                    }
                }
                if !fields.tags.is_empty() {
                    println!("tags: {}", fields.tags.join(", "));
                }
            }
            CloneOutcome::NotFound(message) => {
                eprintln!("{message}");
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Delete { id } => match EventService::new(&mut conn, &config).delete(id)? {
            DeleteOutcome::Deleted(event) => {
                print!("deleted ");
                print_event(&event);
            }
            DeleteOutcome::NotFound(message) => {
                eprintln!("{message}");
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Venues => {
            for venue in EventService::new(&mut conn, &config).venues()? {
                println!("{}  {}", venue.uuid, venue.title);
            }
        }
        Command::SourceEdit { id, origin, title } => {
            match SourceService::new(&mut conn).update(id, &origin, title.as_deref())? {
                SourceUpdate::Updated(source) => println!("{}  {}", source.uuid, source.url),
                SourceUpdate::Rejected(message) | SourceUpdate::NotFound(message) => {
                    eprintln!("{message}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_event(event: &Event) {
    println!(
        "{}  {}  {}",
        event.uuid,
        event.start_time.format("%Y-%m-%d %H:%M"),
        event.title
    );
}

fn print_edit(outcome: EditOutcome) -> ExitCode {
    match outcome {
        EditOutcome::Saved { event, new_venue } => {
            print_event(&event);
            if let Some(venue) = new_venue {
                println!("new venue: {} ({})", venue.title, venue.uuid);
            }
            ExitCode::SUCCESS
        }
        EditOutcome::Rejected(message) | EditOutcome::NotFound(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Import { .. } => "import",
        Command::Duplicates { .. } => "duplicates",
        Command::Squash { .. } => "squash",
        Command::Search(_) => "search",
        Command::List { .. } => "list",
        Command::Show { .. } => "show",
        Command::Add(_) => "add",
        Command::Edit { .. } => "edit",
        Command::Clone { .. } => "clone",
        Command::Delete { .. } => "delete",
        Command::Venues => "venues",
        Command::SourceEdit { .. } => "source_edit",
    }
}
