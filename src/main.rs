//! SEAS Analytics CLI
//!
//! Command-line interface for the analytics layer:
//! - Query point values and current values
//! - Summarise equipment key metrics
//! - Tag topics and build tag reports
//! - Create and delete dashboards
//! - Import readings and seed metadata

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use seas_analytics::config::{generate_default_config, Config};
use seas_analytics::integrations::{DashboardClient, GeoLocation, GeocodingClient};
use seas_analytics::query::point_values;
use seas_analytics::store::{MetadataSource, ReadingSource, SensorPoint};
use seas_analytics::summary::{add_current_values, ahu_current_values, equipment_metrics};
use seas_analytics::tags::{
    equipment_dashboard_metrics, tag_report, tag_topics, trending_report, Report, RoleCatalog,
    TagSpec, TagTopicsRequest, TopicFilter,
};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "seas-analytics")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Analytics and reporting for building sensor data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query the values of a point
    Values {
        /// Point entity id or topic
        point: String,
        /// Range: 24h, 30m, 7 days, 3 months, today, yesterday, or "start[,end]"
        #[arg(short, long)]
        range: Option<String>,
        /// Bucket size (day, hour, minute, second)
        #[arg(short, long)]
        granularity: Option<String>,
        /// Aggregation function (avg, sum, min, max, count)
        #[arg(short, long)]
        aggregation: Option<String>,
    },

    /// Show the current value of points
    Current {
        /// Point entity ids or topics
        #[arg(required = true)]
        points: Vec<String>,
    },

    /// Show the key metrics of an air handling unit
    Ahu {
        /// Equipment entity id
        equipment: String,
    },

    /// List the dashboard metrics of an equipment
    Metrics {
        /// Equipment entity id
        equipment: String,
        /// Role catalog JSON file (default: built-in dashboard metrics)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Build the topic/tag report
    Report,

    /// Build the BACnet trending report
    Trending,

    /// Tag topics
    Tag {
        /// Topic filter: c:<text> (contains) or nc:<text> (does not contain)
        #[arg(short = 'F', long = "filter")]
        filters: Vec<String>,
        /// Tag to apply: <tag> or <tag>=<value>
        #[arg(short = 'T', long = "tag")]
        tags: Vec<String>,
        /// Topics to tag (ignored with --all)
        #[arg(long = "topic")]
        topics: Vec<String>,
        /// Tag every topic passing the filters
        #[arg(long)]
        all: bool,
        /// Only consider topics without a point
        #[arg(long)]
        unmapped: bool,
    },

    /// Manage dashboards
    Dashboard {
        #[command(subcommand)]
        action: DashboardAction,
    },

    /// Geocode a site from its geo tags
    Locate {
        /// Site entity id
        site: String,
    },

    /// Import readings from CSV (topic,ts,string_value,double_value)
    Import {
        /// Path to CSV file
        path: PathBuf,
    },

    /// Seed point and entity metadata from JSON
    Seed {
        /// Path to JSON file
        path: PathBuf,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DashboardAction {
    /// Create the dashboard of a point
    Point {
        /// Point entity id or topic
        point: String,
    },
    /// Create the dashboard of an equipment
    Equipment {
        /// Equipment entity id
        equipment: String,
        /// Dashboard title (default: equipment display name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a dashboard
    Delete {
        /// Dashboard uid
        uid: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config);

    match cli.command {
        Commands::Values {
            point,
            range,
            granularity,
            aggregation,
        } => {
            let meta = config.store.metadata().connect()?;
            let readings = config.store.timeseries().connect()?;
            let point = find_point(&meta, &point)?;

            let request = config.query.request(
                range.as_deref(),
                granularity.as_deref(),
                aggregation.as_deref(),
            )?;
            let series = point_values(&readings, &point, &request, chrono::Utc::now())?;

            let header = ["ts", "time", "value"];
            let rows: Vec<Vec<String>> = series
                .iter()
                .map(|s| {
                    vec![
                        s.ts.to_string(),
                        s.time().map(|t| t.to_rfc3339()).unwrap_or_default(),
                        s.value.to_string(),
                    ]
                })
                .collect();

            if cli.format == OutputFormat::Table {
                println!("{} ({})", point.topic, series.window);
            }
            emit(cli.format, &series, &header, &rows)?;
        }

        Commands::Current { points } => {
            let meta = config.store.metadata().connect()?;
            let readings = config.store.timeseries().connect()?;

            let points = points
                .iter()
                .map(|p| find_point(&meta, p))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let summaries = add_current_values(&readings, points)?;

            let rows: Vec<Vec<String>> = summaries
                .iter()
                .map(|s| vec![s.point.topic.clone(), s.current_display()])
                .collect();
            emit(cli.format, &summaries, &["topic", "current value"], &rows)?;
        }

        Commands::Ahu { equipment } => {
            let meta = config.store.metadata().connect()?;
            let readings = config.store.timeseries().connect()?;
            let values = ahu_current_values(&meta, &readings, &equipment)?;

            let rows: Vec<Vec<String>> = values
                .iter()
                .map(|v| {
                    vec![
                        v.role.clone(),
                        v.summary.point.topic.clone(),
                        v.summary.current_display(),
                    ]
                })
                .collect();
            emit(cli.format, &values, &["role", "topic", "current value"], &rows)?;
        }

        Commands::Metrics { equipment, catalog } => {
            let meta = config.store.metadata().connect()?;
            let catalog = load_catalog(catalog.as_ref())?;
            let metrics = equipment_metrics(&meta.points_for_equipment(&equipment)?, &catalog);

            let rows: Vec<Vec<String>> = metrics
                .iter()
                .map(|m| vec![m.metric.clone(), m.topic.clone()])
                .collect();
            emit(cli.format, &metrics, &["metric", "topic"], &rows)?;
        }

        Commands::Report => {
            let meta = config.store.metadata().connect()?;
            let readings = config.store.timeseries().connect()?;

            let topics = readings.list_topics()?;
            let points = topics
                .iter()
                .map(|t| meta.point_for_topic(t))
                .collect::<Result<Vec<_>, _>>()?;
            let report = tag_report(
                topics
                    .iter()
                    .map(String::as_str)
                    .zip(points.iter().map(Option::as_ref)),
            );
            emit_report(cli.format, &report)?;
        }

        Commands::Trending => {
            let meta = config.store.metadata().connect()?;
            let report = trending_report(&meta.all_points()?);
            emit_report(cli.format, &report)?;
        }

        Commands::Tag {
            filters,
            tags,
            topics,
            all,
            unmapped,
        } => {
            let request = TagTopicsRequest {
                filters: filters
                    .iter()
                    .map(|f| parse_filter(f))
                    .collect::<anyhow::Result<Vec<_>>>()?,
                tags: tags.iter().map(|t| TagSpec::parse(t)).collect(),
                select_all: all,
                topics,
                only_unmapped: unmapped,
            };

            let meta = config.store.metadata().connect()?;
            let readings = config.store.timeseries().connect()?;
            let tagged = tag_topics(&readings, &meta, &request)?;

            let rows: Vec<Vec<String>> = tagged
                .iter()
                .map(|t| {
                    vec![
                        t.topic.clone(),
                        t.point.clone(),
                        t.name.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            emit(cli.format, &tagged, &["topic", "point", "name"], &rows)?;
        }

        Commands::Dashboard { action } => {
            let client = DashboardClient::new(config.dashboard.clone())?;

            let receipt = match action {
                DashboardAction::Point { point } => {
                    let meta = config.store.metadata().connect()?;
                    let point = find_point(&meta, &point)?;
                    client.create_point_dashboard(&point.topic).await?
                }
                DashboardAction::Equipment { equipment, name } => {
                    let meta = config.store.metadata().connect()?;
                    let metrics = equipment_metrics(
                        &meta.points_for_equipment(&equipment)?,
                        &equipment_dashboard_metrics(),
                    );
                    let name = match name {
                        Some(name) => name,
                        None => meta
                            .entity_tags(&equipment)?
                            .and_then(|tags| tags.get("dis").cloned())
                            .unwrap_or_else(|| equipment.clone()),
                    };
                    client.create_equipment_dashboard(&name, &metrics).await?
                }
                DashboardAction::Delete { uid } => client.delete(&uid).await,
            };

            match receipt {
                Some(receipt) => {
                    let rows = vec![vec![
                        receipt.status.to_string(),
                        receipt.uid.clone().unwrap_or_default(),
                        receipt.url.clone().unwrap_or_default(),
                    ]];
                    emit(cli.format, &receipt, &["status", "uid", "url"], &rows)?;
                }
                None => eprintln!("Dashboard service unavailable, nothing was changed"),
            }
        }

        Commands::Locate { site } => {
            let meta = config.store.metadata().connect()?;
            let Some(tags) = meta.entity_tags(&site)? else {
                bail!("Site not found: {}", site);
            };

            let client = GeocodingClient::new(config.geocoding.clone())?;
            if !client.is_enabled() {
                eprintln!("Geocoding is disabled (no API key configured)");
            }

            let mut cache: HashMap<String, GeoLocation> = HashMap::new();
            match client.locate_site(&tags, &site, &mut cache).await {
                Some(location) => {
                    let rows = vec![vec![
                        location.site_id.clone(),
                        location.latitude.to_string(),
                        location.longitude.to_string(),
                    ]];
                    emit(cli.format, &location, &["site", "latitude", "longitude"], &rows)?;
                }
                None => eprintln!("Could not locate site {}", site),
            }
        }

        Commands::Import { path } => {
            let file = std::fs::File::open(&path)
                .with_context(|| format!("File not found: {:?}", path))?;
            let mut readings = config.store.timeseries().connect()?;
            let imported = readings.import_csv(file)?;
            println!("Imported {} readings from {:?}", imported, path);
        }

        Commands::Seed { path } => {
            let file = std::fs::File::open(&path)
                .with_context(|| format!("File not found: {:?}", path))?;
            let meta = config.store.metadata().connect()?;
            let (entities, points) = meta.import_json(file)?;
            println!(
                "Seeded {} entities and {} points from {:?}",
                entities, points, path
            );
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("seas_analytics={}", config.logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Look a point up by entity id, then by topic
fn find_point<M: MetadataSource>(meta: &M, key: &str) -> anyhow::Result<SensorPoint> {
    if let Some(point) = meta.point(key)? {
        return Ok(point);
    }
    match meta.point_for_topic(key)? {
        Some(point) => Ok(point),
        None => bail!("Point not found: {}", key),
    }
}

fn load_catalog(path: Option<&PathBuf>) -> anyhow::Result<RoleCatalog> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read catalog {:?}", path))?;
            Ok(serde_json::from_str(&content)?)
        }
        None => Ok(equipment_dashboard_metrics()),
    }
}

/// Parse `c:<text>` or `nc:<text>`
fn parse_filter(s: &str) -> anyhow::Result<TopicFilter> {
    let Some((kind, text)) = s.split_once(':') else {
        bail!("Invalid filter '{}'. Use c:<text> or nc:<text>", s);
    };
    TopicFilter::from_json(&serde_json::json!({ "t": kind, "f": text }))
        .with_context(|| format!("Invalid filter '{}'. Use c:<text> or nc:<text>", s))
}

fn emit_report(format: OutputFormat, report: &Report) -> anyhow::Result<()> {
    if format == OutputFormat::Csv {
        report.write_csv(std::io::stdout().lock())?;
        return Ok(());
    }
    let header: Vec<&str> = report.header.iter().map(String::as_str).collect();
    emit(format, report, &header, &report.rows)
}

fn emit<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    header: &[&str],
    rows: &[Vec<String>],
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout().lock());
            writer.write_record(header)?;
            for row in rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        OutputFormat::Table => print_table(header, rows)?,
    }
    Ok(())
}

fn print_table(header: &[&str], rows: &[Vec<String>]) -> std::io::Result<()> {
    if rows.is_empty() {
        println!("No data.");
        return Ok(());
    }

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = std::io::stdout().lock();
    write_line(&mut out, header.iter().copied(), &widths)?;
    let rule_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    writeln!(out, "{}", "-".repeat(rule_width))?;
    for row in rows {
        write_line(&mut out, row.iter().map(String::as_str), &widths)?;
    }
    Ok(())
}

fn write_line<'a, W: Write>(
    out: &mut W,
    cells: impl Iterator<Item = &'a str>,
    widths: &[usize],
) -> std::io::Result<()> {
    let text: Vec<String> = cells
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect();
    writeln!(out, "{}", text.join("  ").trim_end())
}
