#[macro_use]
extern crate log;

use std::sync::Arc;

use animiru::{
    domain::{entities::tracker::TrackingUpdate, services::tracker::TrackerService},
    infrastructure::{
        config::Config, database::open_store,
        repositories::tracker::TrackerRepositoryImpl,
    },
};
use animiru_tracker::{Bangumi, ReqwestClient, TrackRecord, TrackStatus, bangumi};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(version, about = "Sync anime progress with online trackers")]
struct Opts {
    /// Path to config file
    #[clap(long)]
    config: Option<String>,
    /// Tracker to talk to
    #[clap(long, global = true, default_value = bangumi::NAME)]
    tracker: String,
    #[clap(subcommand)]
    subcmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the url to authorize animiru
    LoginUrl,
    /// Exchange the code from the redirect for a token
    Login { code: String },
    Logout,
    Search { query: String },
    /// Link a local anime to a tracker entry
    Track {
        anime_id: i64,
        media_id: i64,
        #[clap(long, default_value = "plan_to_watch")]
        status: TrackStatus,
    },
    Update {
        anime_id: i64,
        #[clap(long)]
        score: Option<f64>,
        #[clap(long)]
        episode: Option<f64>,
        #[clap(long)]
        status: Option<TrackStatus>,
    },
    /// Pull remote status for every tracker linked to an anime
    Status { anime_id: i64 },
    Untrack { anime_id: i64 },
}

fn print_record(tracker: &str, record: &TrackRecord) {
    println!(
        "{tracker}\t{}\t{}\t{}\tep {}/{}\tscore {}\t{}",
        record.media_id,
        record.title,
        record.status,
        record.last_episode_seen,
        record.total_episodes,
        record.score,
        record.tracking_url
    );
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let mut logger = env_logger::Builder::from_default_env();
    if std::env::var("RUST_LOG").is_err() {
        if let Ok(animiru_log) = std::env::var("ANIMIRU_LOG") {
            logger.parse_filters(&format!(
                "animiru={animiru_log},animiru_tracker={animiru_log}"
            ));
        }
    }
    logger.init();

    let opts: Opts = Opts::parse();
    let config = Config::open(opts.config.as_ref())?;

    debug!("config: {:?}", config);

    let pool = open_store(&config.database_path, config.create_database).await?;
    let mut tracker_repo = TrackerRepositoryImpl::new(pool);

    if let Some(bangumi_cfg) = config.bangumi.as_ref() {
        let http = Arc::new(ReqwestClient::new(&config.user_agent)?);
        let client = Bangumi::new(
            bangumi_cfg.client_id.clone(),
            bangumi_cfg.client_secret.clone(),
            &bangumi_cfg.redirect_url,
            http,
        )?
        .with_api_url(&bangumi_cfg.api_url)?;
        tracker_repo = tracker_repo.register(client);
    } else {
        warn!("bangumi is not configured");
    }

    let tracker_svc = TrackerService::new(tracker_repo);
    let tracker = opts.tracker.as_str();

    match opts.subcmd {
        Command::LoginUrl => {
            println!("{}", tracker_svc.login_start(tracker)?);
        }
        Command::Login { code } => {
            tracker_svc.login_end(tracker, code).await?;
            println!("logged in to {tracker}");
        }
        Command::Logout => {
            tracker_svc.logout(tracker).await?;
            println!("logged out of {tracker}");
        }
        Command::Search { query } => {
            for result in tracker_svc.search_anime(tracker, &query).await? {
                println!(
                    "{}\t{}\t{} eps\t{}",
                    result.media_id, result.title, result.total_episodes, result.tracking_url
                );
            }
        }
        Command::Track {
            anime_id,
            media_id,
            status,
        } => {
            let record = tracker_svc
                .track_anime(anime_id, tracker, media_id, status)
                .await?;
            print_record(tracker, &record);
        }
        Command::Update {
            anime_id,
            score,
            episode,
            status,
        } => {
            let update = TrackingUpdate {
                status,
                score,
                last_episode_seen: episode,
            };
            let record = tracker_svc
                .update_tracking(anime_id, tracker, update)
                .await?;
            print_record(tracker, &record);
        }
        Command::Status { anime_id } => {
            for tracked in tracker_svc.fetch_tracking_status(anime_id).await? {
                print_record(&tracked.tracker, &tracked.record);
            }
        }
        Command::Untrack { anime_id } => {
            tracker_svc.untrack_anime(anime_id, tracker).await?;
            println!("untracked anime {anime_id} from {tracker}");
        }
    }

    Ok(())
}
