use std::env;
use std::sync::Arc;

use imagechat_auth::{AccessGate, QueryHistory, Session};
use imagechat_core::config::{expand_path, Config};
use imagechat_core::error::Error;
use imagechat_core::traits::{FeedbackStore, HistoryStore, UserStore};
use imagechat_core::types::{Query, QueryOutcome};
use imagechat_query::QueryOrchestrator;
use imagechat_relevance::RelevanceAdjuster;
use imagechat_remote::{HttpAnswerGenerator, HttpSimilarityIndex};
use imagechat_store::SqliteStore;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <register|query|history|feedback> [args...]", prog);
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn login_or_exit(gate: &AccessGate, session: &mut Session, email: &str, password: &str) {
    if let Err(e) = gate.login(session, email, password) {
        eprintln!("Login failed: {}", e);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let (cmd, args) = parse_args();

    let db_path = expand_path(
        config
            .get::<String>("store.db_path")
            .unwrap_or_else(|_| "./data/imagechat.db".to_string()),
    );
    let store = Arc::new(SqliteStore::open(&db_path)?);
    let gate = AccessGate::new(store.clone() as Arc<dyn UserStore>);
    let history = QueryHistory::new(store.clone() as Arc<dyn HistoryStore>);
    let policy = config.policy();

    match cmd.as_str() {
        "register" => {
            if args.len() != 3 {
                eprintln!("Usage: imagechat register <name> <email> <password>");
                std::process::exit(1);
            }
            match gate.register(&args[0], &args[1], &args[2]) {
                Ok(user) => {
                    println!("✅ Registered {} <{}>. Log in to start querying.", user.name, user.email);
                }
                Err(e) => {
                    eprintln!("Registration failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        "query" => {
            if args.len() < 3 {
                eprintln!("Usage: imagechat query <email> <password> \"<text>\" [--similar]");
                std::process::exit(1);
            }
            let force_similarity = args.iter().any(|a| a == "--similar");
            let mut session = Session::Anonymous;
            login_or_exit(&gate, &mut session, &args[0], &args[1]);
            let user = gate.require_user(&session)?.clone();

            // History is recorded before orchestration; a history failure
            // must not block the query itself.
            if let Err(e) = history.record(&session, &args[2]) {
                eprintln!("⚠️  History not recorded: {}", e);
            }

            let generator_url = config
                .get::<String>("remote.generator_url")
                .unwrap_or_else(|_| "http://localhost:8081".to_string());
            let index_url = config
                .get::<String>("remote.index_url")
                .unwrap_or_else(|_| "http://localhost:8082".to_string());
            let generator = HttpAnswerGenerator::new(generator_url, policy.upstream_timeout())?;
            let index = HttpSimilarityIndex::new(index_url, policy.upstream_timeout())?;
            let adjuster = RelevanceAdjuster::new(
                store.clone() as Arc<dyn FeedbackStore>,
                policy.feedback_weight,
            );
            let orchestrator = QueryOrchestrator::new(generator, index, adjuster, policy);

            let query = Query::new(args[2].clone(), user.id, force_similarity);
            match orchestrator.handle_query(&query).await {
                Ok(QueryOutcome::Answer { text }) => {
                    println!("{}", text);
                }
                Ok(QueryOutcome::SimilarImages { images }) => {
                    if images.is_empty() {
                        println!("No matching images.");
                    }
                    for (i, img) in images.iter().enumerate() {
                        let url = img
                            .metadata
                            .get("image_url")
                            .map(String::as_str)
                            .unwrap_or("-");
                        println!(
                            "{}. {} (similarity {:.3}) {}",
                            i + 1,
                            img.document_id,
                            img.similarity,
                            url
                        );
                        println!("   {}", img.page_content);
                    }
                }
                Err(Error::NoResultsAvailable) => {
                    eprintln!("No results available: both services are unreachable.");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
        "history" => {
            if args.len() != 2 {
                eprintln!("Usage: imagechat history <email> <password>");
                std::process::exit(1);
            }
            let mut session = Session::Anonymous;
            login_or_exit(&gate, &mut session, &args[0], &args[1]);
            let entries = history.list(&session)?;
            if entries.is_empty() {
                println!("No queries yet.");
            }
            for entry in entries {
                println!("{}  {}", entry.timestamp.format("%Y-%m-%d %H:%M"), entry.query_text);
            }
        }
        "feedback" => {
            if args.len() != 6 {
                eprintln!(
                    "Usage: imagechat feedback <email> <password> <doc_id> <image_url> <+1|-1> \"<query>\""
                );
                std::process::exit(1);
            }
            let mut session = Session::Anonymous;
            login_or_exit(&gate, &mut session, &args[0], &args[1]);
            gate.require_user(&session)?;

            let rating: i64 = args[4].parse().unwrap_or(0);
            let adjuster = RelevanceAdjuster::new(
                store.clone() as Arc<dyn FeedbackStore>,
                policy.feedback_weight,
            );
            match adjuster.record_feedback(&args[2], &args[5], &args[3], rating) {
                Ok(()) => println!("✅ Feedback recorded"),
                Err(Error::Persistence(reason)) => {
                    println!("⚠️  Feedback not recorded ({}). Please retry.", reason);
                }
                Err(e) => {
                    eprintln!("Feedback rejected: {}", e);
                    std::process::exit(1);
                }
            }
        }
        _ => {
            eprintln!("Unknown command: {}", cmd);
            std::process::exit(1);
        }
    }
    Ok(())
}
