//! Unit tests for the session registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recipe_harness::bridge::{LaunchFuture, Session, SessionLauncher, SessionRegistry};
use recipe_harness::models::{Job, JobAnswer, JobKind};
use recipe_harness::AppError;

fn asking_launcher(launched: Arc<AtomicUsize>) -> SessionLauncher {
    Arc::new(move |session: Arc<Session>| -> LaunchFuture {
        launched.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let ticket = session.enqueue(Job::new(JobKind::Answer {
                prompt: "name?".into(),
                default: String::new(),
                multiline: false,
            }));
            ticket.wait().await?;
            Ok(())
        })
    })
}

fn finished_launcher(final_print: bool) -> SessionLauncher {
    Arc::new(move |session: Arc<Session>| -> LaunchFuture {
        Box::pin(async move {
            if final_print {
                drop(session.enqueue(Job::print("result", false, false)));
            }
            Ok(())
        })
    })
}

async fn wait_until_empty(registry: &SessionRegistry) {
    for _ in 0..100 {
        if registry.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn create_starts_the_recipe() {
    let launched = Arc::new(AtomicUsize::new(0));
    let registry = SessionRegistry::new(asking_launcher(Arc::clone(&launched)));

    let id = registry.create();
    assert_eq!(launched.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len(), 1);

    let session = registry.get(&id).expect("session");
    let job = session
        .next_job(Duration::from_secs(2))
        .await
        .expect("recipe enqueued a job");
    assert_eq!(job.kind.name(), "answer");
    session
        .complete_job(&job.id, JobAnswer::Text("Ada".into()))
        .expect("complete");
}

#[tokio::test]
async fn sessions_are_independent() {
    let registry = SessionRegistry::new(asking_launcher(Arc::new(AtomicUsize::new(0))));
    let first = registry.create();
    let second = registry.create();
    assert_ne!(first, second);

    let a = registry.get(&first).expect("first");
    let b = registry.get(&second).expect("second");
    let a_job = a.next_job(Duration::from_secs(2)).await.expect("a job");
    let b_job = b.next_job(Duration::from_secs(2)).await.expect("b job");
    assert_ne!(a_job.id, b_job.id);

    let err = a
        .complete_job(&b_job.id, JobAnswer::Text("x".into()))
        .expect_err("foreign job");
    assert!(matches!(err, AppError::Consistency(_)));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let registry = SessionRegistry::new(asking_launcher(Arc::new(AtomicUsize::new(0))));
    assert!(matches!(registry.get("missing"), Err(AppError::NotFound(_))));
    assert!(matches!(registry.remove("missing"), Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn remove_drops_pending_jobs() {
    let registry = SessionRegistry::new(asking_launcher(Arc::new(AtomicUsize::new(0))));
    let id = registry.create();
    let session = registry.get(&id).expect("session");
    session.next_job(Duration::from_secs(2)).await.expect("job");

    registry.remove(&id).expect("remove");
    assert!(registry.is_empty());
    assert_eq!(session.pending_len(), 0);
    assert!(matches!(registry.get(&id), Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn shutdown_stops_every_session() {
    let registry = SessionRegistry::new(asking_launcher(Arc::new(AtomicUsize::new(0))));
    let _first = registry.create();
    let _second = registry.create();
    registry.shutdown();
    assert!(registry.is_empty());
}

#[tokio::test]
async fn finished_recipe_is_reaped() {
    let registry = SessionRegistry::new(finished_launcher(false));
    let id = registry.create();

    wait_until_empty(&registry).await;
    assert_eq!(registry.len(), 0);
    assert!(matches!(registry.get(&id), Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn final_print_is_served_before_reaping() {
    let registry = SessionRegistry::new(finished_launcher(true));
    let id = registry.create();
    let session = registry.get(&id).expect("session still live");

    let job = session
        .next_job(Duration::from_secs(2))
        .await
        .expect("final print");
    assert_eq!(job.kind.name(), "print");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(registry.len(), 1, "kept until the print is acknowledged");

    session
        .complete_job(&job.id, JobAnswer::Text(String::new()))
        .expect("ack");
    wait_until_empty(&registry).await;
    assert!(matches!(registry.get(&id), Err(AppError::NotFound(_))));
}
