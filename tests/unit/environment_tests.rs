//! Unit tests for the web environment against a simulated poller.

use std::sync::Arc;
use std::time::Duration;

use recipe_harness::bridge::Session;
use recipe_harness::environment::{Environment, WebEnvironment};
use recipe_harness::models::{Job, JobAnswer, JobKind};
use recipe_harness::AppError;

/// Answer the next job with `answer`, returning the job.
async fn answer_next(session: &Session, answer: JobAnswer) -> Job {
    let job = session
        .next_job(Duration::from_secs(2))
        .await
        .expect("job within poll window");
    session.complete_job(&job.id, answer).expect("complete");
    job
}

#[tokio::test]
async fn answer_round_trips_through_the_session() {
    let session = Arc::new(Session::new());
    let env = WebEnvironment::new(Arc::clone(&session));

    let (answer, job) = tokio::join!(
        env.answer("Your name?", "anon", false),
        answer_next(&session, JobAnswer::Text("Ada".into()))
    );
    assert_eq!(answer.expect("answer"), "Ada");
    assert_eq!(
        job.kind,
        JobKind::Answer {
            prompt: "Your name?".into(),
            default: "anon".into(),
            multiline: false,
        }
    );
}

#[tokio::test]
async fn select_decodes_json_encoded_choice() {
    let session = Arc::new(Session::new());
    let env = WebEnvironment::new(Arc::clone(&session));
    let choices = vec!["red".to_owned(), "blue".to_owned()];

    let (choice, _) = tokio::join!(
        env.select("Colour?", &choices, Some("red")),
        answer_next(&session, JobAnswer::Text("\"blue\"".into()))
    );
    assert_eq!(choice.expect("select"), "blue");
}

#[tokio::test]
async fn checkboxes_accept_a_list() {
    let session = Arc::new(Session::new());
    let env = WebEnvironment::new(Arc::clone(&session));
    let choices = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];

    let (picked, _) = tokio::join!(
        env.checkboxes("Pick", &choices),
        answer_next(&session, JobAnswer::Choices(vec!["a".into(), "c".into()]))
    );
    assert_eq!(picked.expect("checkboxes"), vec!["a", "c"]);
}

#[tokio::test]
async fn score_rejects_out_of_range_answer() {
    let session = Arc::new(Session::new());
    let env = WebEnvironment::new(Arc::clone(&session));

    let (score, job) = tokio::join!(
        env.score("q", "ctx", Some(0.5)),
        answer_next(&session, JobAnswer::Text("2".into()))
    );
    assert!(matches!(score, Err(AppError::BadRequest(_))));
    assert!(job.display_prompt().contains("ctx"));
}

#[tokio::test]
async fn print_enqueues_without_blocking() {
    let session = Arc::new(Session::new());
    let env = WebEnvironment::new(Arc::clone(&session));

    env.print("hello **there**", true, false);
    assert_eq!(session.pending_len(), 1);
    let job = answer_next(&session, JobAnswer::Text(String::new())).await;
    assert!(matches!(job.kind, JobKind::Print { format_markdown: true, .. }));
}

#[tokio::test]
async fn teardown_cancels_pending_question() {
    let session = Arc::new(Session::new());
    let env = WebEnvironment::new(Arc::clone(&session));

    let closer = {
        let session = Arc::clone(&session);
        async move {
            session.next_job(Duration::from_secs(2)).await.expect("job");
            session.close();
        }
    };
    let (answer, ()) = tokio::join!(env.answer("q", "", false), closer);
    assert!(matches!(answer, Err(AppError::Cancelled(_))));
}
