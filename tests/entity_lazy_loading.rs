// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Integration tests for the lazy entity machinery: at most one upgrade
//! fetch per entity, no fetch at construction or serialization time, no
//! resolution regression, and stub-based relationship traversal.

use anyhow::Result;
use mockito::{Matcher, Server, ServerGuard};
use peloton_client::{Config, Entity, Error, PelotonClient, Resolution};
use serde_json::json;

fn client_for(server: &ServerGuard) -> PelotonClient {
    PelotonClient::with_base_url(Config::new("rider@example.com", "hunter2"), &server.url())
        .expect("client builds")
}

async fn mock_login(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/auth/login")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("set-cookie", "peloton_session_id=sess1; Path=/")
        .with_body(json!({"user_id": "u1", "session_id": "sess1"}).to_string())
        .create_async()
        .await
}

fn workout_detail() -> serde_json::Value {
    json!({
        "id": "w1",
        "status": "COMPLETE",
        "fitness_discipline": "cycling",
        "created": 1_700_000_000,
        "created_at": 1_700_000_000,
        "start_time": 1_700_000_000,
        "end_time": 1_700_001_800,
        "leaderboard_rank": 123.0,
        "total_leaderboard_users": 5000,
        "achievement_templates": [
            {"name": "Best Output", "description": "New personal best"}
        ],
        "ride": {
            "id": "r1",
            "title": "30 min Climb Ride",
            "duration": 1800,
            "instructor_id": "i1"
        }
    })
}

/// One workout-list page containing a single partial record.
fn one_record_page(status: Option<&str>) -> serde_json::Value {
    let mut record = json!({
        "id": "w1",
        "fitness_discipline": "cycling",
        "ride": {"id": "r1", "title": "30 min Climb Ride"}
    });
    if let Some(status) = status {
        record["status"] = json!(status);
    }
    json!({"data": [record], "page_count": 1})
}

async fn mock_workout_page(
    server: &mut ServerGuard,
    body: serde_json::Value,
    hits: usize,
) -> mockito::Mock {
    server
        .mock("GET", "/api/user/u1/workouts")
        .match_query(Matcher::UrlEncoded("page".into(), "0".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(hits)
        .create_async()
        .await
}

#[tokio::test]
async fn construction_from_id_costs_no_network() -> Result<()> {
    let server = Server::new_async().await;
    let client = client_for(&server);

    let workout = client.workout("w1");
    let ride = client.ride("r1");
    let instructor = client.instructor("i1");

    assert_eq!(workout.resolution(), Resolution::Unresolved);
    assert_eq!(ride.resolution(), Resolution::Unresolved);
    assert_eq!(instructor.resolution(), Resolution::Unresolved);
    assert_eq!(client.requests_issued(), 0);
    Ok(())
}

#[tokio::test]
async fn two_field_reads_issue_one_upgrade_fetch() -> Result<()> {
    let mut server = Server::new_async().await;
    mock_login(&mut server).await;
    let detail = server
        .mock("GET", "/api/workout/w1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(workout_detail().to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let workout = client.workout("w1");

    assert_eq!(workout.status(&client).await?, "COMPLETE");
    assert_eq!(workout.resolution(), Resolution::Complete);
    assert_eq!(workout.fitness_discipline(&client).await?, "cycling");
    assert_eq!(workout.leaderboard_rank(&client).await?, 123.0);

    detail.assert_async().await;
    // login + one detail fetch, nothing else
    assert_eq!(client.requests_issued(), 2);
    Ok(())
}

#[tokio::test]
async fn concurrent_field_reads_share_one_upgrade_fetch() -> Result<()> {
    let mut server = Server::new_async().await;
    mock_login(&mut server).await;
    let detail = server
        .mock("GET", "/api/workout/w1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(workout_detail().to_string())
        .expect(1)
        .create_async()
        .await;

    let client = std::sync::Arc::new(client_for(&server));
    let workout = client.workout("w1");

    // All readers race the same unresolved entity; the upgrade gate must
    // collapse them into a single detail fetch.
    let mut readers = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        let workout = workout.clone();
        readers.push(tokio::spawn(async move { workout.status(&client).await }));
    }
    for reader in readers {
        assert_eq!(reader.await.expect("reader finishes")?, "COMPLETE");
    }

    detail.assert_async().await;
    assert_eq!(workout.resolution(), Resolution::Complete);
    // login + one detail fetch, no matter how many readers raced
    assert_eq!(client.requests_issued(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_upgrade_fetch_leaves_state_unchanged() -> Result<()> {
    let mut server = Server::new_async().await;
    mock_login(&mut server).await;
    server
        .mock("GET", "/api/workout/w1")
        .with_status(500)
        .with_body("flaky")
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let workout = client.workout("w1");
    assert!(workout.status(&client).await.is_err());
    assert_eq!(workout.resolution(), Resolution::Unresolved);
    Ok(())
}

#[tokio::test]
async fn missing_field_after_full_fetch_is_attribute_not_found() -> Result<()> {
    let mut server = Server::new_async().await;
    mock_login(&mut server).await;
    let detail = server
        .mock("GET", "/api/workout/w1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"id": "w1", "status": "COMPLETE"}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let workout = client.workout("w1");

    let err = workout.leaderboard_rank(&client).await.unwrap_err();
    assert!(
        matches!(err, Error::AttributeNotFound { ref field, .. } if field == "leaderboard_rank"),
        "got {err:?}"
    );

    // A second read reports the same condition without another fetch.
    let err = workout.leaderboard_rank(&client).await.unwrap_err();
    assert!(matches!(err, Error::AttributeNotFound { .. }));
    detail.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn serialize_returns_resident_fields_without_fetching() -> Result<()> {
    let mut server = Server::new_async().await;
    mock_login(&mut server).await;
    mock_workout_page(&mut server, one_record_page(Some("COMPLETE")), 1).await;
    let detail = server
        .mock("GET", "/api/workout/w1")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server);
    let workout = client
        .workouts()
        .next()
        .await?
        .expect("one workout listed");
    assert_eq!(workout.resolution(), Resolution::Partial);

    let before = client.requests_issued();
    let serialized = workout.serialize();
    assert_eq!(client.requests_issued(), before, "serialize must not fetch");

    assert_eq!(serialized["id"], "w1");
    assert_eq!(serialized["status"], "COMPLETE");
    assert_eq!(serialized["ride"]["title"], "30 min Climb Ride");
    assert!(serialized.get("leaderboard_rank").is_none());

    detail.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn complete_entity_ignores_later_partial_records() -> Result<()> {
    let mut server = Server::new_async().await;
    mock_login(&mut server).await;
    let detail = server
        .mock("GET", "/api/workout/w1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(workout_detail().to_string())
        .expect(1)
        .create_async()
        .await;
    // The list record for the same workout omits `status` entirely.
    mock_workout_page(&mut server, one_record_page(None), 1).await;

    let client = client_for(&server);
    let workout = client.workout("w1");
    assert_eq!(workout.status(&client).await?, "COMPLETE");

    let listed = client.workouts().next().await?.expect("listed workout");
    assert!(std::sync::Arc::ptr_eq(&workout, &listed), "one instance per id");

    // Still complete, still COMPLETE, and no extra detail fetch happened.
    assert_eq!(listed.resolution(), Resolution::Complete);
    assert_eq!(listed.status(&client).await?, "COMPLETE");
    detail.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn relationship_chain_defers_each_fetch() -> Result<()> {
    let mut server = Server::new_async().await;
    mock_login(&mut server).await;
    mock_workout_page(&mut server, one_record_page(Some("COMPLETE")), 1).await;
    let ride_detail = server
        .mock("GET", "/api/ride/r1/details")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "ride": {
                    "id": "r1",
                    "title": "30 min Climb Ride",
                    "description": "Out of the saddle",
                    "duration": 1800,
                    "instructor_id": "i1"
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let instructor_detail = server
        .mock("GET", "/api/instructor/i1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"id": "i1", "name": "Alex", "bio": "Climbs."}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let workout = client.workouts().next().await?.expect("listed workout");

    // The ride join made the ride partially resident; its title reads free.
    let ride = workout.ride(&client).await?;
    assert_eq!(ride.resolution(), Resolution::Partial);
    let before = client.requests_issued();
    assert_eq!(ride.title(&client).await?, "30 min Climb Ride");
    assert_eq!(client.requests_issued(), before);

    // An absent field upgrades the ride, once.
    assert_eq!(ride.description(&client).await?, "Out of the saddle");
    assert_eq!(ride.duration(&client).await?, 1800);
    ride_detail.assert_async().await;

    // The instructor starts as a stub and fetches on first field read.
    let instructor = ride.instructor(&client).await?;
    assert_eq!(instructor.resolution(), Resolution::Unresolved);
    assert_eq!(instructor.name(&client).await?, "Alex");
    instructor_detail.assert_async().await;

    // Shared instance: asking the client again returns the same object.
    assert!(std::sync::Arc::ptr_eq(&instructor, &client.instructor("i1")));
    Ok(())
}

#[tokio::test]
async fn metrics_are_a_separate_lazily_fetched_entity() -> Result<()> {
    let mut server = Server::new_async().await;
    mock_login(&mut server).await;
    let graph = server
        .mock("GET", "/api/workout/w1/performance_graph")
        .match_query(Matcher::UrlEncoded("every_n".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "duration": 1800,
                "segment_list": [{"metrics_type": "cycling"}],
                "summaries": [
                    {"slug": "total_output", "display_name": "Total Output",
                     "display_unit": "kj", "value": 250.0},
                    {"slug": "calories", "display_name": "Calories",
                     "display_unit": "kcal", "value": 400.0}
                ],
                "metrics": [
                    {"slug": "heart_rate", "display_name": "Heart Rate",
                     "display_unit": "bpm", "average_value": 150.0,
                     "max_value": 175.0, "values": [148.0, null, 152.0]}
                ]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let workout = client.workout("w1");
    let metrics = workout.metrics(&client);
    assert_eq!(client.requests_issued(), 0, "metrics stub must not fetch");

    let output = metrics.summary(&client, "total_output").await?;
    assert_eq!(output.value, Some(250.0));
    assert_eq!(metrics.duration(&client).await?, 1800);
    assert_eq!(metrics.discipline(&client).await?, "cycling");

    // Sensor dropouts arrive as nulls and stay addressable.
    let heart_rate = metrics.metric(&client, "heart_rate").await?;
    assert_eq!(heart_rate.values, Some(vec![Some(148.0), None, Some(152.0)]));

    // Unknown slug is "no such attribute", not a fetch failure.
    let err = metrics.summary(&client, "watts_per_kg").await.unwrap_err();
    assert!(matches!(err, Error::AttributeNotFound { .. }), "got {err:?}");

    graph.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn me_returns_a_stub_and_fetches_profile_on_read() -> Result<()> {
    let mut server = Server::new_async().await;
    mock_login(&mut server).await;
    let profile = server
        .mock("GET", "/api/user/u1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"id": "u1", "username": "rider", "total_workouts": 42}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let me = client.me().await?;
    assert_eq!(me.id(), "u1", "id comes straight from the login response");
    assert_eq!(me.resolution(), Resolution::Unresolved);
    assert_eq!(client.requests_issued(), 1, "only the login so far");

    assert_eq!(me.username(&client).await?, "rider");
    assert_eq!(me.total_workouts(&client).await?, 42);
    profile.assert_async().await;
    assert_eq!(client.requests_issued(), 2);
    Ok(())
}
