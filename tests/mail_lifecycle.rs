mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::*;

#[tokio::test]
async fn first_inward_mail_of_the_year_gets_sequence_one_and_a_tracking_event() {
    let app = test_app().await;
    create_department(&app, "Finance", "FIN").await;

    let mail = create_inward(&app, "Tax details", "ACME", "Finance").await;
    assert_eq!(mail["mailId"], format!("INW-{}-001", current_year()));
    assert_eq!(mail["status"], "pending");
    assert_eq!(mail["sender"], "ACME");
    assert_eq!(mail["senderName"], "ACME");
    assert_eq!(mail["department"], "Finance");

    let (status, body) = get(&app, "/api/tracking").await;
    assert_eq!(status, StatusCode::OK);
    let events = body["data"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event["subject"], "Tax details");
    assert_eq!(event["mailType"], "Inward");
    assert_eq!(event["priority"], mail["priority"]);
    assert_eq!(event["trackingId"], mail["trackingId"]);
    assert_eq!(event["mailId"], mail["mailId"]);
    let timeline = event["timeline"].as_array().unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0]["status"], mail["status"]);
    assert_eq!(timeline[0]["user"], "System");
}

#[tokio::test]
async fn mail_ids_are_sequential_and_unique_per_kind() {
    let app = test_app().await;
    create_department(&app, "Finance", "FIN").await;
    let year = current_year();

    let a = create_inward(&app, "One", "A", "Finance").await;
    let b = create_inward(&app, "Two", "B", "FIN").await;
    let c = create_outward(&app, "Three", "C", "finance").await;

    assert_eq!(a["mailId"], format!("INW-{year}-001"));
    assert_eq!(b["mailId"], format!("INW-{year}-002"));
    assert_eq!(c["mailId"], format!("OUT-{year}-001"));
    assert_eq!(c["status"], "pending");
    assert_ne!(a["trackingId"], b["trackingId"]);
    assert!(c["trackingId"].as_str().unwrap().starts_with("TRK-OUT-"));
}

#[tokio::test]
async fn concurrent_creates_never_share_a_mail_id() {
    let app = test_app().await;
    create_department(&app, "Finance", "FIN").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            create_inward(&app, &format!("Parallel {i}"), "Sender", "Finance").await["mailId"]
                .as_str()
                .unwrap()
                .to_string()
        }));
    }
    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);

    let (_, body) = get(&app, "/api/tracking").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_on_a_shared_file_database_all_succeed() {
    let (app, _dir) = file_app(5).await;
    create_department(&app, "Finance", "FIN").await;
    let seeded = create_outward(&app, "Seed", "Bank", "FIN").await;
    let seeded_id = seeded["mailId"].as_str().unwrap().to_string();

    let mut handles = Vec::new();
    for i in 0..40 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            post(
                &app,
                "/api/mails",
                json!({"type": "inward", "subject": format!("Load {i}"), "sender": "S", "department": "FIN"}),
            )
            .await
        }));
    }
    // Writers of another kind interleave with the creates.
    for i in 0..5 {
        let app = app.clone();
        let id = seeded_id.clone();
        handles.push(tokio::spawn(async move {
            put(&app, &format!("/api/mails/outward/{id}"), json!({"remarks": format!("edit {i}")})).await
        }));
    }

    let mut ids = Vec::new();
    for h in handles {
        let (status, body) = h.await.unwrap();
        assert!(status.is_success(), "{status}: {body}");
        if body["data"]["type"] == "inward" {
            ids.push(body["data"]["mailId"].as_str().unwrap().to_string());
        }
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 40);
    let year = current_year();
    assert_eq!(ids[0], format!("INW-{year}-001"));
    assert_eq!(ids[39], format!("INW-{year}-040"));

    let (_, body) = get(&app, "/api/tracking").await;
    let events = body["data"].as_array().unwrap();
    assert_eq!(events.len(), 41);
    let mut tracking_ids: Vec<&str> = events.iter().map(|e| e["trackingId"].as_str().unwrap()).collect();
    tracking_ids.sort();
    tracking_ids.dedup();
    assert_eq!(tracking_ids.len(), 41);
}

#[tokio::test]
async fn list_search_and_department_filter_fold_non_ascii_case() {
    let app = test_app().await;
    create_department(&app, "Énergie", "ENR").await;
    create_inward(&app, "État civil", "Mairie", "Énergie").await;
    create_inward(&app, "Budget", "Treasury", "ENR").await;

    // search=état
    let (status, body) = get(&app, "/api/mails?type=inward&search=%C3%A9tat").await;
    assert_eq!(status, StatusCode::OK);
    let hits = body["data"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["subject"], "État civil");

    let (_, body) = get(&app, "/api/search/%C3%A9tat").await;
    assert_eq!(body["data"]["inwardMails"].as_array().unwrap().len(), 1);

    // department=éNERGIE
    let (_, body) = get(&app, "/api/mails?department=%C3%A9NERGIE").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // a lower-case department name resolves on create too
    let (status, _) = post(
        &app,
        "/api/mails",
        json!({"type": "outward", "subject": "Réponse", "receiver": "Mairie", "department": "énergie"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn create_without_type_is_rejected_and_persists_nothing() {
    let app = test_app().await;
    create_department(&app, "Finance", "FIN").await;

    let (status, body) = post(
        &app,
        "/api/mails",
        json!({"subject": "No type", "sender": "X", "department": "Finance"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("type"));

    let (status, _) = post(
        &app,
        "/api/mails",
        json!({"type": "sideways", "subject": "Bad", "sender": "X", "department": "Finance"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = get(&app, "/api/mails").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
    let (_, body) = get(&app, "/api/tracking").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn create_validates_required_fields_and_department() {
    let app = test_app().await;
    create_department(&app, "Finance", "FIN").await;

    let (status, body) = post(
        &app,
        "/api/mails",
        json!({"type": "inward", "subject": "Missing sender", "department": "Finance"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Sender is required");

    let (status, body) = post(
        &app,
        "/api/mails",
        json!({"type": "inward", "subject": "S", "sender": "X", "department": "Nowhere"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Department not found: Nowhere");

    let (status, _) = post(
        &app,
        "/api/mails",
        json!({"type": "outward", "subject": "S", "receiver": "X", "department": "Finance", "status": "lost"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn legacy_field_names_are_accepted_on_create() {
    let app = test_app().await;
    let dept = create_department(&app, "Finance", "FIN").await;

    let (status, body) = post(
        &app,
        "/api/mails",
        json!({
            "type": "outward",
            "subject": "Reply on audit",
            "receiverName": "Auditor",
            "description": "Reply with annexures",
            "departmentId": dept["id"],
            "attachments": [{"name": "a.pdf"}, {"name": "b.pdf"}, {"name": "c.pdf"}],
            "priority": "high",
            "status": "in-transit"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let mail = &body["data"];
    assert_eq!(mail["receiver"], "Auditor");
    assert_eq!(mail["details"], "Reply with annexures");
    assert_eq!(mail["description"], "Reply with annexures");
    assert_eq!(mail["attachments"], 3);
    assert_eq!(mail["priority"], "High");
    assert_eq!(mail["status"], "in-transit");
}

#[tokio::test]
async fn get_by_mail_id_or_internal_id_returns_the_same_record() {
    let app = test_app().await;
    create_department(&app, "Finance", "FIN").await;
    let mail = create_inward(&app, "Lookup", "ACME", "Finance").await;

    let (s1, by_code) = get(&app, &format!("/api/mails/inward/{}", mail["mailId"].as_str().unwrap())).await;
    let (s2, by_id) = get(&app, &format!("/api/mails/inward/{}", mail["id"].as_str().unwrap())).await;
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(by_code["data"], by_id["data"]);
    assert_eq!(by_code["data"], mail);
}

#[tokio::test]
async fn unknown_mail_is_404_and_unknown_kind_is_400() {
    let app = test_app().await;

    let (status, body) = get(&app, "/api/mails/inward/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = get(&app, "/api/mails/sideways/INW-2024-001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/api/tracking/TRK-INW-0").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn appended_timeline_entries_keep_their_order() {
    let app = test_app().await;
    create_department(&app, "Finance", "FIN").await;
    let mail = create_inward(&app, "Timeline", "ACME", "Finance").await;
    let tracking_id = mail["trackingId"].as_str().unwrap();

    let steps = ["ASSIGNED", "in progress", "Completed"];
    for (i, step) in steps.iter().enumerate() {
        let (status, body) = post(
            &app,
            &format!("/api/tracking/{tracking_id}/timeline"),
            json!({"status": step, "remarks": format!("step {i}"), "updatedBy": "Clerk A", "assignedTo": "Officer B"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (_, body) = get(&app, &format!("/api/tracking/{tracking_id}")).await;
    let event = &body["data"];
    let timeline = event["timeline"].as_array().unwrap();
    assert_eq!(timeline.len(), steps.len() + 1);
    let statuses: Vec<&str> = timeline.iter().map(|t| t["status"].as_str().unwrap()).collect();
    assert_eq!(statuses, ["pending", "assigned", "in_progress", "completed"]);
    let stamps: Vec<&str> = timeline.iter().map(|t| t["timestamp"].as_str().unwrap()).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(timeline[3]["remarks"], "step 2");
    assert_eq!(timeline[3]["user"], "Clerk A");
    assert_eq!(event["currentStatus"], "completed");
    assert_eq!(event["assignedTo"], "Officer B");

    // the source mail follows the tracking status
    let (_, body) = get(&app, &format!("/api/mails/inward/{}", mail["mailId"].as_str().unwrap())).await;
    assert_eq!(body["data"]["status"], "completed");
}

#[tokio::test]
async fn timeline_append_validates_status() {
    let app = test_app().await;
    create_department(&app, "Finance", "FIN").await;
    let mail = create_inward(&app, "Timeline", "ACME", "Finance").await;
    let uri = format!("/api/tracking/{}/timeline", mail["trackingId"].as_str().unwrap());

    let (status, _) = post(&app, &uri, json!({"remarks": "no status"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post(&app, &uri, json!({"status": "teleported"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post(&app, "/api/tracking/TRK-NOPE/timeline", json!({"status": "sent"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_update_appends_timeline_and_refreshes_tracking_copy() {
    let app = test_app().await;
    create_department(&app, "Finance", "FIN").await;
    create_department(&app, "Administration", "ADM").await;
    let mail = create_outward(&app, "Dispatch", "Collector", "Finance").await;
    let uri = format!("/api/mails/outward/{}", mail["mailId"].as_str().unwrap());

    let (status, body) = put(
        &app,
        &uri,
        json!({"status": "IN_TRANSIT", "subject": "Dispatch (revised)", "department": "ADM", "updatedBy": "Dispatcher"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "in-transit");
    assert_eq!(body["data"]["department"], "Administration");

    let (_, body) = get(&app, &format!("/api/tracking/{}", mail["trackingId"].as_str().unwrap())).await;
    let event = &body["data"];
    assert_eq!(event["subject"], "Dispatch (revised)");
    assert_eq!(event["department"], "Administration");
    assert_eq!(event["currentStatus"], "in-transit");
    let timeline = event["timeline"].as_array().unwrap();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[1]["user"], "Dispatcher");

    // same status again adds nothing
    let (status, _) = put(&app, &uri, json!({"status": "in-transit"})).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = get(&app, &format!("/api/tracking/{}", mail["trackingId"].as_str().unwrap())).await;
    assert_eq!(body["data"]["timeline"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn deleting_a_mail_removes_its_tracking_event() {
    let app = test_app().await;
    create_department(&app, "Finance", "FIN").await;
    let mail = create_inward(&app, "Short lived", "ACME", "Finance").await;
    let mail_id = mail["mailId"].as_str().unwrap();

    let (status, _) = delete(&app, &format!("/api/mails/inward/{mail_id}")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&app, &format!("/api/mails/inward/{mail_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app, &format!("/api/tracking/{}", mail["trackingId"].as_str().unwrap())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = delete(&app, &format!("/api/mails/inward/{mail_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_filters_by_department_status_priority_and_search() {
    let app = test_app().await;
    create_department(&app, "Finance", "FIN").await;
    create_department(&app, "Finance Audit", "FAU").await;
    create_inward(&app, "Salary revision", "Union", "Finance").await;
    create_inward(&app, "Audit schedule", "AG Office", "Finance Audit").await;
    let (status, _) = post(
        &app,
        "/api/mails",
        json!({"type": "inward", "subject": "Urgent grant", "sender": "Ministry", "department": "Finance", "priority": "Important", "status": "assigned"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = get(&app, "/api/mails?type=inward&department=finance").await;
    let mails = body["data"].as_array().unwrap();
    assert_eq!(mails.len(), 2);
    assert!(mails.iter().all(|m| m["department"] == "Finance"));
    // newest first
    assert_eq!(mails[0]["subject"], "Urgent grant");

    let (_, body) = get(&app, "/api/mails?type=inward&status=ASSIGNED").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = get(&app, "/api/mails?type=inward&priority=important").await;
    assert_eq!(body["data"][0]["subject"], "Urgent grant");

    let (_, body) = get(&app, "/api/mails?type=inward&search=AG%20off").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["subject"], "Audit schedule");

    let (status, _) = get(&app, "/api/mails?type=inward&status=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
