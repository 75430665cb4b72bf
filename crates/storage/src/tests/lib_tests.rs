use std::sync::Arc;

use shared::domain::{Category, GrievanceId, NewGrievance, Status};

use super::*;

fn storage() -> Storage {
    Storage::new(Arc::new(MemoryStore::new()))
}

fn desk_complaint() -> NewGrievance {
    NewGrievance {
        name: "A".into(),
        email: "a@x.com".into(),
        category: Category::Facilities,
        description: "broken desk".into(),
        anonymous: false,
    }
}

#[tokio::test]
async fn creates_and_fetches_a_pending_grievance() {
    let storage = storage();
    let id = storage
        .create_grievance(desk_complaint())
        .await
        .expect("create");

    let grievance = storage
        .fetch_grievance(&id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(grievance.id, id);
    assert_eq!(grievance.name, "A");
    assert_eq!(grievance.email, "a@x.com");
    assert_eq!(grievance.category, Category::Facilities);
    assert_eq!(grievance.status, Status::Pending);
    assert!(!grievance.anonymous);
}

#[tokio::test]
async fn fetch_of_unknown_id_is_none() {
    let storage = storage();
    let missing = storage
        .fetch_grievance(&GrievanceId("nonexistent-id".into()))
        .await
        .expect("fetch");
    assert!(missing.is_none());
}

#[tokio::test]
async fn lists_every_stored_grievance() {
    let storage = storage();
    storage
        .create_grievance(desk_complaint())
        .await
        .expect("first");
    storage
        .create_grievance(NewGrievance {
            name: "B".into(),
            email: "b@x.com".into(),
            category: Category::Academics,
            description: "missing grades".into(),
            anonymous: false,
        })
        .await
        .expect("second");

    let grievances = storage.list_grievances().await.expect("list");
    assert_eq!(grievances.len(), 2);
}

#[tokio::test]
async fn update_status_overwrites_only_the_status_field() {
    let storage = storage();
    let id = storage
        .create_grievance(desk_complaint())
        .await
        .expect("create");

    let updated = storage
        .update_status(&id, Status::Resolved)
        .await
        .expect("update")
        .expect("present");
    assert_eq!(updated.status, Status::Resolved);
    assert_eq!(updated.name, "A");
    assert_eq!(updated.description, "broken desk");

    let reread = storage
        .fetch_grievance(&id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(reread.status, Status::Resolved);
}

#[tokio::test]
async fn update_status_for_unknown_id_is_none() {
    let storage = storage();
    let outcome = storage
        .update_status(&GrievanceId("nonexistent-id".into()), Status::InProgress)
        .await
        .expect("update");
    assert!(outcome.is_none());
}

#[tokio::test]
async fn status_can_reach_every_value_and_reopen() {
    let storage = storage();
    let id = storage
        .create_grievance(desk_complaint())
        .await
        .expect("create");

    for status in [Status::InProgress, Status::Resolved, Status::Pending] {
        let updated = storage
            .update_status(&id, status)
            .await
            .expect("update")
            .expect("present");
        assert_eq!(updated.status, status);
    }
}

#[tokio::test]
async fn malformed_document_surfaces_a_contextual_error() {
    let backend = Arc::new(MemoryStore::new());
    let mut document = Document::new();
    document.insert("name".into(), serde_json::Value::from("orphan"));
    let id = backend
        .insert(GRIEVANCE_COLLECTION, document)
        .await
        .expect("raw insert");

    let storage = Storage::new(backend);
    let err = storage
        .fetch_grievance(&GrievanceId(id))
        .await
        .expect_err("must fail");
    assert!(err.to_string().contains("malformed grievance document"));
}
