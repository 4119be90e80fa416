use super::authors::AuthorCreate;
use super::tags::{TagCreate, DEFAULT_TAG_COLOR};
use super::test_helpers::setup_test_db;
use super::venues::VenueCreate;

#[tokio::test]
async fn test_create_and_get_author() {
    let db = setup_test_db().await;
    let author = db
        .create_author(AuthorCreate {
            name: " Grace Hopper ".into(),
            email: Some("grace@navy.example.mil".into()),
            affiliation: Some("Harvard".into()),
        })
        .await
        .unwrap();
    assert_eq!(author.name, "Grace Hopper");
    assert_eq!(db.get_author(author.id).await.unwrap(), Some(author));
    assert_eq!(db.get_author(999).await.unwrap(), None);
}

#[tokio::test]
async fn test_create_author_rejects_bad_email() {
    let db = setup_test_db().await;
    let result = db
        .create_author(AuthorCreate {
            name: "Someone".into(),
            email: Some("not-an-email".into()),
            affiliation: None,
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_author_email_is_unique() {
    let db = setup_test_db().await;
    let params = AuthorCreate {
        name: "A".into(),
        email: Some("a@example.com".into()),
        affiliation: None,
    };
    db.create_author(params.clone()).await.unwrap();
    assert!(db.create_author(params).await.is_err());
}

#[tokio::test]
async fn test_find_or_create_author_reuses_existing() {
    let db = setup_test_db().await;
    let first = db.find_or_create_author("Edsger Dijkstra").await.unwrap();
    let second = db.find_or_create_author("  Edsger Dijkstra ").await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(db.list_authors(0, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_authors_sorted_and_paged() {
    let db = setup_test_db().await;
    for name in ["Carol", "Alice", "Bob"] {
        db.find_or_create_author(name).await.unwrap();
    }
    let names: Vec<String> = db
        .list_authors(0, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    assert_eq!(db.list_authors(2, 10).await.unwrap()[0].name, "Carol");
}

#[tokio::test]
async fn test_tags() {
    let db = setup_test_db().await;
    let ml = db
        .create_tag(TagCreate {
            name: "ML".into(),
            color: None,
        })
        .await
        .unwrap();
    assert_eq!(ml.color, DEFAULT_TAG_COLOR);

    let bad_color = db
        .create_tag(TagCreate {
            name: "Bad".into(),
            color: Some("red".into()),
        })
        .await;
    assert!(bad_color.is_err());

    let duplicate = db
        .create_tag(TagCreate {
            name: "ML".into(),
            color: None,
        })
        .await;
    assert!(duplicate.is_err());

    let found = db.find_or_create_tag("ML").await.unwrap();
    assert_eq!(found, ml);
    db.find_or_create_tag("Vision").await.unwrap();
    let names: Vec<String> = db.list_tags().await.unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["ML", "Vision"]);
}

#[tokio::test]
async fn test_venues() {
    let db = setup_test_db().await;
    let venue = db
        .create_venue(VenueCreate {
            name: "ICML".into(),
            venue_type: "conference".into(),
            impact_factor: Some(4.5),
        })
        .await
        .unwrap();
    assert_eq!(db.get_venue(venue.id).await.unwrap(), Some(venue.clone()));

    let same = db.find_or_create_venue("ICML", "journal").await.unwrap();
    assert_eq!(same.id, venue.id);
    assert_eq!(same.venue_type, "conference");

    let created = db.find_or_create_venue("Nature", "journal").await.unwrap();
    assert_eq!(created.venue_type, "journal");
    assert_eq!(db.list_venues().await.unwrap().len(), 2);

    let bad = db
        .create_venue(VenueCreate {
            name: "Blog".into(),
            venue_type: "blog".into(),
            impact_factor: None,
        })
        .await;
    assert!(bad.is_err());
}

#[test]
fn test_venue_type_defaults_to_journal() {
    let params: VenueCreate = serde_json::from_str(r#"{"name": "Science"}"#).unwrap();
    assert_eq!(params.venue_type, "journal");
}
