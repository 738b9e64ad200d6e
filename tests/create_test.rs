mod support;

use serde_json::json;
use users_db::ent_framework::Entity;
use users_db::entities::EntUser;
use users_db::infrastructure::Filter;

#[tokio::test]
async fn test_saves_a_user() {
    let ctx = support::setup().await;
    let mut joe = EntUser::new("Joe");
    assert!(joe.is_new());

    joe.save(&ctx).await.unwrap();
    assert!(!joe.is_new());

    let stored = EntUser::find_by_id(&ctx, joe.id).await.unwrap().unwrap();
    assert_eq!(stored.id, joe.id);
    assert_eq!(stored.name.as_deref(), Some("Joe"));
}

#[tokio::test]
async fn test_constructed_user_keeps_id_through_save() {
    let ctx = support::setup().await;
    let mut joe = EntUser::construct(json!({"name": "Joe"})).unwrap();
    let id = joe.id;
    joe.save(&ctx).await.unwrap();

    let found = EntUser::find_one(&ctx, Filter::eq("name", "Joe"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, id);
}

#[tokio::test]
async fn test_second_save_replaces_instead_of_inserting() {
    let ctx = support::setup().await;
    let mut joe = EntUser::new("Joe");
    joe.save(&ctx).await.unwrap();
    joe.name = Some("Joseph".to_string());
    joe.save(&ctx).await.unwrap();

    assert_eq!(EntUser::count(&ctx, Filter::all()).await.unwrap(), 1);
    let stored = EntUser::find_by_id(&ctx, joe.id).await.unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("Joseph"));
}
