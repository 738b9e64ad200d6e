mod support;

use serde_json::json;
use users_db::ent_framework::Entity;
use users_db::entities::{EntUser, Post};
use users_db::infrastructure::Filter;

#[tokio::test]
async fn test_post_count_returns_number_of_posts() {
    let ctx = support::setup().await;
    let mut joe = EntUser::construct(json!({
        "name": "Joe",
        "posts": [{"url": "https://www.udemy.com/"}],
    }))
    .unwrap();
    assert_eq!(joe.post_count(), 1);
    joe.save(&ctx).await.unwrap();

    let user = EntUser::find_one(&ctx, Filter::eq("name", "Joe"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.post_count(), 1);
}

#[tokio::test]
async fn test_post_count_matches_posts_after_reload() {
    let ctx = support::setup().await;
    for n in [0usize, 1, 5] {
        let mut user = EntUser::new(&format!("User{}", n));
        for i in 0..n {
            user.posts.push(Post::new(&format!("https://example.com/{}", i)));
        }
        assert_eq!(user.post_count(), user.posts.len());
        user.save(&ctx).await.unwrap();

        let stored = EntUser::find_by_id(&ctx, user.id).await.unwrap().unwrap();
        assert_eq!(stored.post_count(), n);
    }
}

#[tokio::test]
async fn test_post_count_is_never_stored() {
    let ctx = support::setup().await;
    let mut joe = EntUser::new("Joe");
    joe.posts.push(Post::new("https://www.udemy.com/"));
    joe.save(&ctx).await.unwrap();

    let doc = ctx
        .db()
        .find_one_document("users", &Filter::id(joe.id))
        .await
        .unwrap()
        .unwrap();
    assert!(doc.get("postCount").is_none());
}
