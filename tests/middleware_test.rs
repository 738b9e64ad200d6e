mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use users_db::ent_framework::{
    create_default_hook_registry, EntContext, EntHook, Entity, HookContext, HookOperation,
    HookTiming, Ref,
};
use users_db::entities::{EntBlogPost, EntUser, EntityType};
use users_db::error::{AppError, AppResult};
use users_db::infrastructure::{DatabaseInterface, Filter, InMemoryDatabase};
use users_db::schemas::create_schema_registry;

const TITLE: &str = "My *Awesome* Blog Post Title";

async fn seed(ctx: &EntContext) -> (EntUser, EntBlogPost) {
    let mut joe = EntUser::new("Joe");
    let mut blog_post = EntBlogPost::new(TITLE, "My blog post content is *awesome*.");
    joe.blog_posts.push(Ref::from(&blog_post));
    tokio::try_join!(joe.save(ctx), blog_post.save(ctx)).unwrap();
    (joe, blog_post)
}

#[tokio::test]
async fn test_removing_a_user_removes_its_blog_posts() {
    let ctx = support::setup().await;
    let (joe, _) = seed(&ctx).await;
    EntBlogPost::new("Unrelated", "Kept").save(&ctx).await.unwrap();

    joe.remove(&ctx).await.unwrap();

    assert_eq!(EntBlogPost::count(&ctx, Filter::all()).await.unwrap(), 1);
    assert!(EntBlogPost::find_one(&ctx, Filter::eq("title", TITLE))
        .await
        .unwrap()
        .is_none());
    assert!(EntUser::find_by_id(&ctx, joe.id).await.unwrap().is_none());
}

async fn assert_user_gone_and_blog_post_kept(
    ctx: &EntContext,
    joe: &EntUser,
    blog_post: &EntBlogPost,
) {
    assert!(EntUser::find_by_id(ctx, joe.id).await.unwrap().is_none());
    assert!(EntBlogPost::find_by_id(ctx, blog_post.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_remove_many_does_not_cascade() {
    let ctx = support::setup().await;
    let (joe, blog_post) = seed(&ctx).await;

    let result = EntUser::remove_many(&ctx, Filter::id(joe.id)).await.unwrap();
    assert_eq!(result.deleted, 1);
    assert_user_gone_and_blog_post_kept(&ctx, &joe, &blog_post).await;
}

#[tokio::test]
async fn test_find_one_and_remove_does_not_cascade() {
    let ctx = support::setup().await;
    let (joe, blog_post) = seed(&ctx).await;

    let removed = EntUser::find_one_and_remove(&ctx, Filter::eq("name", "Joe"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(removed.id, joe.id);
    assert_user_gone_and_blog_post_kept(&ctx, &joe, &blog_post).await;
}

#[tokio::test]
async fn test_find_by_id_and_remove_does_not_cascade() {
    let ctx = support::setup().await;
    let (joe, blog_post) = seed(&ctx).await;

    let removed = EntUser::find_by_id_and_remove(&ctx, joe.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(removed.id, joe.id);
    assert_user_gone_and_blog_post_kept(&ctx, &joe, &blog_post).await;
}

#[tokio::test]
async fn test_failed_cascade_keeps_the_user() {
    let ctx = support::FailingDeletes::context("blogposts");
    let (joe, blog_post) = seed(&ctx).await;

    let err = joe.remove(&ctx).await.unwrap_err();
    match &err {
        AppError::CascadeFailure { source, .. } => {
            assert!(matches!(**source, AppError::DatabaseError(_)))
        }
        other => panic!("expected cascade failure, got {}", other),
    }

    assert!(EntUser::find_by_id(&ctx, joe.id).await.unwrap().is_some());
    assert!(EntBlogPost::find_by_id(&ctx, blog_post.id)
        .await
        .unwrap()
        .is_some());
}

struct CountingHook {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl EntHook for CountingHook {
    async fn execute(&self, _db: &dyn DatabaseInterface, ctx: &mut HookContext) -> AppResult<()> {
        assert_eq!(ctx.entity_type, EntityType::User);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "counting_hook"
    }

    fn operations(&self) -> Vec<HookOperation> {
        vec![HookOperation::Save]
    }

    fn timing(&self) -> HookTiming {
        HookTiming::Before
    }
}

struct RejectingHook;

#[async_trait]
impl EntHook for RejectingHook {
    async fn execute(&self, _db: &dyn DatabaseInterface, _ctx: &mut HookContext) -> AppResult<()> {
        Err(AppError::BadRequest("saves are closed".to_string()))
    }

    fn name(&self) -> &str {
        "rejecting_hook"
    }

    fn operations(&self) -> Vec<HookOperation> {
        vec![HookOperation::Save]
    }

    fn timing(&self) -> HookTiming {
        HookTiming::Before
    }
}

#[tokio::test]
async fn test_custom_hooks_run_in_order_and_errors_pass_through() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut hooks = create_default_hook_registry(&create_schema_registry());
    hooks.register_hook(
        EntityType::User,
        Box::new(CountingHook {
            calls: Arc::clone(&calls),
        }),
    );
    hooks.register_hook(EntityType::User, Box::new(RejectingHook));
    let ctx = EntContext::with_hooks(Arc::new(InMemoryDatabase::new("hooks")), hooks).unwrap();

    let mut joe = EntUser::new("Joe");
    let err = joe.save(&ctx).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(EntUser::count(&ctx, Filter::all()).await.unwrap(), 0);

    // blog posts have no custom hooks
    EntBlogPost::new("T", "C").save(&ctx).await.unwrap();
}
