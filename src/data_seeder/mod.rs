use tracing::info;

use crate::ent_framework::{EntContext, Entity, Ref};
use crate::entities::{EntBlogPost, EntComment, EntUser, Post};
use crate::error::AppResult;

/// The entities created by `seed_sample_graph`, wired together
pub struct SampleGraph {
    pub user: EntUser,
    pub blog_post: EntBlogPost,
    pub comment: EntComment,
}

/// Create Joe, a blog post Joe wrote and a comment Joe left on it.
///
/// The three saves are independent and issued jointly; the first failure
/// wins and the others may or may not have been written.
pub async fn seed_sample_graph(ctx: &EntContext) -> AppResult<SampleGraph> {
    let mut user = EntUser::new("Joe");
    user.posts.push(Post::new("https://example.com/hello"));
    let mut blog_post = EntBlogPost::new(
        "My *Awesome* Blog Post Title",
        "My blog post content is *awesome*.",
    );
    let mut comment = EntComment::new("Wow! That blog post was totally *awesome*.");

    user.blog_posts.push(Ref::from(&blog_post));
    blog_post.comments.push(Ref::from(&comment));
    comment.user = Some(Ref::from(&user));

    tokio::try_join!(user.save(ctx), blog_post.save(ctx), comment.save(ctx))?;
    info!(
        "Seeded user {} with blog post {} and comment {}",
        user.id, blog_post.id, comment.id
    );

    Ok(SampleGraph {
        user,
        blog_post,
        comment,
    })
}
