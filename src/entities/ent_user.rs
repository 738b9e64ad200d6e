// EntUser - root entity owning embedded posts and referencing blog posts

use serde::{Deserialize, Serialize, Serializer};

use super::{EntBlogPost, EntityType, Post};
use crate::core::DocumentId;
use crate::ent_framework::{Entity, Ref};
use crate::schemas::UserSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntUser {
    #[serde(rename = "_id", default)]
    pub id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub likes: i64,
    #[serde(default, serialize_with = "serialize_kept_posts")]
    pub posts: Vec<Post>,
    #[serde(rename = "blogPosts", default)]
    pub blog_posts: Vec<Ref<EntBlogPost>>,
    #[serde(skip)]
    is_new: bool,
}

fn serialize_kept_posts<S: Serializer>(posts: &[Post], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(posts.iter().filter(|post| !post.is_removed()))
}

impl EntUser {
    pub fn new(name: &str) -> Self {
        Self {
            id: DocumentId::new(),
            name: Some(name.to_string()),
            likes: 0,
            posts: Vec::new(),
            blog_posts: Vec::new(),
            is_new: true,
        }
    }

    /// Number of embedded posts, not counting ones marked for removal.
    /// Computed on every call and never stored.
    pub fn post_count(&self) -> usize {
        self.posts.iter().filter(|post| !post.is_removed()).count()
    }
}

impl Entity for EntUser {
    const ENTITY_TYPE: EntityType = EntityType::User;
    type Schema = UserSchema;

    fn id(&self) -> DocumentId {
        self.id
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn set_new(&mut self, is_new: bool) {
        self.is_new = is_new;
    }

    fn after_save(&mut self) {
        self.posts.retain(|post| !post.is_removed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_count_tracks_posts() {
        let mut joe = EntUser::new("Joe");
        assert_eq!(joe.post_count(), 0);

        joe.posts.push(Post::new("a"));
        joe.posts.push(Post::new("b"));
        assert_eq!(joe.post_count(), 2);

        joe.posts[0].remove();
        assert_eq!(joe.post_count(), 1);
    }

    #[test]
    fn test_document_skips_removed_posts_and_virtuals() {
        let mut joe = EntUser::new("Joe");
        joe.posts.push(Post::new("a"));
        joe.posts.push(Post::new("b"));
        joe.posts[0].remove();

        let doc = joe.to_document().unwrap();
        assert_eq!(doc["posts"].as_array().unwrap().len(), 1);
        assert_eq!(doc["posts"][0]["url"], json!("b"));
        assert!(doc["posts"][0]["createdAt"].is_string());
        assert!(doc.get("postCount").is_none());
        assert_eq!(doc["likes"], json!(0));
    }

    #[test]
    fn test_construct_accepts_entity_or_id_in_blog_posts() {
        let post = EntBlogPost::new("T", "C");
        let other = DocumentId::new();
        let joe = EntUser::construct(json!({
            "name": "Joe",
            "blogPosts": [post.to_document().unwrap(), other.to_string()],
        }))
        .unwrap();

        assert!(joe.is_new());
        assert!(joe.blog_posts[0].is_loaded());
        let doc = joe.to_document().unwrap();
        assert_eq!(
            doc["blogPosts"],
            json!([post.id.to_string(), other.to_string()])
        );
    }
}
