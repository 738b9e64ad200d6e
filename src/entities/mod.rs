// Entities of the users data model and their type tags

use std::fmt;

pub mod ent_blog_post;
pub mod ent_comment;
pub mod ent_user;
pub mod post;

pub use ent_blog_post::EntBlogPost;
pub use ent_comment::EntComment;
pub use ent_user::EntUser;
pub use post::Post;

/// Top-level entity types, each stored in its own collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    User,
    BlogPost,
    Comment,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::User => "User",
            EntityType::BlogPost => "BlogPost",
            EntityType::Comment => "Comment",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            EntityType::User => "users",
            EntityType::BlogPost => "blogposts",
            EntityType::Comment => "comments",
        }
    }

    pub fn all() -> [EntityType; 3] {
        [EntityType::User, EntityType::BlogPost, EntityType::Comment]
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value types embedded inside entities, with no identity of their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddedType {
    Post,
}

impl EmbeddedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddedType::Post => "Post",
        }
    }
}
