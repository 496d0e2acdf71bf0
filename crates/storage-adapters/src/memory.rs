//! # In-memory store
//!
//! A single `MemoryStore` implements every repository port over `DashMap`s.
//! It backs tests, the seeder dry-run and deployments without a database.
//!
//! Cross-map writes take their locks in the order users → posts → comments
//! and never hold a guard on one map while touching the same map again.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{
    Comment, CommentId, CommentPatch, CommentRepository, PageWindow, Post, PostFilter, PostId,
    PostPatch, PostRepository, RepoError, Topic, TopicId, TopicRepository, User, UserId,
    UserRepository,
};
use tracing::debug;

/// A record plus its insertion sequence, used for stable ordering.
#[derive(Debug, Clone)]
struct Sequenced<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<UserId, User>,
    usernames: DashMap<String, UserId>,
    emails: DashMap<String, UserId>,
    posts: DashMap<PostId, Sequenced<Post>>,
    comments: DashMap<CommentId, Sequenced<Comment>>,
    topics: DashMap<TopicId, Topic>,
    topic_names: DashMap<String, TopicId>,
    seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}

fn window<T>(items: Vec<T>, window: PageWindow) -> Vec<T> {
    let skip = usize::try_from(window.skip).unwrap_or(usize::MAX);
    let take = usize::try_from(window.limit).unwrap_or(usize::MAX);
    items.into_iter().skip(skip).take(take).collect()
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn count(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let n = self
            .posts
            .iter()
            .filter(|entry| filter.matches(&entry.value().value))
            .count();
        Ok(n as u64)
    }

    async fn list(&self, filter: &PostFilter, page: PageWindow) -> Result<Vec<Post>, RepoError> {
        let mut matching: Vec<Sequenced<Post>> = self
            .posts
            .iter()
            .filter(|entry| filter.matches(&entry.value().value))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| {
            b.value
                .created_at
                .cmp(&a.value.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(window(
            matching.into_iter().map(|s| s.value).collect(),
            page,
        ))
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepoError> {
        Ok(self.posts.get(&id).map(|entry| entry.value.clone()))
    }

    async fn create(&self, post: &Post) -> Result<(), RepoError> {
        let Some(mut author) = self.users.get_mut(&post.author) else {
            return Err(RepoError::MissingReference(format!("user {}", post.author)));
        };
        match self.posts.entry(post.id) {
            Entry::Occupied(_) => return Err(RepoError::Conflict(format!("post {}", post.id))),
            Entry::Vacant(slot) => {
                slot.insert(Sequenced {
                    seq: self.next_seq(),
                    value: post.clone(),
                });
            }
        }
        author.posts.push(post.id);
        Ok(())
    }

    async fn update(&self, id: PostId, patch: &PostPatch) -> Result<Option<Post>, RepoError> {
        Ok(self.posts.get_mut(&id).map(|mut entry| {
            patch.apply_to(&mut entry.value);
            entry.value.clone()
        }))
    }

    async fn delete(&self, id: PostId) -> Result<Option<Post>, RepoError> {
        let Some((_, removed)) = self.posts.remove(&id) else {
            return Ok(None);
        };
        let post = removed.value;
        for comment in &post.comments {
            self.comments.remove(comment);
        }
        if let Some(mut author) = self.users.get_mut(&post.author) {
            author.posts.retain(|p| *p != id);
        }
        debug!(post = %id, comments = post.comments.len(), "removed post with its comments");
        Ok(Some(post))
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn count_for_post(&self, post: PostId) -> Result<u64, RepoError> {
        let n = self
            .comments
            .iter()
            .filter(|entry| entry.value().value.post == post)
            .count();
        Ok(n as u64)
    }

    async fn list_for_post(
        &self,
        post: PostId,
        page: PageWindow,
    ) -> Result<Vec<Comment>, RepoError> {
        let mut matching: Vec<Sequenced<Comment>> = self
            .comments
            .iter()
            .filter(|entry| entry.value().value.post == post)
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(|a, b| {
            a.value
                .created_at
                .cmp(&b.value.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        Ok(window(
            matching.into_iter().map(|s| s.value).collect(),
            page,
        ))
    }

    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>, RepoError> {
        Ok(self.comments.get(&id).map(|entry| entry.value.clone()))
    }

    async fn create(&self, comment: &Comment) -> Result<(), RepoError> {
        let Some(mut parent) = self.posts.get_mut(&comment.post) else {
            return Err(RepoError::MissingReference(format!("post {}", comment.post)));
        };
        match self.comments.entry(comment.id) {
            Entry::Occupied(_) => {
                return Err(RepoError::Conflict(format!("comment {}", comment.id)))
            }
            Entry::Vacant(slot) => {
                slot.insert(Sequenced {
                    seq: self.next_seq(),
                    value: comment.clone(),
                });
            }
        }
        parent.value.comments.push(comment.id);
        Ok(())
    }

    async fn update(
        &self,
        id: CommentId,
        patch: &CommentPatch,
    ) -> Result<Option<Comment>, RepoError> {
        Ok(self.comments.get_mut(&id).map(|mut entry| {
            patch.apply_to(&mut entry.value);
            entry.value.clone()
        }))
    }

    async fn delete(&self, id: CommentId) -> Result<Option<Comment>, RepoError> {
        let Some((_, removed)) = self.comments.remove(&id) else {
            return Ok(None);
        };
        let comment = removed.value;
        if let Some(mut parent) = self.posts.get_mut(&comment.post) {
            parent.value.comments.retain(|c| *c != id);
        }
        Ok(Some(comment))
    }
}

#[async_trait]
impl TopicRepository for MemoryStore {
    async fn find_by_id(&self, id: TopicId) -> Result<Option<Topic>, RepoError> {
        Ok(self.topics.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Topic>, RepoError> {
        let Some(id) = self.topic_names.get(name).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.topics.get(&id).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, topic: &Topic) -> Result<(), RepoError> {
        match self.topic_names.entry(topic.name.clone()) {
            Entry::Occupied(_) => Err(RepoError::Conflict(format!("topic {}", topic.name))),
            Entry::Vacant(slot) => {
                // the name guard is held until the topic itself is visible
                self.topics.insert(topic.id, topic.clone());
                slot.insert(topic.id);
                Ok(())
            }
        }
    }

    async fn list(&self) -> Result<Vec<Topic>, RepoError> {
        let mut topics: Vec<Topic> = self
            .topics
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(topics)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepoError> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let Some(id) = self.usernames.get(username).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, user: &User) -> Result<(), RepoError> {
        let Entry::Vacant(name_slot) = self.usernames.entry(user.username.clone()) else {
            return Err(RepoError::Conflict(format!("username {}", user.username)));
        };
        let Entry::Vacant(email_slot) = self.emails.entry(user.email.clone()) else {
            return Err(RepoError::Conflict(format!("email {}", user.email)));
        };
        self.users.insert(user.id, user.clone());
        email_slot.insert(user.id);
        name_slot.insert(user.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn user(name: &str) -> User {
        User {
            id: UserId::new(),
            username: name.into(),
            email: format!("{name}@example.com"),
            password_hash: "hash".into(),
            posts: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn post(author: UserId, topic: TopicId, age_minutes: i64) -> Post {
        Post {
            id: PostId::new(),
            author,
            title: "Title".into(),
            body: "Body".into(),
            topic,
            created_at: Utc::now() - Duration::minutes(age_minutes),
            comments: Vec::new(),
        }
    }

    fn comment(post: PostId) -> Comment {
        Comment {
            id: CommentId::new(),
            post,
            email: "reader@example.com".into(),
            title: "Reply".into(),
            body: "A reply long enough".into(),
            created_at: Utc::now(),
        }
    }

    fn all() -> PageWindow {
        PageWindow {
            page: 0,
            skip: 0,
            limit: 20,
        }
    }

    #[tokio::test]
    async fn creating_a_post_links_the_author() {
        let store = MemoryStore::new();
        let ada = user("ada");
        UserRepository::create(&store, &ada).await.unwrap();

        let p = post(ada.id, TopicId::new(), 0);
        PostRepository::create(&store, &p).await.unwrap();

        let stored = UserRepository::find_by_id(&store, ada.id).await.unwrap().unwrap();
        assert_eq!(stored.posts, vec![p.id]);
    }

    #[tokio::test]
    async fn posts_need_an_existing_author() {
        let store = MemoryStore::new();
        let err = PostRepository::create(&store, &post(UserId::new(), TopicId::new(), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::MissingReference(_)));
        assert_eq!(store.count(&PostFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn posts_list_newest_first_and_honor_filters() {
        let store = MemoryStore::new();
        let ada = user("ada");
        let bob = user("bob");
        UserRepository::create(&store, &ada).await.unwrap();
        UserRepository::create(&store, &bob).await.unwrap();
        let rust = TopicId::new();

        let old = post(ada.id, rust, 30);
        let new = post(ada.id, rust, 1);
        let other = post(bob.id, TopicId::new(), 5);
        for p in [&old, &new, &other] {
            PostRepository::create(&store, p).await.unwrap();
        }

        let listed = PostRepository::list(&store, &PostFilter::default(), all())
            .await
            .unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![new.id, other.id, old.id]);

        let filter = PostFilter {
            topic: Some(rust),
            author: Some(ada.id),
        };
        assert_eq!(store.count(&filter).await.unwrap(), 2);

        let second = PageWindow {
            page: 1,
            skip: 1,
            limit: 1,
        };
        let paged = PostRepository::list(&store, &filter, second).await.unwrap();
        assert_eq!(paged[0].id, old.id);
    }

    #[tokio::test]
    async fn deleting_a_post_cascades() {
        let store = MemoryStore::new();
        let ada = user("ada");
        UserRepository::create(&store, &ada).await.unwrap();
        let p = post(ada.id, TopicId::new(), 0);
        PostRepository::create(&store, &p).await.unwrap();
        let c = comment(p.id);
        CommentRepository::create(&store, &c).await.unwrap();

        let removed = PostRepository::delete(&store, p.id).await.unwrap().unwrap();
        assert_eq!(removed.comments, vec![c.id]);
        assert!(CommentRepository::find_by_id(&store, c.id).await.unwrap().is_none());
        let author = UserRepository::find_by_id(&store, ada.id).await.unwrap().unwrap();
        assert!(author.posts.is_empty());
    }

    #[tokio::test]
    async fn comments_link_and_unlink_their_parent() {
        let store = MemoryStore::new();
        let ada = user("ada");
        UserRepository::create(&store, &ada).await.unwrap();
        let p = post(ada.id, TopicId::new(), 0);
        PostRepository::create(&store, &p).await.unwrap();

        let first = comment(p.id);
        let second = comment(p.id);
        CommentRepository::create(&store, &first).await.unwrap();
        CommentRepository::create(&store, &second).await.unwrap();

        let listed = store.list_for_post(p.id, all()).await.unwrap();
        assert_eq!(listed[0].id, first.id);

        CommentRepository::delete(&store, first.id).await.unwrap();
        let parent = PostRepository::find_by_id(&store, p.id).await.unwrap().unwrap();
        assert_eq!(parent.comments, vec![second.id]);

        let orphan = comment(PostId::new());
        let err = CommentRepository::create(&store, &orphan).await.unwrap_err();
        assert!(matches!(err, RepoError::MissingReference(_)));
    }

    #[tokio::test]
    async fn topic_names_are_unique() {
        let store = MemoryStore::new();
        let rust = Topic {
            id: TopicId::new(),
            name: "rust".into(),
        };
        store.insert(&rust).await.unwrap();
        let dup = Topic {
            id: TopicId::new(),
            name: "rust".into(),
        };
        assert!(matches!(
            store.insert(&dup).await,
            Err(RepoError::Conflict(_))
        ));
        let found = store.find_by_name("rust").await.unwrap().unwrap();
        assert_eq!(found.id, rust.id);
    }

    #[tokio::test]
    async fn concurrent_topic_inserts_keep_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let topic = Topic {
                    id: TopicId::new(),
                    name: "rust".into(),
                };
                store.insert(&topic).await.is_ok()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(TopicRepository::list(store.as_ref()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn usernames_and_emails_are_unique() {
        let store = MemoryStore::new();
        UserRepository::create(&store, &user("ada")).await.unwrap();

        let mut same_email = user("ada2");
        same_email.email = "ada@example.com".into();
        assert!(matches!(
            UserRepository::create(&store, &same_email).await,
            Err(RepoError::Conflict(_))
        ));
        // the rejected user must not leave its username behind
        assert!(store.find_by_username("ada2").await.unwrap().is_none());
        assert!(matches!(
            UserRepository::create(&store, &user("ada")).await,
            Err(RepoError::Conflict(_))
        ));
    }
}
