//! # services
//!
//! Business rules of the blog. Each service validates raw input, runs the
//! domain operation against the ports and reports failures as `AppError`.

pub mod accounts;
pub mod comments;
pub mod ownership;
pub mod pagination;
pub mod posts;
pub mod topics;
pub mod validation;

pub use accounts::{AccountService, LoginInput, RegisterInput};
pub use comments::{CommentInput, CommentService, ListCommentsQuery};
pub use pagination::{Page, PageRequest, PaginationConfig};
pub use posts::{ListPostsQuery, PostInput, PostService};
pub use topics::TopicResolver;
