//! Value types shared by the cache, the orchestrator and the link resolver.

pub mod find_options;
pub mod follow_link;
pub mod paginated_list;
pub mod patch;
pub mod remote_data;
pub mod resource;
pub mod types;

pub use find_options::{FindListOptions, RequestParam, SortDirection, SortOptions};
pub use follow_link::{FollowLinkConfig, follow_link, follow_list};
pub use paginated_list::PaginatedList;
pub use patch::PatchBatch;
pub use remote_data::{RemoteData, RequestEntryState};
pub use resource::Resource;
pub use types::{Method, RequestId, ResourceType};
