pub mod hook_repo;

pub use hook_repo::HookRepo;
